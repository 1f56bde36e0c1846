// Copyright 2018-2025 Firefly Data Systems, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License. You may obtain a copy of
// the License at http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the
// License for the specific language governing permissions and limitations under
// the License.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::Mutex;

use crate::errors::Result;
use crate::Record;

/// Virtual collection of records retrieved through scans and queries. The
/// per-node streams push into a bounded queue; the consumer drains it with
/// [`Recordset::next_record`]. Closing the recordset is the cancellation
/// point: streams stop at their next record and in-flight connections are
/// discarded.
#[derive(Debug)]
pub struct Recordset {
    active: AtomicBool,
    task_id: u64,
    records: Mutex<mpsc::Receiver<Result<Record>>>,
}

impl Recordset {
    pub(crate) fn new(
        queue_size: usize,
        task_id: u64,
    ) -> (Arc<Recordset>, mpsc::Sender<Result<Record>>) {
        let (tx, rx) = mpsc::channel(queue_size.max(1));
        let recordset = Arc::new(Recordset {
            active: AtomicBool::new(true),
            task_id,
            records: Mutex::new(rx),
        });
        (recordset, tx)
    }

    /// Whether the scan or query is still producing records.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    /// Cancel the scan or query. Producers notice at the next record
    /// boundary; records already queued can still be drained.
    pub fn close(&self) {
        self.active.store(false, Ordering::Relaxed);
    }

    /// Returns the task id assigned to this scan/query.
    pub const fn task_id(&self) -> u64 {
        self.task_id
    }

    /// The next record, or `None` once all nodes finished streaming.
    pub async fn next_record(&self) -> Option<Result<Record>> {
        let mut records = self.records.lock().await;
        records.recv().await
    }
}
