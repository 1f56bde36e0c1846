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

use std::sync::Arc;

use crate::cluster::partition::PARTITIONS;
use crate::cluster::Node;

// Per-namespace replica table. Published as an immutable snapshot: the
// tending task builds a new instance and swaps the map pointer, so routing
// reads never observe a half-updated table.
#[derive(Debug, Clone)]
pub struct Partitions {
    // replicas[replica_index][partition_id]; index 0 is the master column.
    pub replicas: Vec<Vec<Option<Arc<Node>>>>,

    // Rebalance generation per partition; stale updates are dropped.
    pub regimes: Vec<u32>,

    // True when the namespace runs in strong-consistency mode.
    pub sc_mode: bool,
}

impl Partitions {
    pub fn new(replica_count: usize, sc_mode: bool) -> Self {
        let mut replicas = Vec::with_capacity(replica_count);
        for _ in 0..replica_count {
            replicas.push(vec![None; PARTITIONS]);
        }

        Partitions {
            replicas,
            regimes: vec![0; PARTITIONS],
            sc_mode,
        }
    }

    pub fn replica_count(&self) -> usize {
        self.replicas.len()
    }

    // Grow or shrink the replica columns while keeping existing assignments.
    pub fn set_replica_count(&mut self, replica_count: usize) {
        self.replicas.resize_with(replica_count, || vec![None; PARTITIONS]);
    }

    /// A partition is available when the current snapshot knows a master
    /// for it.
    pub fn is_available(&self, partition_id: usize) -> bool {
        self.replicas
            .get(0)
            .and_then(|masters| masters.get(partition_id))
            .map_or(false, Option::is_some)
    }
}
