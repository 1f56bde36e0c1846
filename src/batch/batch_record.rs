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

#[cfg(feature = "serialization")]
use serde::Serialize;

use crate::Key;
use crate::Record;
use crate::ResultCode;

/// Per-key result of a batch operation.
#[cfg_attr(feature = "serialization", derive(Serialize))]
#[derive(Debug, Clone)]
pub struct BatchRecord {
    /// Key.
    pub key: Key,

    /// Record result after the batch command has completed. Will be `None`
    /// if the record was not found or an error occurred.
    pub record: Option<Record>,

    /// Result code for this returned record. `None` when the record never
    /// received a response.
    pub result_code: Option<ResultCode>,

    /// Signifies that a write may have been applied even though an error was
    /// reported, because the request was already transmitted (possibly more
    /// than once) when the failure occurred.
    pub in_doubt: bool,

    has_write: bool,
}

impl BatchRecord {
    pub(crate) fn new(key: Key, has_write: bool) -> Self {
        BatchRecord {
            key,
            record: None,
            result_code: None,
            in_doubt: false,
            has_write,
        }
    }

    /// Does this record's operation contain a write.
    pub fn has_write(&self) -> bool {
        self.has_write
    }

    /// Whether the row completed successfully.
    pub fn is_ok(&self) -> bool {
        matches!(self.result_code, Some(ResultCode::Ok))
    }
}
