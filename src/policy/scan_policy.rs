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

use crate::expressions::FilterExpression;
use crate::policy::{BasePolicy, PolicyLike};

/// `ScanPolicy` encapsulates optional parameters used in scan operations.
#[derive(Debug, Clone)]
pub struct ScanPolicy {
    /// Base policy instance.
    pub base_policy: BasePolicy,

    /// Approximate number of records to return to the client. This number is
    /// divided by the number of nodes involved in the scan. The actual
    /// number of records returned may be less than this number.
    /// 0 means no limit.
    pub max_records: u64,

    /// Limit the scan to records per second per node. 0 means no limit.
    pub records_per_second: u32,

    /// Number of records to place in queue before blocking. Records received
    /// from multiple server nodes will be placed in a queue. A high
    /// concurrency value will increase memory requirements, but will also
    /// increase parallelism.
    pub record_queue_size: usize,

    /// Optional filter expression.
    pub filter_expression: Option<FilterExpression>,
}

impl ScanPolicy {
    /// Create a new scan policy instance.
    pub fn new() -> Self {
        ScanPolicy::default()
    }

    /// Get the current filter expression.
    pub const fn filter_expression(&self) -> Option<&FilterExpression> {
        self.filter_expression.as_ref()
    }
}

impl Default for ScanPolicy {
    fn default() -> Self {
        ScanPolicy {
            base_policy: BasePolicy::default(),
            max_records: 0,
            records_per_second: 0,
            record_queue_size: 1024,
            filter_expression: None,
        }
    }
}

impl PolicyLike for ScanPolicy {
    fn base(&self) -> &BasePolicy {
        &self.base_policy
    }
}
