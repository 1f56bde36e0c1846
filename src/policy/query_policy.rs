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
use crate::policy::{BasePolicy, PolicyLike, QueryDuration};

/// `QueryPolicy` encapsulates parameters for query operations.
#[derive(Debug, Clone)]
pub struct QueryPolicy {
    /// Base policy instance.
    pub base_policy: BasePolicy,

    /// Expected duration of the query, which affects server-side scheduling.
    pub expected_duration: QueryDuration,

    /// Approximate number of records to return to the client. 0 means no
    /// limit.
    pub max_records: u64,

    /// Limit the query to records per second per node. 0 means no limit.
    pub records_per_second: u32,

    /// Number of records to place in queue before blocking. Records received
    /// from multiple server nodes will be placed in a queue. A high
    /// concurrency value will increase memory requirements, but will also
    /// increase parallelism.
    pub record_queue_size: usize,

    /// Optional filter expression.
    pub filter_expression: Option<FilterExpression>,
}

impl QueryPolicy {
    /// Create a new query policy instance.
    pub fn new() -> Self {
        QueryPolicy::default()
    }

    /// Get the current filter expression.
    pub const fn filter_expression(&self) -> Option<&FilterExpression> {
        self.filter_expression.as_ref()
    }
}

impl Default for QueryPolicy {
    fn default() -> Self {
        QueryPolicy {
            base_policy: BasePolicy::default(),
            expected_duration: QueryDuration::default(),
            max_records: 0,
            records_per_second: 0,
            record_queue_size: 1024,
            filter_expression: None,
        }
    }
}

impl PolicyLike for QueryPolicy {
    fn base(&self) -> &BasePolicy {
        &self.base_policy
    }
}
