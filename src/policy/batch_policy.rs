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
use crate::policy::{BasePolicy, Concurrency, PolicyLike};

/// `BatchPolicy` encapsulates parameters for all batch operations.
#[derive(Debug, Clone)]
pub struct BatchPolicy {
    /// Base policy instance.
    pub base_policy: BasePolicy,

    /// Concurrency mode for batch requests: sequential or parallel.
    pub concurrency: Concurrency,

    /// Allow batch to be processed immediately in the server's receiving thread when the server
    /// deems it to be appropriate. If false, the batch will always be processed in separate
    /// service threads.
    ///
    /// For batch exists or batch reads of smaller sized records (<= 1K per record), inline
    /// processing will be significantly faster on in-memory namespaces.
    ///
    /// Default: true
    pub allow_inline: bool,

    /// Allow batch to be processed immediately in the server's receiving thread for SSD
    /// namespaces. If false, the batch will always be processed in separate service threads.
    ///
    /// Default: false
    pub allow_inline_ssd: bool,

    /// Should all batch keys be attempted regardless of errors. This field is used on both
    /// the client and server. The client handles node specific errors and the server handles
    /// key specific errors.
    ///
    /// If true, every batch key is attempted regardless of previous key specific errors.
    /// Node specific errors such as timeouts stop keys to that node, but keys directed at
    /// other nodes will continue to be processed.
    ///
    /// If false, the client will stop the entire batch on the first node or
    /// row error.
    ///
    /// Default: true
    pub respond_all_keys: bool,

    /// Optional filter expression applied to every record unless the record's
    /// own batch policy carries one.
    pub filter_expression: Option<FilterExpression>,
}

impl BatchPolicy {
    /// Create a new batch policy instance.
    pub fn new() -> Self {
        BatchPolicy::default()
    }

    /// Get the current filter expression.
    pub const fn filter_expression(&self) -> Option<&FilterExpression> {
        self.filter_expression.as_ref()
    }
}

impl Default for BatchPolicy {
    fn default() -> Self {
        BatchPolicy {
            base_policy: BasePolicy::default(),
            concurrency: Concurrency::Parallel,
            allow_inline: true,
            allow_inline_ssd: false,
            respond_all_keys: true,
            filter_expression: None,
        }
    }
}

impl PolicyLike for BatchPolicy {
    fn base(&self) -> &BasePolicy {
        &self.base_policy
    }
}
