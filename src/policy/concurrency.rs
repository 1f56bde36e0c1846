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

/// Concurrency mode for batch requests. Per-record results are placed by
/// the caller's original order either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
    /// Issue the per-node batch requests sequentially. This mode has a lower
    /// resource overhead, but the requests take longer to complete.
    Sequential,

    /// Issue all batch requests in parallel, one task per node.
    Parallel,
}

impl Default for Concurrency {
    fn default() -> Self {
        Concurrency::Parallel
    }
}
