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

/// Expected query duration. The server treats short and long queries
/// differently when scheduling them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryDuration {
    /// The query is expected to return more than 100 records per node. The
    /// server runs the query in a thread pool with a configurable number of
    /// threads.
    Long,

    /// The query is expected to return less than 100 records per node. The
    /// server runs the query on the connection's service thread.
    Short,

    /// Treat the query as a long query, but relax the read consistency for
    /// AP namespaces.
    LongRelaxAP,
}

impl Default for QueryDuration {
    fn default() -> Self {
        QueryDuration::Long
    }
}
