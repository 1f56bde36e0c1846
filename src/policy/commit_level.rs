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

/// `CommitLevel` determines how the server should wait for replication
/// before returning success to the client on a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitLevel {
    /// Wait until successfully committing master and all replicas.
    CommitAll,

    /// Wait until successfully committing master only.
    CommitMaster,
}

impl Default for CommitLevel {
    fn default() -> Self {
        CommitLevel::CommitAll
    }
}
