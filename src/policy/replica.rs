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

/// Algorithm used to determine the target node for a command. The replica
/// algorithm only affects single-record and batch commands; writes always
/// start at the master replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replica {
    /// Use the partition's master replica only.
    Master,

    /// Distribute reads across master and prole replicas in round-robin
    /// fashion.
    MasterProles,

    /// Try the replica at the command's sequence offset; each retry advances
    /// the sequence to the next replica.
    Sequence,

    /// Prefer replicas on the client's configured racks; fall back to
    /// `Sequence` when none qualify.
    PreferRack,

    /// Distribute reads across all live replicas uniformly.
    Random,
}

impl Default for Replica {
    fn default() -> Self {
        Replica::Sequence
    }
}
