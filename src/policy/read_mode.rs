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

/// Read policy for availability-mode (AP) namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadModeAP {
    /// Involve a single node in the read operation.
    One,

    /// Involve all duplicates in the read operation.
    All,
}

impl Default for ReadModeAP {
    fn default() -> Self {
        ReadModeAP::One
    }
}

/// Read consistency under strong-consistency (SC) namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadModeSC {
    /// Ensures this client sees only an increasing sequence of record
    /// versions. Reads are not linearized across clients.
    Session,

    /// Ensures all clients see an increasing sequence of record versions.
    /// Reads are linearized and may incur extra server-side latency.
    Linearize,

    /// Session consistency, but allow reads from unfull replicas or
    /// migrating partitions.
    AllowReplica,

    /// Like `AllowReplica`, but also allow reads of partitions that are
    /// locally unavailable during a split.
    AllowUnavailable,
}

impl Default for ReadModeSC {
    fn default() -> Self {
        ReadModeSC::Session
    }
}
