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

/// `RecordExistsAction` determines how to handle record writes based on record generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordExistsAction {
    /// Create or update record. Merge write command bins with existing bins.
    Update,

    /// Update record only. Fail if record does not exist. Merge write command bins with existing
    /// bins.
    UpdateOnly,

    /// Create or replace record. Delete existing bins not referenced by write command bins.
    Replace,

    /// Replace record only. Fail if record does not exist. Delete existing bins not referenced by
    /// write command bins.
    ReplaceOnly,

    /// Create only. Fail if record exists.
    CreateOnly,
}

impl Default for RecordExistsAction {
    fn default() -> Self {
        RecordExistsAction::Update
    }
}
