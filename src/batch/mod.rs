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

pub(crate) mod batch_executor;
mod batch_record;

use crate::commands::buffer::{FIELD_HEADER_SIZE, OPERATION_HEADER_SIZE};
use crate::expressions::FilterExpression;
use crate::msgpack::encoder;
use crate::operations::Operation;
use crate::Bins;
use crate::CommitLevel;
use crate::Expiration;
use crate::GenerationPolicy;
use crate::Key;
use crate::Record;
use crate::RecordExistsAction;
use crate::ResultCode;
use crate::Value;

pub(crate) use self::batch_executor::BatchExecutor;
pub use self::batch_record::BatchRecord;

use crate::errors::{Error, Result};

/// Policy for a single batch read operation.
#[derive(Debug, Clone, Default)]
pub struct BatchReadPolicy {
    /// Optional expression filter. When it evaluates to false the record is
    /// not read and its result code is set to `FilteredOut`.
    pub filter_expression: Option<FilterExpression>,
}

/// Policy for a single batch write operation.
#[derive(Debug, Clone)]
pub struct BatchWritePolicy {
    /// Qualifies how to handle writes where the record already exists.
    pub record_exists_action: RecordExistsAction,

    /// Qualifies how to handle record writes based on record generation.
    /// The default (None) indicates that the generation is not used to
    /// restrict writes.
    pub generation_policy: GenerationPolicy,

    /// Desired replication guarantee before the server reports a write as
    /// successful.
    pub commit_level: CommitLevel,

    /// Expected generation for the generation policy.
    pub generation: u32,

    /// Record expiration, also known as TTL (time-to-live).
    pub expiration: Expiration,

    /// Send user defined key in addition to hash digest on a record put.
    pub send_key: bool,

    /// If the write results in a record deletion, leave a tombstone for the
    /// record.
    pub durable_delete: bool,

    /// Under a multi-record transaction, only lock the record instead of
    /// applying the provisional value.
    pub on_locking_only: bool,

    /// Optional filter expression.
    pub filter_expression: Option<FilterExpression>,
}

impl Default for BatchWritePolicy {
    fn default() -> Self {
        Self {
            record_exists_action: RecordExistsAction::Update,
            generation_policy: GenerationPolicy::None,
            commit_level: CommitLevel::CommitAll,
            generation: 0,
            expiration: Expiration::NamespaceDefault,
            send_key: false,
            durable_delete: false,
            on_locking_only: false,
            filter_expression: None,
        }
    }
}

/// Policy for a single batch delete operation.
#[derive(Debug, Clone)]
pub struct BatchDeletePolicy {
    /// Qualifies how to handle record deletes based on record generation.
    pub generation_policy: GenerationPolicy,

    /// Desired replication guarantee before the server reports the delete as
    /// successful.
    pub commit_level: CommitLevel,

    /// Expected generation for the generation policy.
    pub generation: u32,

    /// Send user defined key in addition to hash digest.
    pub send_key: bool,

    /// Leave a tombstone for the deleted record.
    pub durable_delete: bool,

    /// Optional filter expression.
    pub filter_expression: Option<FilterExpression>,
}

impl Default for BatchDeletePolicy {
    fn default() -> Self {
        Self {
            generation_policy: GenerationPolicy::None,
            commit_level: CommitLevel::CommitAll,
            generation: 0,
            send_key: false,
            durable_delete: false,
            filter_expression: None,
        }
    }
}

/// Policy for a single batch UDF operation.
#[derive(Debug, Clone)]
pub struct BatchUdfPolicy {
    /// Desired replication guarantee before the server reports the write as
    /// successful.
    pub commit_level: CommitLevel,

    /// Record expiration, also known as TTL (time-to-live).
    pub expiration: Expiration,

    /// Send user defined key in addition to hash digest.
    pub send_key: bool,

    /// If the UDF results in a record deletion, leave a tombstone for the
    /// record.
    pub durable_delete: bool,

    /// Optional filter expression.
    pub filter_expression: Option<FilterExpression>,
}

impl Default for BatchUdfPolicy {
    fn default() -> Self {
        Self {
            commit_level: CommitLevel::CommitAll,
            expiration: Expiration::NamespaceDefault,
            send_key: false,
            durable_delete: false,
            filter_expression: None,
        }
    }
}

/// One per-key operation inside a batch request. Use the constructor
/// functions instead of building the variants directly.
pub enum BatchOperation<'a> {
    #[doc(hidden)]
    Read {
        record: BatchRecord,
        policy: &'a BatchReadPolicy,
        bins: Bins,
        ops: Option<Vec<Operation<'a>>>,
    },
    #[doc(hidden)]
    Write {
        record: BatchRecord,
        policy: &'a BatchWritePolicy,
        ops: Vec<Operation<'a>>,
    },
    #[doc(hidden)]
    Delete {
        record: BatchRecord,
        policy: &'a BatchDeletePolicy,
    },
    #[doc(hidden)]
    Udf {
        record: BatchRecord,
        policy: &'a BatchUdfPolicy,
        package_name: &'a str,
        function_name: &'a str,
        args: Option<Vec<Value>>,
    },
}

impl<'a> BatchOperation<'a> {
    /// Create a batch read operation.
    pub fn read(policy: &'a BatchReadPolicy, key: Key, bins: Bins) -> Self {
        BatchOperation::Read {
            record: BatchRecord::new(key, false),
            policy,
            bins,
            ops: None,
        }
    }

    /// Create a batch read with explicit read operations.
    pub fn read_ops(policy: &'a BatchReadPolicy, key: Key, ops: Vec<Operation<'a>>) -> Self {
        BatchOperation::Read {
            record: BatchRecord::new(key, false),
            policy,
            bins: Bins::None,
            ops: Some(ops),
        }
    }

    /// Create a batch write with one or more operations.
    pub fn write(policy: &'a BatchWritePolicy, key: Key, ops: Vec<Operation<'a>>) -> Self {
        BatchOperation::Write {
            record: BatchRecord::new(key, true),
            policy,
            ops,
        }
    }

    /// Create a batch delete operation.
    pub fn delete(policy: &'a BatchDeletePolicy, key: Key) -> Self {
        BatchOperation::Delete {
            record: BatchRecord::new(key, true),
            policy,
        }
    }

    /// Create a batch UDF operation.
    pub fn udf(
        policy: &'a BatchUdfPolicy,
        key: Key,
        package_name: &'a str,
        function_name: &'a str,
        args: Option<Vec<Value>>,
    ) -> Self {
        BatchOperation::Udf {
            record: BatchRecord::new(key, true),
            policy,
            package_name,
            function_name,
            args,
        }
    }

    /// The key this operation addresses.
    pub fn key(&self) -> &Key {
        &self.record().key
    }

    /// Whether this operation mutates its record.
    pub fn has_write(&self) -> bool {
        self.record().has_write()
    }

    /// Access to the per-record result.
    pub fn record(&self) -> &BatchRecord {
        match self {
            Self::Read { record, .. }
            | Self::Write { record, .. }
            | Self::Delete { record, .. }
            | Self::Udf { record, .. } => record,
        }
    }

    fn record_mut(&mut self) -> &mut BatchRecord {
        match self {
            Self::Read { record, .. }
            | Self::Write { record, .. }
            | Self::Delete { record, .. }
            | Self::Udf { record, .. } => record,
        }
    }

    /// Consume the operation, yielding the per-record result.
    pub fn into_record(self) -> BatchRecord {
        match self {
            Self::Read { record, .. }
            | Self::Write { record, .. }
            | Self::Delete { record, .. }
            | Self::Udf { record, .. } => record,
        }
    }

    // On-wire payload size of this row beyond the digest/header prefix and
    // the namespace/set fields.
    pub(crate) fn size(&self, parent_filter: Option<&FilterExpression>) -> Result<usize> {
        let filter_size = |own: &Option<FilterExpression>| -> usize {
            own.as_ref()
                .or(parent_filter)
                .map_or(0, |fe| fe.size() + FIELD_HEADER_SIZE as usize)
        };

        match self {
            Self::Read {
                policy, bins, ops, ..
            } => {
                let mut size: usize = filter_size(&policy.filter_expression);

                if let Bins::Some(bin_names) = bins {
                    for bin in bin_names {
                        size += bin.len() + OPERATION_HEADER_SIZE as usize;
                    }
                }

                if let Some(ops) = ops {
                    for op in ops {
                        if op.is_write() {
                            return Err(Error::InvalidArgument(
                                "Write operations not allowed in batch read".into(),
                            ));
                        }
                        size += op.estimate_size() + OPERATION_HEADER_SIZE as usize;
                    }
                }

                Ok(size)
            }
            Self::Write {
                record,
                policy,
                ops,
            } => {
                let mut size: usize = 2; // gen(2)
                size += filter_size(&policy.filter_expression);

                if policy.send_key {
                    if let Some(ref user_key) = record.key.user_key {
                        size += user_key.estimate_size() + FIELD_HEADER_SIZE as usize + 1;
                    }
                }

                let mut has_write = false;
                for op in ops {
                    if op.is_write() {
                        has_write = true;
                    }
                    size += op.estimate_size() + OPERATION_HEADER_SIZE as usize;
                }

                if !has_write {
                    return Err(Error::InvalidArgument(
                        "Batch write operations do not contain a write".into(),
                    ));
                }
                Ok(size)
            }
            Self::Delete { record, policy } => {
                let mut size: usize = 2; // gen(2)
                size += filter_size(&policy.filter_expression);

                if policy.send_key {
                    if let Some(ref user_key) = record.key.user_key {
                        size += user_key.estimate_size() + FIELD_HEADER_SIZE as usize + 1;
                    }
                }

                Ok(size)
            }
            Self::Udf {
                record,
                policy,
                package_name,
                function_name,
                args,
            } => {
                let mut size: usize = 2; // gen(2)
                size += filter_size(&policy.filter_expression);

                if policy.send_key {
                    if let Some(ref user_key) = record.key.user_key {
                        size += user_key.estimate_size() + FIELD_HEADER_SIZE as usize + 1;
                    }
                }

                size += package_name.len() + FIELD_HEADER_SIZE as usize;
                size += function_name.len() + FIELD_HEADER_SIZE as usize;
                if let Some(args) = args {
                    size += encoder::pack_array(&mut None, args) + FIELD_HEADER_SIZE as usize;
                } else {
                    size += encoder::pack_empty_args_array(&mut None) + FIELD_HEADER_SIZE as usize;
                }

                Ok(size)
            }
        }
    }

    // Prefix-repeat: a row may omit its header when namespace, set, policy
    // and bin selection all match the previous row. Conservative by design;
    // emitting a full header is always correct.
    pub(crate) fn match_header(&self, prev: Option<&BatchOperation<'a>>) -> bool {
        let prev = match prev {
            Some(prev) => prev,
            None => return false,
        };

        if self.key().namespace != prev.key().namespace
            || self.key().set_name != prev.key().set_name
        {
            return false;
        }

        match (self, prev) {
            (
                Self::Read {
                    policy, bins, ops, ..
                },
                Self::Read {
                    policy: prev_policy,
                    bins: prev_bins,
                    ops: prev_ops,
                    ..
                },
            ) => {
                std::ptr::eq(*policy, *prev_policy)
                    && bins == prev_bins
                    && ops.is_none()
                    && prev_ops.is_none()
            }
            (
                Self::Delete { policy, .. },
                Self::Delete {
                    policy: prev_policy,
                    ..
                },
            ) => std::ptr::eq(*policy, *prev_policy),
            _ => false,
        }
    }

    pub(crate) fn set_record(&mut self, record: Option<Record>) {
        let br = self.record_mut();
        br.record = record;
        br.result_code = Some(ResultCode::Ok);
    }

    pub(crate) fn set_result_code(&mut self, rc: ResultCode, in_doubt: bool) {
        let has_write = self.has_write();
        let br = self.record_mut();
        br.result_code = Some(rc);
        br.in_doubt = has_write && in_doubt;
    }

    /// Whether the row has received any response or verdict yet.
    pub(crate) fn is_resolved(&self) -> bool {
        self.record().result_code.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeat_requires_same_selection() {
        let policy = BatchReadPolicy::default();
        let other_policy = BatchReadPolicy::default();
        let a = BatchOperation::read(&policy, as_key!("ns", "s", 1), Bins::All);
        let b = BatchOperation::read(&policy, as_key!("ns", "s", 2), Bins::All);
        let c = BatchOperation::read(&policy, as_key!("ns", "other", 3), Bins::All);
        let d = BatchOperation::read(&policy, as_key!("ns", "s", 4), Bins::None);
        let e = BatchOperation::read(&other_policy, as_key!("ns", "s", 5), Bins::All);

        assert!(!a.match_header(None));
        assert!(b.match_header(Some(&a)));
        assert!(!c.match_header(Some(&a)));
        assert!(!d.match_header(Some(&a)));
        assert!(!e.match_header(Some(&a)));
    }

    #[test]
    fn writes_never_repeat() {
        let policy = BatchWritePolicy::default();
        let bin = as_bin!("a", 1);
        let a = BatchOperation::write(&policy, as_key!("ns", "s", 1), vec![crate::operations::put(&bin)]);
        let b = BatchOperation::write(&policy, as_key!("ns", "s", 2), vec![crate::operations::put(&bin)]);
        assert!(!b.match_header(Some(&a)));
    }

    #[test]
    fn batch_read_rejects_write_ops() {
        let policy = BatchReadPolicy::default();
        let bin = as_bin!("a", 1);
        let op = BatchOperation::read_ops(
            &policy,
            as_key!("ns", "s", 1),
            vec![crate::operations::put(&bin)],
        );
        assert!(op.size(None).is_err());
    }

    #[test]
    fn in_doubt_only_marks_writes() {
        let rp = BatchReadPolicy::default();
        let mut read = BatchOperation::read(&rp, as_key!("ns", "s", 1), Bins::All);
        read.set_result_code(ResultCode::Timeout, true);
        assert!(!read.record().in_doubt);

        let dp = BatchDeletePolicy::default();
        let mut delete = BatchOperation::delete(&dp, as_key!("ns", "s", 1));
        delete.set_result_code(ResultCode::Timeout, true);
        assert!(delete.record().in_doubt);
    }
}
