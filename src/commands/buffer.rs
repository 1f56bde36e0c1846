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

use std::io::{Read, Write};
use std::str;
use std::time::Duration;

use byteorder::{ByteOrder, LittleEndian, NetworkEndian};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::batch::BatchOperation;
use crate::commands::field_type::FieldType;
use crate::commands::BatchAttr;
use crate::errors::{Error, Result};
use crate::expressions::FilterExpression;
use crate::msgpack::encoder;
use crate::operations::{Operation, OperationBin, OperationData, OperationType};
use crate::policy::{
    BasePolicy, BatchPolicy, CommitLevel, GenerationPolicy, QueryDuration, QueryPolicy,
    ReadModeAP, ReadModeSC, RecordExistsAction, ScanPolicy, WritePolicy,
};
use crate::record::RecordVersion;
use crate::txn::Txn;
use crate::{Bin, Bins, Key, Statement, Value};

// Contains a read operation.
pub(crate) const INFO1_READ: u8 = 1;

// Get all bins.
pub(crate) const INFO1_GET_ALL: u8 = 1 << 1;

// Short query.
pub(crate) const INFO1_SHORT_QUERY: u8 = 1 << 2;

// Batch read or exists.
pub(crate) const INFO1_BATCH: u8 = 1 << 3;

// Do not read the bins.
pub(crate) const INFO1_NOBINDATA: u8 = 1 << 5;

// Involve all replicas in read operation.
pub(crate) const INFO1_READ_MODE_AP_ALL: u8 = 1 << 6;

// Tell the server to compress its response.
pub(crate) const INFO1_COMPRESS_RESPONSE: u8 = 1 << 7;

// Create or update record.
pub(crate) const INFO2_WRITE: u8 = 1;

// Fling a record into the belly of Moloch.
pub(crate) const INFO2_DELETE: u8 = 1 << 1;

// Update if expected generation == old.
pub(crate) const INFO2_GENERATION: u8 = 1 << 2;

// Update if new generation >= old, good for restore.
pub(crate) const INFO2_GENERATION_GT: u8 = 1 << 3;

// Command resulting in record deletion leaves tombstone (Enterprise only).
pub(crate) const INFO2_DURABLE_DELETE: u8 = 1 << 4;

// Create only. Fail if record already exists.
pub(crate) const INFO2_CREATE_ONLY: u8 = 1 << 5;

// Treat as long query, but relax read consistency.
pub(crate) const INFO2_RELAX_AP_LONG_QUERY: u8 = 1 << 6;

// Return a result for every operation.
pub(crate) const INFO2_RESPOND_ALL_OPS: u8 = 1 << 7;

// This is the last of a multi-part message.
pub(crate) const INFO3_LAST: u8 = 1;

// Commit to master only before declaring success.
pub(crate) const INFO3_COMMIT_MASTER: u8 = 1 << 1;

// Partition is complete response in scan.
pub(crate) const INFO3_PARTITION_DONE: u8 = 1 << 2;

// Update only. Merge bins.
pub(crate) const INFO3_UPDATE_ONLY: u8 = 1 << 3;

// Create or completely replace record.
pub(crate) const INFO3_CREATE_OR_REPLACE: u8 = 1 << 4;

// Completely replace existing record only.
pub(crate) const INFO3_REPLACE_ONLY: u8 = 1 << 5;

// See ReadModeSC.
pub(crate) const INFO3_SC_READ_TYPE: u8 = 1 << 6;

// See ReadModeSC.
pub(crate) const INFO3_SC_READ_RELAX: u8 = 1 << 7;

// Verify a read version under a transaction.
pub(crate) const INFO4_TXN_VERIFY_READ: u8 = 1;

// Roll a provisional transaction write forward.
pub(crate) const INFO4_TXN_ROLL_FORWARD: u8 = 1 << 1;

// Roll a provisional transaction write back.
pub(crate) const INFO4_TXN_ROLL_BACK: u8 = 1 << 2;

// Only lock the record; do not apply the write if absent.
pub(crate) const INFO4_TXN_ON_LOCKING_ONLY: u8 = 1 << 3;

pub(crate) const BATCH_MSG_REPEAT: u8 = 0x1;
pub(crate) const BATCH_MSG_INFO: u8 = 0x2;
pub(crate) const BATCH_MSG_GEN: u8 = 0x4;
pub(crate) const BATCH_MSG_TTL: u8 = 0x8;
pub(crate) const BATCH_MSG_INFO4: u8 = 0x10;

pub(crate) const MSG_TOTAL_HEADER_SIZE: u8 = 30;
pub(crate) const FIELD_HEADER_SIZE: u8 = 5;
pub(crate) const OPERATION_HEADER_SIZE: u8 = 8;
pub(crate) const MSG_REMAINING_HEADER_SIZE: u8 = 22;
const DIGEST_SIZE: u8 = 20;
pub(crate) const CL_MSG_VERSION: u8 = 2;
pub(crate) const MSG_TYPE_STANDARD: u8 = 3;
pub(crate) const MSG_TYPE_COMPRESSED: u8 = 4;

// Bin names are length-prefixed with a single byte on the wire, but the
// server additionally caps them at 15 bytes.
pub(crate) const MAX_BIN_NAME_LENGTH: usize = 15;

// Frames whose payload is at or below this size are never compressed; the
// zlib header overhead would outweigh the savings.
pub(crate) const COMPRESS_THRESHOLD: usize = 128;

// Protects against allocating massive memory blocks for buffers from
// corrupted or hostile length prefixes.
pub(crate) const MAX_BUFFER_SIZE: usize = 120 * 1024 * 1024 + 8;

/// Growable encode/parse buffer shared by all commands. Encoding is
/// two-pass: commands first walk their inputs accumulating `data_offset` as
/// a size estimate, then `size_buffer` materializes the allocation and the
/// same walk writes the bytes.
#[derive(Debug, Default)]
pub struct Buffer {
    pub data_buffer: Vec<u8>,
    pub data_offset: usize,
    pub reclaim_threshold: usize,
}

impl Buffer {
    pub(crate) fn new(reclaim_threshold: usize) -> Self {
        Buffer {
            data_buffer: Vec::with_capacity(1024),
            data_offset: 0,
            reclaim_threshold,
        }
    }

    fn begin(&mut self) {
        self.data_offset = MSG_TOTAL_HEADER_SIZE as usize;
    }

    pub(crate) fn size_buffer(&mut self) -> Result<()> {
        let offset = self.data_offset;
        self.resize_buffer(offset)
    }

    pub(crate) fn resize_buffer(&mut self, size: usize) -> Result<()> {
        // Corrupted data streams can result in a huge length.
        if size > MAX_BUFFER_SIZE {
            return Err(Error::InvalidArgument(format!(
                "Invalid size for buffer: {}",
                size
            )));
        }

        let mem_size = self.data_buffer.capacity();
        self.data_buffer.resize(size, 0);
        if mem_size > self.reclaim_threshold && size < mem_size {
            self.data_buffer.shrink_to_fit();
        }

        Ok(())
    }

    pub(crate) fn reset_offset(&mut self) {
        self.data_offset = 0;
    }

    pub(crate) fn end(&mut self) {
        let size = ((self.data_offset - 8) as i64)
            | ((i64::from(CL_MSG_VERSION) << 56) as i64)
            | (i64::from(MSG_TYPE_STANDARD) << 48);

        self.reset_offset();
        self.write_i64(size);
    }

    /// Deflate the assembled frame when the policy asks for compression and
    /// the payload is large enough to benefit. The compressed frame is the
    /// whole original frame wrapped in a type-4 proto header followed by the
    /// original frame length.
    pub(crate) fn compress(&mut self) -> Result<()> {
        let total = self.data_buffer.len();
        if total <= COMPRESS_THRESHOLD + 8 {
            return Ok(());
        }

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&self.data_buffer)?;
        let compressed = encoder.finish()?;

        let mut wrapped = Vec::with_capacity(compressed.len() + 16);
        let size = ((compressed.len() + 8) as i64)
            | ((i64::from(CL_MSG_VERSION) << 56) as i64)
            | (i64::from(MSG_TYPE_COMPRESSED) << 48);
        let mut header = [0u8; 16];
        NetworkEndian::write_i64(&mut header[0..8], size);
        NetworkEndian::write_u64(&mut header[8..16], total as u64);
        wrapped.extend_from_slice(&header);
        wrapped.extend_from_slice(&compressed);

        self.data_buffer = wrapped;
        self.data_offset = self.data_buffer.len();
        Ok(())
    }

    /// Inflate a compressed message body. The buffer must hold the payload
    /// of a type-4 proto frame: the original frame length followed by the
    /// zlib stream. Afterwards the buffer holds the original frame,
    /// starting with its own proto header.
    pub(crate) fn decompress(&mut self) -> Result<()> {
        if self.data_buffer.len() < 8 {
            return Err(Error::BadResponse(
                "Compressed message truncated".to_string(),
            ));
        }
        let uncompressed_size = NetworkEndian::read_u64(&self.data_buffer[0..8]) as usize;
        if uncompressed_size > MAX_BUFFER_SIZE {
            return Err(Error::BadResponse(format!(
                "Invalid uncompressed message size: {}",
                uncompressed_size
            )));
        }

        let mut inflated = Vec::with_capacity(uncompressed_size);
        let mut decoder = ZlibDecoder::new(&self.data_buffer[8..]);
        decoder.read_to_end(&mut inflated)?;
        if inflated.len() != uncompressed_size {
            return Err(Error::BadResponse(format!(
                "Compressed message advertised {} bytes but inflated to {}",
                uncompressed_size,
                inflated.len()
            )));
        }

        self.data_buffer = inflated;
        self.reset_offset();
        Ok(())
    }

    // Writes the command for write operations
    pub(crate) fn set_write(
        &mut self,
        policy: &WritePolicy,
        op_type: OperationType,
        key: &Key,
        bins: &[Bin<'_>],
    ) -> Result<()> {
        self.begin();
        let mut field_count = self.estimate_key_size(key, policy.send_key);
        field_count += self.estimate_txn_size(policy.base_policy.txn.as_deref(), key, true);
        let filter_size = self.estimate_filter_size(policy.filter_expression());
        if filter_size > 0 {
            field_count += 1;
        }

        for bin in bins {
            self.estimate_operation_size_for_bin(bin)?;
        }

        self.size_buffer()?;
        self.write_header_write(policy, 0, INFO2_WRITE, field_count, bins.len() as u16);
        self.write_key(key, policy.send_key);
        self.write_txn(policy.base_policy.txn.as_deref(), key, true);

        if let Some(filter) = policy.filter_expression() {
            self.write_filter_expression(filter, filter_size);
        }
        for bin in bins {
            self.write_operation_for_bin(bin, op_type);
        }

        self.end();
        Ok(())
    }

    // Writes the command for delete operations
    pub(crate) fn set_delete(&mut self, policy: &WritePolicy, key: &Key) -> Result<()> {
        self.begin();
        let mut field_count = self.estimate_key_size(key, false);
        field_count += self.estimate_txn_size(policy.base_policy.txn.as_deref(), key, true);
        let filter_size = self.estimate_filter_size(policy.filter_expression());
        if filter_size > 0 {
            field_count += 1;
        }

        self.size_buffer()?;
        self.write_header_write(policy, 0, INFO2_WRITE | INFO2_DELETE, field_count, 0);
        self.write_key(key, false);
        self.write_txn(policy.base_policy.txn.as_deref(), key, true);

        if let Some(filter) = policy.filter_expression() {
            self.write_filter_expression(filter, filter_size);
        }

        self.end();
        Ok(())
    }

    // Writes the command for touch operations
    pub(crate) fn set_touch(&mut self, policy: &WritePolicy, key: &Key) -> Result<()> {
        self.begin();
        let mut field_count = self.estimate_key_size(key, policy.send_key);
        field_count += self.estimate_txn_size(policy.base_policy.txn.as_deref(), key, true);
        let filter_size = self.estimate_filter_size(policy.filter_expression());
        if filter_size > 0 {
            field_count += 1;
        }
        self.estimate_operation_size();
        self.size_buffer()?;
        self.write_header_write(policy, 0, INFO2_WRITE, field_count, 1);
        self.write_key(key, policy.send_key);
        self.write_txn(policy.base_policy.txn.as_deref(), key, true);

        if let Some(filter) = policy.filter_expression() {
            self.write_filter_expression(filter, filter_size);
        }

        self.write_operation_for_operation_type(OperationType::Touch);
        self.end();
        Ok(())
    }

    // Writes the command for exist operations
    pub(crate) fn set_exists(&mut self, policy: &BasePolicy, key: &Key) -> Result<()> {
        self.begin();
        let mut field_count = self.estimate_key_size(key, false);
        let filter_size = self.estimate_filter_size(policy.filter_expression());
        if filter_size > 0 {
            field_count += 1;
        }

        self.size_buffer()?;
        self.write_header_read(policy, INFO1_READ | INFO1_NOBINDATA, 0, 0, field_count, 0);
        self.write_key(key, false);

        if let Some(filter) = policy.filter_expression() {
            self.write_filter_expression(filter, filter_size);
        }

        self.end();
        Ok(())
    }

    // Writes the command for get operations
    pub(crate) fn set_read(&mut self, policy: &BasePolicy, key: &Key, bins: &Bins) -> Result<()> {
        match bins {
            Bins::None => self.set_read_header(policy, key),
            Bins::All => self.set_read_for_key_only(policy, key),
            Bins::Some(ref bin_names) => {
                self.begin();
                let mut field_count = self.estimate_key_size(key, false);
                field_count += self.estimate_txn_size(policy.txn.as_deref(), key, false);
                let filter_size = self.estimate_filter_size(policy.filter_expression());
                if filter_size > 0 {
                    field_count += 1;
                }
                for bin_name in bin_names {
                    self.estimate_operation_size_for_bin_name(bin_name)?;
                }

                self.size_buffer()?;
                self.write_header_read(
                    policy,
                    INFO1_READ,
                    0,
                    0,
                    field_count,
                    bin_names.len() as u16,
                );
                self.write_key(key, false);
                self.write_txn(policy.txn.as_deref(), key, false);

                if let Some(filter) = policy.filter_expression() {
                    self.write_filter_expression(filter, filter_size);
                }

                for bin_name in bin_names {
                    self.write_operation_for_bin_name(bin_name, OperationType::Read);
                }

                self.end();
                Ok(())
            }
        }
    }

    // Writes the command for getting metadata operations
    pub(crate) fn set_read_header(&mut self, policy: &BasePolicy, key: &Key) -> Result<()> {
        self.begin();
        let mut field_count = self.estimate_key_size(key, false);
        let filter_size = self.estimate_filter_size(policy.filter_expression());
        if filter_size > 0 {
            field_count += 1;
        }

        self.size_buffer()?;
        self.write_header_read(policy, INFO1_READ | INFO1_NOBINDATA, 0, 0, field_count, 0);
        self.write_key(key, false);

        if let Some(filter) = policy.filter_expression() {
            self.write_filter_expression(filter, filter_size);
        }

        self.end();
        Ok(())
    }

    pub(crate) fn set_read_for_key_only(&mut self, policy: &BasePolicy, key: &Key) -> Result<()> {
        self.begin();

        let mut field_count = self.estimate_key_size(key, false);
        field_count += self.estimate_txn_size(policy.txn.as_deref(), key, false);
        let filter_size = self.estimate_filter_size(policy.filter_expression());
        if filter_size > 0 {
            field_count += 1;
        }

        self.size_buffer()?;
        self.write_header_read(policy, INFO1_READ | INFO1_GET_ALL, 0, 0, field_count, 0);
        self.write_key(key, false);
        self.write_txn(policy.txn.as_deref(), key, false);

        if let Some(filter) = policy.filter_expression() {
            self.write_filter_expression(filter, filter_size);
        }

        self.end();
        Ok(())
    }

    // Writes the command for record operations
    pub(crate) fn set_operate<'a>(
        &mut self,
        policy: &WritePolicy,
        key: &Key,
        operations: &'a [Operation<'a>],
    ) -> Result<()> {
        self.begin();

        let mut read_attr = 0;
        let mut write_attr = 0;

        for operation in operations {
            match *operation {
                Operation {
                    op: OperationType::Read,
                    bin: OperationBin::None,
                    ..
                } => read_attr |= INFO1_READ | INFO1_NOBINDATA,
                Operation {
                    op: OperationType::Read,
                    bin: OperationBin::All,
                    ..
                } => read_attr |= INFO1_READ | INFO1_GET_ALL,
                Operation {
                    op: OperationType::Read | OperationType::CdtRead,
                    ..
                } => read_attr |= INFO1_READ,
                _ => write_attr |= INFO2_WRITE,
            }

            let each_op = matches!(operation.data, OperationData::CdtListOp(_));
            if policy.respond_per_each_op || each_op {
                write_attr |= INFO2_RESPOND_ALL_OPS;
            }

            if let OperationBin::Name(name) = operation.bin {
                if name.len() > MAX_BIN_NAME_LENGTH {
                    return Err(Error::InvalidArgument(format!(
                        "Bin name `{}` exceeds {} bytes",
                        name, MAX_BIN_NAME_LENGTH
                    )));
                }
            }

            self.data_offset += operation.estimate_size() + OPERATION_HEADER_SIZE as usize;
        }

        let send_key = policy.send_key && write_attr != 0;
        let mut field_count = self.estimate_key_size(key, send_key);
        field_count +=
            self.estimate_txn_size(policy.base_policy.txn.as_deref(), key, write_attr != 0);
        let filter_size = self.estimate_filter_size(policy.filter_expression());
        if filter_size > 0 {
            field_count += 1;
        }
        self.size_buffer()?;

        if write_attr == 0 {
            self.write_header_read(
                &policy.base_policy,
                read_attr,
                write_attr,
                0,
                field_count,
                operations.len() as u16,
            );
        } else {
            self.write_header_write(
                policy,
                read_attr,
                write_attr,
                field_count,
                operations.len() as u16,
            );
        }
        self.write_key(key, send_key);
        self.write_txn(policy.base_policy.txn.as_deref(), key, write_attr != 0);

        if let Some(filter) = policy.filter_expression() {
            self.write_filter_expression(filter, filter_size);
        }

        for operation in operations {
            operation.write_to(self);
        }
        self.end();
        Ok(())
    }

    pub(crate) fn set_udf(
        &mut self,
        policy: &WritePolicy,
        key: &Key,
        package_name: &str,
        function_name: &str,
        args: Option<&[Value]>,
    ) -> Result<()> {
        self.begin();

        let mut field_count = self.estimate_key_size(key, policy.send_key);
        field_count += self.estimate_txn_size(policy.base_policy.txn.as_deref(), key, true);
        field_count += self.estimate_udf_size(package_name, function_name, args) as u16;
        let filter_size = self.estimate_filter_size(policy.filter_expression());
        if filter_size > 0 {
            field_count += 1;
        }
        self.size_buffer()?;

        self.write_header_write(policy, 0, INFO2_WRITE, field_count, 0);
        self.write_key(key, policy.send_key);
        self.write_txn(policy.base_policy.txn.as_deref(), key, true);

        if let Some(filter) = policy.filter_expression() {
            self.write_filter_expression(filter, filter_size);
        }

        self.write_field_string(package_name, FieldType::UdfPackageName);
        self.write_field_string(function_name, FieldType::UdfFunction);
        self.write_args(args, FieldType::UdfArgList);
        self.end();
        Ok(())
    }

    pub(crate) fn get_batch_flags(policy: &BatchPolicy) -> u8 {
        // 0x8 is reserved and always set by this library.
        let mut flags = 0x8;
        if policy.allow_inline {
            flags |= 0x1;
        }

        if policy.allow_inline_ssd {
            flags |= 0x2;
        }

        if policy.respond_all_keys {
            flags |= 0x4;
        }

        flags
    }

    // Writes the command for batch operations. Each entry pairs the
    // operation with the caller's original index; the on-wire index is the
    // position within this sub-command, which the merge step maps back.
    pub(crate) fn set_batch_operate(
        &mut self,
        policy: &BatchPolicy,
        batch_ops: &[(BatchOperation<'_>, usize)],
    ) -> Result<()> {
        self.begin();
        let mut field_count = 1;
        self.data_offset += FIELD_HEADER_SIZE as usize + 5;

        let filter_size = self.estimate_filter_size(policy.filter_expression());
        if filter_size > 0 {
            field_count += 1;
        }

        let mut prev: Option<&BatchOperation<'_>> = None;
        for (batch_op, _) in batch_ops {
            let key = batch_op.key();
            self.data_offset += key.digest.len() + 4;
            if batch_op.match_header(prev) {
                self.data_offset += 1;
            } else {
                // Full sub-header plus namespace/set fields plus the
                // variant-specific payload.
                self.data_offset += 12; // header(4) + ttl(4) + field_count(2) + op_count(2)
                self.data_offset += key.namespace.len() + FIELD_HEADER_SIZE as usize;
                self.data_offset += key.set_name.len() + FIELD_HEADER_SIZE as usize;
                self.data_offset += batch_op.size(policy.filter_expression())?;
            }
            prev = Some(batch_op);
        }

        self.size_buffer()?;
        self.write_header_read(
            &policy.base_policy,
            INFO1_BATCH,
            0,
            0,
            field_count,
            0,
        );

        if let Some(filter) = policy.filter_expression() {
            self.write_filter_expression(filter, filter_size);
        }

        let field_size_offset = self.data_offset;
        self.write_field_header(0, FieldType::BatchIndex);
        self.write_u32(batch_ops.len() as u32);
        self.write_u8(Buffer::get_batch_flags(policy));

        let mut attr = BatchAttr::default();
        prev = None;
        for (idx, (batch_op, _)) in batch_ops.iter().enumerate() {
            let key = batch_op.key();
            self.write_u32(idx as u32);
            self.write_bytes(&key.digest);
            if batch_op.match_header(prev) {
                self.write_u8(BATCH_MSG_REPEAT);
            } else {
                match batch_op {
                    BatchOperation::Read {
                        policy: read_policy,
                        bins,
                        ops,
                        ..
                    } => {
                        attr.set_batch_read(read_policy);
                        match (bins, ops) {
                            (Bins::Some(bin_names), Some(ops))
                                if !bin_names.is_empty() && !ops.is_empty() =>
                            {
                                return Err(Error::InvalidArgument(
                                    "Batch reads accept either bin names or operations, not both"
                                        .into(),
                                ))
                            }
                            (Bins::Some(bin_names), _) if !bin_names.is_empty() => {
                                self.write_batch_bin_names(
                                    key,
                                    bin_names,
                                    &attr,
                                    policy.filter_expression(),
                                )?;
                            }
                            (_, Some(ops)) if !ops.is_empty() => {
                                attr.adjust_read(ops);
                                self.write_batch_operations(
                                    key,
                                    ops,
                                    &attr,
                                    policy.filter_expression(),
                                )?;
                            }
                            _ => {
                                attr.adjust_read_for_all_bins(matches!(bins, Bins::All));
                                self.write_batch_read(
                                    key,
                                    &attr,
                                    policy.filter_expression(),
                                    0,
                                )?;
                            }
                        }
                    }
                    BatchOperation::Write {
                        policy: write_policy,
                        ops,
                        ..
                    } => {
                        attr.set_batch_write(write_policy);
                        attr.adjust_write(ops);
                        self.write_batch_operations(
                            key,
                            ops,
                            &attr,
                            policy.filter_expression(),
                        )?;
                    }
                    BatchOperation::Delete {
                        policy: delete_policy,
                        ..
                    } => {
                        attr.set_batch_delete(delete_policy);
                        self.write_batch_write(
                            key,
                            &attr,
                            policy.filter_expression(),
                            0,
                            0,
                        )?;
                    }
                    BatchOperation::Udf {
                        policy: udf_policy,
                        package_name,
                        function_name,
                        args,
                        ..
                    } => {
                        attr.set_batch_udf(udf_policy);
                        self.write_batch_write(
                            key,
                            &attr,
                            policy.filter_expression(),
                            3,
                            0,
                        )?;
                        self.write_field_string(package_name, FieldType::UdfPackageName);
                        self.write_field_string(function_name, FieldType::UdfFunction);
                        self.write_args(args.as_deref(), FieldType::UdfArgList);
                    }
                }
            }
            prev = Some(batch_op);
        }

        let field_size = self.data_offset - field_size_offset - 4;
        NetworkEndian::write_u32(
            &mut self.data_buffer[field_size_offset..field_size_offset + 4],
            field_size as u32,
        );

        self.end();
        Ok(())
    }

    // Writes a transaction verify batch: one row per read, carrying the
    // expected record version.
    pub(crate) fn set_batch_txn_verify(
        &mut self,
        policy: &BatchPolicy,
        txn_id: u64,
        records: &[(Key, Option<RecordVersion>)],
    ) -> Result<()> {
        self.begin();
        let field_count = 1;
        self.data_offset += FIELD_HEADER_SIZE as usize + 5;

        for (key, version) in records {
            self.data_offset += key.digest.len() + 4;
            self.data_offset += 9; // sub-header(5) + field_count(2) + op_count(2)
            self.data_offset += key.namespace.len() + FIELD_HEADER_SIZE as usize;
            self.data_offset += key.set_name.len() + FIELD_HEADER_SIZE as usize;
            self.data_offset += 8 + FIELD_HEADER_SIZE as usize; // txn id
            if version.is_some() {
                self.data_offset += 7 + FIELD_HEADER_SIZE as usize;
            }
        }

        self.size_buffer()?;
        self.write_header_read(&policy.base_policy, INFO1_BATCH, 0, 0, field_count, 0);

        let field_size_offset = self.data_offset;
        self.write_field_header(0, FieldType::BatchIndex);
        self.write_u32(records.len() as u32);
        self.write_u8(Buffer::get_batch_flags(policy));

        for (idx, (key, version)) in records.iter().enumerate() {
            self.write_u32(idx as u32);
            self.write_bytes(&key.digest);
            self.write_u8(BATCH_MSG_INFO | BATCH_MSG_INFO4);
            self.write_u8(INFO1_READ | INFO1_NOBINDATA);
            self.write_u8(0);
            self.write_u8(INFO3_SC_READ_TYPE);
            self.write_u8(INFO4_TXN_VERIFY_READ);

            let mut row_fields = 3; // namespace + set + txn id
            if version.is_some() {
                row_fields += 1;
            }
            self.write_u16(row_fields);
            self.write_u16(0);
            self.write_field_string(&key.namespace, FieldType::Namespace);
            self.write_field_string(&key.set_name, FieldType::Table);
            self.write_field_u64(txn_id, FieldType::TxnId);
            if let Some(version) = version {
                self.write_field_version(version);
            }
        }

        let field_size = self.data_offset - field_size_offset - 4;
        NetworkEndian::write_u32(
            &mut self.data_buffer[field_size_offset..field_size_offset + 4],
            field_size as u32,
        );

        self.end();
        Ok(())
    }

    // Writes a transaction roll batch (forward or back) for previously
    // written keys. `txn_attr` is one of the INFO4_TXN_ROLL_* bits.
    pub(crate) fn set_batch_txn_roll(
        &mut self,
        policy: &BatchPolicy,
        txn_id: u64,
        keys: &[Key],
        txn_attr: u8,
    ) -> Result<()> {
        self.begin();
        let field_count = 1;
        self.data_offset += FIELD_HEADER_SIZE as usize + 5;

        for key in keys {
            self.data_offset += key.digest.len() + 4;
            self.data_offset += 15; // sub-header(5) + gen(2) + ttl(4) + field_count(2) + op_count(2)
            self.data_offset += key.namespace.len() + FIELD_HEADER_SIZE as usize;
            self.data_offset += key.set_name.len() + FIELD_HEADER_SIZE as usize;
            self.data_offset += 8 + FIELD_HEADER_SIZE as usize; // txn id
        }

        self.size_buffer()?;
        self.write_header_read(&policy.base_policy, INFO1_BATCH, 0, 0, field_count, 0);

        let field_size_offset = self.data_offset;
        self.write_field_header(0, FieldType::BatchIndex);
        self.write_u32(keys.len() as u32);
        self.write_u8(Buffer::get_batch_flags(policy));

        for (idx, key) in keys.iter().enumerate() {
            self.write_u32(idx as u32);
            self.write_bytes(&key.digest);
            self.write_u8(BATCH_MSG_INFO | BATCH_MSG_GEN | BATCH_MSG_TTL | BATCH_MSG_INFO4);
            self.write_u8(0);
            self.write_u8(INFO2_WRITE | INFO2_DURABLE_DELETE);
            self.write_u8(0);
            self.write_u8(txn_attr);
            self.write_u16(0); // generation
            self.write_u32(0); // ttl
            self.write_u16(3); // namespace + set + txn id
            self.write_u16(0);
            self.write_field_string(&key.namespace, FieldType::Namespace);
            self.write_field_string(&key.set_name, FieldType::Table);
            self.write_field_u64(txn_id, FieldType::TxnId);
        }

        let field_size = self.data_offset - field_size_offset - 4;
        NetworkEndian::write_u32(
            &mut self.data_buffer[field_size_offset..field_size_offset + 4],
            field_size as u32,
        );

        self.end();
        Ok(())
    }

    // Writes the transaction monitor record: a durable marker carrying the
    // transaction id and deadline, created before the roll-forward phase.
    pub(crate) fn set_txn_mark_roll_forward(
        &mut self,
        policy: &WritePolicy,
        txn_id: u64,
        deadline: u32,
        key: &Key,
        bin: &Bin<'_>,
    ) -> Result<()> {
        self.begin();
        let mut field_count = self.estimate_key_size(key, false);
        field_count += 2; // txn id + deadline
        self.data_offset += 8 + FIELD_HEADER_SIZE as usize;
        self.data_offset += 4 + FIELD_HEADER_SIZE as usize;
        self.estimate_operation_size_for_bin(bin)?;

        self.size_buffer()?;
        self.write_header_write(policy, 0, INFO2_WRITE, field_count, 1);
        self.write_key(key, false);
        self.write_field_u64(txn_id, FieldType::TxnId);
        self.write_field_u32(deadline, FieldType::TxnDeadline);
        self.write_operation_for_bin(bin, OperationType::Write);
        self.end();
        Ok(())
    }

    // Deletes the transaction monitor record after roll completion.
    pub(crate) fn set_txn_close(
        &mut self,
        policy: &WritePolicy,
        txn_id: u64,
        key: &Key,
    ) -> Result<()> {
        self.begin();
        let mut field_count = self.estimate_key_size(key, false);
        field_count += 1; // txn id
        self.data_offset += 8 + FIELD_HEADER_SIZE as usize;

        self.size_buffer()?;
        self.write_header_write(
            policy,
            0,
            INFO2_WRITE | INFO2_DELETE | INFO2_DURABLE_DELETE,
            field_count,
            0,
        );
        self.write_key(key, false);
        self.write_field_u64(txn_id, FieldType::TxnId);
        self.end();
        Ok(())
    }

    fn write_batch_fields(&mut self, key: &Key, field_count: usize, op_count: usize) {
        let field_count = field_count + 2;
        self.write_u16(field_count as u16);
        self.write_u16(op_count as u16);
        self.write_field_string(&key.namespace, FieldType::Namespace);
        self.write_field_string(&key.set_name, FieldType::Table);
    }

    fn write_batch_fields_with_filter(
        &mut self,
        key: &Key,
        attr: &BatchAttr,
        parent_filter: Option<&FilterExpression>,
        mut field_count: usize,
        op_count: usize,
    ) {
        let filter = attr.filter_expression.as_ref().or(parent_filter);
        if filter.is_some() {
            field_count += 1;
        }
        if attr.send_key && key.user_key.is_some() {
            field_count += 1;
        }

        self.write_batch_fields(key, field_count, op_count);

        if let Some(filter) = filter {
            let exp_size = filter.size();
            self.write_filter_expression(filter, exp_size);
        }
        if attr.send_key {
            if let Some(ref user_key) = key.user_key {
                self.write_field_value(user_key, FieldType::Key);
            }
        }
    }

    fn write_batch_bin_names(
        &mut self,
        key: &Key,
        bin_names: &[String],
        attr: &BatchAttr,
        parent_filter: Option<&FilterExpression>,
    ) -> Result<()> {
        self.write_batch_read(key, attr, parent_filter, bin_names.len())?;

        for bin in bin_names {
            self.write_operation_for_bin_name(bin, OperationType::Read);
        }
        Ok(())
    }

    fn write_batch_operations(
        &mut self,
        key: &Key,
        ops: &[Operation<'_>],
        attr: &BatchAttr,
        parent_filter: Option<&FilterExpression>,
    ) -> Result<()> {
        if attr.has_write {
            self.write_batch_write(key, attr, parent_filter, 0, ops.len())?;
        } else {
            self.write_batch_read(key, attr, parent_filter, ops.len())?;
        }

        for op in ops {
            op.write_to(self);
        }
        Ok(())
    }

    fn write_batch_read(
        &mut self,
        key: &Key,
        attr: &BatchAttr,
        parent_filter: Option<&FilterExpression>,
        op_count: usize,
    ) -> Result<()> {
        self.write_u8(BATCH_MSG_INFO | BATCH_MSG_TTL);
        self.write_u8(attr.read_attr);
        self.write_u8(attr.write_attr);
        self.write_u8(attr.info_attr);
        self.write_u32(attr.expiration);
        self.write_batch_fields_with_filter(key, attr, parent_filter, 0, op_count);
        Ok(())
    }

    fn write_batch_write(
        &mut self,
        key: &Key,
        attr: &BatchAttr,
        parent_filter: Option<&FilterExpression>,
        field_count: usize,
        op_count: usize,
    ) -> Result<()> {
        self.write_u8(BATCH_MSG_INFO | BATCH_MSG_GEN | BATCH_MSG_TTL);
        self.write_u8(attr.read_attr);
        self.write_u8(attr.write_attr);
        self.write_u8(attr.info_attr);
        self.write_u16(attr.generation as u16);
        self.write_u32(attr.expiration);
        self.write_batch_fields_with_filter(key, attr, parent_filter, field_count, op_count);
        Ok(())
    }

    pub(crate) fn set_scan(
        &mut self,
        policy: &ScanPolicy,
        namespace: &str,
        set_name: &str,
        bins: &Bins,
        task_id: u64,
        partitions: &[u16],
    ) -> Result<()> {
        self.begin();

        let mut field_count = 0;
        let parts_size = partitions.len() * 2;

        let filter_size = self.estimate_filter_size(policy.filter_expression());
        if filter_size > 0 {
            field_count += 1;
        }

        if !namespace.is_empty() {
            self.data_offset += namespace.len() + FIELD_HEADER_SIZE as usize;
            field_count += 1;
        }

        if !set_name.is_empty() {
            self.data_offset += set_name.len() + FIELD_HEADER_SIZE as usize;
            field_count += 1;
        }

        if parts_size > 0 {
            self.data_offset += parts_size + FIELD_HEADER_SIZE as usize;
            field_count += 1;
        }

        if policy.max_records > 0 {
            self.data_offset += 8 + FIELD_HEADER_SIZE as usize;
            field_count += 1;
        }

        if policy.records_per_second > 0 {
            self.data_offset += 4 + FIELD_HEADER_SIZE as usize;
            field_count += 1;
        }

        // Socket timeout field.
        self.data_offset += 4 + FIELD_HEADER_SIZE as usize;
        field_count += 1;

        // Task id field.
        self.data_offset += 8 + FIELD_HEADER_SIZE as usize;
        field_count += 1;

        let bin_count = match *bins {
            Bins::All | Bins::None => 0,
            Bins::Some(ref bin_names) => {
                for bin_name in bin_names {
                    self.estimate_operation_size_for_bin_name(bin_name)?;
                }
                bin_names.len()
            }
        };

        self.size_buffer()?;

        let mut read_attr = INFO1_READ;
        if bins.is_none() {
            read_attr |= INFO1_NOBINDATA;
        }

        self.write_header_read(
            &policy.base_policy,
            read_attr,
            0,
            INFO3_PARTITION_DONE,
            field_count,
            bin_count as u16,
        );

        if !namespace.is_empty() {
            self.write_field_string(namespace, FieldType::Namespace);
        }

        if !set_name.is_empty() {
            self.write_field_string(set_name, FieldType::Table);
        }

        if parts_size > 0 {
            self.write_field_header(parts_size, FieldType::PidArray);
            for pid in partitions {
                self.write_u16_little_endian(*pid);
            }
        }

        if let Some(filter) = policy.filter_expression() {
            self.write_filter_expression(filter, filter_size);
        }

        if policy.max_records > 0 {
            self.write_field_u64(policy.max_records, FieldType::MaxRecords);
        }

        if policy.records_per_second > 0 {
            self.write_field_u32(policy.records_per_second, FieldType::RecordsPerSecond);
        }

        self.write_field_header(4, FieldType::SocketTimeout);
        self.write_u32(duration_millis(policy.base_policy.socket_timeout));

        self.write_field_header(8, FieldType::QueryId);
        self.write_u64(task_id);

        if let Bins::Some(ref bin_names) = *bins {
            for bin_name in bin_names {
                self.write_operation_for_bin_name(bin_name, OperationType::Read);
            }
        }

        self.end();
        Ok(())
    }

    pub(crate) fn set_query(
        &mut self,
        policy: &QueryPolicy,
        statement: &Statement,
        task_id: u64,
        partitions: &[u16],
    ) -> Result<()> {
        let filter = statement.filters.as_ref().and_then(|filters| filters.first());

        self.begin();

        let mut field_count = 0;
        let mut filter_size = 0;

        if !statement.namespace.is_empty() {
            self.data_offset += statement.namespace.len() + FIELD_HEADER_SIZE as usize;
            field_count += 1;
        }

        if !statement.set_name.is_empty() {
            self.data_offset += statement.set_name.len() + FIELD_HEADER_SIZE as usize;
            field_count += 1;
        }

        if policy.records_per_second > 0 {
            self.data_offset += 4 + FIELD_HEADER_SIZE as usize;
            field_count += 1;
        }

        if let Some(ref index_name) = statement.index_name {
            if !index_name.is_empty() {
                self.data_offset += index_name.len() + FIELD_HEADER_SIZE as usize;
                field_count += 1;
            }
        }

        // Task id field.
        self.data_offset += 8 + FIELD_HEADER_SIZE as usize;
        field_count += 1;

        if let Some(filter) = filter {
            filter_size = 1 + filter.estimate_size();
            self.data_offset += filter_size + FIELD_HEADER_SIZE as usize;
            field_count += 1;
        }

        let parts_size = partitions.len() * 2;
        if parts_size > 0 {
            self.data_offset += parts_size + FIELD_HEADER_SIZE as usize;
            field_count += 1;
        }

        if policy.max_records > 0 {
            self.data_offset += 8 + FIELD_HEADER_SIZE as usize;
            field_count += 1;
        }

        let filter_exp_size = self.estimate_filter_size(policy.filter_expression());
        if filter_exp_size > 0 {
            field_count += 1;
        }

        if statement.is_scan() {
            if let Bins::Some(ref bin_names) = statement.bins {
                for bin_name in bin_names {
                    self.estimate_operation_size_for_bin_name(bin_name)?;
                }
            }
        }

        self.size_buffer()?;

        let mut operation_count: usize = 0;
        if statement.is_scan() {
            if let Bins::Some(ref bin_names) = statement.bins {
                operation_count += bin_names.len();
            }
        }

        let mut info1 = if statement.bins.is_none() {
            INFO1_READ | INFO1_NOBINDATA
        } else {
            INFO1_READ
        };
        let mut info2 = 0;

        match policy.expected_duration {
            QueryDuration::Short => info1 |= INFO1_SHORT_QUERY,
            QueryDuration::LongRelaxAP => info2 |= INFO2_RELAX_AP_LONG_QUERY,
            QueryDuration::Long => (),
        }

        self.write_header_read(
            &policy.base_policy,
            info1,
            info2,
            INFO3_PARTITION_DONE,
            field_count,
            operation_count as u16,
        );

        if !statement.namespace.is_empty() {
            self.write_field_string(&statement.namespace, FieldType::Namespace);
        }

        if let Some(ref index_name) = statement.index_name {
            if !index_name.is_empty() {
                self.write_field_string(index_name, FieldType::IndexName);
            }
        }

        if !statement.set_name.is_empty() {
            self.write_field_string(&statement.set_name, FieldType::Table);
        }

        self.write_field_header(8, FieldType::QueryId);
        self.write_u64(task_id);

        if let Some(filter) = filter {
            self.write_field_header(filter_size, FieldType::IndexRange);
            self.write_u8(1);
            filter.write(self);
        }

        if parts_size > 0 {
            self.write_field_header(parts_size, FieldType::PidArray);
            for pid in partitions {
                self.write_u16_little_endian(*pid);
            }
        }

        if policy.max_records > 0 {
            self.write_field_u64(policy.max_records, FieldType::MaxRecords);
        }

        if policy.records_per_second > 0 {
            self.write_field_u32(policy.records_per_second, FieldType::RecordsPerSecond);
        }

        if let Some(filter_exp) = policy.filter_expression() {
            self.write_filter_expression(filter_exp, filter_exp_size);
        }

        // scan bin names come last
        if statement.is_scan() {
            if let Bins::Some(ref bin_names) = statement.bins {
                for bin_name in bin_names {
                    self.write_operation_for_bin_name(bin_name, OperationType::Read);
                }
            }
        }

        self.end();
        Ok(())
    }

    fn estimate_filter_size(&mut self, filter: Option<&FilterExpression>) -> usize {
        filter.map_or(0, |filter| {
            let filter_size = filter.size();
            self.data_offset += filter_size + FIELD_HEADER_SIZE as usize;
            filter_size
        })
    }

    fn estimate_key_size(&mut self, key: &Key, send_key: bool) -> u16 {
        let mut field_count: u16 = 0;

        if !key.namespace.is_empty() {
            self.data_offset += key.namespace.len() + FIELD_HEADER_SIZE as usize;
            field_count += 1;
        }

        if !key.set_name.is_empty() {
            self.data_offset += key.set_name.len() + FIELD_HEADER_SIZE as usize;
            field_count += 1;
        }

        self.data_offset += (DIGEST_SIZE + FIELD_HEADER_SIZE) as usize;
        field_count += 1;

        if send_key {
            if let Some(ref user_key) = key.user_key {
                // field header size + particle type + key
                self.data_offset += user_key.estimate_size() + FIELD_HEADER_SIZE as usize + 1;
                field_count += 1;
            }
        }

        field_count
    }

    // A read under a transaction sends the transaction id; a write
    // additionally sends the record version observed by an earlier read of
    // the same key, if any.
    fn estimate_txn_size(&mut self, txn: Option<&Txn>, key: &Key, is_write: bool) -> u16 {
        let mut field_count = 0;
        if let Some(txn) = txn {
            self.data_offset += 8 + FIELD_HEADER_SIZE as usize;
            field_count += 1;

            if is_write && txn.read_version(key).is_some() {
                self.data_offset += 7 + FIELD_HEADER_SIZE as usize;
                field_count += 1;
            }
        }
        field_count
    }

    fn write_txn(&mut self, txn: Option<&Txn>, key: &Key, is_write: bool) {
        if let Some(txn) = txn {
            self.write_field_u64(txn.id(), FieldType::TxnId);
            if is_write {
                if let Some(version) = txn.read_version(key) {
                    self.write_field_version(&version);
                }
            }
        }
    }

    fn estimate_args_size(&mut self, args: Option<&[Value]>) {
        if let Some(args) = args {
            self.data_offset += encoder::pack_array(&mut None, args) + FIELD_HEADER_SIZE as usize;
        } else {
            self.data_offset +=
                encoder::pack_empty_args_array(&mut None) + FIELD_HEADER_SIZE as usize;
        }
    }

    fn estimate_udf_size(
        &mut self,
        package_name: &str,
        function_name: &str,
        args: Option<&[Value]>,
    ) -> usize {
        self.data_offset += package_name.len() + FIELD_HEADER_SIZE as usize;
        self.data_offset += function_name.len() + FIELD_HEADER_SIZE as usize;
        self.estimate_args_size(args);
        3
    }

    fn estimate_operation_size_for_bin(&mut self, bin: &Bin<'_>) -> Result<()> {
        if bin.name.len() > MAX_BIN_NAME_LENGTH {
            return Err(Error::InvalidArgument(format!(
                "Bin name `{}` exceeds {} bytes",
                bin.name, MAX_BIN_NAME_LENGTH
            )));
        }
        self.data_offset += bin.name.len() + OPERATION_HEADER_SIZE as usize;
        self.data_offset += bin.value.estimate_size();
        Ok(())
    }

    fn estimate_operation_size_for_bin_name(&mut self, bin_name: &str) -> Result<()> {
        if bin_name.len() > MAX_BIN_NAME_LENGTH {
            return Err(Error::InvalidArgument(format!(
                "Bin name `{}` exceeds {} bytes",
                bin_name, MAX_BIN_NAME_LENGTH
            )));
        }
        self.data_offset += bin_name.len() + OPERATION_HEADER_SIZE as usize;
        Ok(())
    }

    fn estimate_operation_size(&mut self) {
        self.data_offset += OPERATION_HEADER_SIZE as usize;
    }

    // Header for read-only commands.
    fn write_header_read(
        &mut self,
        policy: &BasePolicy,
        read_attr: u8,
        write_attr: u8,
        info_attr: u8,
        field_count: u16,
        operation_count: u16,
    ) {
        let mut read_attr = read_attr;
        let mut info_attr = info_attr;

        if policy.read_mode_ap == ReadModeAP::All {
            read_attr |= INFO1_READ_MODE_AP_ALL;
        }
        if policy.use_compression {
            read_attr |= INFO1_COMPRESS_RESPONSE;
        }
        info_attr |= sc_read_bits(policy.read_mode_sc);

        // Write all header data except total size which must be written last.
        self.data_buffer[8] = MSG_REMAINING_HEADER_SIZE; // Message header length.
        self.data_buffer[9] = read_attr;
        self.data_buffer[10] = write_attr;
        self.data_buffer[11] = info_attr;

        for i in 12..26 {
            self.data_buffer[i] = 0;
        }

        self.data_offset = 26;
        self.write_u16(field_count);
        self.write_u16(operation_count);

        self.data_offset = MSG_TOTAL_HEADER_SIZE as usize;
    }

    // Header for write commands, folding in the write policy bits.
    fn write_header_write(
        &mut self,
        policy: &WritePolicy,
        read_attr: u8,
        write_attr: u8,
        field_count: u16,
        operation_count: u16,
    ) {
        let mut generation: u32 = 0;
        let mut info_attr: u8 = 0;
        let mut txn_attr: u8 = 0;
        let mut read_attr = read_attr;
        let mut write_attr = write_attr;

        match policy.record_exists_action {
            RecordExistsAction::Update => (),
            RecordExistsAction::UpdateOnly => info_attr |= INFO3_UPDATE_ONLY,
            RecordExistsAction::Replace => info_attr |= INFO3_CREATE_OR_REPLACE,
            RecordExistsAction::ReplaceOnly => info_attr |= INFO3_REPLACE_ONLY,
            RecordExistsAction::CreateOnly => write_attr |= INFO2_CREATE_ONLY,
        }

        match policy.generation_policy {
            GenerationPolicy::None => (),
            GenerationPolicy::ExpectGenEqual => {
                generation = policy.generation;
                write_attr |= INFO2_GENERATION;
            }
            GenerationPolicy::ExpectGenGreater => {
                generation = policy.generation;
                write_attr |= INFO2_GENERATION_GT;
            }
        }

        if policy.commit_level == CommitLevel::CommitMaster {
            info_attr |= INFO3_COMMIT_MASTER;
        }

        if policy.base_policy.read_mode_ap == ReadModeAP::All {
            read_attr |= INFO1_READ_MODE_AP_ALL;
        }
        if policy.base_policy.use_compression {
            read_attr |= INFO1_COMPRESS_RESPONSE;
        }
        info_attr |= sc_read_bits(policy.base_policy.read_mode_sc);

        if policy.durable_delete {
            write_attr |= INFO2_DURABLE_DELETE;
        }

        if policy.on_locking_only {
            txn_attr |= INFO4_TXN_ON_LOCKING_ONLY;
        }

        // Write all header data except total size which must be written last.
        self.data_offset = 8;
        self.write_u8(MSG_REMAINING_HEADER_SIZE); // Message header length.
        self.write_u8(read_attr);
        self.write_u8(write_attr);
        self.write_u8(info_attr);
        self.write_u8(txn_attr);
        self.write_u8(0); // clear the result code

        self.write_u32(generation);
        self.write_u32(policy.expiration.into());

        // Transaction timeout; filled in later by write_timeout.
        self.write_u32(0);

        self.write_u16(field_count);
        self.write_u16(operation_count);
        self.data_offset = MSG_TOTAL_HEADER_SIZE as usize;
    }

    fn write_key(&mut self, key: &Key, send_key: bool) {
        if !key.namespace.is_empty() {
            self.write_field_string(&key.namespace, FieldType::Namespace);
        }

        if !key.set_name.is_empty() {
            self.write_field_string(&key.set_name, FieldType::Table);
        }

        self.write_field_bytes(&key.digest, FieldType::DigestRipe);

        if send_key {
            if let Some(ref user_key) = key.user_key {
                self.write_field_value(user_key, FieldType::Key);
            }
        }
    }

    fn write_filter_expression(&mut self, filter: &FilterExpression, size: usize) {
        self.write_field_header(size, FieldType::FilterExp);
        filter.pack(&mut Some(self));
    }

    pub(crate) fn write_field_header(&mut self, size: usize, ftype: FieldType) {
        self.write_i32(size as i32 + 1);
        self.write_u8(ftype as u8);
    }

    pub(crate) fn write_field_u64(&mut self, field: u64, ftype: FieldType) {
        self.write_field_header(8, ftype);
        self.write_u64(field);
    }

    pub(crate) fn write_field_u32(&mut self, field: u32, ftype: FieldType) {
        self.write_field_header(4, ftype);
        self.write_u32(field);
    }

    pub(crate) fn write_field_string(&mut self, field: &str, ftype: FieldType) {
        self.write_field_header(field.len(), ftype);
        self.write_str(field);
    }

    pub(crate) fn write_field_bytes(&mut self, bytes: &[u8], ftype: FieldType) {
        self.write_field_header(bytes.len(), ftype);
        self.write_bytes(bytes);
    }

    pub(crate) fn write_field_value(&mut self, value: &Value, ftype: FieldType) {
        self.write_field_header(value.estimate_size() + 1, ftype);
        self.write_u8(value.particle_type() as u8);
        value.write_to(self);
    }

    pub(crate) fn write_field_version(&mut self, version: &RecordVersion) {
        self.write_field_bytes(version.as_bytes(), FieldType::RecordVersion);
    }

    fn write_args(&mut self, args: Option<&[Value]>, ftype: FieldType) {
        if let Some(args) = args {
            self.write_field_header(encoder::pack_array(&mut None, args), ftype);
            encoder::pack_array(&mut Some(self), args);
        } else {
            self.write_field_header(encoder::pack_empty_args_array(&mut None), ftype);
            encoder::pack_empty_args_array(&mut Some(self));
        }
    }

    fn write_operation_for_bin(&mut self, bin: &Bin<'_>, op_type: OperationType) {
        let name_length = bin.name.len();
        let value_length = bin.value.estimate_size();

        self.write_i32((name_length + value_length + 4) as i32);
        self.write_u8(op_type as u8);
        self.write_u8(bin.value.particle_type() as u8);
        self.write_u8(0);
        self.write_u8(name_length as u8);
        self.write_str(bin.name);
        bin.value.write_to(self);
    }

    fn write_operation_for_bin_name(&mut self, name: &str, op_type: OperationType) {
        self.write_i32(name.len() as i32 + 4);
        self.write_u8(op_type as u8);
        self.write_u8(0);
        self.write_u8(0);
        self.write_u8(name.len() as u8);
        self.write_str(name);
    }

    fn write_operation_for_operation_type(&mut self, op_type: OperationType) {
        self.write_i32(4);
        self.write_u8(op_type as u8);
        self.write_u8(0);
        self.write_u8(0);
        self.write_u8(0);
    }

    // Data buffer implementations

    pub(crate) const fn data_offset(&self) -> usize {
        self.data_offset
    }

    pub(crate) fn skip(&mut self, count: usize) {
        self.data_offset += count;
    }

    pub(crate) fn peek(&self) -> u8 {
        self.data_buffer[self.data_offset]
    }

    /// Remaining parseable bytes from the current offset.
    pub(crate) fn remaining(&self) -> usize {
        self.data_buffer.len().saturating_sub(self.data_offset)
    }

    pub(crate) fn check_remaining(&self, count: usize) -> Result<()> {
        if self.remaining() < count {
            return Err(Error::BadResponse(format!(
                "Message truncated: needed {} more byte(s), have {}",
                count,
                self.remaining()
            )));
        }
        Ok(())
    }

    #[allow(clippy::option_if_let_else)]
    pub(crate) fn read_u8(&mut self, pos: Option<usize>) -> u8 {
        if let Some(pos) = pos {
            self.data_buffer[pos]
        } else {
            let res = self.data_buffer[self.data_offset];
            self.data_offset += 1;
            res
        }
    }

    #[allow(clippy::option_if_let_else)]
    pub(crate) fn read_i8(&mut self, pos: Option<usize>) -> i8 {
        self.read_u8(pos) as i8
    }

    #[allow(clippy::option_if_let_else)]
    pub(crate) fn read_u16(&mut self, pos: Option<usize>) -> u16 {
        let len = 2;
        if let Some(pos) = pos {
            NetworkEndian::read_u16(&self.data_buffer[pos..pos + len])
        } else {
            let res = NetworkEndian::read_u16(
                &self.data_buffer[self.data_offset..self.data_offset + len],
            );
            self.data_offset += len;
            res
        }
    }

    pub(crate) fn read_i16(&mut self, pos: Option<usize>) -> i16 {
        self.read_u16(pos) as i16
    }

    #[allow(clippy::option_if_let_else)]
    pub(crate) fn read_u32(&mut self, pos: Option<usize>) -> u32 {
        let len = 4;
        if let Some(pos) = pos {
            NetworkEndian::read_u32(&self.data_buffer[pos..pos + len])
        } else {
            let res = NetworkEndian::read_u32(
                &self.data_buffer[self.data_offset..self.data_offset + len],
            );
            self.data_offset += len;
            res
        }
    }

    pub(crate) fn read_i32(&mut self, pos: Option<usize>) -> i32 {
        self.read_u32(pos) as i32
    }

    #[allow(clippy::option_if_let_else)]
    pub(crate) fn read_u64(&mut self, pos: Option<usize>) -> u64 {
        let len = 8;
        if let Some(pos) = pos {
            NetworkEndian::read_u64(&self.data_buffer[pos..pos + len])
        } else {
            let res = NetworkEndian::read_u64(
                &self.data_buffer[self.data_offset..self.data_offset + len],
            );
            self.data_offset += len;
            res
        }
    }

    pub(crate) fn read_i64(&mut self, pos: Option<usize>) -> i64 {
        self.read_u64(pos) as i64
    }

    pub(crate) fn read_msg_size(&mut self, pos: Option<usize>) -> usize {
        let size = self.read_i64(pos);
        (size & 0xFFFF_FFFF_FFFF) as usize
    }

    #[allow(clippy::option_if_let_else)]
    pub(crate) fn read_f32(&mut self, pos: Option<usize>) -> f32 {
        let len = 4;
        if let Some(pos) = pos {
            NetworkEndian::read_f32(&self.data_buffer[pos..pos + len])
        } else {
            let res = NetworkEndian::read_f32(
                &self.data_buffer[self.data_offset..self.data_offset + len],
            );
            self.data_offset += len;
            res
        }
    }

    #[allow(clippy::option_if_let_else)]
    pub(crate) fn read_f64(&mut self, pos: Option<usize>) -> f64 {
        let len = 8;
        if let Some(pos) = pos {
            NetworkEndian::read_f64(&self.data_buffer[pos..pos + len])
        } else {
            let res = NetworkEndian::read_f64(
                &self.data_buffer[self.data_offset..self.data_offset + len],
            );
            self.data_offset += len;
            res
        }
    }

    pub(crate) fn read_str(&mut self, len: usize) -> Result<String> {
        self.check_remaining(len)?;
        let s = str::from_utf8(&self.data_buffer[self.data_offset..self.data_offset + len])?;
        self.data_offset += len;
        Ok(s.to_owned())
    }

    pub(crate) fn read_slice(&mut self, count: usize) -> Result<&[u8]> {
        self.check_remaining(count)?;
        Ok(&self.data_buffer[self.data_offset..self.data_offset + count])
    }

    pub(crate) fn read_blob(&mut self, len: usize) -> Result<Vec<u8>> {
        self.check_remaining(len)?;
        let val = self.data_buffer[self.data_offset..self.data_offset + len].to_vec();
        self.data_offset += len;
        Ok(val)
    }

    pub(crate) fn read_bool(&mut self, len: usize) -> bool {
        if len == 0 {
            false
        } else {
            let val = self.data_buffer[self.data_offset];
            self.data_offset += len;
            val != 0
        }
    }

    pub(crate) fn read_version(&mut self, len: usize) -> Result<RecordVersion> {
        let bytes = self.read_blob(len)?;
        RecordVersion::from_bytes(&bytes)
    }

    pub(crate) fn write_u8(&mut self, val: u8) -> usize {
        self.data_buffer[self.data_offset] = val;
        self.data_offset += 1;
        1
    }

    pub(crate) fn write_i8(&mut self, val: i8) -> usize {
        self.write_u8(val as u8)
    }

    pub(crate) fn write_u16(&mut self, val: u16) -> usize {
        NetworkEndian::write_u16(
            &mut self.data_buffer[self.data_offset..self.data_offset + 2],
            val,
        );
        self.data_offset += 2;
        2
    }

    pub(crate) fn write_u16_little_endian(&mut self, val: u16) -> usize {
        LittleEndian::write_u16(
            &mut self.data_buffer[self.data_offset..self.data_offset + 2],
            val,
        );
        self.data_offset += 2;
        2
    }

    pub(crate) fn write_i16(&mut self, val: i16) -> usize {
        self.write_u16(val as u16)
    }

    pub(crate) fn write_u32(&mut self, val: u32) -> usize {
        NetworkEndian::write_u32(
            &mut self.data_buffer[self.data_offset..self.data_offset + 4],
            val,
        );
        self.data_offset += 4;
        4
    }

    pub(crate) fn write_i32(&mut self, val: i32) -> usize {
        self.write_u32(val as u32)
    }

    pub(crate) fn write_u64(&mut self, val: u64) -> usize {
        NetworkEndian::write_u64(
            &mut self.data_buffer[self.data_offset..self.data_offset + 8],
            val,
        );
        self.data_offset += 8;
        8
    }

    pub(crate) fn write_i64(&mut self, val: i64) -> usize {
        self.write_u64(val as u64)
    }

    pub(crate) fn write_bool(&mut self, val: bool) -> usize {
        self.write_i8(if val { 1 } else { 0 })
    }

    pub(crate) fn write_f32(&mut self, val: f32) -> usize {
        NetworkEndian::write_f32(
            &mut self.data_buffer[self.data_offset..self.data_offset + 4],
            val,
        );
        self.data_offset += 4;
        4
    }

    pub(crate) fn write_f64(&mut self, val: f64) -> usize {
        NetworkEndian::write_f64(
            &mut self.data_buffer[self.data_offset..self.data_offset + 8],
            val,
        );
        self.data_offset += 8;
        8
    }

    pub(crate) fn write_bytes(&mut self, bytes: &[u8]) -> usize {
        for b in bytes {
            self.write_u8(*b);
        }
        bytes.len()
    }

    pub(crate) fn write_str(&mut self, val: &str) -> usize {
        self.write_bytes(val.as_bytes())
    }

    pub(crate) fn write_geo(&mut self, value: &str) -> usize {
        self.write_u8(0);
        self.write_u8(0);
        self.write_u8(0);
        self.write_bytes(value.as_bytes());
        3 + value.len()
    }

    pub(crate) fn write_timeout(&mut self, val: Option<Duration>) {
        if let Some(val) = val {
            let millis: i32 = (val.as_secs() * 1_000) as i32 + val.subsec_millis() as i32;
            NetworkEndian::write_i32(&mut self.data_buffer[22..22 + 4], millis);
        }
    }
}

fn duration_millis(duration: Option<Duration>) -> u32 {
    duration.map_or(0, |d| d.as_millis() as u32)
}

const fn sc_read_bits(mode: ReadModeSC) -> u8 {
    match mode {
        ReadModeSC::Session => 0,
        ReadModeSC::Linearize => INFO3_SC_READ_TYPE,
        ReadModeSC::AllowReplica => INFO3_SC_READ_RELAX,
        ReadModeSC::AllowUnavailable => INFO3_SC_READ_TYPE | INFO3_SC_READ_RELAX,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{BatchOperation, BatchReadPolicy};
    use crate::policy::{BasePolicy, BatchPolicy, GenerationPolicy, WritePolicy};
    use crate::{as_bin, as_key, Bins};

    fn frame(buf: &Buffer) -> &[u8] {
        &buf.data_buffer
    }

    #[test]
    fn read_frame_header() {
        let mut buf = Buffer::new(1 << 20);
        let key = as_key!("test", "s", "k1");
        let policy = BasePolicy::default();
        buf.set_read(&policy, &key, &Bins::All).unwrap();

        let bytes = frame(&buf);
        let proto = NetworkEndian::read_u64(&bytes[0..8]);
        assert_eq!((proto >> 56) as u8, CL_MSG_VERSION);
        assert_eq!((proto >> 48) as u8 & 0xFF, MSG_TYPE_STANDARD);
        assert_eq!((proto & 0xFFFF_FFFF_FFFF) as usize, bytes.len() - 8);

        assert_eq!(bytes[8], MSG_REMAINING_HEADER_SIZE);
        assert_eq!(bytes[9], INFO1_READ | INFO1_GET_ALL);
        assert_eq!(bytes[10], 0);
        // three fields: namespace, set, digest; no operations
        assert_eq!(NetworkEndian::read_u16(&bytes[26..28]), 3);
        assert_eq!(NetworkEndian::read_u16(&bytes[28..30]), 0);

        // first field is the namespace
        assert_eq!(NetworkEndian::read_u32(&bytes[30..34]), 5);
        assert_eq!(bytes[34], FieldType::Namespace as u8);
        assert_eq!(&bytes[35..39], b"test");
    }

    #[test]
    fn write_frame_generation_policy() {
        let mut buf = Buffer::new(1 << 20);
        let key = as_key!("test", "s", "k1");
        let mut policy = WritePolicy::default();
        policy.generation_policy = GenerationPolicy::ExpectGenEqual;
        policy.generation = 5;
        let bins = [as_bin!("a", 1)];
        buf.set_write(&policy, OperationType::Write, &key, &bins)
            .unwrap();

        let bytes = frame(&buf);
        assert_eq!(bytes[10] & INFO2_WRITE, INFO2_WRITE);
        assert_eq!(bytes[10] & INFO2_GENERATION, INFO2_GENERATION);
        assert_eq!(NetworkEndian::read_u32(&bytes[14..18]), 5);
    }

    #[test]
    fn sc_read_modes() {
        for (mode, expected) in [
            (ReadModeSC::Session, 0),
            (ReadModeSC::Linearize, INFO3_SC_READ_TYPE),
            (ReadModeSC::AllowReplica, INFO3_SC_READ_RELAX),
            (
                ReadModeSC::AllowUnavailable,
                INFO3_SC_READ_TYPE | INFO3_SC_READ_RELAX,
            ),
        ] {
            let mut buf = Buffer::new(1 << 20);
            let key = as_key!("test", "s", "k1");
            let mut policy = BasePolicy::default();
            policy.read_mode_sc = mode;
            buf.set_read(&policy, &key, &Bins::All).unwrap();
            assert_eq!(frame(&buf)[11], expected, "mode {:?}", mode);
        }
    }

    #[test]
    fn bin_name_length_limits() {
        let key = as_key!("test", "s", "k1");
        let policy = WritePolicy::default();

        let empty = "";
        let fifteen = "123456789012345";
        let sixteen = "1234567890123456";

        let mut buf = Buffer::new(1 << 20);
        let bins = [as_bin!(empty, 1), as_bin!(fifteen, 2)];
        assert!(buf
            .set_write(&policy, OperationType::Write, &key, &bins)
            .is_ok());

        let mut buf = Buffer::new(1 << 20);
        let bins = [as_bin!(sixteen, 1)];
        let err = buf
            .set_write(&policy, OperationType::Write, &key, &bins)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn batch_prefix_repeat() {
        let read_policy = BatchReadPolicy::default();
        let k1 = as_key!("test", "s", "k1");
        let k2 = as_key!("test", "s", "k2");
        let k3 = as_key!("test", "other", "k3");
        let ops = vec![
            (BatchOperation::read(&read_policy, k1, Bins::All), 0),
            (BatchOperation::read(&read_policy, k2.clone(), Bins::All), 1),
            (BatchOperation::read(&read_policy, k3.clone(), Bins::All), 2),
        ];

        let mut buf = Buffer::new(1 << 20);
        let policy = BatchPolicy::default();
        buf.set_batch_operate(&policy, &ops).unwrap();

        let bytes = frame(&buf);
        assert_eq!(bytes[9] & INFO1_BATCH, INFO1_BATCH);

        // BATCH_INDEX field starts right after the 30-byte header:
        // u32 len, u8 type, u32 count, u8 flags.
        assert_eq!(bytes[34], FieldType::BatchIndex as u8);
        assert_eq!(NetworkEndian::read_u32(&bytes[35..39]), 3);

        // First record: index 0 at offset 40, digest, then a full header.
        let rec0 = 40;
        assert_eq!(NetworkEndian::read_u32(&bytes[rec0..rec0 + 4]), 0);
        let hdr0 = bytes[rec0 + 4 + 20];
        assert_eq!(hdr0 & BATCH_MSG_REPEAT, 0);

        // Second record repeats namespace/set/bin selection of the first.
        let rec1 = rec0
            + 4
            + 20
            + 1 // sub-header bits
            + 3 // info1..info3
            + 4 // ttl
            + 4 // field count + op count
            + (FIELD_HEADER_SIZE as usize + 4) // namespace field
            + (FIELD_HEADER_SIZE as usize + 1); // set field
        assert_eq!(NetworkEndian::read_u32(&bytes[rec1..rec1 + 4]), 1);
        assert_eq!(&bytes[rec1 + 4..rec1 + 24], &k2.digest[..]);
        assert_eq!(bytes[rec1 + 24], BATCH_MSG_REPEAT);

        // Third record has a different set, so a full header again.
        let rec2 = rec1 + 4 + 20 + 1;
        assert_eq!(NetworkEndian::read_u32(&bytes[rec2..rec2 + 4]), 2);
        assert_eq!(&bytes[rec2 + 4..rec2 + 24], &k3.digest[..]);
        assert_eq!(bytes[rec2 + 24] & BATCH_MSG_REPEAT, 0);
    }

    #[test]
    fn batch_flags_reserved_bit() {
        let mut policy = BatchPolicy::default();
        policy.allow_inline = true;
        policy.allow_inline_ssd = false;
        policy.respond_all_keys = true;
        assert_eq!(Buffer::get_batch_flags(&policy), 0x8 | 0x1 | 0x4);

        policy.allow_inline = false;
        policy.respond_all_keys = false;
        assert_eq!(Buffer::get_batch_flags(&policy), 0x8);
    }

    #[test]
    fn compression_threshold() {
        // Frame with payload at the threshold stays untouched.
        let mut buf = Buffer::new(1 << 20);
        buf.resize_buffer(8 + COMPRESS_THRESHOLD).unwrap();
        buf.data_offset = 8 + COMPRESS_THRESHOLD;
        buf.reset_offset();
        buf.write_i64(
            (COMPRESS_THRESHOLD as i64)
                | ((i64::from(CL_MSG_VERSION) << 56) as i64)
                | (i64::from(MSG_TYPE_STANDARD) << 48),
        );
        let before = buf.data_buffer.clone();
        buf.compress().unwrap();
        assert_eq!(before, buf.data_buffer);

        // One byte over the threshold compresses and round-trips.
        let mut buf = Buffer::new(1 << 20);
        let total = 8 + COMPRESS_THRESHOLD + 1;
        buf.resize_buffer(total).unwrap();
        for i in 8..total {
            buf.data_buffer[i] = (i % 251) as u8;
        }
        buf.reset_offset();
        buf.write_i64(
            ((total - 8) as i64)
                | ((i64::from(CL_MSG_VERSION) << 56) as i64)
                | (i64::from(MSG_TYPE_STANDARD) << 48),
        );
        let original = buf.data_buffer.clone();

        buf.compress().unwrap();
        let proto = NetworkEndian::read_u64(&buf.data_buffer[0..8]);
        assert_eq!((proto >> 48) as u8 & 0xFF, MSG_TYPE_COMPRESSED);
        assert_eq!(
            NetworkEndian::read_u64(&buf.data_buffer[8..16]) as usize,
            original.len()
        );

        // Strip the outer proto header the way the response path does, then
        // inflate.
        buf.data_buffer.drain(0..8);
        buf.decompress().unwrap();
        assert_eq!(original, buf.data_buffer);
    }

    #[test]
    fn record_version_field() {
        let mut buf = Buffer::new(1 << 20);
        buf.resize_buffer(64).unwrap();
        let version = RecordVersion::from_bytes(&[1, 2, 3, 4, 5, 6, 7]).unwrap();
        buf.write_field_version(&version);

        buf.reset_offset();
        let len = buf.read_u32(None) as usize;
        assert_eq!(len, 8); // 7 bytes + type byte
        assert_eq!(buf.read_u8(None), FieldType::RecordVersion as u8);
        let parsed = buf.read_version(len - 1).unwrap();
        assert_eq!(parsed, version);
    }

    #[test]
    fn operate_respond_all_ops() {
        use crate::operations;

        let mut buf = Buffer::new(1 << 20);
        let key = as_key!("test", "s", "k1");
        let mut policy = WritePolicy::default();
        policy.respond_per_each_op = true;
        let bin = as_bin!("a", 1);
        let ops = [operations::put(&bin), operations::get()];
        buf.set_operate(&policy, &key, &ops).unwrap();

        let bytes = frame(&buf);
        assert_eq!(bytes[10] & INFO2_RESPOND_ALL_OPS, INFO2_RESPOND_ALL_OPS);
        assert_eq!(bytes[9] & INFO1_READ, INFO1_READ);
        assert_eq!(NetworkEndian::read_u16(&bytes[28..30]), 2);
    }

    #[test]
    fn txn_verify_row_layout() {
        let mut buf = Buffer::new(1 << 20);
        let policy = BatchPolicy::default();
        let key = as_key!("test", "s", "k1");
        let version = RecordVersion::from_bytes(&[9, 8, 7, 6, 5, 4, 3]).unwrap();
        buf.set_batch_txn_verify(&policy, 0xDEAD_BEEF, &[(key.clone(), Some(version))])
            .unwrap();

        let bytes = frame(&buf);
        assert_eq!(bytes[9] & INFO1_BATCH, INFO1_BATCH);

        let rec = 40;
        assert_eq!(&bytes[rec + 4..rec + 24], &key.digest[..]);
        assert_eq!(bytes[rec + 24], BATCH_MSG_INFO | BATCH_MSG_INFO4);
        assert_eq!(bytes[rec + 25], INFO1_READ | INFO1_NOBINDATA);
        assert_eq!(bytes[rec + 27], INFO3_SC_READ_TYPE);
        assert_eq!(bytes[rec + 28], INFO4_TXN_VERIFY_READ);
        // namespace + set + txn id + record version
        assert_eq!(NetworkEndian::read_u16(&bytes[rec + 29..rec + 31]), 4);
    }

    #[test]
    fn txn_roll_row_layout() {
        let mut buf = Buffer::new(1 << 20);
        let policy = BatchPolicy::default();
        let key = as_key!("test", "s", "k1");
        buf.set_batch_txn_roll(&policy, 7, &[key], INFO4_TXN_ROLL_FORWARD)
            .unwrap();

        let bytes = frame(&buf);
        let rec = 40;
        assert_eq!(
            bytes[rec + 24],
            BATCH_MSG_INFO | BATCH_MSG_GEN | BATCH_MSG_TTL | BATCH_MSG_INFO4
        );
        assert_eq!(bytes[rec + 26], INFO2_WRITE | INFO2_DURABLE_DELETE);
        assert_eq!(bytes[rec + 28], INFO4_TXN_ROLL_FORWARD);
    }
}
