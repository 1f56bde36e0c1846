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

pub mod batch_attr;
pub mod batch_command;
pub mod buffer;
pub mod delete_command;
pub mod execute_udf_command;
pub mod exists_command;
pub mod info_command;
pub mod operate_command;
pub mod particle_type;
pub mod query_command;
pub mod read_command;
pub mod scan_command;
pub mod single_command;
pub mod stream_command;
pub mod touch_command;
pub mod write_command;

pub(crate) mod field_type;

use std::collections::hash_map::Entry::{Occupied, Vacant};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub(crate) use self::batch_attr::BatchAttr;
pub(crate) use self::batch_command::BatchCommand;
pub(crate) use self::delete_command::DeleteCommand;
pub(crate) use self::execute_udf_command::ExecuteUdfCommand;
pub(crate) use self::exists_command::ExistsCommand;
pub(crate) use self::info_command::Message;
pub(crate) use self::operate_command::OperateCommand;
pub use self::particle_type::ParticleType;
pub(crate) use self::query_command::QueryCommand;
pub(crate) use self::read_command::ReadCommand;
pub(crate) use self::scan_command::ScanCommand;
pub(crate) use self::single_command::SingleCommand;
pub(crate) use self::stream_command::StreamCommand;
pub(crate) use self::touch_command::TouchCommand;
pub(crate) use self::write_command::WriteCommand;

use self::buffer::Buffer;
use self::field_type::FieldType;
use crate::cluster::{Cluster, Node};
use crate::errors::{Error, Result};
use crate::net::Connection;
use crate::record::RecordVersion;
use crate::value::bytes_to_particle;
use crate::{Key, ResultCode, Value};

// Command interface implemented by all leaf commands; the retry driver in
// `single_command` consumes it.
#[async_trait::async_trait]
pub(crate) trait Command {
    async fn write_timeout(
        &mut self,
        conn: &mut Connection,
        timeout: Option<Duration>,
    ) -> Result<()>;
    fn prepare_buffer(&mut self, conn: &mut Connection) -> Result<()>;
    async fn get_node(&mut self) -> Result<Arc<Node>>;
    async fn parse_result(&mut self, conn: &mut Connection) -> Result<()>;
    async fn write_buffer(&mut self, conn: &mut Connection) -> Result<()>;
    fn cluster(&self) -> Arc<Cluster>;

    /// Whether a failure can leave an unconfirmed server-side write.
    fn is_write(&self) -> bool {
        false
    }

    /// Advance replica sequences before the next attempt.
    fn prepare_retry(&mut self, _is_timeout: bool) {}
}

pub(crate) const fn keep_connection(err: &Error) -> bool {
    matches!(
        err,
        Error::ServerError(ResultCode::KeyNotFoundError | ResultCode::FilteredOut)
    )
}

/// Validate a proto header and extract the message type.
pub(crate) fn proto_msg_type(proto: u64) -> Result<u8> {
    let version = (proto >> 56) as u8;
    let msg_type = (proto >> 48) as u8;
    if version != buffer::CL_MSG_VERSION {
        return Err(Error::BadResponse(format!(
            "Unsupported protocol version: {}",
            version
        )));
    }
    match msg_type {
        buffer::MSG_TYPE_STANDARD | buffer::MSG_TYPE_COMPRESSED => Ok(msg_type),
        n => Err(Error::BadResponse(format!("Invalid proto type: {}", n))),
    }
}

// Header of a single-record response, read relative to the start of the
// 22-byte message header in the buffer.
pub(crate) struct SingleResponse {
    pub result_code: ResultCode,
    pub generation: u32,
    pub expiration: u32,
    pub field_count: usize,
    pub op_count: usize,
}

impl SingleResponse {
    // Consumes the message header; afterwards the buffer offset sits on the
    // first field.
    pub(crate) fn parse_header(buf: &mut Buffer) -> Result<SingleResponse> {
        let base = buf.data_offset();
        buf.check_remaining(buffer::MSG_REMAINING_HEADER_SIZE as usize)?;
        let result_code = ResultCode::from(buf.read_u8(Some(base + 5)));
        let generation = buf.read_u32(Some(base + 6));
        let expiration = buf.read_u32(Some(base + 10));
        let field_count = buf.read_u16(Some(base + 18)) as usize;
        let op_count = buf.read_u16(Some(base + 20)) as usize;
        buf.skip(buffer::MSG_REMAINING_HEADER_SIZE as usize);
        Ok(SingleResponse {
            result_code,
            generation,
            expiration,
            field_count,
            op_count,
        })
    }
}

// Consume response fields, capturing the record version when present.
pub(crate) fn parse_fields(buf: &mut Buffer, field_count: usize) -> Result<Option<RecordVersion>> {
    let mut version = None;
    for _ in 0..field_count {
        buf.check_remaining(5)?;
        let field_size = buf.read_u32(None) as usize;
        if field_size == 0 {
            return Err(Error::BadResponse("Empty response field".to_string()));
        }
        let field_type = buf.read_u8(None);
        if field_type == FieldType::RecordVersion as u8 && field_size - 1 == RecordVersion::LEN {
            version = Some(buf.read_version(RecordVersion::LEN)?);
        } else {
            buf.check_remaining(field_size - 1)?;
            buf.skip(field_size - 1);
        }
    }
    Ok(version)
}

// Reconstruct a key from the fields of a streamed response record.
pub(crate) fn parse_key(buf: &mut Buffer, field_count: usize) -> Result<Key> {
    let mut digest: [u8; 20] = [0; 20];
    let mut namespace: String = String::new();
    let mut set_name: String = String::new();
    let mut orig_key: Option<Value> = None;

    for _ in 0..field_count {
        buf.check_remaining(5)?;
        let field_len = buf.read_u32(None) as usize;
        if field_len == 0 {
            return Err(Error::BadResponse("Empty response field".to_string()));
        }
        let field_type = buf.read_u8(None);

        match field_type {
            x if x == FieldType::DigestRipe as u8 => {
                if field_len - 1 != digest.len() {
                    return Err(Error::BadResponse(format!(
                        "Invalid digest length: {}",
                        field_len - 1
                    )));
                }
                digest.copy_from_slice(buf.read_slice(field_len - 1)?);
                buf.skip(field_len - 1);
            }
            x if x == FieldType::Namespace as u8 => {
                namespace = buf.read_str(field_len - 1)?;
            }
            x if x == FieldType::Table as u8 => {
                set_name = buf.read_str(field_len - 1)?;
            }
            x if x == FieldType::Key as u8 => {
                let particle_type = buf.read_u8(None);
                let particle_bytes_size = field_len - 2;
                orig_key = Some(bytes_to_particle(particle_type, buf, particle_bytes_size)?);
            }
            _ => {
                buf.check_remaining(field_len - 1)?;
                buf.skip(field_len - 1);
            }
        }
    }

    Ok(Key {
        namespace,
        set_name,
        user_key: orig_key,
        digest,
    })
}

// Parse `op_count` operation results into a bin map. List and map
// operations may return multiple values for the same bin; those are folded
// into a list in operation order.
pub(crate) fn parse_bins(buf: &mut Buffer, op_count: usize) -> Result<HashMap<String, Value>> {
    let mut bins: HashMap<String, Value> = HashMap::with_capacity(op_count);

    for _ in 0..op_count {
        buf.check_remaining(8)?;
        let op_size = buf.read_u32(None) as usize;
        buf.skip(1);
        let particle_type = buf.read_u8(None);
        buf.skip(1);
        let name_size = buf.read_u8(None) as usize;
        let name: String = buf.read_str(name_size)?;
        if op_size < 4 + name_size {
            return Err(Error::BadResponse("Corrupt operation header".to_string()));
        }

        let particle_bytes_size = op_size - (4 + name_size);
        buf.check_remaining(particle_bytes_size)?;
        let value = bytes_to_particle(particle_type, buf, particle_bytes_size)?;

        if !value.is_nil() {
            match bins.entry(name) {
                Vacant(entry) => {
                    entry.insert(value);
                }
                Occupied(entry) => match *entry.into_mut() {
                    Value::List(ref mut list) => list.push(value),
                    ref mut prev => {
                        *prev = as_list!(prev.clone(), value);
                    }
                },
            }
        }
    }

    Ok(bins)
}
