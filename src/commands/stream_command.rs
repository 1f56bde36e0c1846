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

use std::sync::Arc;
use std::time::Duration;

use log::warn;
use tokio::sync::mpsc;

use crate::cluster::{Cluster, Node};
use crate::commands::{self, buffer, Command};
use crate::errors::{Error, Result};
use crate::net::Connection;
use crate::query::Recordset;
use crate::{Record, ResultCode};

// Shared parser for the record streams produced by scans and queries. The
// payload is a sequence of mini-records, each with its own message header;
// the INFO3_LAST bit marks the end of the stream.
pub(crate) struct StreamCommand {
    node: Arc<Node>,
    cluster: Arc<Cluster>,
    pub recordset: Arc<Recordset>,
    records: mpsc::Sender<Result<Record>>,
}

impl StreamCommand {
    pub fn new(
        node: Arc<Node>,
        cluster: Arc<Cluster>,
        recordset: Arc<Recordset>,
        records: mpsc::Sender<Result<Record>>,
    ) -> Self {
        StreamCommand {
            node,
            cluster,
            recordset,
            records,
        }
    }

    async fn push(&self, record: Result<Record>) -> Result<()> {
        if !self.recordset.is_active() {
            return Err(Error::Canceled);
        }
        self.records
            .send(record)
            .await
            .map_err(|_| Error::Canceled)
    }

    // Parse one mini-record. Returns the record (when the row carries one)
    // and whether the stream continues.
    fn parse_record(conn: &mut Connection) -> Result<(Option<Record>, bool)> {
        let base = conn.buffer.data_offset();
        conn.buffer
            .check_remaining(buffer::MSG_REMAINING_HEADER_SIZE as usize)?;

        let info3 = conn.buffer.read_u8(Some(base + 3));
        let result_code = ResultCode::from(conn.buffer.read_u8(Some(base + 5)));

        if info3 & buffer::INFO3_LAST == buffer::INFO3_LAST {
            return match result_code {
                ResultCode::Ok | ResultCode::QueryEnd => Ok((None, false)),
                rc => Err(Error::ServerError(rc)),
            };
        }

        match result_code {
            ResultCode::Ok => (),
            ResultCode::KeyNotFoundError => return Ok((None, false)),
            rc => return Err(Error::ServerError(rc)),
        }

        let generation = conn.buffer.read_u32(Some(base + 6));
        let expiration = conn.buffer.read_u32(Some(base + 10));
        let field_count = conn.buffer.read_u16(Some(base + 18)) as usize;
        let op_count = conn.buffer.read_u16(Some(base + 20)) as usize;
        conn.buffer
            .skip(buffer::MSG_REMAINING_HEADER_SIZE as usize);

        let key = commands::parse_key(&mut conn.buffer, field_count)?;

        // Partition complete marker; carries no bin data.
        if info3 & buffer::INFO3_PARTITION_DONE != 0 {
            return Ok((None, true));
        }

        let bins = commands::parse_bins(&mut conn.buffer, op_count)?;
        let record = Record::new(Some(key), bins, generation, expiration);
        Ok((Some(record), true))
    }

    async fn parse_block(&mut self, conn: &mut Connection) -> Result<bool> {
        while self.recordset.is_active() && conn.buffer.remaining() > 0 {
            match StreamCommand::parse_record(conn) {
                Ok((Some(rec), _)) => self.push(Ok(rec)).await?,
                Ok((None, cont)) => return Ok(cont),
                Err(err) => {
                    // Surface the server error through the recordset; the
                    // stream is unusable from here, so the command ends with
                    // `Canceled`, which closes the connection and suppresses
                    // retries that would replay already-delivered records.
                    warn!("Stream error from node {}: {}", self.node, err);
                    let _ = self.push(Err(err)).await;
                    return Err(Error::Canceled);
                }
            };
        }

        if !self.recordset.is_active() {
            return Err(Error::Canceled);
        }
        Ok(true)
    }
}

#[async_trait::async_trait]
impl Command for StreamCommand {
    async fn write_timeout(
        &mut self,
        conn: &mut Connection,
        timeout: Option<Duration>,
    ) -> Result<()> {
        conn.buffer.write_timeout(timeout);
        Ok(())
    }

    async fn write_buffer(&mut self, conn: &mut Connection) -> Result<()> {
        conn.flush().await
    }

    #[allow(unused_variables)]
    fn prepare_buffer(&mut self, conn: &mut Connection) -> Result<()> {
        // implemented by the scan/query wrappers
        unreachable!()
    }

    async fn get_node(&mut self) -> Result<Arc<Node>> {
        Ok(self.node.clone())
    }

    fn cluster(&self) -> Arc<Cluster> {
        self.cluster.clone()
    }

    async fn parse_result(&mut self, conn: &mut Connection) -> Result<()> {
        loop {
            conn.read_proto_block().await?;
            if conn.buffer.remaining() == 0 {
                break;
            }
            if !self.parse_block(conn).await? {
                break;
            }
        }

        Ok(())
    }
}
