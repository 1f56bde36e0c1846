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
use std::time::{Duration, SystemTime};

use crate::cluster::partition::Partition;
use crate::cluster::{Cluster, Node};
use crate::commands::buffer::{INFO4_TXN_ROLL_BACK, INFO4_TXN_ROLL_FORWARD};
use crate::commands::{self, buffer, Command, SingleCommand, SingleResponse};
use crate::errors::{Error, Result};
use crate::net::Connection;
use crate::policy::{BatchPolicy, WritePolicy};
use crate::record::{RecordVersion, FIREFLY_EPOCH};
use crate::txn::Txn;
use crate::{Bin, Key, ResultCode, Value};

// Executor for the commit/abort phases. Verify and roll are per-node
// batches; the monitor record is a single-record write/delete. All phases
// reuse the ordinary retry driver.
pub(crate) struct TxnRoll {
    cluster: Arc<Cluster>,
}

impl TxnRoll {
    pub fn new(cluster: Arc<Cluster>) -> Self {
        TxnRoll { cluster }
    }

    // Verify every read version against the server. Runs one batch per
    // involved node, sequentially; the first mismatch fails the phase.
    pub async fn verify(&self, policy: &BatchPolicy, txn: &Txn) -> Result<()> {
        let reads = txn.reads_snapshot();
        if reads.is_empty() {
            return Ok(());
        }

        let groups = self.group_rows(reads).await?;
        for (node, rows) in groups {
            let mut cmd = TxnBatchCommand {
                cluster: self.cluster.clone(),
                node,
                policy,
                txn_id: txn.id(),
                frame: TxnFrame::Verify { rows },
            };
            SingleCommand::execute(policy, &mut cmd).await?;
        }
        Ok(())
    }

    // Write the monitor record; from here on a crash is rolled forward by
    // the server instead of expiring silently.
    pub async fn mark_roll_forward(&self, policy: &WritePolicy, txn: &Txn) -> Result<()> {
        let deadline = monitor_deadline(txn.timeout())?;
        let mut cmd = MonitorCommand {
            cluster: self.cluster.clone(),
            policy,
            txn_id: txn.id(),
            key: txn.monitor_key()?,
            mode: MonitorMode::Mark { deadline },
            sequence: 0,
        };
        SingleCommand::execute(policy, &mut cmd).await
    }

    // Roll all provisional writes forward (commit) or back (abort), one
    // batch per node, sequentially.
    pub async fn roll(&self, policy: &BatchPolicy, txn: &Txn, txn_attr: u8) -> Result<()> {
        let writes = txn.writes_snapshot();
        if writes.is_empty() {
            return Ok(());
        }

        let rows = writes.into_iter().map(|key| (key, None)).collect();
        let groups = self.group_rows(rows).await?;
        for (node, rows) in groups {
            let keys = rows.into_iter().map(|(key, _)| key).collect();
            let mut cmd = TxnBatchCommand {
                cluster: self.cluster.clone(),
                node,
                policy,
                txn_id: txn.id(),
                frame: TxnFrame::Roll { keys, txn_attr },
            };
            SingleCommand::execute(policy, &mut cmd).await?;
        }
        Ok(())
    }

    // Delete the monitor record.
    pub async fn close(&self, policy: &WritePolicy, txn: &Txn) -> Result<()> {
        let mut cmd = MonitorCommand {
            cluster: self.cluster.clone(),
            policy,
            txn_id: txn.id(),
            key: txn.monitor_key()?,
            mode: MonitorMode::Close,
            sequence: 0,
        };
        SingleCommand::execute(policy, &mut cmd).await
    }

    // Master-routed grouping of rows by node under the current map.
    async fn group_rows(
        &self,
        rows: Vec<(Key, Option<RecordVersion>)>,
    ) -> Result<Vec<(Arc<Node>, Vec<(Key, Option<RecordVersion>)>)>> {
        let mut groups: Vec<(Arc<Node>, Vec<(Key, Option<RecordVersion>)>)> = Vec::new();
        for row in rows {
            let partition = Partition::new_by_key(&row.0);
            let node = self
                .cluster
                .get_node(&partition, crate::policy::Replica::Sequence, true, 0, 0)
                .await?;
            let group = groups.iter().position(|(n, _)| n.name() == node.name());
            match group {
                Some(i) => groups[i].1.push(row),
                None => groups.push((node, vec![row])),
            }
        }
        Ok(groups)
    }
}

fn monitor_deadline(timeout: Duration) -> Result<u32> {
    let deadline = SystemTime::now() + timeout;
    let secs = deadline
        .duration_since(*FIREFLY_EPOCH)
        .map_err(|_| Error::InvalidArgument("Invalid transaction deadline".to_string()))?
        .as_secs();
    Ok(secs as u32)
}

enum TxnFrame {
    Verify {
        rows: Vec<(Key, Option<RecordVersion>)>,
    },
    Roll {
        keys: Vec<Key>,
        txn_attr: u8,
    },
}

// Per-node verify or roll batch.
struct TxnBatchCommand<'a> {
    cluster: Arc<Cluster>,
    node: Arc<Node>,
    policy: &'a BatchPolicy,
    txn_id: u64,
    frame: TxnFrame,
}

impl<'a> TxnBatchCommand<'a> {
    // Roll results tolerate rows that already reached the target state.
    fn row_is_ok(&self, rc: ResultCode) -> bool {
        match &self.frame {
            TxnFrame::Verify { .. } => rc == ResultCode::Ok,
            TxnFrame::Roll { txn_attr, .. } => match rc {
                ResultCode::Ok | ResultCode::KeyNotFoundError => true,
                ResultCode::TxnAlreadyCommitted => *txn_attr == INFO4_TXN_ROLL_FORWARD,
                ResultCode::TxnAlreadyAborted => *txn_attr == INFO4_TXN_ROLL_BACK,
                _ => false,
            },
        }
    }
}

#[async_trait::async_trait]
impl<'a> Command for TxnBatchCommand<'a> {
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

    fn prepare_buffer(&mut self, conn: &mut Connection) -> Result<()> {
        match &self.frame {
            TxnFrame::Verify { rows } => {
                conn.buffer
                    .set_batch_txn_verify(self.policy, self.txn_id, rows)
            }
            TxnFrame::Roll { keys, txn_attr } => {
                conn.buffer
                    .set_batch_txn_roll(self.policy, self.txn_id, keys, *txn_attr)
            }
        }
    }

    async fn get_node(&mut self) -> Result<Arc<Node>> {
        Ok(self.node.clone())
    }

    fn cluster(&self) -> Arc<Cluster> {
        self.cluster.clone()
    }

    fn is_write(&self) -> bool {
        matches!(self.frame, TxnFrame::Roll { .. })
    }

    async fn parse_result(&mut self, conn: &mut Connection) -> Result<()> {
        loop {
            conn.read_proto_block().await?;
            if conn.buffer.remaining() == 0 {
                return Ok(());
            }

            while conn.buffer.remaining() > 0 {
                let buf = &mut conn.buffer;
                let base = buf.data_offset();
                buf.check_remaining(buffer::MSG_REMAINING_HEADER_SIZE as usize)?;

                let info3 = buf.read_u8(Some(base + 3));
                let result_code = ResultCode::from(buf.read_u8(Some(base + 5)));

                if info3 & buffer::INFO3_LAST == buffer::INFO3_LAST {
                    return match result_code {
                        ResultCode::Ok => Ok(()),
                        rc => Err(Error::ServerError(rc)),
                    };
                }

                let field_count = buf.read_u16(Some(base + 18)) as usize;
                let op_count = buf.read_u16(Some(base + 20)) as usize;
                buf.skip(buffer::MSG_REMAINING_HEADER_SIZE as usize);
                commands::parse_key(buf, field_count)?;
                commands::parse_bins(buf, op_count)?;

                if !self.row_is_ok(result_code) {
                    return Err(Error::ServerError(result_code));
                }
            }
        }
    }
}

enum MonitorMode {
    Mark { deadline: u32 },
    Close,
}

// Single-record command against the transaction monitor record.
struct MonitorCommand<'a> {
    cluster: Arc<Cluster>,
    policy: &'a WritePolicy,
    txn_id: u64,
    key: Key,
    mode: MonitorMode,
    sequence: usize,
}

#[async_trait::async_trait]
impl<'a> Command for MonitorCommand<'a> {
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

    fn prepare_buffer(&mut self, conn: &mut Connection) -> Result<()> {
        match self.mode {
            MonitorMode::Mark { deadline } => {
                let id_bin = Bin::new("id", Value::Int(self.txn_id as i64));
                conn.buffer.set_txn_mark_roll_forward(
                    self.policy,
                    self.txn_id,
                    deadline,
                    &self.key,
                    &id_bin,
                )
            }
            MonitorMode::Close => conn
                .buffer
                .set_txn_close(self.policy, self.txn_id, &self.key),
        }
    }

    async fn get_node(&mut self) -> Result<Arc<Node>> {
        let partition = Partition::new_by_key(&self.key);
        self.cluster
            .get_node(
                &partition,
                crate::policy::Replica::Sequence,
                true,
                self.sequence,
                self.sequence,
            )
            .await
    }

    fn cluster(&self) -> Arc<Cluster> {
        self.cluster.clone()
    }

    fn is_write(&self) -> bool {
        true
    }

    fn prepare_retry(&mut self, _is_timeout: bool) {
        self.sequence += 1;
    }

    async fn parse_result(&mut self, conn: &mut Connection) -> Result<()> {
        conn.read_proto_block().await?;
        let header = SingleResponse::parse_header(&mut conn.buffer)?;

        match header.result_code {
            ResultCode::Ok => Ok(()),
            // Closing an already-deleted monitor is benign.
            ResultCode::KeyNotFoundError if matches!(self.mode, MonitorMode::Close) => Ok(()),
            rc => Err(Error::ServerError(rc)),
        }
    }
}
