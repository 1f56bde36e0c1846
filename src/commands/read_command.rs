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

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::cluster::{Cluster, Node};
use crate::commands::{self, Command, SingleCommand, SingleResponse};
use crate::errors::{Error, Result};
use crate::net::Connection;
use crate::policy::ReadPolicy;
use crate::{Bins, Key, Record, ResultCode};

pub(crate) struct ReadCommand<'a> {
    pub single_command: SingleCommand<'a>,
    pub record: Option<Record>,
    policy: &'a ReadPolicy,
    bins: Bins,
}

impl<'a> ReadCommand<'a> {
    pub fn new(policy: &'a ReadPolicy, cluster: Arc<Cluster>, key: &'a Key, bins: Bins) -> Self {
        ReadCommand {
            single_command: SingleCommand::new(cluster, key, policy.replica, policy.read_mode_sc),
            bins,
            policy,
            record: None,
        }
    }

    pub async fn execute(&mut self) -> Result<()> {
        SingleCommand::execute(self.policy, self).await
    }
}

#[async_trait::async_trait]
impl<'a> Command for ReadCommand<'a> {
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
        conn.buffer
            .set_read(self.policy, self.single_command.key, &self.bins)
    }

    async fn get_node(&mut self) -> Result<Arc<Node>> {
        self.single_command.get_node(false).await
    }

    fn cluster(&self) -> Arc<Cluster> {
        self.single_command.cluster.clone()
    }

    fn prepare_retry(&mut self, is_timeout: bool) {
        self.single_command.prepare_retry(is_timeout);
    }

    async fn parse_result(&mut self, conn: &mut Connection) -> Result<()> {
        conn.read_proto_block().await?;
        let header = SingleResponse::parse_header(&mut conn.buffer)?;

        match header.result_code {
            ResultCode::Ok => {
                let version = commands::parse_fields(&mut conn.buffer, header.field_count)?;
                let bins = if self.bins.is_none() {
                    HashMap::new()
                } else {
                    commands::parse_bins(&mut conn.buffer, header.op_count)?
                };
                let mut record =
                    Record::new(None, bins, header.generation, header.expiration);
                record.version = version;

                // A read under a transaction pins the observed version for
                // the eventual verify phase.
                if let Some(ref txn) = self.policy.txn {
                    txn.on_read(self.single_command.key, version)?;
                }

                self.record = Some(record);
                Ok(())
            }
            // A missing record is a benign outcome, not an error.
            ResultCode::KeyNotFoundError => {
                self.record = None;
                Ok(())
            }
            ResultCode::UdfBadResponse => {
                // record bin "FAILURE" contains details about the UDF error
                commands::parse_fields(&mut conn.buffer, header.field_count)?;
                let bins = commands::parse_bins(&mut conn.buffer, header.op_count)?;
                let reason = bins
                    .get("FAILURE")
                    .map_or(String::from("UDF Error"), ToString::to_string);
                Err(Error::UdfBadResponse(reason))
            }
            rc => Err(Error::ServerError(rc)),
        }
    }
}
