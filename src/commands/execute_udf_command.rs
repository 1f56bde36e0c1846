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

use crate::cluster::{Cluster, Node};
use crate::commands::{self, Command, SingleCommand, SingleResponse};
use crate::errors::{Error, Result};
use crate::net::Connection;
use crate::policy::WritePolicy;
use crate::{Key, Record, ResultCode, Value};

pub(crate) struct ExecuteUdfCommand<'a> {
    pub single_command: SingleCommand<'a>,
    pub record: Option<Record>,
    policy: &'a WritePolicy,
    package_name: &'a str,
    function_name: &'a str,
    args: Option<&'a [Value]>,
}

impl<'a> ExecuteUdfCommand<'a> {
    pub fn new(
        policy: &'a WritePolicy,
        cluster: Arc<Cluster>,
        key: &'a Key,
        package_name: &'a str,
        function_name: &'a str,
        args: Option<&'a [Value]>,
    ) -> Self {
        ExecuteUdfCommand {
            single_command: SingleCommand::new(
                cluster,
                key,
                policy.base_policy.replica,
                policy.base_policy.read_mode_sc,
            ),
            record: None,
            policy,
            package_name,
            function_name,
            args,
        }
    }

    pub async fn execute(&mut self) -> Result<()> {
        SingleCommand::execute(self.policy, self).await
    }
}

#[async_trait::async_trait]
impl<'a> Command for ExecuteUdfCommand<'a> {
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
        conn.buffer.set_udf(
            self.policy,
            self.single_command.key,
            self.package_name,
            self.function_name,
            self.args,
        )
    }

    async fn get_node(&mut self) -> Result<Arc<Node>> {
        self.single_command.get_node(true).await
    }

    fn cluster(&self) -> Arc<Cluster> {
        self.single_command.cluster.clone()
    }

    fn is_write(&self) -> bool {
        true
    }

    fn prepare_retry(&mut self, is_timeout: bool) {
        self.single_command.prepare_retry(is_timeout);
    }

    async fn parse_result(&mut self, conn: &mut Connection) -> Result<()> {
        conn.read_proto_block().await?;
        let header = SingleResponse::parse_header(&mut conn.buffer)?;

        match header.result_code {
            ResultCode::Ok => {
                commands::parse_fields(&mut conn.buffer, header.field_count)?;
                let bins = commands::parse_bins(&mut conn.buffer, header.op_count)?;
                self.record = Some(Record::new(
                    None,
                    bins,
                    header.generation,
                    header.expiration,
                ));
                Ok(())
            }
            ResultCode::UdfBadResponse => {
                // The "FAILURE" bin carries the error payload.
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
