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
use tokio::time::Instant;

use crate::batch::BatchOperation;
use crate::cluster::partition::Partition;
use crate::cluster::{Cluster, Node};
use crate::commands::single_command::try_with_timeout;
use crate::commands::{self, buffer};
use crate::errors::{Error, Result};
use crate::policy::{BatchPolicy, Policy, PolicyLike, ReadModeSC};
use crate::{Record, ResultCode};

// One batch sub-command: the slice of a batch request routed to a single
// node. Owns its rows as (operation, caller-index) pairs; results land in
// the operations' embedded records and are merged by the executor.
pub(crate) struct BatchCommand<'a> {
    cluster: Arc<Cluster>,
    policy: &'a BatchPolicy,
    pub node: Arc<Node>,
    pub batch_ops: Vec<(BatchOperation<'a>, usize)>,
    sequence_ap: usize,
    sequence_sc: usize,
    // Split-retry is allowed once; children retry in place to bound the
    // recursion.
    allow_split: bool,
    sent: usize,
}

impl<'a> BatchCommand<'a> {
    pub fn new(
        cluster: Arc<Cluster>,
        policy: &'a BatchPolicy,
        node: Arc<Node>,
        batch_ops: Vec<(BatchOperation<'a>, usize)>,
    ) -> Self {
        BatchCommand {
            cluster,
            policy,
            node,
            batch_ops,
            sequence_ap: 0,
            sequence_sc: 0,
            allow_split: true,
            sent: 0,
        }
    }

    fn child(&self, node: Arc<Node>) -> BatchCommand<'a> {
        BatchCommand {
            cluster: self.cluster.clone(),
            policy: self.policy,
            node,
            batch_ops: vec![],
            sequence_ap: self.sequence_ap,
            sequence_sc: self.sequence_sc,
            allow_split: false,
            sent: self.sent,
        }
    }

    fn has_write(&self) -> bool {
        self.batch_ops.iter().any(|(op, _)| op.has_write())
    }

    pub async fn execute(&mut self) -> Result<()> {
        self.cluster.add_command();

        let deadline = self.policy.deadline();
        let socket_timeout = self.policy.socket_timeout();

        let mut iterations: usize = 0;
        let mut last_err = Error::Connection("No batch attempt was made".to_string());
        let mut last_was_timeout = false;

        loop {
            iterations += 1;

            if iterations > 1 {
                if let Some(max_retries) = self.policy.max_retries() {
                    if iterations > max_retries + 1 {
                        break;
                    }
                }

                if let Some(sleep_between_retries) = self.policy.sleep_between_retries() {
                    if let Some(deadline) = deadline {
                        if Instant::now() + sleep_between_retries > deadline {
                            break;
                        }
                    }
                    tokio::time::sleep(sleep_between_retries).await;
                } else if let Some(deadline) = deadline {
                    if Instant::now() > deadline {
                        break;
                    }
                }

                self.prepare_retry(last_was_timeout);
                self.cluster.add_retry();

                // Re-route against the current partition map. When the keys
                // no longer agree on one node the batch splits; children run
                // sequentially and do not split again.
                match self.route_rows().await {
                    Ok(routes) => {
                        let moved = routes.iter().any(|node| node.name() != self.node.name());
                        if moved {
                            let distinct = distinct_nodes(&routes);
                            if distinct > 1 && self.allow_split {
                                return self.split_and_run(routes).await;
                            }
                            self.node = routes[0].clone();
                        }
                    }
                    Err(err) => {
                        last_err = err;
                        continue;
                    }
                }
            }
            last_was_timeout = false;

            match self.request(deadline, socket_timeout).await {
                Ok(()) => return Ok(()),
                Err(err) if err.should_retry() => {
                    last_was_timeout = matches!(
                        &err,
                        Error::Timeout(_) | Error::ServerError(ResultCode::Timeout)
                    );
                    warn!("Batch node {}: {}", self.node, err);
                    last_err = err;
                }
                Err(err) => {
                    let in_doubt = self.sent > 0 && !err.confirms_outcome();
                    self.mark_unresolved(&err, in_doubt);
                    let in_doubt = self.has_write() && in_doubt;
                    return Err(err.annotate(Some(&self.node), iterations, in_doubt));
                }
            }
        }

        let in_doubt = self.sent > 0;
        self.mark_unresolved(&last_err, in_doubt);
        let in_doubt = self.has_write() && in_doubt;
        Err(last_err.annotate(Some(&self.node), iterations, in_doubt))
    }

    fn prepare_retry(&mut self, is_timeout: bool) {
        self.sequence_ap += 1;
        if !(is_timeout && self.policy.base().read_mode_sc == ReadModeSC::Linearize) {
            self.sequence_sc += 1;
        }
    }

    // Route every row against the current map snapshot.
    async fn route_rows(&self) -> Result<Vec<Arc<Node>>> {
        let mut routes = Vec::with_capacity(self.batch_ops.len());
        for (op, _) in &self.batch_ops {
            let partition = Partition::new_by_key(op.key());
            let node = self
                .cluster
                .get_node(
                    &partition,
                    self.policy.base().replica,
                    op.has_write(),
                    self.sequence_ap,
                    self.sequence_sc,
                )
                .await?;
            routes.push(node);
        }
        Ok(routes)
    }

    // Fan the rows out to child commands, one per destination node, and run
    // them sequentially with the inherited deadline and counters.
    async fn split_and_run(&mut self, routes: Vec<Arc<Node>>) -> Result<()> {
        let rows = std::mem::take(&mut self.batch_ops);
        let mut children: Vec<BatchCommand<'a>> = Vec::new();

        for (pair, node) in rows.into_iter().zip(routes) {
            let group = children
                .iter()
                .position(|child| child.node.name() == node.name());
            match group {
                Some(i) => children[i].batch_ops.push(pair),
                None => {
                    let mut child = self.child(node);
                    child.batch_ops.push(pair);
                    children.push(child);
                }
            }
        }

        let mut first_err = None;
        for mut child in children {
            let result = Box::pin(child.execute()).await;
            self.sent = self.sent.max(child.sent);
            self.batch_ops.append(&mut child.batch_ops);

            if let Err(err) = result {
                if !self.policy.respond_all_keys {
                    return Err(err);
                }
                // Row-level verdicts were already recorded by the child;
                // remember the first failure for the aggregate result.
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    // One network attempt against the current node.
    async fn request(
        &mut self,
        deadline: Option<Instant>,
        socket_timeout: Option<Duration>,
    ) -> Result<()> {
        let node = self.node.clone();
        let mut conn = match try_with_timeout(deadline, socket_timeout, node.get_connection()).await
        {
            Ok(conn) => conn,
            Err(err) => {
                node.add_error();
                return Err(err);
            }
        };

        conn.buffer.set_batch_operate(self.policy, &self.batch_ops)?;
        conn.buffer.write_timeout(self.policy.timeout());
        if self.policy.use_compression() {
            conn.buffer.compress()?;
        }

        if let Err(err) = try_with_timeout(deadline, socket_timeout, conn.flush()).await {
            conn.invalidate();
            node.add_error();
            return Err(err);
        }
        self.sent += 1;

        loop {
            match try_with_timeout(deadline, socket_timeout, conn.read_proto_block()).await {
                Ok(()) => (),
                Err(err @ Error::Timeout(_)) => {
                    match self.policy.timeout_delay() {
                        Some(delay) => self.cluster.recover_connection(conn, delay),
                        None => conn.invalidate(),
                    }
                    node.add_error();
                    return Err(err);
                }
                Err(err) => {
                    conn.invalidate();
                    node.add_error();
                    return Err(err);
                }
            }

            if conn.buffer.remaining() == 0 {
                return Ok(());
            }

            while conn.buffer.remaining() > 0 {
                match self.parse_row(&mut conn) {
                    Ok(true) => (),
                    Ok(false) => return Ok(()),
                    Err(err) => {
                        if err.should_retry() {
                            // Node-level retriable verdict (server timeout or
                            // overload); connection content is spent.
                            node.add_error();
                        }
                        conn.invalidate();
                        return Err(err);
                    }
                }
            }
        }
    }

    // Parse one response row and place it at its original position.
    // Returns false when the end-of-batch marker was consumed.
    fn parse_row(&mut self, conn: &mut crate::net::Connection) -> Result<bool> {
        let buf = &mut conn.buffer;
        let base = buf.data_offset();
        buf.check_remaining(buffer::MSG_REMAINING_HEADER_SIZE as usize)?;

        let info3 = buf.read_u8(Some(base + 3));
        let result_code = ResultCode::from(buf.read_u8(Some(base + 5)));

        if info3 & buffer::INFO3_LAST == buffer::INFO3_LAST {
            // The trailer carries the node-level verdict.
            return match result_code {
                ResultCode::Ok => Ok(false),
                rc => Err(Error::ServerError(rc)),
            };
        }

        let generation = buf.read_u32(Some(base + 6));
        let expiration = buf.read_u32(Some(base + 10));
        let batch_index = buf.read_u32(Some(base + 14)) as usize;
        let field_count = buf.read_u16(Some(base + 18)) as usize;
        let op_count = buf.read_u16(Some(base + 20)) as usize;
        buf.skip(buffer::MSG_REMAINING_HEADER_SIZE as usize);

        let key = commands::parse_key(buf, field_count)?;
        let bins = commands::parse_bins(buf, op_count)?;

        let row = match self.batch_ops.get_mut(batch_index) {
            Some((op, _)) => op,
            None => {
                return Err(Error::BadResponse(format!(
                    "Invalid batch index: {}",
                    batch_index
                )))
            }
        };

        match result_code {
            ResultCode::Ok => {
                let record = Record::new(Some(key), bins, generation, expiration);
                row.set_record(Some(record));
            }
            ResultCode::KeyNotFoundError | ResultCode::FilteredOut => {
                row.set_result_code(result_code, false);
            }
            ResultCode::UdfBadResponse => {
                // Attach the FAILURE bin as the error payload.
                let record = Record::new(Some(key), bins, generation, expiration);
                row.set_record(Some(record));
                row.set_result_code(result_code, false);
            }
            rc => {
                row.set_result_code(rc, self.sent > 1);
            }
        }

        Ok(true)
    }

    // Give every row that never received a response the command-level
    // verdict.
    fn mark_unresolved(&mut self, err: &Error, in_doubt: bool) {
        let rc = match err {
            Error::ServerError(rc) => *rc,
            Error::Timeout(_) => ResultCode::Timeout,
            _ => ResultCode::ServerError,
        };
        for (op, _) in &mut self.batch_ops {
            if !op.is_resolved() {
                op.set_result_code(rc, in_doubt);
            }
        }
    }
}

fn distinct_nodes(routes: &[Arc<Node>]) -> usize {
    let mut names: Vec<&str> = routes.iter().map(|node| node.name()).collect();
    names.sort_unstable();
    names.dedup();
    names.len()
}
