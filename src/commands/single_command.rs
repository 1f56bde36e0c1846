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

use crate::cluster::partition::Partition;
use crate::cluster::{Cluster, Node};
use crate::commands::{self, Command};
use crate::errors::{Error, Result};
use crate::policy::{Policy, ReadModeSC, Replica};
use crate::Key;

// Per-command routing state shared by all single-record commands: the key's
// partition plus the replica sequences advanced across retries.
pub(crate) struct SingleCommand<'a> {
    pub cluster: Arc<Cluster>,
    pub key: &'a Key,
    partition_id: usize,
    replica: Replica,
    linearize: bool,
    sequence_ap: usize,
    sequence_sc: usize,
}

impl<'a> SingleCommand<'a> {
    pub fn new(
        cluster: Arc<Cluster>,
        key: &'a Key,
        replica: Replica,
        read_mode_sc: ReadModeSC,
    ) -> Self {
        let partition = Partition::new_by_key(key);
        SingleCommand {
            cluster,
            key,
            partition_id: partition.partition_id,
            replica,
            linearize: read_mode_sc == ReadModeSC::Linearize,
            sequence_ap: 0,
            sequence_sc: 0,
        }
    }

    pub async fn get_node(&mut self, is_write: bool) -> Result<Arc<Node>> {
        let partition = Partition::new(&self.key.namespace, self.partition_id);
        self.cluster
            .get_node(
                &partition,
                self.replica,
                is_write,
                self.sequence_ap,
                self.sequence_sc,
            )
            .await
    }

    // Advance the replica sequences for the next attempt. Under linearized
    // SC reads a timeout must not move to another replica, or the session
    // guarantee would be lost.
    pub fn prepare_retry(&mut self, is_timeout: bool) {
        self.sequence_ap += 1;
        if !(is_timeout && self.linearize) {
            self.sequence_sc += 1;
        }
    }

    // EXECUTE
    //

    pub async fn execute(
        policy: &(dyn Policy + Send + Sync),
        cmd: &mut (dyn Command + Send),
    ) -> Result<()> {
        let cluster = cmd.cluster();
        cluster.add_command();

        // set deadline outside the loop
        let deadline = policy.deadline();
        let socket_timeout = policy.socket_timeout();
        let is_write = cmd.is_write();

        let mut iterations: usize = 0;
        let mut sent: usize = 0;
        let mut last_node: Option<Arc<Node>> = None;
        let mut last_err = Error::Connection("No command attempt was made".to_string());
        let mut last_was_timeout = false;

        // Execute command until successful, timed out or maximum iterations
        // have been reached.
        loop {
            iterations += 1;

            if iterations > 1 {
                if let Some(max_retries) = policy.max_retries() {
                    if iterations > max_retries + 1 {
                        break;
                    }
                }

                // Sleep before trying again, but only while the deadline
                // leaves room for it.
                if let Some(sleep_between_retries) = policy.sleep_between_retries() {
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

                cmd.prepare_retry(last_was_timeout);
                cluster.add_retry();
            }
            last_was_timeout = false;

            // set command node, so when you return a record it has the node
            let node = match cmd.get_node().await {
                Ok(node) => node,
                Err(err) => {
                    // Routing failed; the next attempt re-selects.
                    last_err = err;
                    continue;
                }
            };
            last_node = Some(node.clone());

            let mut conn =
                match try_with_timeout(deadline, socket_timeout, node.get_connection()).await {
                    Ok(conn) => conn,
                    Err(err) => {
                        node.add_error();
                        warn!("Node {}: {}", node, err);
                        last_err = err;
                        continue;
                    }
                };

            if let Err(err) = cmd.prepare_buffer(&mut conn) {
                // Encoding failures are caller errors; no retry.
                return Err(err.annotate(Some(&node), iterations, false));
            }

            cmd.write_timeout(&mut conn, policy.timeout()).await?;

            if policy.use_compression() {
                conn.buffer.compress()?;
            }

            // Send command.
            match try_with_timeout(deadline, socket_timeout, cmd.write_buffer(&mut conn)).await {
                Ok(()) => sent += 1,
                Err(err) => {
                    // IO errors are considered temporary anomalies. Retry.
                    // Close socket to flush out possible garbage.
                    conn.invalidate();
                    node.add_error();
                    warn!("Node {}: {}", node, err);
                    last_err = err;
                    continue;
                }
            }

            // Parse results.
            match try_with_timeout(deadline, socket_timeout, cmd.parse_result(&mut conn)).await {
                Ok(()) => return Ok(()),
                Err(err @ Error::Timeout(_)) => {
                    // The response did not arrive in time. With a timeout
                    // delay configured the socket is drained in the
                    // background and pooled again; otherwise it is closed.
                    match policy.timeout_delay() {
                        Some(delay) => cluster.recover_connection(conn, delay),
                        None => conn.invalidate(),
                    }
                    node.add_error();
                    last_was_timeout = true;
                    last_err = err;
                    continue;
                }
                Err(err) if err.should_retry() => {
                    if !commands::keep_connection(&err) {
                        conn.invalidate();
                    }
                    node.add_error();
                    warn!("Node {}: {}", node, err);
                    last_err = err;
                    continue;
                }
                Err(err) => {
                    // Parse errors and terminal server results; closing the
                    // connection discards any unconsumed response bytes.
                    if !commands::keep_connection(&err) {
                        conn.invalidate();
                    }
                    let in_doubt = is_write && sent > 0 && !err.confirms_outcome();
                    return Err(err.annotate(Some(&node), iterations, in_doubt));
                }
            }
        }

        let in_doubt = is_write && sent > 0;
        Err(last_err.annotate(last_node.as_ref(), iterations, in_doubt))
    }
}

/// Await a future within the smaller of the socket timeout and the time
/// remaining until the command deadline.
pub(crate) async fn try_with_timeout<O, F>(
    deadline: Option<Instant>,
    socket_timeout: Option<Duration>,
    future: F,
) -> Result<O>
where
    F: std::future::Future<Output = Result<O>>,
{
    let step_deadline = match (deadline, socket_timeout) {
        (None, None) => return future.await,
        (Some(deadline), None) => deadline,
        (None, Some(timeout)) => Instant::now() + timeout,
        (Some(deadline), Some(timeout)) => deadline.min(Instant::now() + timeout),
    };

    match tokio::time::timeout_at(step_deadline, future).await {
        Ok(res) => res,
        Err(_) => Err(Error::Timeout("Network operation timed out".to_string())),
    }
}
