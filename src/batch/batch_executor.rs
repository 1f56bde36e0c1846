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

use crate::batch::{BatchOperation, BatchRecord};
use crate::cluster::partition::Partition;
use crate::cluster::{Cluster, Node};
use crate::commands::BatchCommand;
use crate::errors::{Error, Result};
use crate::policy::{BatchPolicy, Concurrency, PolicyLike};

// Groups a batch by destination node and runs one sub-command per group.
// Results are merged back into the caller's order via the original indexes
// carried alongside every operation.
pub(crate) struct BatchExecutor {
    cluster: Arc<Cluster>,
}

impl BatchExecutor {
    pub fn new(cluster: Arc<Cluster>) -> Self {
        BatchExecutor { cluster }
    }

    pub async fn execute_batch<'a>(
        &self,
        policy: &'a BatchPolicy,
        batch_ops: Vec<BatchOperation<'a>>,
    ) -> Result<Vec<BatchRecord>> {
        // An empty batch never touches the network.
        if batch_ops.is_empty() {
            return Ok(vec![]);
        }

        let total = batch_ops.len();
        let commands = self.generate_batch_commands(policy, batch_ops).await?;

        let commands = match policy.concurrency {
            Concurrency::Sequential => {
                let mut done = Vec::with_capacity(commands.len());
                let mut first_err: Option<Error> = None;
                for mut command in commands {
                    match command.execute().await {
                        Ok(()) => {}
                        Err(err) if policy.respond_all_keys => {
                            if first_err.is_none() {
                                first_err = Some(err);
                            }
                        }
                        Err(err) => return Err(err),
                    }
                    done.push(command);
                }
                if let Some(err) = first_err {
                    log::warn!("Batch completed with node-level error: {}", err);
                }
                done
            }
            Concurrency::Parallel => {
                let handles = commands.into_iter().map(|mut command| async move {
                    let result = command.execute().await;
                    (command, result)
                });
                let finished = futures::future::join_all(handles).await;

                let mut done = Vec::with_capacity(finished.len());
                let mut first_err: Option<Error> = None;
                for (command, result) in finished {
                    match result {
                        Ok(()) => {}
                        Err(err) => {
                            if first_err.is_none() {
                                first_err = Some(err);
                            }
                        }
                    }
                    done.push(command);
                }
                match first_err {
                    Some(err) if !policy.respond_all_keys => return Err(err),
                    Some(err) => log::warn!("Batch completed with node-level error: {}", err),
                    None => {}
                }
                done
            }
        };

        // Scatter the per-row results back into the caller's order.
        let mut results: Vec<Option<BatchRecord>> = (0..total).map(|_| None).collect();
        for command in commands {
            for (op, index) in command.batch_ops {
                results[index] = Some(op.into_record());
            }
        }

        Ok(results.into_iter().map(Option::unwrap).collect())
    }

    // The grouping pass: route every key against one map snapshot and
    // append its position to the destination node's group.
    async fn generate_batch_commands<'a>(
        &self,
        policy: &'a BatchPolicy,
        batch_ops: Vec<BatchOperation<'a>>,
    ) -> Result<Vec<BatchCommand<'a>>> {
        let mut groups: Vec<(Arc<Node>, Vec<(BatchOperation<'a>, usize)>)> = Vec::new();

        for (index, op) in batch_ops.into_iter().enumerate() {
            let partition = Partition::new_by_key(op.key());
            let node = self
                .cluster
                .get_node(&partition, policy.base().replica, op.has_write(), 0, 0)
                .await?;

            let group = groups.iter().position(|(n, _)| n.name() == node.name());
            match group {
                Some(i) => groups[i].1.push((op, index)),
                None => groups.push((node, vec![(op, index)])),
            }
        }

        Ok(groups
            .into_iter()
            .map(|(node, rows)| BatchCommand::new(self.cluster.clone(), policy, node, rows))
            .collect())
    }
}
