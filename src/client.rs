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

use rand::Rng;

use crate::batch::{BatchExecutor, BatchOperation, BatchRecord};
use crate::cluster::{Cluster, Node};
use crate::commands::buffer::{INFO4_TXN_ROLL_BACK, INFO4_TXN_ROLL_FORWARD};
use crate::commands::{
    DeleteCommand, ExecuteUdfCommand, ExistsCommand, OperateCommand, QueryCommand, ReadCommand,
    ScanCommand, TouchCommand, WriteCommand,
};
use crate::errors::{Error, Result};
use crate::operations::{Operation, OperationType};
use crate::policy::{BatchPolicy, ClientPolicy, QueryPolicy, ReadPolicy, ScanPolicy, WritePolicy};
use crate::query::Recordset;
use crate::txn::roll::TxnRoll;
use crate::txn::{AbortStatus, CommitError, CommitStatus, Txn, TxnState};
use crate::{Bin, Bins, Key, Record, Statement, ToHosts, Value};

/// Instantiate a Client instance to access a Firefly database cluster and perform database
/// operations.
///
/// The client is thread-safe. Only one client instance should be used per cluster. Multiple
/// threads should share this cluster instance.
///
/// Your application uses this class' API to perform database operations such as writing and
/// reading records, and scanning sets of records. Write operations include specialized
/// functionality such as append/prepend and arithmetic addition.
///
/// Each record may have multiple bins, unless the Firefly server nodes are configured as
/// "single-bin". In "multi-bin" mode, partial records may be written or read by specifying the
/// relevant subset of bins.
pub struct Client {
    cluster: Arc<Cluster>,
}

impl Client {
    /// Initializes a Firefly client with suitable hosts to seed the cluster map. The client policy
    /// is used to set defaults and size internal data structures. For each host connection that
    /// succeeds, the client will:
    ///
    /// - Add host to the cluster map
    /// - Request host's list of other nodes in cluster
    /// - Add these nodes to the cluster map
    ///
    /// In most cases, only one host is necessary to seed the cluster. The remaining hosts are
    /// added as future seeds in case of a complete network failure.
    pub async fn new(policy: &ClientPolicy, hosts: &(dyn ToHosts + Send + Sync)) -> Result<Self> {
        let hosts = hosts.to_hosts()?;
        let cluster = Cluster::new(policy.clone(), &hosts).await?;

        Ok(Client { cluster })
    }

    /// Closes the connections to the Firefly cluster.
    pub async fn close(&self) -> Result<()> {
        self.cluster.close().await?;
        Ok(())
    }

    /// Returns `true` if the client is connected to any cluster nodes.
    pub async fn is_connected(&self) -> bool {
        self.cluster.is_connected().await
    }

    /// Returns a list of the names of the active server nodes in the cluster.
    pub async fn node_names(&self) -> Vec<String> {
        self.cluster
            .nodes()
            .await
            .iter()
            .map(|node| node.name().to_owned())
            .collect()
    }

    /// Return node given its name.
    pub async fn get_node(&self, name: &str) -> Result<Arc<Node>> {
        self.cluster.get_node_by_name(name).await
    }

    /// Returns a list of active server nodes in the cluster.
    pub async fn nodes(&self) -> Vec<Arc<Node>> {
        self.cluster.nodes().await
    }

    /// Number of commands started since the client was created.
    pub fn command_count(&self) -> usize {
        self.cluster.command_count()
    }

    /// Number of command retries since the client was created.
    pub fn retry_count(&self) -> usize {
        self.cluster.retry_count()
    }

    /// Read record for the specified key. Depending on the bins value provided, all record bins,
    /// only selected record bins or only the record headers will be returned. Returns `None` when
    /// the record does not exist.
    ///
    /// # Examples
    ///
    /// Fetch specified bins for a record with the given key.
    ///
    /// ```rust,no_run
    /// # use firefly::*;
    /// # #[tokio::main] async fn main() {
    /// # let hosts = std::env::var("FIREFLY_HOSTS").unwrap();
    /// # let client = Client::new(&ClientPolicy::default(), &hosts).await.unwrap();
    /// let key = as_key!("test", "test", "mykey");
    /// match client.get(&ReadPolicy::default(), &key, ["a", "b"]).await {
    ///     Ok(Some(record)) => println!("a: {:?}", record.bins.get("a")),
    ///     Ok(None) => println!("no such record: {}", key),
    ///     Err(err) => println!("error fetching record: {}", err),
    /// }
    /// # }
    /// ```
    pub async fn get<T>(&self, policy: &ReadPolicy, key: &Key, bins: T) -> Result<Option<Record>>
    where
        T: Into<Bins> + Send,
    {
        let bins = bins.into();

        let mut command = ReadCommand::new(policy, self.cluster.clone(), key, bins);
        command.execute().await?;
        Ok(command.record.take())
    }

    /// Determine if a record key exists. The policy can be used to specify timeouts.
    pub async fn exists(&self, policy: &ReadPolicy, key: &Key) -> Result<bool> {
        let mut command = ExistsCommand::new(policy, self.cluster.clone(), key);
        command.execute().await?;
        Ok(command.exists)
    }

    /// Write record bin(s). The policy specifies the command timeout, record expiration and how
    /// the command is handled when the record already exists.
    pub async fn put<'a, 'b>(
        &self,
        policy: &'a WritePolicy,
        key: &'a Key,
        bins: &'a [Bin<'b>],
    ) -> Result<()> {
        let mut command = WriteCommand::new(
            policy,
            self.cluster.clone(),
            key,
            bins,
            OperationType::Write,
        );
        command.execute().await
    }

    /// Add integer bin values to existing record bin values. The policy specifies the command
    /// timeout, record expiration and how the command is handled when the record already exists.
    /// This call only works for integer values.
    pub async fn add<'a, 'b>(
        &self,
        policy: &'a WritePolicy,
        key: &'a Key,
        bins: &'a [Bin<'b>],
    ) -> Result<()> {
        let mut command =
            WriteCommand::new(policy, self.cluster.clone(), key, bins, OperationType::Incr);
        command.execute().await
    }

    /// Append bin string values to existing record bin values. The policy specifies the command
    /// timeout, record expiration and how the command is handled when the record already exists.
    /// This call only works for string values.
    pub async fn append<'a, 'b>(
        &self,
        policy: &'a WritePolicy,
        key: &'a Key,
        bins: &'a [Bin<'b>],
    ) -> Result<()> {
        let mut command = WriteCommand::new(
            policy,
            self.cluster.clone(),
            key,
            bins,
            OperationType::Append,
        );
        command.execute().await
    }

    /// Prepend bin string values to existing record bin values. The policy specifies the command
    /// timeout, record expiration and how the command is handled when the record already exists.
    /// This call only works for string values.
    pub async fn prepend<'a, 'b>(
        &self,
        policy: &'a WritePolicy,
        key: &'a Key,
        bins: &'a [Bin<'b>],
    ) -> Result<()> {
        let mut command = WriteCommand::new(
            policy,
            self.cluster.clone(),
            key,
            bins,
            OperationType::Prepend,
        );
        command.execute().await
    }

    /// Delete record for specified key. The policy specifies the command timeout.
    /// The call returns `true` if the record existed on the server before deletion.
    pub async fn delete(&self, policy: &WritePolicy, key: &Key) -> Result<bool> {
        let mut command = DeleteCommand::new(policy, self.cluster.clone(), key);
        command.execute().await?;
        Ok(command.existed)
    }

    /// Reset record's time to expiration using the policy's expiration. Fail if the record does
    /// not exist.
    pub async fn touch(&self, policy: &WritePolicy, key: &Key) -> Result<()> {
        let mut command = TouchCommand::new(policy, self.cluster.clone(), key);
        command.execute().await
    }

    /// Perform multiple read/write operations on a single key in one batch call.
    ///
    /// Operations on scalar values and complex data types (CDT) can be performed on the same
    /// record at the same time.
    ///
    /// # Examples
    ///
    /// Add an integer value to an existing record and then read the result, all in one database
    /// call.
    ///
    /// ```rust,no_run
    /// # use firefly::*;
    /// # use firefly::operations;
    /// # #[tokio::main] async fn main() {
    /// # let hosts = std::env::var("FIREFLY_HOSTS").unwrap();
    /// # let client = Client::new(&ClientPolicy::default(), &hosts).await.unwrap();
    /// let key = as_key!("test", "test", "mykey");
    /// let bin = as_bin!("a", 42);
    /// let ops = vec![
    ///     operations::add(&bin),
    ///     operations::get_bin("a"),
    /// ];
    /// match client.operate(&WritePolicy::default(), &key, &ops).await {
    ///     Ok(record) => println!("a: {}", record.bins.get("a").unwrap()),
    ///     Err(err) => println!("error: {}", err),
    /// }
    /// # }
    /// ```
    pub async fn operate(
        &self,
        policy: &WritePolicy,
        key: &Key,
        ops: &[Operation<'_>],
    ) -> Result<Record> {
        let mut command = OperateCommand::new(policy, self.cluster.clone(), key, ops);
        command.execute().await?;
        command.record.take().ok_or_else(|| {
            Error::ServerError(crate::ResultCode::KeyNotFoundError)
        })
    }

    /// Execute a user-defined function on the server for a single record and return the result.
    /// The function must have been previously registered on the server.
    pub async fn execute_udf(
        &self,
        policy: &WritePolicy,
        key: &Key,
        udf_name: &str,
        function_name: &str,
        args: Option<&[Value]>,
    ) -> Result<Option<Value>> {
        let mut command = ExecuteUdfCommand::new(
            policy,
            self.cluster.clone(),
            key,
            udf_name,
            function_name,
            args,
        );
        command.execute().await?;

        if let Some(record) = command.record.take() {
            for (key, value) in record.bins {
                if key.contains("SUCCESS") {
                    return Ok(Some(value));
                }
            }
        }
        Ok(None)
    }

    /// Execute a batch of heterogeneous per-key operations in as few network requests as
    /// possible: one request per involved node. Per-record results (and errors) are returned in
    /// the order of the supplied operations.
    ///
    /// # Examples
    ///
    /// Read two records and delete a third in one call.
    ///
    /// ```rust,no_run
    /// # use firefly::*;
    /// # #[tokio::main] async fn main() {
    /// # let hosts = std::env::var("FIREFLY_HOSTS").unwrap();
    /// # let client = Client::new(&ClientPolicy::default(), &hosts).await.unwrap();
    /// let read_policy = BatchReadPolicy::default();
    /// let delete_policy = BatchDeletePolicy::default();
    /// let ops = vec![
    ///     BatchOperation::read(&read_policy, as_key!("test", "test", "a"), Bins::All),
    ///     BatchOperation::read(&read_policy, as_key!("test", "test", "b"), Bins::All),
    ///     BatchOperation::delete(&delete_policy, as_key!("test", "test", "c")),
    /// ];
    /// for result in client.batch(&BatchPolicy::default(), ops).await.unwrap() {
    ///     println!("{:?}: {:?}", result.key, result.result_code);
    /// }
    /// # }
    /// ```
    pub async fn batch<'a>(
        &self,
        policy: &'a BatchPolicy,
        batch_ops: Vec<BatchOperation<'a>>,
    ) -> Result<Vec<BatchRecord>> {
        BatchExecutor::new(self.cluster.clone())
            .execute_batch(policy, batch_ops)
            .await
    }

    /// Read all records in the specified namespace and set and return a record iterator. The scan
    /// executor puts records on a queue in separate tasks. The calling task concurrently pops
    /// records off the queue through the record iterator.
    pub async fn scan<T>(
        &self,
        policy: &ScanPolicy,
        namespace: &str,
        set_name: &str,
        bins: T,
    ) -> Result<Arc<Recordset>>
    where
        T: Into<Bins> + Send,
    {
        let bins = bins.into();
        let nodes = self.cluster.nodes().await;
        if nodes.is_empty() {
            return Err(Error::InvalidNode("No active node".to_string()));
        }

        let task_id = rand::thread_rng().gen();
        let (recordset, records) = Recordset::new(policy.record_queue_size, task_id);
        for node in nodes {
            let partitions = self.cluster.node_partitions(&node, namespace).await;
            let policy = policy.clone();
            let namespace = namespace.to_owned();
            let set_name = set_name.to_owned();
            let bins = bins.clone();
            let cluster = self.cluster.clone();
            let recordset = recordset.clone();
            let records = records.clone();

            let _ = tokio::spawn(async move {
                let errors = records.clone();
                let mut command = ScanCommand::new(
                    &policy,
                    node,
                    cluster,
                    &namespace,
                    &set_name,
                    bins,
                    recordset,
                    records,
                    partitions,
                );
                if let Err(err) = command.execute().await {
                    if !matches!(err, Error::Canceled) {
                        let _ = errors.send(Err(err)).await;
                    }
                }
            });
        }
        Ok(recordset)
    }

    /// Read all records in the specified namespace and set for one node only and return a record
    /// iterator.
    pub async fn scan_node<T>(
        &self,
        policy: &ScanPolicy,
        node: Arc<Node>,
        namespace: &str,
        set_name: &str,
        bins: T,
    ) -> Result<Arc<Recordset>>
    where
        T: Into<Bins> + Send,
    {
        let bins = bins.into();
        let task_id = rand::thread_rng().gen();
        let (recordset, records) = Recordset::new(policy.record_queue_size, task_id);
        let partitions = self.cluster.node_partitions(&node, namespace).await;
        let policy = policy.clone();
        let namespace = namespace.to_owned();
        let set_name = set_name.to_owned();
        let cluster = self.cluster.clone();
        let scan_recordset = recordset.clone();

        let _ = tokio::spawn(async move {
            let errors = records.clone();
            let mut command = ScanCommand::new(
                &policy,
                node,
                cluster,
                &namespace,
                &set_name,
                bins,
                scan_recordset,
                records,
                partitions,
            );
            if let Err(err) = command.execute().await {
                if !matches!(err, Error::Canceled) {
                    let _ = errors.send(Err(err)).await;
                }
            }
        });
        Ok(recordset)
    }

    /// Execute a query on all server nodes and return a record iterator. The query executor puts
    /// records on a queue in separate tasks. The calling task concurrently pops records off the
    /// queue through the record iterator.
    ///
    /// # Examples
    ///
    /// Run a query on the `test` namespace for all records in the `users` set with a `score`
    /// between 80 and 100:
    ///
    /// ```rust,no_run
    /// # use firefly::*;
    /// # use firefly::query::Filter;
    /// # #[tokio::main] async fn main() {
    /// # let hosts = std::env::var("FIREFLY_HOSTS").unwrap();
    /// # let client = Client::new(&ClientPolicy::default(), &hosts).await.unwrap();
    /// let mut stmt = Statement::new("test", "users", Bins::All);
    /// stmt.add_filter(Filter::range("score", as_val!(80), as_val!(100)));
    /// match client.query(&QueryPolicy::default(), stmt).await {
    ///     Ok(records) => {
    ///         while let Some(record) = records.next_record().await {
    ///             // .. process record
    ///         }
    ///     },
    ///     Err(err) => println!("error: {}", err),
    /// }
    /// # }
    /// ```
    pub async fn query(&self, policy: &QueryPolicy, statement: Statement) -> Result<Arc<Recordset>> {
        statement.validate()?;
        let statement = Arc::new(statement);

        let nodes = self.cluster.nodes().await;
        if nodes.is_empty() {
            return Err(Error::InvalidNode("No active node".to_string()));
        }

        let task_id = rand::thread_rng().gen();
        let (recordset, records) = Recordset::new(policy.record_queue_size, task_id);
        for node in nodes {
            let partitions = self
                .cluster
                .node_partitions(&node, &statement.namespace)
                .await;
            let policy = policy.clone();
            let statement = statement.clone();
            let cluster = self.cluster.clone();
            let recordset = recordset.clone();
            let records = records.clone();

            let _ = tokio::spawn(async move {
                let errors = records.clone();
                let mut command = QueryCommand::new(
                    &policy, node, cluster, statement, recordset, records, partitions,
                );
                if let Err(err) = command.execute().await {
                    if !matches!(err, Error::Canceled) {
                        let _ = errors.send(Err(err)).await;
                    }
                }
            });
        }
        Ok(recordset)
    }

    /// Execute a query on a single server node and return a record iterator.
    pub async fn query_node(
        &self,
        policy: &QueryPolicy,
        node: Arc<Node>,
        statement: Statement,
    ) -> Result<Arc<Recordset>> {
        statement.validate()?;
        let statement = Arc::new(statement);

        let task_id = rand::thread_rng().gen();
        let (recordset, records) = Recordset::new(policy.record_queue_size, task_id);
        let partitions = self
            .cluster
            .node_partitions(&node, &statement.namespace)
            .await;
        let policy = policy.clone();
        let cluster = self.cluster.clone();
        let query_recordset = recordset.clone();

        let _ = tokio::spawn(async move {
            let errors = records.clone();
            let mut command = QueryCommand::new(
                &policy,
                node,
                cluster,
                statement,
                query_recordset,
                records,
                partitions,
            );
            if let Err(err) = command.execute().await {
                if !matches!(err, Error::Canceled) {
                    let _ = errors.send(Err(err)).await;
                }
            }
        });
        Ok(recordset)
    }

    /// Commit a multi-record transaction: verify all read versions, write
    /// the monitor record, roll the provisional writes forward and delete
    /// the monitor. A failed verify aborts the transaction.
    pub async fn commit(&self, txn: &Txn) -> Result<CommitStatus> {
        match txn.state() {
            TxnState::Committed => return Ok(CommitStatus::AlreadyCommitted),
            TxnState::Open => (),
            state => {
                return Err(Error::InvalidArgument(format!(
                    "Cannot commit transaction in state {:?}",
                    state
                )))
            }
        }

        let roll = TxnRoll::new(self.cluster.clone());
        let batch_policy = BatchPolicy::default();
        let write_policy = WritePolicy::default();

        if let Err(verify_err) = roll.verify(&batch_policy, txn).await {
            // A stale read: abort the transaction and surface how far the
            // cleanup got.
            let source = Box::new(verify_err);
            match roll.roll(&batch_policy, txn, INFO4_TXN_ROLL_BACK).await {
                Err(_) => {
                    return Err(CommitError::VerifyFailAbortAbandoned { source }.into());
                }
                Ok(()) => {
                    txn.set_state(TxnState::Aborted);
                    if roll.close(&write_policy, txn).await.is_err() {
                        return Err(CommitError::VerifyFailCloseAbandoned { source }.into());
                    }
                }
            }
            return Err(CommitError::VerifyFail { source }.into());
        }
        txn.set_state(TxnState::Verified);

        if txn.writes_snapshot().is_empty() {
            // Read-only transaction; nothing to roll and no monitor to
            // clean up.
            txn.set_state(TxnState::Committed);
            return Ok(CommitStatus::Ok);
        }

        if let Err(err) = roll.mark_roll_forward(&write_policy, txn).await {
            return Err(CommitError::MarkRollForwardAbandoned {
                source: Box::new(err),
            }
            .into());
        }

        if let Err(err) = roll
            .roll(&batch_policy, txn, INFO4_TXN_ROLL_FORWARD)
            .await
        {
            return Err(CommitError::RollForwardAbandoned {
                source: Box::new(err),
            }
            .into());
        }
        txn.set_state(TxnState::Committed);

        if let Err(err) = roll.close(&write_policy, txn).await {
            return Err(CommitError::CloseAbandoned {
                source: Box::new(err),
            }
            .into());
        }

        Ok(CommitStatus::Ok)
    }

    /// Abort a multi-record transaction: roll all provisional writes back
    /// and delete the monitor record.
    pub async fn abort(&self, txn: &Txn) -> Result<AbortStatus> {
        match txn.state() {
            TxnState::Aborted => return Ok(AbortStatus::AlreadyAborted),
            TxnState::Open | TxnState::Verified => (),
            state => {
                return Err(Error::InvalidArgument(format!(
                    "Cannot abort transaction in state {:?}",
                    state
                )))
            }
        }

        let roll = TxnRoll::new(self.cluster.clone());
        let batch_policy = BatchPolicy::default();
        let write_policy = WritePolicy::default();

        if let Err(err) = roll.roll(&batch_policy, txn, INFO4_TXN_ROLL_BACK).await {
            return Err(CommitError::RollBackAbandoned {
                source: Box::new(err),
            }
            .into());
        }
        txn.set_state(TxnState::Aborted);

        if let Err(err) = roll.close(&write_policy, txn).await {
            return Err(CommitError::CloseAbandoned {
                source: Box::new(err),
            }
            .into());
        }

        Ok(AbortStatus::Ok)
    }
}
