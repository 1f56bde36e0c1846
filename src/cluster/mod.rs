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

pub mod node;
pub mod node_validator;
pub mod partition;
pub mod partition_parser;
pub mod partitions;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicIsize, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use rand::Rng;
use tokio::sync::RwLock;
use tokio::time::Instant;

pub use self::node::Node;

use self::node_validator::NodeValidator;
use self::partition::Partition;
use self::partition_parser::PartitionParser;
use self::partitions::Partitions;

use crate::errors::{Error, Result};
use crate::net::{Host, PooledConnection};
use crate::policy::{ClientPolicy, Replica};

// Cluster encapsulates the Firefly cluster nodes and manages them.
#[derive(Debug)]
pub struct Cluster {
    // Initial host nodes specified by user.
    seeds: Arc<RwLock<Vec<Host>>>,

    // All aliases for all nodes in cluster.
    aliases: Arc<RwLock<HashMap<Host, Arc<Node>>>>,

    // Active nodes in cluster.
    nodes: Arc<RwLock<Vec<Arc<Node>>>>,

    // Per-namespace replica tables, published as immutable snapshots.
    partition_map: Arc<RwLock<HashMap<String, Arc<Partitions>>>>,

    // Random node index.
    node_index: AtomicIsize,

    // Round-robin cursor for the MasterProles replica policy.
    replica_index: AtomicUsize,

    // Completed tend rounds; drives the error-rate window.
    tend_count: AtomicUsize,

    // Command / retry counters exposed for monitoring.
    command_count: AtomicUsize,
    retry_count: AtomicUsize,

    client_policy: ClientPolicy,

    closed: AtomicBool,
}

impl Cluster {
    pub async fn new(policy: ClientPolicy, hosts: &[Host]) -> Result<Arc<Self>> {
        let cluster = Arc::new(Cluster {
            client_policy: policy,

            seeds: Arc::new(RwLock::new(hosts.to_vec())),
            aliases: Arc::new(RwLock::new(HashMap::new())),
            nodes: Arc::new(RwLock::new(vec![])),

            partition_map: Arc::new(RwLock::new(HashMap::new())),
            node_index: AtomicIsize::new(0),
            replica_index: AtomicUsize::new(0),
            tend_count: AtomicUsize::new(0),
            command_count: AtomicUsize::new(0),
            retry_count: AtomicUsize::new(0),

            closed: AtomicBool::new(false),
        });
        // try to seed connections for first use
        Cluster::wait_till_stabilized(cluster.clone()).await?;

        // apply policy rules
        if cluster.client_policy.fail_if_not_connected && !cluster.is_connected().await {
            return Err(Error::Connection(
                "Failed to connect to host(s). The network connection(s) to cluster nodes may \
                 have timed out, or the cluster may be in a state of flux."
                    .to_string(),
            ));
        }

        let cluster_for_tend = cluster.clone();
        let _ = tokio::spawn(Cluster::tend_task(cluster_for_tend));
        debug!("New cluster initialized and ready to be used...");
        Ok(cluster)
    }

    async fn tend_task(cluster: Arc<Cluster>) {
        let tend_interval = cluster.client_policy.tend_interval;

        while !cluster.closed.load(Ordering::Relaxed) {
            if let Err(err) = cluster.tend().await {
                error!("Error tending cluster: {}", err);
            }
            tokio::time::sleep(tend_interval).await;
        }
    }

    async fn tend(&self) -> Result<()> {
        let mut nodes = self.nodes().await;

        // All node additions/deletions are performed in the tend task.
        // If active nodes don't exist, seed the cluster.
        if nodes.is_empty() {
            debug!("No connections available; seeding...");
            self.seed_nodes().await;
            nodes = self.nodes().await;
        }

        let mut friend_list: Vec<Host> = vec![];
        let mut refresh_count = 0;

        // Refresh all known nodes.
        for node in nodes {
            let old_gen = node.partition_generation();
            if node.is_active() {
                match node.refresh(self.aliases().await).await {
                    Ok(friends) => {
                        refresh_count += 1;

                        if !friends.is_empty() {
                            friend_list.extend_from_slice(&friends);
                        }

                        if old_gen != node.partition_generation() {
                            self.update_partitions(node.clone()).await?;
                        }
                    }
                    Err(err) => {
                        node.increase_failures();
                        warn!("Node `{}` refresh failed: {}", node, err);
                    }
                }
            }
        }

        // Add nodes in a batch.
        let add_list = self.find_new_nodes_to_add(friend_list).await;
        self.add_nodes_and_aliases(&add_list).await;

        // IMPORTANT: Remove must come after add to remove aliases.
        // Remove nodes in a batch.
        let remove_list = self.find_nodes_to_remove(refresh_count).await;
        if !remove_list.is_empty() {
            self.remove_nodes_and_aliases(remove_list).await;
            // Stale owners must not receive further commands; routing falls
            // back to random nodes until the next refresh republishes the
            // tables.
            self.invalidate_partition_map().await;
        }

        // Close out the error-rate window.
        let tends = self.tend_count.fetch_add(1, Ordering::Relaxed) + 1;
        let window = self.client_policy.error_rate_window.max(1);
        if tends % window == 0 {
            for node in self.nodes().await {
                node.reset_error_window();
            }
        }

        Ok(())
    }

    async fn wait_till_stabilized(cluster: Arc<Cluster>) -> Result<()> {
        let timeout = cluster
            .client_policy()
            .timeout
            .unwrap_or_else(|| Duration::from_secs(3));
        let deadline = Instant::now() + timeout;
        let sleep_between_tend = Duration::from_millis(1);

        let handle = tokio::spawn(async move {
            let mut count: isize = -1;
            loop {
                if Instant::now() > deadline {
                    break;
                }

                if let Err(err) = cluster.tend().await {
                    error!("Error during initial cluster tend: {}", err);
                }

                let old_count = count;
                count = cluster.nodes().await.len() as isize;
                if count == old_count {
                    break;
                }

                tokio::time::sleep(sleep_between_tend).await;
            }
        });

        handle
            .await
            .map_err(|err| Error::Connection(format!("Error during initial cluster tend: {}", err)))
    }

    pub const fn cluster_name(&self) -> &Option<String> {
        &self.client_policy.cluster_name
    }

    pub const fn client_policy(&self) -> &ClientPolicy {
        &self.client_policy
    }

    pub async fn add_seeds(&self, new_seeds: &[Host]) -> Result<()> {
        let mut seeds = self.seeds.write().await;
        seeds.extend_from_slice(new_seeds);

        Ok(())
    }

    async fn set_partitions(&self, partitions: HashMap<String, Arc<Partitions>>) {
        let mut partition_map = self.partition_map.write().await;
        *partition_map = partitions;
    }

    async fn partitions_snapshot(&self) -> HashMap<String, Arc<Partitions>> {
        self.partition_map.read().await.clone()
    }

    /// Snapshot of the replica table for one namespace.
    pub(crate) async fn namespace_partitions(&self, namespace: &str) -> Option<Arc<Partitions>> {
        self.partition_map.read().await.get(namespace).cloned()
    }

    /// Partitions whose master is the given node; used to scope scans.
    pub(crate) async fn node_partitions(&self, node: &Node, namespace: &str) -> Vec<u16> {
        let mut res: Vec<u16> = vec![];
        let partitions = self.partition_map.read().await;

        if let Some(partitions) = partitions.get(namespace) {
            for (pid, owner) in partitions.replicas[0].iter().enumerate() {
                if let Some(owner) = owner {
                    if owner.as_ref() == node {
                        res.push(pid as u16);
                    }
                }
            }
        }

        res
    }

    /// Drop all partition tables. Routing falls back to random nodes until
    /// the next tend round republishes the maps.
    pub(crate) async fn invalidate_partition_map(&self) {
        let mut partition_map = self.partition_map.write().await;
        partition_map.clear();
    }

    async fn update_partitions(&self, node: Arc<Node>) -> Result<()> {
        let parser = {
            let mut conn = node.get_connection().await?;
            match PartitionParser::new(&mut conn).await {
                Ok(parser) => parser,
                Err(e) => {
                    conn.invalidate();
                    return Err(e);
                }
            }
        };

        let current = self.partitions_snapshot().await;
        let updated = parser.update_partitions(&current, &node)?;
        self.set_partitions(updated).await;

        Ok(())
    }

    pub async fn seed_nodes(&self) -> bool {
        let seed_array = self.seeds.read().await;

        info!("Seeding the cluster. Seeds count: {}", seed_array.len());

        let mut list: Vec<Arc<Node>> = vec![];
        for seed in &*seed_array {
            let mut seed_node_validator = NodeValidator::new(self);
            if let Err(err) = seed_node_validator.validate_node(self, seed).await {
                error!("Failed to validate seed host {}: {}", seed, err);
                continue;
            };

            for alias in &*seed_node_validator.aliases() {
                let nv = if *seed == *alias {
                    seed_node_validator.clone()
                } else {
                    let mut nv2 = NodeValidator::new(self);
                    if let Err(err) = nv2.validate_node(self, seed).await {
                        error!("Seeding host {} failed: {}", alias, err);
                        continue;
                    };
                    nv2
                };

                if self.find_node_name(&list, &nv.name) {
                    continue;
                }

                let node = self.create_node(nv);
                let node = Arc::new(node);
                self.add_aliases(node.clone()).await;
                list.push(node);
            }
        }

        self.add_nodes_and_aliases(&list).await;
        !list.is_empty()
    }

    fn find_node_name(&self, list: &[Arc<Node>], name: &str) -> bool {
        list.iter().any(|node| node.name() == name)
    }

    async fn find_new_nodes_to_add(&self, hosts: Vec<Host>) -> Vec<Arc<Node>> {
        let mut list: Vec<Arc<Node>> = vec![];

        for host in hosts {
            let mut nv = NodeValidator::new(self);
            if let Err(err) = nv.validate_node(self, &host).await {
                error!("Adding node {} failed: {}", host.name, err);
                continue;
            };

            // Duplicate node name found. This usually occurs when the server
            // services list contains both internal and external IP addresses
            // for the same node. Add new host to list of alias filters
            // and do not add new node.
            let mut dup = false;
            match self.get_node_by_name(&nv.name).await {
                Ok(node) => {
                    self.add_alias(host, node.clone()).await;
                    dup = true;
                }
                Err(_) => {
                    if let Some(node) = list.iter().find(|n| n.name() == nv.name) {
                        self.add_alias(host, node.clone()).await;
                        dup = true;
                    }
                }
            };

            if !dup {
                let node = self.create_node(nv);
                list.push(Arc::new(node));
            }
        }

        list
    }

    fn create_node(&self, nv: NodeValidator) -> Node {
        Node::new(self.client_policy.clone(), Arc::new(nv))
    }

    async fn find_nodes_to_remove(&self, refresh_count: usize) -> Vec<Arc<Node>> {
        let nodes = self.nodes().await;
        let mut remove_list: Vec<Arc<Node>> = vec![];
        let cluster_size = nodes.len();
        for node in nodes {
            let tnode = node.clone();

            if !node.is_active() {
                remove_list.push(tnode);
                continue;
            }

            match cluster_size {
                // Single node clusters rely on whether it responded to info requests.
                1 if node.failures() > 5 => {
                    // 5 consecutive info requests failed. Try seeds.
                    if self.seed_nodes().await {
                        remove_list.push(tnode);
                    }
                }

                // Two node clusters require at least one successful refresh before removing.
                2 if refresh_count == 1 && node.reference_count() == 0 && node.failures() > 0 => {
                    remove_list.push(node);
                }

                _ => {
                    // Multi-node clusters require two successful node refreshes before removing.
                    if refresh_count >= 2 && node.reference_count() == 0 {
                        // Node is not referenced by other nodes.
                        // Check if node responded to info request.
                        if node.failures() == 0 {
                            // Node is alive, but not referenced by other nodes. Check if mapped.
                            if !self.find_node_in_partition_map(node).await {
                                remove_list.push(tnode);
                            }
                        } else {
                            // Node not responding. Remove it.
                            remove_list.push(tnode);
                        }
                    }
                }
            }
        }

        remove_list
    }

    async fn add_nodes_and_aliases(&self, friend_list: &[Arc<Node>]) {
        for node in friend_list {
            self.add_aliases(node.clone()).await;
        }
        self.add_nodes(friend_list).await;
    }

    async fn remove_nodes_and_aliases(&self, mut nodes_to_remove: Vec<Arc<Node>>) {
        for node in &mut nodes_to_remove {
            for alias in node.aliases().await {
                self.remove_alias(&alias).await;
            }
            if let Some(node) = Arc::get_mut(node) {
                node.close().await;
            }
        }
        self.remove_nodes(&nodes_to_remove).await;
    }

    async fn add_alias(&self, host: Host, node: Arc<Node>) {
        let mut aliases = self.aliases.write().await;
        node.add_alias(host.clone()).await;
        aliases.insert(host, node);
    }

    async fn remove_alias(&self, host: &Host) {
        let mut aliases = self.aliases.write().await;
        aliases.remove(host);
    }

    async fn add_aliases(&self, node: Arc<Node>) {
        let mut aliases = self.aliases.write().await;
        for alias in node.aliases().await {
            aliases.insert(alias, node.clone());
        }
    }

    async fn find_node_in_partition_map(&self, filter: Arc<Node>) -> bool {
        let partitions = self.partition_map.read().await;
        partitions.values().any(|table| {
            table
                .replicas
                .iter()
                .any(|column| column.iter().flatten().any(|node| *node == filter))
        })
    }

    async fn add_nodes(&self, friend_list: &[Arc<Node>]) {
        if friend_list.is_empty() {
            return;
        }

        let mut nodes = self.nodes().await;
        nodes.extend(friend_list.iter().cloned());
        self.set_nodes(nodes).await;
    }

    async fn remove_nodes(&self, nodes_to_remove: &[Arc<Node>]) {
        if nodes_to_remove.is_empty() {
            return;
        }

        let nodes = self.nodes().await;
        let mut node_array: Vec<Arc<Node>> = vec![];

        for node in &nodes {
            if !nodes_to_remove.contains(node) {
                node_array.push(node.clone());
            }
        }

        self.set_nodes(node_array).await;
    }

    pub async fn is_connected(&self) -> bool {
        let nodes = self.nodes().await;
        let closed = self.closed.load(Ordering::Relaxed);
        !nodes.is_empty() && !closed
    }

    pub async fn aliases(&self) -> HashMap<Host, Arc<Node>> {
        self.aliases.read().await.clone()
    }

    pub async fn nodes(&self) -> Vec<Arc<Node>> {
        self.nodes.read().await.clone()
    }

    async fn set_nodes(&self, new_nodes: Vec<Arc<Node>>) {
        let mut nodes = self.nodes.write().await;
        *nodes = new_nodes;
    }

    /// Pick the node for one command attempt. `seq_ap`/`seq_sc` are the
    /// command's replica sequences; which one applies depends on whether the
    /// namespace runs in strong-consistency mode.
    pub(crate) async fn get_node(
        &self,
        partition: &Partition<'_>,
        replica: Replica,
        is_write: bool,
        seq_ap: usize,
        seq_sc: usize,
    ) -> Result<Arc<Node>> {
        let table = self.namespace_partitions(partition.namespace).await;

        match table {
            Some(table) => {
                let sequence = if table.sc_mode && !is_write {
                    seq_sc
                } else {
                    seq_ap
                };
                let rack_ids = if self.client_policy.rack_aware {
                    &self.client_policy.rack_ids[..]
                } else {
                    &[]
                };
                select_replica(
                    &table,
                    partition.partition_id,
                    replica,
                    is_write,
                    sequence,
                    &self.replica_index,
                    rack_ids,
                )
            }
            // The namespace map has not been published yet; any node can
            // proxy during bootstrap.
            None => self.get_random_node().await,
        }
    }

    pub async fn get_random_node(&self) -> Result<Arc<Node>> {
        let node_array = self.nodes().await;
        let length = node_array.len() as isize;

        for _ in 0..length {
            let index = ((self.node_index.fetch_add(1, Ordering::Relaxed) + 1) % length).abs();
            if let Some(node) = node_array.get(index as usize) {
                if node.is_active() {
                    return Ok(node.clone());
                }
            }
        }

        Err(Error::InvalidNode("No active node".to_string()))
    }

    pub async fn get_node_by_name(&self, node_name: &str) -> Result<Arc<Node>> {
        let node_array = self.nodes().await;

        for node in &node_array {
            if node.name() == node_name {
                return Ok(node.clone());
            }
        }

        Err(Error::InvalidNode(format!(
            "Requested node `{}` not found.",
            node_name
        )))
    }

    /// Account a fresh command.
    pub(crate) fn add_command(&self) {
        self.command_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Account a command retry.
    pub(crate) fn add_retry(&self) {
        self.retry_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of commands started since the cluster was created.
    pub fn command_count(&self) -> usize {
        self.command_count.load(Ordering::Relaxed)
    }

    /// Number of command retries since the cluster was created.
    pub fn retry_count(&self) -> usize {
        self.retry_count.load(Ordering::Relaxed)
    }

    /// Hand a connection with a pending late response to a background task
    /// that drains it within `delay` and returns it to its pool, instead of
    /// closing it.
    pub(crate) fn recover_connection(&self, conn: PooledConnection, delay: Duration) {
        let (mut raw, queue) = conn.detach();
        let _ = tokio::spawn(async move {
            match tokio::time::timeout(delay, raw.drain_response()).await {
                Ok(Ok(())) => queue.put_back(raw).await,
                _ => queue.drop_conn(raw).await,
            }
        });
    }

    pub async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

// Replica selection over one published snapshot. Does not consult the
// network; callers retry with advanced sequences when the returned node
// turns out to be unusable.
pub(crate) fn select_replica(
    table: &Partitions,
    partition_id: usize,
    replica: Replica,
    is_write: bool,
    sequence: usize,
    round_robin: &AtomicUsize,
    rack_ids: &[usize],
) -> Result<Arc<Node>> {
    let replica_count = table.replica_count();
    if replica_count == 0 {
        return Err(Error::InvalidNode(format!(
            "No replicas for partition {}",
            partition_id
        )));
    }

    // Writes walk the replica columns master-first so a failed-over master
    // is found on retry.
    let replica = if is_write { Replica::Sequence } else { replica };

    let healthy = |node: &Arc<Node>| node.is_active() && !node.error_rate_exceeded();

    match replica {
        Replica::Master => {
            let master = table.replicas[0][partition_id]
                .as_ref()
                .ok_or_else(|| {
                    Error::InvalidNode(format!("Partition {} unavailable", partition_id))
                })?;
            if !master.is_active() {
                return Err(Error::InvalidNode(format!(
                    "Master for partition {} is inactive",
                    partition_id
                )));
            }
            if master.error_rate_exceeded() {
                return Err(Error::Backoff(master.name().to_owned()));
            }
            Ok(master.clone())
        }

        Replica::MasterProles => {
            let start = round_robin.fetch_add(1, Ordering::Relaxed);
            for i in 0..replica_count {
                let column = (start + i) % replica_count;
                if let Some(node) = &table.replicas[column][partition_id] {
                    if healthy(node) {
                        return Ok(node.clone());
                    }
                }
            }
            Err(Error::InvalidNode(format!(
                "No available replica for partition {}",
                partition_id
            )))
        }

        Replica::Sequence => {
            for i in 0..replica_count {
                let column = (sequence + i) % replica_count;
                if let Some(node) = &table.replicas[column][partition_id] {
                    if healthy(node) {
                        return Ok(node.clone());
                    }
                }
            }
            Err(Error::InvalidNode(format!(
                "No available replica for partition {}",
                partition_id
            )))
        }

        Replica::PreferRack => {
            for i in 0..replica_count {
                let column = (sequence + i) % replica_count;
                if let Some(node) = &table.replicas[column][partition_id] {
                    if healthy(node)
                        && node.rack_id() >= 0
                        && rack_ids.contains(&(node.rack_id() as usize))
                    {
                        return Ok(node.clone());
                    }
                }
            }
            // No replica on a preferred rack; fall back to plain sequence.
            select_replica(
                table,
                partition_id,
                Replica::Sequence,
                false,
                sequence,
                round_robin,
                rack_ids,
            )
        }

        Replica::Random => {
            let start = rand::thread_rng().gen_range(0..replica_count);
            for i in 0..replica_count {
                let column = (start + i) % replica_count;
                if let Some(node) = &table.replicas[column][partition_id] {
                    if healthy(node) {
                        return Ok(node.clone());
                    }
                }
            }
            Err(Error::InvalidNode(format!(
                "No available replica for partition {}",
                partition_id
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ClientPolicy;

    fn test_node(name: &str) -> Arc<Node> {
        Arc::new(Node::test_node(name, ClientPolicy::default()))
    }

    fn table_with(masters: Vec<Option<Arc<Node>>>, proles: Vec<Option<Arc<Node>>>) -> Partitions {
        let mut table = Partitions::new(2, false);
        for (pid, node) in masters.into_iter().enumerate() {
            table.replicas[0][pid] = node;
        }
        for (pid, node) in proles.into_iter().enumerate() {
            table.replicas[1][pid] = node;
        }
        table
    }

    #[test]
    fn master_selection() {
        let a = test_node("A");
        let b = test_node("B");
        let table = table_with(vec![Some(a.clone())], vec![Some(b)]);
        let rr = AtomicUsize::new(0);

        let node = select_replica(&table, 0, Replica::Master, false, 0, &rr, &[]).unwrap();
        assert_eq!(node.name(), "A");
    }

    #[test]
    fn master_unavailable_fails() {
        let b = test_node("B");
        let table = table_with(vec![None], vec![Some(b)]);
        let rr = AtomicUsize::new(0);

        let err = select_replica(&table, 0, Replica::Master, false, 0, &rr, &[]).unwrap_err();
        assert!(matches!(err, Error::InvalidNode(_)));
    }

    #[test]
    fn sequence_rotates_with_retries() {
        let a = test_node("A");
        let b = test_node("B");
        let table = table_with(vec![Some(a)], vec![Some(b)]);
        let rr = AtomicUsize::new(0);

        let first = select_replica(&table, 0, Replica::Sequence, false, 0, &rr, &[]).unwrap();
        let second = select_replica(&table, 0, Replica::Sequence, false, 1, &rr, &[]).unwrap();
        let third = select_replica(&table, 0, Replica::Sequence, false, 2, &rr, &[]).unwrap();
        assert_eq!(first.name(), "A");
        assert_eq!(second.name(), "B");
        assert_eq!(third.name(), "A");
    }

    #[test]
    fn sequence_skips_inactive_nodes() {
        let a = test_node("A");
        let b = test_node("B");
        a.test_set_inactive();
        let table = table_with(vec![Some(a)], vec![Some(b)]);
        let rr = AtomicUsize::new(0);

        let node = select_replica(&table, 0, Replica::Sequence, false, 0, &rr, &[]).unwrap();
        assert_eq!(node.name(), "B");
    }

    #[test]
    fn writes_always_start_at_master() {
        let a = test_node("A");
        let b = test_node("B");
        let table = table_with(vec![Some(a)], vec![Some(b)]);
        let rr = AtomicUsize::new(7);

        // Even under a read-distribution policy, a write's first attempt
        // lands on the master.
        let node =
            select_replica(&table, 0, Replica::MasterProles, true, 0, &rr, &[]).unwrap();
        assert_eq!(node.name(), "A");
    }

    #[test]
    fn prefer_rack_picks_rack_match() {
        let a = test_node("A");
        let b = test_node("B");
        a.test_set_rack_id(1);
        b.test_set_rack_id(2);
        let table = table_with(vec![Some(a)], vec![Some(b.clone())]);
        let rr = AtomicUsize::new(0);

        let node = select_replica(&table, 0, Replica::PreferRack, false, 0, &rr, &[2]).unwrap();
        assert_eq!(node.name(), "B");

        // No replica in rack 9: falls back to the sequence choice.
        let node = select_replica(&table, 0, Replica::PreferRack, false, 0, &rr, &[9]).unwrap();
        assert_eq!(node.name(), "A");
    }

    #[test]
    fn master_proles_round_robin() {
        let a = test_node("A");
        let b = test_node("B");
        let table = table_with(vec![Some(a)], vec![Some(b)]);
        let rr = AtomicUsize::new(0);

        let first = select_replica(&table, 0, Replica::MasterProles, false, 0, &rr, &[]).unwrap();
        let second = select_replica(&table, 0, Replica::MasterProles, false, 0, &rr, &[]).unwrap();
        assert_ne!(first.name(), second.name());
    }
}
