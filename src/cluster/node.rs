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
use std::fmt;
use std::hash::{Hash, Hasher};
use std::result::Result as StdResult;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicIsize, AtomicUsize, Ordering};
use std::sync::Arc;

use log::error;
use tokio::sync::RwLock;

use crate::cluster::node_validator::NodeValidator;
use crate::commands::Message;
use crate::errors::{Error, Result};
use crate::net::{ConnectionPool, Host, PooledConnection};
use crate::policy::ClientPolicy;

/// The node instance holding connections and node settings.
#[derive(Debug)]
pub struct Node {
    client_policy: ClientPolicy,
    name: String,
    host: Host,
    aliases: RwLock<Vec<Host>>,
    address: String,

    connection_pool: ConnectionPool,
    failures: AtomicUsize,

    partition_generation: AtomicIsize,
    refresh_count: AtomicUsize,
    reference_count: AtomicUsize,
    responded: AtomicBool,
    active: AtomicBool,

    // Command errors within the current sliding window; see
    // `ClientPolicy::max_error_rate`.
    error_count: AtomicUsize,

    // Rack the node reports itself in; -1 when unknown.
    rack_id: AtomicIsize,

    supports_batch_any: AtomicBool,
    supports_partition_query: AtomicBool,
}

impl Node {
    #![allow(missing_docs)]
    pub(crate) fn new(client_policy: ClientPolicy, nv: Arc<NodeValidator>) -> Self {
        Node {
            client_policy: client_policy.clone(),
            name: nv.name.clone(),
            aliases: RwLock::new(nv.aliases.clone()),
            address: nv.address.clone(),

            host: nv.aliases[0].clone(),
            connection_pool: ConnectionPool::new(nv.aliases[0].clone(), client_policy),
            failures: AtomicUsize::new(0),
            partition_generation: AtomicIsize::new(-1),
            refresh_count: AtomicUsize::new(0),
            reference_count: AtomicUsize::new(0),
            responded: AtomicBool::new(false),
            active: AtomicBool::new(true),

            error_count: AtomicUsize::new(0),
            rack_id: AtomicIsize::new(-1),

            supports_batch_any: AtomicBool::new(nv.supports_batch_any),
            supports_partition_query: AtomicBool::new(nv.supports_partition_query),
        }
    }

    /// Returns the node address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the node name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the active client policy.
    pub const fn client_policy(&self) -> &ClientPolicy {
        &self.client_policy
    }

    /// Returns the main host of the node.
    pub fn host(&self) -> Host {
        self.host.clone()
    }

    /// True if the node accepts the unified batch message for mixed
    /// read/write batches.
    pub fn supports_batch_any(&self) -> bool {
        self.supports_batch_any.load(Ordering::Relaxed)
    }

    /// True if the node supports partition-scoped queries.
    pub fn supports_partition_query(&self) -> bool {
        self.supports_partition_query.load(Ordering::Relaxed)
    }

    /// Rack id this node reported, or -1 when unknown.
    pub fn rack_id(&self) -> isize {
        self.rack_id.load(Ordering::Relaxed)
    }

    // Returns the reference count
    pub(crate) fn reference_count(&self) -> usize {
        self.reference_count.load(Ordering::Relaxed)
    }

    // Refresh the node: validate identity, collect peers, pick up the
    // current partition generation and rack placement.
    pub(crate) async fn refresh(
        &self,
        current_aliases: HashMap<Host, Arc<Node>>,
    ) -> Result<Vec<Host>> {
        self.reference_count.store(0, Ordering::Relaxed);
        self.responded.store(false, Ordering::Relaxed);
        self.refresh_count.fetch_add(1, Ordering::Relaxed);
        let commands = vec![
            "node",
            "cluster-name",
            "partition-generation",
            "rack-id",
            self.services_name(),
        ];
        let info_map = self.info(&commands).await?;
        self.validate_node(&info_map)?;
        self.responded.store(true, Ordering::Relaxed);
        let friends = self.add_friends(current_aliases, &info_map)?;
        self.update_partition_generation(&info_map)?;
        self.update_rack_id(&info_map);
        self.reset_failures();
        Ok(friends)
    }

    // Returns the services that the client should use for the cluster tend
    const fn services_name(&self) -> &'static str {
        if self.client_policy.use_services_alternate {
            "services-alternate"
        } else {
            "services"
        }
    }

    fn validate_node(&self, info_map: &HashMap<String, String>) -> Result<()> {
        self.verify_node_name(info_map)?;
        self.verify_cluster_name(info_map)?;
        Ok(())
    }

    fn verify_node_name(&self, info_map: &HashMap<String, String>) -> Result<()> {
        match info_map.get("node") {
            None => Err(Error::InvalidNode("Missing node name".to_string())),
            Some(info_name) if info_name == &self.name => Ok(()),
            Some(info_name) => {
                self.inactivate();
                Err(Error::InvalidNode(format!(
                    "Node name has changed: '{}' => '{}'",
                    self.name, info_name
                )))
            }
        }
    }

    fn verify_cluster_name(&self, info_map: &HashMap<String, String>) -> Result<()> {
        match self.client_policy.cluster_name {
            None => Ok(()),
            Some(ref expected) => match info_map.get("cluster-name") {
                None => Err(Error::InvalidNode("Missing cluster name".to_string())),
                Some(info_name) if info_name == expected => Ok(()),
                Some(info_name) => {
                    self.inactivate();
                    Err(Error::InvalidNode(format!(
                        "Cluster name mismatch: expected={}, got={}",
                        expected, info_name
                    )))
                }
            },
        }
    }

    fn add_friends(
        &self,
        current_aliases: HashMap<Host, Arc<Node>>,
        info_map: &HashMap<String, String>,
    ) -> Result<Vec<Host>> {
        let mut friends: Vec<Host> = vec![];

        let friend_string = match info_map.get(self.services_name()) {
            None => return Err(Error::BadResponse("Missing services list".to_string())),
            Some(friend_string) if friend_string.is_empty() => return Ok(friends),
            Some(friend_string) => friend_string,
        };

        let friend_names = friend_string.split(';');
        for friend in friend_names {
            let mut friend_info = friend.split(':');
            if friend_info.clone().count() != 2 {
                error!(
                    "Node info from services is malformed. Expected HOST:PORT, but got '{}'",
                    friend
                );
                continue;
            }

            let host = friend_info.next().unwrap();
            let port = u16::from_str(friend_info.next().unwrap())?;
            let alias = match self.client_policy.ip_map {
                Some(ref ip_map) if ip_map.contains_key(host) => {
                    Host::new(ip_map.get(host).unwrap(), port)
                }
                _ => Host::new(host, port),
            };

            if current_aliases.contains_key(&alias) {
                self.reference_count.fetch_add(1, Ordering::Relaxed);
            } else if !friends.contains(&alias) {
                friends.push(alias);
            }
        }

        Ok(friends)
    }

    fn update_partition_generation(&self, info_map: &HashMap<String, String>) -> Result<()> {
        match info_map.get("partition-generation") {
            None => {
                return Err(Error::BadResponse(
                    "Missing partition generation".to_string(),
                ))
            }
            Some(gen_string) => {
                let gen = gen_string.parse::<isize>()?;
                self.partition_generation.store(gen, Ordering::Relaxed);
            }
        }

        Ok(())
    }

    fn update_rack_id(&self, info_map: &HashMap<String, String>) {
        if let Some(rack) = info_map.get("rack-id") {
            if let Ok(rack) = rack.parse::<isize>() {
                self.rack_id.store(rack, Ordering::Relaxed);
            }
        }
    }

    /// Get a connection to the node from the connection pool. Fails fast
    /// when the node exceeded its error-rate window.
    pub(crate) async fn get_connection(&self) -> Result<PooledConnection> {
        if self.error_rate_exceeded() {
            return Err(Error::Backoff(self.name.clone()));
        }
        self.connection_pool.get().await
    }

    // Amount of failures
    pub(crate) fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    fn reset_failures(&self) {
        self.failures.store(0, Ordering::Relaxed);
    }

    // Adds a failure to the failure count
    pub(crate) fn increase_failures(&self) -> usize {
        self.failures.fetch_add(1, Ordering::Relaxed)
    }

    /// Account one command error against the sliding window.
    pub(crate) fn add_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    /// True when the node collected more errors than the policy allows
    /// within the current window.
    pub(crate) fn error_rate_exceeded(&self) -> bool {
        self.client_policy.max_error_rate > 0
            && self.error_count.load(Ordering::Relaxed) > self.client_policy.max_error_rate
    }

    /// Called by tending at the end of each error-rate window.
    pub(crate) fn reset_error_window(&self) {
        self.error_count.store(0, Ordering::Relaxed);
    }

    fn inactivate(&self) {
        self.active.store(false, Ordering::Relaxed);
    }

    /// Returns true if the node is active.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    // Get a list of aliases to the node
    pub(crate) async fn aliases(&self) -> Vec<Host> {
        self.aliases.read().await.to_vec()
    }

    // Add an alias to the node
    pub(crate) async fn add_alias(&self, alias: Host) {
        let mut aliases = self.aliases.write().await;
        aliases.push(alias);
        self.reference_count.fetch_add(1, Ordering::Relaxed);
    }

    // Set the node inactive and close all connections in the pool
    pub(crate) async fn close(&mut self) {
        self.inactivate();
        self.connection_pool.close().await;
    }

    // Send info commands to this node
    pub(crate) async fn info(&self, commands: &[&str]) -> Result<HashMap<String, String>> {
        let mut conn = self.get_connection().await?;
        match Message::info(&mut conn, commands).await {
            Ok(info) => Ok(info),
            Err(e) => {
                conn.invalidate();
                Err(e)
            }
        }
    }

    // Get the partition generation
    pub(crate) fn partition_generation(&self) -> isize {
        self.partition_generation.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub(crate) fn test_node(name: &str, client_policy: ClientPolicy) -> Self {
        let host = Host::new(name, 3000);
        Node {
            client_policy: client_policy.clone(),
            name: name.to_string(),
            aliases: RwLock::new(vec![host.clone()]),
            address: host.address(),
            host: host.clone(),
            connection_pool: ConnectionPool::new(host, client_policy),
            failures: AtomicUsize::new(0),
            partition_generation: AtomicIsize::new(-1),
            refresh_count: AtomicUsize::new(0),
            reference_count: AtomicUsize::new(0),
            responded: AtomicBool::new(false),
            active: AtomicBool::new(true),
            error_count: AtomicUsize::new(0),
            rack_id: AtomicIsize::new(-1),
            supports_batch_any: AtomicBool::new(true),
            supports_partition_query: AtomicBool::new(true),
        }
    }

    #[cfg(test)]
    pub(crate) fn test_set_rack_id(&self, rack: isize) {
        self.rack_id.store(rack, Ordering::Relaxed);
    }

    #[cfg(test)]
    pub(crate) fn test_set_inactive(&self) {
        self.inactivate();
    }
}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Node) -> bool {
        self.name == other.name
    }
}

impl Eq for Node {}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> StdResult<(), fmt::Error> {
        format!("{}: {}", self.name, self.host).fmt(f)
    }
}
