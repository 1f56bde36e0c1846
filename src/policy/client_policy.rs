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
use std::time::Duration;

/// `ClientPolicy` encapsulates parameters for cluster management.
#[derive(Debug, Clone)]
pub struct ClientPolicy {
    /// Initial host connection timeout in milliseconds. The timeout when opening a connection to
    /// the server host for the first time.
    pub timeout: Option<Duration>,

    /// Connection idle timeout. Every time a connection is used, its idle deadline will be
    /// extended by this duration. When this deadline is reached, the connection will be closed
    /// and discarded from the connection pool.
    pub idle_timeout: Option<Duration>,

    /// Maximum number of synchronous connections allowed per server node.
    pub max_conns_per_node: usize,

    /// Number of connection pools used for each node. Machines with 8 MB page sizes can benefit
    /// from increasing this value when the client performs many concurrent requests.
    pub conn_pools_per_node: usize,

    /// Throw exception if host connection fails during constructing the
    /// client.
    pub fail_if_not_connected: bool,

    /// Expected cluster name. If populated, the cluster-name info command must return this string
    /// for all nodes in the cluster.
    pub cluster_name: Option<String>,

    /// Cluster tend interval. Determines how often the client checks for cluster state changes.
    /// Minimum interval is 10ms.
    pub tend_interval: Duration,

    /// A IP translation table is used in cases where different clients use different server IP
    /// addresses. This may be necessary when using clients from both inside and outside a local
    /// area network.
    pub ip_map: Option<HashMap<String, String>>,

    /// Use "services-alternate" instead of "services" in info request during cluster tending.
    /// "services-alternate" returns server configured external IP addresses that client uses to
    /// talk to nodes.
    pub use_services_alternate: bool,

    /// Size of the thread-local buffer above which completed commands shrink their buffer back
    /// instead of keeping the allocation around.
    pub buffer_reclaim_threshold: usize,

    /// Track server rack data. This is useful for the `Replica::PreferRack`
    /// replica policy.
    pub rack_aware: bool,

    /// Racks where the client instance resides, ordered by preference.
    /// Used with `Replica::PreferRack` when `rack_aware` is enabled.
    pub rack_ids: Vec<usize>,

    /// Maximum number of errors allowed per node within `error_rate_window`
    /// before commands to that node are rejected with a backoff error.
    /// 0 disables error-rate tracking.
    pub max_error_rate: usize,

    /// Number of cluster tend iterations that make up the sliding error-rate
    /// window.
    pub error_rate_window: usize,
}

impl Default for ClientPolicy {
    fn default() -> Self {
        ClientPolicy {
            timeout: Some(Duration::new(30, 0)),
            idle_timeout: Some(Duration::from_secs(5)),
            max_conns_per_node: 256,
            conn_pools_per_node: 1,
            fail_if_not_connected: true,
            cluster_name: None,
            tend_interval: Duration::new(1, 0),
            ip_map: None,
            use_services_alternate: false,
            buffer_reclaim_threshold: 65536,
            rack_aware: false,
            rack_ids: vec![],
            max_error_rate: 100,
            error_rate_window: 1,
        }
    }
}
