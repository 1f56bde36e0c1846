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

use crate::cluster::Cluster;
use crate::commands::Message;
use crate::errors::{Error, Result};
use crate::net::{Connection, Host};

// Probes a candidate host before it becomes a cluster node: resolves the
// node name and the capability bits advertised through `features`.
#[derive(Debug, Clone, Default)]
pub struct NodeValidator {
    pub name: String,
    pub aliases: Vec<Host>,
    pub address: String,

    pub supports_batch_any: bool,
    pub supports_partition_query: bool,
}

impl NodeValidator {
    pub fn new(_cluster: &Cluster) -> Self {
        NodeValidator::default()
    }

    pub async fn validate_node(&mut self, cluster: &Cluster, host: &Host) -> Result<()> {
        let mut conn = Connection::new(&host.address(), cluster.client_policy()).await?;
        let info_map = Message::info(&mut conn, &["node", "features"]).await?;
        conn.close().await;

        match info_map.get("node") {
            None => return Err(Error::InvalidNode("Missing node name".to_string())),
            Some(node_name) => self.name = node_name.clone(),
        }

        if let Some(features) = info_map.get("features") {
            self.set_features(features);
        }

        self.address = host.address();
        self.aliases = vec![host.clone()];
        Ok(())
    }

    fn set_features(&mut self, features: &str) {
        for feature in features.split(';') {
            match feature {
                "batch-any" => self.supports_batch_any = true,
                "pquery" => self.supports_partition_query = true,
                _ => (),
            }
        }
    }

    pub fn aliases(&self) -> Vec<Host> {
        self.aliases.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::NodeValidator;

    #[test]
    fn feature_bits() {
        let mut nv = NodeValidator::default();
        nv.set_features("float;geo;batch-any;pquery;blob-bits");
        assert!(nv.supports_batch_any);
        assert!(nv.supports_partition_query);

        let mut nv = NodeValidator::default();
        nv.set_features("float");
        assert!(!nv.supports_batch_any);
        assert!(!nv.supports_partition_query);
    }
}
