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
use std::str;
use std::sync::Arc;

use crate::cluster::partition::PARTITIONS;
use crate::cluster::partitions::Partitions;
use crate::cluster::Node;
use crate::commands::Message;
use crate::errors::{Error, Result};
use crate::net::Connection;

const REPLICAS_NAME: &str = "replicas";

// Fetches and decodes a node's replica ownership bitmaps.
//
// The info value has the form
// `<ns>:<regime>,<replica-count>,<b64 bitmap>[,<b64 bitmap>...];...`
// with one base64-encoded bitmap of owned partitions per replica column.
#[derive(Debug, Clone)]
pub struct PartitionParser {
    buffer: Vec<u8>,
}

impl PartitionParser {
    pub async fn new(conn: &mut Connection) -> Result<Self> {
        let info_map = Message::info(conn, &[REPLICAS_NAME]).await?;
        if let Some(buf) = info_map.get(REPLICAS_NAME) {
            return Ok(PartitionParser {
                buffer: buf.as_bytes().to_owned(),
            });
        }
        Err(Error::BadResponse("Missing replicas info".to_string()))
    }

    // Builds the successor snapshot map by copying the current tables and
    // applying this node's ownership claims. Claims carrying an older regime
    // than the one recorded for a partition are dropped.
    pub fn update_partitions(
        &self,
        current: &HashMap<String, Arc<Partitions>>,
        node: &Arc<Node>,
    ) -> Result<HashMap<String, Arc<Partitions>>> {
        let mut updated: HashMap<String, Arc<Partitions>> = current.clone();

        let part_str = str::from_utf8(&self.buffer)?;
        for part in part_str.trim_end().split(';') {
            if part.is_empty() {
                continue;
            }

            let (ns, rest) = part
                .split_once(':')
                .ok_or_else(|| Error::BadResponse("Error parsing partition info".to_string()))?;

            let mut fields = rest.split(',');
            let regime: u32 = fields
                .next()
                .ok_or_else(|| Error::BadResponse("Missing partition regime".to_string()))?
                .parse()?;
            let replica_count: usize = fields
                .next()
                .ok_or_else(|| Error::BadResponse("Missing replica count".to_string()))?
                .parse()?;

            let entry = updated
                .entry(ns.to_string())
                .or_insert_with(|| Arc::new(Partitions::new(replica_count, regime != 0)));
            let partitions = Arc::make_mut(entry);
            if partitions.replica_count() != replica_count {
                partitions.set_replica_count(replica_count);
            }
            partitions.sc_mode = regime != 0;

            for replica_idx in 0..replica_count {
                let bitmap = fields.next().ok_or_else(|| {
                    Error::BadResponse(format!(
                        "Missing replica bitmap {} for namespace {}",
                        replica_idx, ns
                    ))
                })?;
                let restore_buffer = base64::decode(bitmap)?;
                if restore_buffer.len() < PARTITIONS / 8 {
                    return Err(Error::BadResponse(format!(
                        "Partition bitmap too short for namespace {}",
                        ns
                    )));
                }

                for pid in 0..PARTITIONS {
                    if restore_buffer[pid >> 3] & (0x80 >> (pid & 7) as u8) != 0 {
                        if regime >= partitions.regimes[pid] {
                            if regime > partitions.regimes[pid] {
                                partitions.regimes[pid] = regime;
                            }
                            partitions.replicas[replica_idx][pid] = Some(node.clone());
                        }
                    }
                }
            }
        }

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::Node;
    use crate::policy::ClientPolicy;

    fn parser_for(value: &str) -> PartitionParser {
        PartitionParser {
            buffer: value.as_bytes().to_owned(),
        }
    }

    fn bitmap_with(pids: &[usize]) -> String {
        let mut bytes = vec![0u8; PARTITIONS / 8];
        for pid in pids {
            bytes[pid >> 3] |= 0x80 >> (pid & 7) as u8;
        }
        base64::encode(&bytes)
    }

    fn test_node(name: &str) -> Arc<Node> {
        Arc::new(Node::test_node(name, ClientPolicy::default()))
    }

    #[test]
    fn parses_replica_columns() {
        let node = test_node("A");
        let info = format!(
            "test:0,2,{},{};",
            bitmap_with(&[0, 7, 4095]),
            bitmap_with(&[1])
        );
        let parser = parser_for(&info);

        let map = parser.update_partitions(&HashMap::new(), &node).unwrap();
        let partitions = map.get("test").unwrap();
        assert_eq!(partitions.replica_count(), 2);
        assert!(!partitions.sc_mode);
        assert!(partitions.is_available(0));
        assert!(partitions.is_available(7));
        assert!(partitions.is_available(4095));
        assert!(!partitions.is_available(2));
        assert!(partitions.replicas[1][1].is_some());
    }

    #[test]
    fn stale_regime_is_ignored() {
        let node_a = test_node("A");
        let node_b = test_node("B");

        let first = parser_for(&format!("sc:7,1,{};", bitmap_with(&[3])));
        let map = first.update_partitions(&HashMap::new(), &node_a).unwrap();
        assert!(map.get("sc").unwrap().sc_mode);

        // An older view from another node must not steal the partition.
        let stale = parser_for(&format!("sc:5,1,{};", bitmap_with(&[3])));
        let map = stale.update_partitions(&map, &node_b).unwrap();
        let owner = map.get("sc").unwrap().replicas[0][3].clone().unwrap();
        assert_eq!(owner.name(), "A");

        // A newer view does take over.
        let newer = parser_for(&format!("sc:8,1,{};", bitmap_with(&[3])));
        let map = newer.update_partitions(&map, &node_b).unwrap();
        let owner = map.get("sc").unwrap().replicas[0][3].clone().unwrap();
        assert_eq!(owner.name(), "B");
    }

    #[test]
    fn malformed_info_is_rejected() {
        let node = test_node("A");
        assert!(parser_for("garbage")
            .update_partitions(&HashMap::new(), &node)
            .is_err());
        assert!(parser_for("test:0;")
            .update_partitions(&HashMap::new(), &node)
            .is_err());
        assert!(parser_for("test:0,1,short;")
            .update_partitions(&HashMap::new(), &node)
            .is_err());
    }
}
