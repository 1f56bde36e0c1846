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

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};

use crate::Key;

/// Number of partitions per namespace.
pub const PARTITIONS: usize = 4096;

// Routing bucket for a key: namespace plus partition id derived from the
// first four digest bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition<'a> {
    pub namespace: &'a str,
    pub partition_id: usize,
}

impl<'a> Partition<'a> {
    pub const fn new(namespace: &'a str, partition_id: usize) -> Self {
        Partition {
            namespace,
            partition_id,
        }
    }

    pub fn new_by_key(key: &'a Key) -> Self {
        Partition {
            namespace: &key.namespace,

            // Mask is equivalent to mod here since the partition count is a
            // power of two, and avoids sign pitfalls.
            partition_id: LittleEndian::read_u32(&key.digest[0..4]) as usize & (PARTITIONS - 1),
        }
    }
}

impl<'a> fmt::Display for Partition<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "Partition ({}: {})", self.namespace, self.partition_id)
    }
}

#[cfg(test)]
mod tests {
    use super::{Partition, PARTITIONS};
    use crate::Key;

    #[test]
    fn partition_from_digest() {
        let mut key = Key::from_digest("test", "s", [0; 20]);
        key.digest[0..4].copy_from_slice(&[0x01, 0x02, 0x03, 0x04]);

        // 0x04030201 little-endian, masked to the partition count.
        let partition = Partition::new_by_key(&key);
        assert_eq!(partition.partition_id, 0x0403_0201 & (PARTITIONS - 1));
        assert_eq!(partition.namespace, "test");
    }

    #[test]
    fn partition_is_stable_for_key() {
        let key = as_key!("test", "s", "k1");
        let p1 = Partition::new_by_key(&key);
        let p2 = Partition::new_by_key(&key);
        assert_eq!(p1, p2);
        assert!(p1.partition_id < PARTITIONS);
    }
}
