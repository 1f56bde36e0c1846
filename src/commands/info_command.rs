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

use byteorder::{ByteOrder, NetworkEndian};

use crate::errors::{Error, Result};
use crate::net::Connection;

const INFO_MSG_VERSION: u64 = 2;
const INFO_MSG_TYPE: u64 = 1;
const MAX_INFO_BUFFER_SIZE: usize = 1 << 24;

// The name/value info protocol used for node discovery, capability probing
// and partition map refresh.
#[derive(Debug)]
pub struct Message;

impl Message {
    pub(crate) async fn info(
        conn: &mut Connection,
        commands: &[&str],
    ) -> Result<HashMap<String, String>> {
        let mut payload = String::new();
        for command in commands {
            payload.push_str(command);
            payload.push('\n');
        }

        let mut request = vec![0u8; 8 + payload.len()];
        let proto = (INFO_MSG_VERSION << 56) | (INFO_MSG_TYPE << 48) | payload.len() as u64;
        NetworkEndian::write_u64(&mut request[0..8], proto);
        request[8..].copy_from_slice(payload.as_bytes());

        conn.write(&request).await?;

        let mut header = [0u8; 8];
        conn.read(&mut header).await?;
        let proto = NetworkEndian::read_u64(&header);
        let version = proto >> 56;
        let msg_type = (proto >> 48) & 0xFF;
        let size = (proto & 0xFFFF_FFFF_FFFF) as usize;

        if version != INFO_MSG_VERSION || msg_type != INFO_MSG_TYPE {
            return Err(Error::BadResponse(format!(
                "Invalid info response header: version {}, type {}",
                version, msg_type
            )));
        }
        if size > MAX_INFO_BUFFER_SIZE {
            return Err(Error::BadResponse(format!(
                "Info response too large: {} bytes",
                size
            )));
        }

        let mut body = vec![0u8; size];
        conn.read(&mut body).await?;

        Message::parse_response(&body)
    }

    fn parse_response(body: &[u8]) -> Result<HashMap<String, String>> {
        let response = str::from_utf8(body)?;
        let mut result = HashMap::new();

        for line in response.split('\n') {
            if line.is_empty() {
                continue;
            }
            match line.split_once('\t') {
                Some((name, value)) => {
                    result.insert(name.to_string(), value.to_string());
                }
                // A name without a value is a valid (empty) response.
                None => {
                    result.insert(line.to_string(), String::new());
                }
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::Message;

    #[test]
    fn parse_response() {
        let body = b"node\tBB9020011AC4202\npartition-generation\t42\nfeatures\t\n";
        let values = Message::parse_response(body).unwrap();
        assert_eq!(values.get("node").unwrap(), "BB9020011AC4202");
        assert_eq!(values.get("partition-generation").unwrap(), "42");
        assert_eq!(values.get("features").unwrap(), "");
    }

    #[test]
    fn parse_response_rejects_invalid_utf8() {
        assert!(Message::parse_response(&[0xff, 0xfe]).is_err());
    }
}
