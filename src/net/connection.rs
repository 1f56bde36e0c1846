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

use std::ops::Add;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;

use crate::commands::buffer::{Buffer, MSG_TYPE_COMPRESSED};
use crate::errors::{Error, Result};
use crate::policy::ClientPolicy;

#[derive(Debug)]
pub struct Connection {
    // duration after which connection is considered idle
    idle_timeout: Option<Duration>,
    idle_deadline: Option<Instant>,

    // connection object
    conn: TcpStream,

    pub buffer: Buffer,
}

impl Connection {
    pub(crate) async fn new(addr: &str, policy: &ClientPolicy) -> Result<Self> {
        let connect_timeout = policy.timeout.unwrap_or_else(|| Duration::from_secs(10));
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::Connection("Could not open network connection".to_string()))?;
        let mut conn = Connection {
            buffer: Buffer::new(policy.buffer_reclaim_threshold),
            conn: stream?,
            idle_timeout: policy.idle_timeout,
            idle_deadline: policy.idle_timeout.map(|timeout| Instant::now() + timeout),
        };
        conn.refresh();
        Ok(conn)
    }

    pub(crate) async fn close(&mut self) {
        let _s = self.conn.shutdown().await;
    }

    /// Transmit the assembled command frame.
    pub(crate) async fn flush(&mut self) -> Result<()> {
        self.conn.write_all(&self.buffer.data_buffer).await?;
        self.refresh();
        Ok(())
    }

    /// Replace the buffer contents with exactly `size` bytes from the socket.
    pub(crate) async fn read_buffer(&mut self, size: usize) -> Result<()> {
        self.buffer.resize_buffer(size)?;
        self.conn.read_exact(&mut self.buffer.data_buffer).await?;
        self.buffer.reset_offset();
        self.refresh();
        Ok(())
    }

    /// Read one whole proto block into the buffer: the 8-byte proto header
    /// followed by the advertised payload, inflated when the block is
    /// compressed. Afterwards the buffer holds a plain frame and the offset
    /// sits on the message header.
    pub(crate) async fn read_proto_block(&mut self) -> Result<()> {
        self.read_buffer(8).await?;
        let proto = self.buffer.read_u64(Some(0));
        let msg_type = crate::commands::proto_msg_type(proto)?;
        let size = (proto & 0xFFFF_FFFF_FFFF) as usize;

        self.read_buffer(size).await?;
        if msg_type == MSG_TYPE_COMPRESSED {
            self.buffer.decompress()?;
            // Skip the inner proto header of the inflated frame.
            self.buffer.skip(8);
        }
        Ok(())
    }

    pub(crate) async fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.conn.write_all(buf).await?;
        self.refresh();
        Ok(())
    }

    pub(crate) async fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        self.conn.read_exact(buf).await?;
        self.refresh();
        Ok(())
    }

    /// Consume a late response so the socket can go back to the pool. Used
    /// by the timeout-delay recovery path; anything beyond a single proto
    /// block (a multi-part stream) is not recoverable.
    pub(crate) async fn drain_response(&mut self) -> Result<()> {
        self.read_proto_block().await?;
        Ok(())
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.idle_deadline
            .map_or(false, |idle_dl| Instant::now() >= idle_dl)
    }

    fn refresh(&mut self) {
        self.idle_deadline = None;
        if let Some(idle_to) = self.idle_timeout {
            self.idle_deadline = Some(Instant::now().add(idle_to));
        };
    }
}
