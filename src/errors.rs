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

//! Error and Result types for the Firefly client.
//!
//! Errors fall into two broad classes. Retriable errors (routing failures,
//! node backoff, socket errors, server timeouts, device overload) are
//! absorbed by the command retry loop until its deadline or retry budget is
//! exhausted; the final error is then annotated with the node, the attempt
//! count and the in-doubt flag. Everything else fails the command on first
//! occurrence.

#![allow(missing_docs)]

use std::sync::Arc;

use crate::cluster::Node;
use crate::result_code::ResultCode;
use crate::txn::CommitError;

/// Common result type used by nearly all client functions.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error type for the Firefly client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The client received a server response it was not able to process.
    #[error("Bad server response: {0}")]
    BadResponse(String),

    /// The client could not communicate with the cluster over the network.
    #[error("Unable to communicate with server cluster: {0}")]
    Connection(String),

    /// One or more of the arguments passed to the client are invalid.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No usable cluster node for the requested partition.
    #[error("Invalid cluster node: {0}")]
    InvalidNode(String),

    /// The chosen node exceeded its error-rate window and is backing off.
    #[error("Node {0} in backoff due to error rate")]
    Backoff(String),

    /// Exceeded the max. number of connections per node.
    #[error("Too many connections")]
    NoMoreConnections,

    /// Server responded with a result code indicating an error condition.
    #[error("Server error: {}", .0.into_string())]
    ServerError(ResultCode),

    /// Executing a user-defined function resulted in an error.
    #[error("UDF error: {0}")]
    UdfBadResponse(String),

    /// A command timed out before it could be completed.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The command was canceled by the caller.
    #[error("Command canceled")]
    Canceled,

    /// Terminal command failure, annotated by the retry loop.
    #[error(
        "Command failed after {iterations} attempt(s), last node {node:?}, in doubt: {in_doubt}: {source}"
    )]
    Exhausted {
        #[source]
        source: Box<Error>,
        node: Option<String>,
        iterations: usize,
        in_doubt: bool,
    },

    /// A multi-record transaction commit or abort failed part-way.
    #[error(transparent)]
    Commit(#[from] Box<CommitError>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid UTF-8 content: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("Error parsing integer: {0}")]
    ParseInt(#[from] std::num::ParseIntError),

    #[error("Error parsing address: {0}")]
    ParseAddr(#[from] std::net::AddrParseError),

    #[error("Error decoding Base64 value: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl Error {
    /// Whether the retry machine may re-attempt the command on this error.
    ///
    /// Server timeouts and device overload retry so another replica gets a
    /// chance; routing and socket failures retry on a re-selected node.
    pub(crate) fn should_retry(&self) -> bool {
        match self {
            Error::InvalidNode(_)
            | Error::Backoff(_)
            | Error::Connection(_)
            | Error::NoMoreConnections
            | Error::Timeout(_)
            | Error::Io(_) => true,
            Error::ServerError(rc) => {
                matches!(rc, ResultCode::Timeout | ResultCode::DeviceOverload)
            }
            _ => false,
        }
    }

    /// Whether the error carries a definitive server verdict. A rejected
    /// write (generation mismatch, parameter error) is known not to have
    /// been applied; timeouts and overload leave the outcome open.
    pub(crate) fn confirms_outcome(&self) -> bool {
        match self {
            Error::ServerError(rc) => {
                !matches!(rc, ResultCode::Timeout | ResultCode::DeviceOverload)
            }
            Error::UdfBadResponse(_) => true,
            _ => false,
        }
    }

    /// True when the failure left the server-side outcome of a write unknown.
    pub fn in_doubt(&self) -> bool {
        match self {
            Error::Exhausted { in_doubt, .. } => *in_doubt,
            _ => false,
        }
    }

    /// Wrap a terminal failure with the retry loop's bookkeeping.
    pub(crate) fn annotate(
        self,
        node: Option<&Arc<Node>>,
        iterations: usize,
        in_doubt: bool,
    ) -> Error {
        match self {
            // Already annotated by an inner driver (split-retry children).
            err @ Error::Exhausted { .. } => err,
            err => Error::Exhausted {
                source: Box::new(err),
                node: node.map(|n| n.name().to_owned()),
                iterations,
                in_doubt,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Error;
    use crate::ResultCode;

    #[test]
    fn retriability() {
        assert!(Error::Connection("broken pipe".into()).should_retry());
        assert!(Error::InvalidNode("no master".into()).should_retry());
        assert!(Error::Backoff("bb9".into()).should_retry());
        assert!(Error::Timeout("socket".into()).should_retry());
        assert!(Error::ServerError(ResultCode::Timeout).should_retry());
        assert!(Error::ServerError(ResultCode::DeviceOverload).should_retry());

        assert!(!Error::ServerError(ResultCode::KeyNotFoundError).should_retry());
        assert!(!Error::ServerError(ResultCode::GenerationError).should_retry());
        assert!(!Error::ServerError(ResultCode::FilteredOut).should_retry());
        assert!(!Error::BadResponse("trailing garbage".into()).should_retry());
        assert!(!Error::InvalidArgument("bin name too long".into()).should_retry());
        assert!(!Error::Canceled.should_retry());
    }

    #[test]
    fn annotate_marks_in_doubt() {
        let err = Error::Connection("reset".into()).annotate(None, 3, true);
        assert!(err.in_doubt());
        match err {
            Error::Exhausted {
                iterations,
                in_doubt,
                node,
                ..
            } => {
                assert_eq!(iterations, 3);
                assert!(in_doubt);
                assert!(node.is_none());
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn annotate_is_idempotent() {
        let once = Error::Timeout("socket".into()).annotate(None, 1, false);
        let twice = once.annotate(None, 9, true);
        match twice {
            Error::Exhausted { iterations, .. } => assert_eq!(iterations, 1),
            other => panic!("unexpected error: {}", other),
        }
    }
}
