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

//! Policy types encapsulate optional parameters for various client operations.
#![allow(clippy::missing_errors_doc)]

mod batch_policy;
mod client_policy;
mod commit_level;
mod concurrency;
mod expiration;
mod generation_policy;
mod query_duration;
mod query_policy;
mod read_mode;
mod read_policy;
mod record_exists_action;
mod replica;
mod scan_policy;
mod write_policy;

pub use self::batch_policy::BatchPolicy;
pub use self::client_policy::ClientPolicy;
pub use self::commit_level::CommitLevel;
pub use self::concurrency::Concurrency;
pub use self::expiration::Expiration;
pub use self::generation_policy::GenerationPolicy;
pub use self::query_duration::QueryDuration;
pub use self::query_policy::QueryPolicy;
pub use self::read_mode::{ReadModeAP, ReadModeSC};
pub use self::read_policy::ReadPolicy;
pub use self::record_exists_action::RecordExistsAction;
pub use self::replica::Replica;
pub use self::scan_policy::ScanPolicy;
pub use self::write_policy::WritePolicy;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::expressions::FilterExpression;
use crate::txn::Txn;

/// Trait implemented by most policy types; policies that implement this trait typically encompass
/// an instance of `BasePolicy`.
pub trait Policy {
    #[doc(hidden)]
    /// Deadline for the current command based on the total timeout.
    fn deadline(&self) -> Option<Instant>;

    /// Total command timeout for both client and server. The timeout is tracked on the client
    /// and also sent to the server along with the command in the wire protocol. The client
    /// will most likely timeout first, but the server also has the capability to timeout the
    /// command.
    fn timeout(&self) -> Option<Duration>;

    /// Maximum time any single network read or write may take. Shortened to
    /// the remaining total timeout when that is closer.
    fn socket_timeout(&self) -> Option<Duration>;

    /// Maximum number of retries before aborting the current command. A retry may be attempted
    /// when there is a network error or a retriable server error. If `max_retries` is exceeded,
    /// the abort will occur even if the timeout has not yet been exceeded.
    fn max_retries(&self) -> Option<usize>;

    /// Time to sleep between retries. Set to zero to skip sleep.
    fn sleep_between_retries(&self) -> Option<Duration>;

    /// How long a timed-out connection may keep draining its late response
    /// in the background before being closed.
    fn timeout_delay(&self) -> Option<Duration>;

    /// Algorithm used to determine the target node for a command.
    fn replica(&self) -> Replica;

    /// Whether large request frames are deflated before transmission.
    fn use_compression(&self) -> bool;
}

#[doc(hidden)]
/// Policy-like object that encapsulates a base policy instance.
pub trait PolicyLike {
    /// Retrieve a reference to the base policy.
    fn base(&self) -> &BasePolicy;
}

impl<T> Policy for T
where
    T: PolicyLike,
{
    fn deadline(&self) -> Option<Instant> {
        self.base().deadline()
    }

    fn timeout(&self) -> Option<Duration> {
        self.base().timeout()
    }

    fn socket_timeout(&self) -> Option<Duration> {
        self.base().socket_timeout()
    }

    fn max_retries(&self) -> Option<usize> {
        self.base().max_retries()
    }

    fn sleep_between_retries(&self) -> Option<Duration> {
        self.base().sleep_between_retries()
    }

    fn timeout_delay(&self) -> Option<Duration> {
        self.base().timeout_delay()
    }

    fn replica(&self) -> Replica {
        self.base().replica()
    }

    fn use_compression(&self) -> bool {
        self.base().use_compression()
    }
}

/// Common parameters shared by all policy types.
#[derive(Debug, Clone)]
pub struct BasePolicy {
    /// How duplicates should be consulted in a read operation in AP
    /// namespaces.
    pub read_mode_ap: ReadModeAP,

    /// Read consistency under strong-consistency namespaces.
    pub read_mode_sc: ReadModeSC,

    /// Total timeout for the whole command including retries.
    /// Default: 1s. `None` means no total timeout.
    pub total_timeout: Option<Duration>,

    /// Bound for any single network read or write.
    /// Default: 30s.
    pub socket_timeout: Option<Duration>,

    /// Maximum number of retries before aborting the current command.
    pub max_retries: Option<usize>,

    /// Duration to sleep between retries. Enter zero to skip sleep.
    pub sleep_between_retries: Option<Duration>,

    /// When a socket read times out and `timeout_delay` is set, the
    /// connection is handed to a background task that keeps draining the
    /// late response for up to this long, so the socket can be pooled again
    /// instead of closed.
    pub timeout_delay: Option<Duration>,

    /// Algorithm used to determine the target node for the command.
    pub replica: Replica,

    /// Deflate request frames larger than the compression threshold and ask
    /// the server to compress its responses.
    pub use_compression: bool,

    /// Optional filter expression.
    pub filter_expression: Option<FilterExpression>,

    /// Multi-record transaction this command participates in.
    pub txn: Option<Arc<Txn>>,
}

impl BasePolicy {
    /// Get the current filter expression.
    pub const fn filter_expression(&self) -> Option<&FilterExpression> {
        self.filter_expression.as_ref()
    }
}

impl Default for BasePolicy {
    fn default() -> Self {
        BasePolicy {
            read_mode_ap: ReadModeAP::default(),
            read_mode_sc: ReadModeSC::default(),
            total_timeout: Some(Duration::from_secs(1)),
            socket_timeout: Some(Duration::from_secs(30)),
            max_retries: Some(2),
            sleep_between_retries: Some(Duration::from_millis(500)),
            timeout_delay: None,
            replica: Replica::default(),
            use_compression: false,
            filter_expression: None,
            txn: None,
        }
    }
}

impl Policy for BasePolicy {
    fn deadline(&self) -> Option<Instant> {
        self.total_timeout.map(|timeout| Instant::now() + timeout)
    }

    fn timeout(&self) -> Option<Duration> {
        self.total_timeout
    }

    fn socket_timeout(&self) -> Option<Duration> {
        self.socket_timeout
    }

    fn max_retries(&self) -> Option<usize> {
        self.max_retries
    }

    fn sleep_between_retries(&self) -> Option<Duration> {
        self.sleep_between_retries
    }

    fn timeout_delay(&self) -> Option<Duration> {
        self.timeout_delay
    }

    fn replica(&self) -> Replica {
        self.replica
    }

    fn use_compression(&self) -> bool {
        self.use_compression
    }
}
