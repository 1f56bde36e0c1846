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

//! Multi-record transactions built on single-record server primitives.
//!
//! A transaction tracks the versions of records it read and the keys it
//! wrote under a client-generated transaction id. Committing verifies the
//! read versions, writes a durable monitor record, rolls the provisional
//! writes forward and deletes the monitor; aborting rolls the writes back
//! instead. Every phase failure is reported through [`CommitError`] so the
//! caller can reason about partial durability.

pub(crate) mod roll;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use rand::Rng;

use crate::errors::{Error, Result};
use crate::record::RecordVersion;
use crate::Key;

/// Server-side set holding transaction monitor records.
pub(crate) const TXN_MONITOR_SET: &str = "<tx-monitor";

/// State of a multi-record transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    /// The transaction accepts reads and writes.
    Open,
    /// Verify succeeded; roll-forward is in progress.
    Verified,
    /// The transaction was durably committed.
    Committed,
    /// The transaction was rolled back.
    Aborted,
}

/// Terminal disposition of a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStatus {
    /// All phases completed; the writes are durable.
    Ok,
    /// The transaction had already been committed.
    AlreadyCommitted,
}

/// Terminal disposition of an abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortStatus {
    /// The provisional writes were rolled back.
    Ok,
    /// The transaction had already been aborted.
    AlreadyAborted,
}

/// Categorized commit/abort failures. The variants encode how far the
/// envelope got, so the caller can reason about what is durable.
#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    /// A read version no longer matched; the transaction was aborted.
    #[error("Transaction verify failed; the transaction was aborted: {source}")]
    VerifyFail {
        #[source]
        source: Box<Error>,
    },

    /// Verify failed and the roll-back of provisional writes also failed.
    #[error("Transaction verify failed and the abort was abandoned: {source}")]
    VerifyFailAbortAbandoned {
        #[source]
        source: Box<Error>,
    },

    /// Verify failed, the writes were rolled back, but the monitor record
    /// could not be deleted.
    #[error("Transaction verify failed and the monitor close was abandoned: {source}")]
    VerifyFailCloseAbandoned {
        #[source]
        source: Box<Error>,
    },

    /// The monitor record could not be written; no roll-forward was issued.
    #[error("Transaction mark-roll-forward was abandoned: {source}")]
    MarkRollForwardAbandoned {
        #[source]
        source: Box<Error>,
    },

    /// The monitor exists but some writes could not be rolled forward. The
    /// server will complete the roll-forward when it encounters the monitor.
    #[error("Transaction roll-forward was abandoned: {source}")]
    RollForwardAbandoned {
        #[source]
        source: Box<Error>,
    },

    /// Some writes could not be rolled back during an abort.
    #[error("Transaction roll-back was abandoned: {source}")]
    RollBackAbandoned {
        #[source]
        source: Box<Error>,
    },

    /// All rolls completed but the monitor record could not be deleted; the
    /// outcome is durable, only the marker lingers.
    #[error("Transaction close was abandoned: {source}")]
    CloseAbandoned {
        #[source]
        source: Box<Error>,
    },
}

impl From<CommitError> for Error {
    fn from(err: CommitError) -> Error {
        Error::Commit(Box::new(err))
    }
}

/// A multi-record transaction handle. Attach it to read and write policies
/// via `BasePolicy::txn`; commit or abort it through the client.
pub struct Txn {
    id: u64,
    timeout: Duration,
    inner: Mutex<TxnInner>,
}

#[derive(Debug)]
struct TxnInner {
    reads: HashMap<Key, RecordVersion>,
    writes: HashSet<Key>,
    namespace: Option<String>,
    state: TxnState,
}

impl Txn {
    /// Create a new transaction with a random, non-zero id and the default
    /// monitor timeout of 10 seconds.
    pub fn new() -> Self {
        Txn::with_timeout(Duration::from_secs(10))
    }

    /// Create a new transaction with the given monitor timeout. The server
    /// may unilaterally roll the transaction back once the deadline derived
    /// from this timeout has passed.
    pub fn with_timeout(timeout: Duration) -> Self {
        let mut rng = rand::thread_rng();
        let mut id: u64 = 0;
        while id == 0 {
            id = rng.gen();
        }
        Txn {
            id,
            timeout,
            inner: Mutex::new(TxnInner {
                reads: HashMap::new(),
                writes: HashSet::new(),
                namespace: None,
                state: TxnState::Open,
            }),
        }
    }

    /// The client-generated transaction id.
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// The monitor timeout this transaction was created with.
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Current transaction state.
    pub fn state(&self) -> TxnState {
        self.inner.lock().unwrap().state
    }

    pub(crate) fn set_state(&self, state: TxnState) {
        self.inner.lock().unwrap().state = state;
    }

    /// The record version observed for a key earlier in this transaction.
    pub(crate) fn read_version(&self, key: &Key) -> Option<RecordVersion> {
        self.inner.lock().unwrap().reads.get(key).copied()
    }

    // A read observed a record version; remember it for the verify phase.
    pub(crate) fn on_read(&self, key: &Key, version: Option<RecordVersion>) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_open()?;
        inner.bind_namespace(key)?;
        if let Some(version) = version {
            inner.reads.insert(key.clone(), version);
        }
        Ok(())
    }

    // A write went through. When the server echoes a version the record is
    // only locked and stays in the read set; otherwise it becomes a
    // provisional write to roll at commit.
    pub(crate) fn on_write(&self, key: &Key, version: Option<RecordVersion>) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_open()?;
        inner.bind_namespace(key)?;
        match version {
            Some(version) => {
                inner.reads.insert(key.clone(), version);
            }
            None => {
                inner.reads.remove(key);
                inner.writes.insert(key.clone());
            }
        }
        Ok(())
    }

    pub(crate) fn reads_snapshot(&self) -> Vec<(Key, Option<RecordVersion>)> {
        let inner = self.inner.lock().unwrap();
        inner
            .reads
            .iter()
            .map(|(key, version)| (key.clone(), Some(*version)))
            .collect()
    }

    pub(crate) fn writes_snapshot(&self) -> Vec<Key> {
        let inner = self.inner.lock().unwrap();
        inner.writes.iter().cloned().collect()
    }

    pub(crate) fn namespace(&self) -> Option<String> {
        self.inner.lock().unwrap().namespace.clone()
    }

    /// The key of this transaction's monitor record.
    pub(crate) fn monitor_key(&self) -> Result<Key> {
        let namespace = self.namespace().ok_or_else(|| {
            Error::InvalidArgument("Transaction touched no records".to_string())
        })?;
        Key::new(namespace, TXN_MONITOR_SET.to_string(), (self.id as i64).into())
    }
}

impl TxnInner {
    fn check_open(&self) -> Result<()> {
        if self.state != TxnState::Open {
            return Err(Error::InvalidArgument(format!(
                "Transaction is no longer open: {:?}",
                self.state
            )));
        }
        Ok(())
    }

    // All keys of a transaction must live in one namespace; the monitor
    // record is stored there.
    fn bind_namespace(&mut self, key: &Key) -> Result<()> {
        match self.namespace {
            None => {
                self.namespace = Some(key.namespace.clone());
                Ok(())
            }
            Some(ref ns) if *ns == key.namespace => Ok(()),
            Some(ref ns) => Err(Error::InvalidArgument(format!(
                "Transaction spans namespaces: {} and {}",
                ns, key.namespace
            ))),
        }
    }
}

impl Default for Txn {
    fn default() -> Self {
        Txn::new()
    }
}

impl fmt::Debug for Txn {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("Txn")
            .field("id", &self.id)
            .field("state", &inner.state)
            .field("reads", &inner.reads.len())
            .field("writes", &inner.writes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordVersion;

    fn version(tag: u8) -> RecordVersion {
        RecordVersion::from_bytes(&[tag, 0, 0, 0, 0, 0, 1]).unwrap()
    }

    #[test]
    fn id_is_non_zero() {
        for _ in 0..64 {
            assert_ne!(Txn::new().id(), 0);
        }
    }

    #[test]
    fn read_versions_are_tracked() {
        let txn = Txn::new();
        let key = as_key!("test", "s", "k1");
        txn.on_read(&key, Some(version(1))).unwrap();
        assert_eq!(txn.read_version(&key), Some(version(1)));

        // A read without a version leaves the map untouched.
        txn.on_read(&key, None).unwrap();
        assert_eq!(txn.read_version(&key), Some(version(1)));
    }

    #[test]
    fn writes_replace_reads() {
        let txn = Txn::new();
        let key = as_key!("test", "s", "k1");
        txn.on_read(&key, Some(version(1))).unwrap();
        txn.on_write(&key, None).unwrap();

        assert_eq!(txn.read_version(&key), None);
        assert_eq!(txn.writes_snapshot(), vec![key]);
    }

    #[test]
    fn namespace_is_bound_by_first_key() {
        let txn = Txn::new();
        txn.on_read(&as_key!("a", "s", 1), Some(version(1))).unwrap();
        assert!(txn.on_write(&as_key!("b", "s", 2), None).is_err());
        assert_eq!(txn.namespace(), Some("a".to_string()));
    }

    #[test]
    fn closed_transactions_reject_operations() {
        let txn = Txn::new();
        let key = as_key!("test", "s", "k1");
        txn.set_state(TxnState::Committed);
        assert!(txn.on_read(&key, Some(version(1))).is_err());
        assert!(txn.on_write(&key, None).is_err());
    }

    #[test]
    fn monitor_key_lives_in_bound_namespace() {
        let txn = Txn::new();
        assert!(txn.monitor_key().is_err());

        txn.on_write(&as_key!("test", "s", 1), None).unwrap();
        let monitor = txn.monitor_key().unwrap();
        assert_eq!(monitor.namespace, "test");
        assert_eq!(monitor.set_name, TXN_MONITOR_SET);
    }
}
