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

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::needless_pass_by_value,
    clippy::similar_names,
    clippy::too_many_lines,
    clippy::missing_errors_doc
)]

//! A pure-Rust client for the Firefly distributed key-value database.
//!
//! Firefly is a partitioned, replicated, in-memory key-value store. Records
//! are addressed by a 20-byte digest computed from the set name and the user
//! key; the client maintains a local partition map per namespace and routes
//! every request directly to a node that owns the record's partition.
//!
//! # Example
//!
//! ```rust,no_run
//! use firefly::{as_bin, as_key, Bins, Client, ClientPolicy, ReadPolicy, WritePolicy};
//!
//! #[tokio::main]
//! async fn main() {
//!     let hosts = std::env::var("FIREFLY_HOSTS").unwrap_or_else(|_| "127.0.0.1:3000".into());
//!     let client = Client::new(&ClientPolicy::default(), &hosts)
//!         .await
//!         .expect("Failed to connect to cluster");
//!
//!     let key = as_key!("test", "demo", "user-1");
//!     let bins = [as_bin!("visits", 1), as_bin!("name", "Ada")];
//!     client.put(&WritePolicy::default(), &key, &bins).await.unwrap();
//!
//!     let record = client.get(&ReadPolicy::default(), &key, Bins::All).await.unwrap();
//!     match record {
//!         Some(record) => println!("{}", record),
//!         None => println!("no such record"),
//!     }
//!
//!     client.close().await.unwrap();
//! }
//! ```

pub use crate::batch::{
    BatchDeletePolicy, BatchOperation, BatchReadPolicy, BatchRecord, BatchUdfPolicy,
    BatchWritePolicy,
};
pub use crate::bin::{Bin, Bins};
pub use crate::client::Client;
pub use crate::cluster::Node;
pub use crate::commands::particle_type::ParticleType;
pub use crate::errors::{Error, Result};
pub use crate::key::Key;
pub use crate::net::{Host, ToHosts};
pub use crate::policy::{
    BasePolicy, BatchPolicy, ClientPolicy, CommitLevel, Concurrency, Expiration, GenerationPolicy,
    Policy, QueryPolicy, ReadModeAP, ReadModeSC, ReadPolicy, RecordExistsAction, Replica,
    ScanPolicy, WritePolicy,
};
pub use crate::query::{Recordset, Statement};
pub use crate::record::{Record, RecordVersion};
pub use crate::result_code::ResultCode;
pub use crate::txn::{AbortStatus, CommitError, CommitStatus, Txn, TxnState};
pub use crate::value::{FloatValue, Value};

pub mod errors;
#[macro_use]
mod value;
#[macro_use]
mod bin;
#[macro_use]
mod key;
mod batch;
mod client;
mod cluster;
mod commands;
pub mod expressions;
mod msgpack;
mod net;
pub mod operations;
pub mod policy;
pub mod query;
mod record;
mod result_code;
mod txn;

#[cfg(test)]
extern crate hex;
