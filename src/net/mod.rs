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

mod connection;
mod connection_pool;
mod host;
mod parser;

pub use self::connection::Connection;
pub(crate) use self::connection_pool::{ConnectionPool, DetachedQueue};
pub use self::connection_pool::PooledConnection;
pub use self::host::{Host, ToHosts};
