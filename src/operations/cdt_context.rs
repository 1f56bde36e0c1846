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

//! Nesting context for operations on sub-elements of lists and maps.

use crate::Value;

#[doc(hidden)]
pub const DEFAULT_CTX: &[CdtContext] = &[];

const CTX_TYPE_LIST_INDEX: u8 = 0x10;
const CTX_TYPE_LIST_RANK: u8 = 0x11;
const CTX_TYPE_LIST_VALUE: u8 = 0x13;
const CTX_TYPE_MAP_INDEX: u8 = 0x20;
const CTX_TYPE_MAP_RANK: u8 = 0x21;
const CTX_TYPE_MAP_KEY: u8 = 0x22;
const CTX_TYPE_MAP_VALUE: u8 = 0x23;

/// Identifies one nesting level inside a list or map bin.
#[derive(Debug, Clone)]
pub struct CdtContext {
    #[doc(hidden)]
    pub id: u8,

    #[doc(hidden)]
    pub flags: u8,

    #[doc(hidden)]
    pub value: Value,
}

/// Lookup list by index offset. Negative offsets are offset from the end
/// (-1 = last item).
pub const fn ctx_list_index(index: i64) -> CdtContext {
    CdtContext {
        id: CTX_TYPE_LIST_INDEX,
        flags: 0,
        value: Value::Int(index),
    }
}

/// Lookup list by rank. 0 = smallest value, -1 = largest value.
pub const fn ctx_list_rank(rank: i64) -> CdtContext {
    CdtContext {
        id: CTX_TYPE_LIST_RANK,
        flags: 0,
        value: Value::Int(rank),
    }
}

/// Lookup list by value.
pub const fn ctx_list_value(key: Value) -> CdtContext {
    CdtContext {
        id: CTX_TYPE_LIST_VALUE,
        flags: 0,
        value: key,
    }
}

/// Lookup map by index offset.
pub const fn ctx_map_index(key: i64) -> CdtContext {
    CdtContext {
        id: CTX_TYPE_MAP_INDEX,
        flags: 0,
        value: Value::Int(key),
    }
}

/// Lookup map by rank.
pub const fn ctx_map_rank(rank: i64) -> CdtContext {
    CdtContext {
        id: CTX_TYPE_MAP_RANK,
        flags: 0,
        value: Value::Int(rank),
    }
}

/// Lookup map by key.
pub const fn ctx_map_key(key: Value) -> CdtContext {
    CdtContext {
        id: CTX_TYPE_MAP_KEY,
        flags: 0,
        value: key,
    }
}

/// Lookup map by value.
pub const fn ctx_map_value(value: Value) -> CdtContext {
    CdtContext {
        id: CTX_TYPE_MAP_VALUE,
        flags: 0,
        value,
    }
}
