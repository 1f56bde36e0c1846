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

//! Filter expressions attached to commands through their policies. When the
//! expression evaluates to false for a record, the operation is not applied
//! and the record reports `FilteredOut`.
//!
//! ```rust
//! use firefly::expressions::*;
//! // "visits" bin greater than 100, and key stored with the record
//! let filter = and(vec![gt(int_bin("visits".into()), int_val(100)), key_exists()]);
//! ```

use crate::commands::buffer::Buffer;
use crate::msgpack::encoder::{pack_array_begin, pack_integer, pack_raw_string, pack_value};
use crate::Value;

/// Expression data types for usage in some `FilterExpression`s.
#[derive(Debug, Clone, Copy)]
#[allow(missing_docs)]
pub enum ExpType {
    NIL = 0,
    BOOL = 1,
    INT = 2,
    STRING = 3,
    LIST = 4,
    MAP = 5,
    BLOB = 6,
    FLOAT = 7,
    GEO = 8,
    HLL = 9,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[doc(hidden)]
pub enum ExpOp {
    EQ = 1,
    NE = 2,
    GT = 3,
    GE = 4,
    LT = 5,
    LE = 6,
    And = 16,
    Or = 17,
    Not = 18,
    DigestModulo = 64,
    LastUpdate = 66,
    SinceUpdate = 67,
    VoidTime = 68,
    TTL = 69,
    SetName = 70,
    KeyExists = 71,
    Key = 80,
    Bin = 81,
}

/// Filter expression, which can be applied to most commands, to control
/// which records are affected by the command.
#[derive(Debug, Clone)]
pub struct FilterExpression {
    /// The operation code; a plain value when absent.
    cmd: Option<ExpOp>,
    /// The primary value of the operation.
    val: Option<Value>,
    /// The expression type for accessor operations (`Bin`, `Key`).
    module: Option<ExpType>,
    /// Sub-expressions.
    exps: Option<Vec<FilterExpression>>,
}

impl FilterExpression {
    fn new(
        cmd: Option<ExpOp>,
        val: Option<Value>,
        module: Option<ExpType>,
        exps: Option<Vec<FilterExpression>>,
    ) -> FilterExpression {
        FilterExpression {
            cmd,
            val,
            module,
            exps,
        }
    }

    #[doc(hidden)]
    pub fn pack(&self, buf: &mut Option<&mut Buffer>) -> usize {
        let mut size = 0;
        match self.cmd {
            None => {
                // Literal value.
                size += pack_value(buf, self.val.as_ref().unwrap_or(&Value::Nil));
            }
            Some(
                op
                @
                (ExpOp::And
                | ExpOp::Or
                | ExpOp::Not
                | ExpOp::EQ
                | ExpOp::NE
                | ExpOp::GT
                | ExpOp::GE
                | ExpOp::LT
                | ExpOp::LE),
            ) => {
                let exps = self.exps.as_ref().map_or(&[][..], Vec::as_slice);
                size += pack_array_begin(buf, exps.len() + 1);
                size += pack_integer(buf, op as i64);
                for exp in exps {
                    size += exp.pack(buf);
                }
            }
            Some(ExpOp::Bin) => {
                size += pack_array_begin(buf, 3);
                size += pack_integer(buf, ExpOp::Bin as i64);
                size += pack_integer(buf, self.module.map_or(0, |m| m as i64));
                size += pack_raw_string(
                    buf,
                    &self
                        .val
                        .as_ref()
                        .map_or_else(String::new, ToString::to_string),
                );
            }
            Some(ExpOp::Key) => {
                size += pack_array_begin(buf, 2);
                size += pack_integer(buf, ExpOp::Key as i64);
                size += pack_integer(buf, self.module.map_or(0, |m| m as i64));
            }
            Some(ExpOp::DigestModulo) => {
                size += pack_array_begin(buf, 2);
                size += pack_integer(buf, ExpOp::DigestModulo as i64);
                size += pack_value(buf, self.val.as_ref().unwrap_or(&Value::Nil));
            }
            Some(op) => {
                // Metadata accessors take no arguments.
                size += pack_array_begin(buf, 1);
                size += pack_integer(buf, op as i64);
            }
        }
        size
    }

    #[doc(hidden)]
    pub fn size(&self) -> usize {
        self.pack(&mut None)
    }
}

/// Create an equality comparison expression.
pub fn eq(left: FilterExpression, right: FilterExpression) -> FilterExpression {
    FilterExpression::new(Some(ExpOp::EQ), None, None, Some(vec![left, right]))
}

/// Create an inequality comparison expression.
pub fn ne(left: FilterExpression, right: FilterExpression) -> FilterExpression {
    FilterExpression::new(Some(ExpOp::NE), None, None, Some(vec![left, right]))
}

/// Create a greater-than comparison expression.
pub fn gt(left: FilterExpression, right: FilterExpression) -> FilterExpression {
    FilterExpression::new(Some(ExpOp::GT), None, None, Some(vec![left, right]))
}

/// Create a greater-than-or-equal comparison expression.
pub fn ge(left: FilterExpression, right: FilterExpression) -> FilterExpression {
    FilterExpression::new(Some(ExpOp::GE), None, None, Some(vec![left, right]))
}

/// Create a less-than comparison expression.
pub fn lt(left: FilterExpression, right: FilterExpression) -> FilterExpression {
    FilterExpression::new(Some(ExpOp::LT), None, None, Some(vec![left, right]))
}

/// Create a less-than-or-equal comparison expression.
pub fn le(left: FilterExpression, right: FilterExpression) -> FilterExpression {
    FilterExpression::new(Some(ExpOp::LE), None, None, Some(vec![left, right]))
}

/// Create an "and" operator that applies to a list of expressions.
pub fn and(exps: Vec<FilterExpression>) -> FilterExpression {
    FilterExpression::new(Some(ExpOp::And), None, None, Some(exps))
}

/// Create an "or" operator that applies to a list of expressions.
pub fn or(exps: Vec<FilterExpression>) -> FilterExpression {
    FilterExpression::new(Some(ExpOp::Or), None, None, Some(exps))
}

/// Create a "not" operator expression.
pub fn not(exp: FilterExpression) -> FilterExpression {
    FilterExpression::new(Some(ExpOp::Not), None, None, Some(vec![exp]))
}

/// Create a 64-bit integer bin accessor.
pub fn int_bin(name: String) -> FilterExpression {
    FilterExpression::new(
        Some(ExpOp::Bin),
        Some(Value::from(name)),
        Some(ExpType::INT),
        None,
    )
}

/// Create a string bin accessor.
pub fn string_bin(name: String) -> FilterExpression {
    FilterExpression::new(
        Some(ExpOp::Bin),
        Some(Value::from(name)),
        Some(ExpType::STRING),
        None,
    )
}

/// Create a blob bin accessor.
pub fn blob_bin(name: String) -> FilterExpression {
    FilterExpression::new(
        Some(ExpOp::Bin),
        Some(Value::from(name)),
        Some(ExpType::BLOB),
        None,
    )
}

/// Create a 64-bit float bin accessor.
pub fn float_bin(name: String) -> FilterExpression {
    FilterExpression::new(
        Some(ExpOp::Bin),
        Some(Value::from(name)),
        Some(ExpType::FLOAT),
        None,
    )
}

/// Create a boolean bin accessor.
pub fn bool_bin(name: String) -> FilterExpression {
    FilterExpression::new(
        Some(ExpOp::Bin),
        Some(Value::from(name)),
        Some(ExpType::BOOL),
        None,
    )
}

/// Create an expression that returns the record's user key as the given type.
pub fn key(exp_type: ExpType) -> FilterExpression {
    FilterExpression::new(Some(ExpOp::Key), None, Some(exp_type), None)
}

/// Create an expression that returns whether the user key was stored with
/// the record.
pub fn key_exists() -> FilterExpression {
    FilterExpression::new(Some(ExpOp::KeyExists), None, None, None)
}

/// Create an expression that returns the record's set name.
pub fn set_name() -> FilterExpression {
    FilterExpression::new(Some(ExpOp::SetName), None, None, None)
}

/// Create an expression that returns the record's last-update time as
/// nanoseconds since the epoch.
pub fn last_update() -> FilterExpression {
    FilterExpression::new(Some(ExpOp::LastUpdate), None, None, None)
}

/// Create an expression that returns the milliseconds since the record was
/// last updated.
pub fn since_update() -> FilterExpression {
    FilterExpression::new(Some(ExpOp::SinceUpdate), None, None, None)
}

/// Create an expression that returns the record's void time (absolute expiry)
/// in nanoseconds since the epoch.
pub fn void_time() -> FilterExpression {
    FilterExpression::new(Some(ExpOp::VoidTime), None, None, None)
}

/// Create an expression that returns the record's remaining time-to-live in
/// seconds.
pub fn ttl() -> FilterExpression {
    FilterExpression::new(Some(ExpOp::TTL), None, None, None)
}

/// Create an expression that returns the record digest modulo as an integer.
pub fn digest_modulo(modulo: i64) -> FilterExpression {
    FilterExpression::new(Some(ExpOp::DigestModulo), Some(Value::from(modulo)), None, None)
}

/// Create a 64-bit integer literal.
pub fn int_val(val: i64) -> FilterExpression {
    FilterExpression::new(None, Some(Value::from(val)), None, None)
}

/// Create a string literal.
pub fn string_val(val: String) -> FilterExpression {
    FilterExpression::new(None, Some(Value::from(val)), None, None)
}

/// Create a 64-bit float literal.
pub fn float_val(val: f64) -> FilterExpression {
    FilterExpression::new(None, Some(Value::from(val)), None, None)
}

/// Create a blob literal.
pub fn blob_val(val: Vec<u8>) -> FilterExpression {
    FilterExpression::new(None, Some(Value::from(val)), None, None)
}

/// Create a boolean literal.
pub fn bool_val(val: bool) -> FilterExpression {
    FilterExpression::new(None, Some(Value::from(val)), None, None)
}

/// Create a nil literal.
pub fn nil() -> FilterExpression {
    FilterExpression::new(None, Some(Value::Nil), None, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::buffer::Buffer;

    fn packed(exp: &FilterExpression) -> Vec<u8> {
        let size = exp.size();
        let mut buf = Buffer::new(1 << 20);
        buf.resize_buffer(size).unwrap();
        buf.reset_offset();
        let written = exp.pack(&mut Some(&mut buf));
        assert_eq!(size, written);
        buf.data_buffer
    }

    #[test]
    fn pack_comparison() {
        let exp = eq(int_bin("a".into()), int_val(7));
        let bytes = packed(&exp);
        // [EQ, [BIN, INT, "a"], 7]
        assert_eq!(
            bytes,
            vec![
                0x93, // array(3)
                0x01, // EQ
                0x93, // array(3)
                0x51, // BIN (81)
                0x02, // INT
                0xa1, b'a', // raw string "a"
                0x07, // literal 7
            ]
        );
    }

    #[test]
    fn pack_logical() {
        let exp = and(vec![key_exists(), not(ttl())]);
        let bytes = packed(&exp);
        assert_eq!(
            bytes,
            vec![
                0x93, // array(3)
                0x10, // AND (16)
                0x91, 0x47, // [KEY_EXISTS]
                0x92, 0x12, // [NOT, ...]
                0x91, 0x45, // [TTL]
            ]
        );
    }

    #[test]
    fn size_matches_pack() {
        let exp = or(vec![
            ge(float_bin("f".into()), float_val(1.5)),
            eq(string_bin("s".into()), string_val("x".into())),
        ]);
        let _ = packed(&exp); // asserts size == written
    }
}
