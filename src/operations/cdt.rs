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

use crate::commands::buffer::Buffer;
use crate::commands::ParticleType;
use crate::msgpack::encoder;
use crate::operations::cdt_context::CdtContext;
use crate::Value;

// Argument of a collection operation, packed after the op code.
#[derive(Debug)]
pub enum CdtArgument<'a> {
    Byte(u8),
    Int(i64),
    Value(&'a Value),
    List(&'a [Value]),
    Bool(bool),
}

// A collection (CDT) operation: sub-op code plus packed arguments,
// transported as a blob particle.
#[derive(Debug)]
pub struct CdtOperation<'a> {
    pub op: u8,
    pub args: Vec<CdtArgument<'a>>,
}

impl<'a> CdtOperation<'a> {
    pub const fn particle_type(&self) -> ParticleType {
        ParticleType::BLOB
    }

    pub fn estimate_size(&self, ctx: &[CdtContext]) -> usize {
        encoder::pack_cdt_op(&mut None, self, ctx)
    }

    pub fn write_to(&self, buf: &mut Buffer, ctx: &[CdtContext]) -> usize {
        encoder::pack_cdt_op(&mut Some(buf), self, ctx)
    }
}
