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
use crate::Value;

/// Secondary-index filter definition. Currently, only one filter is allowed
/// in a query statement.
#[derive(Debug, Clone)]
pub struct Filter {
    bin_name: String,
    particle_type: ParticleType,
    begin: Value,
    end: Value,
}

impl Filter {
    /// Create an equality filter for queries; supports integer and string
    /// values.
    pub fn equal(bin_name: &str, value: Value) -> Self {
        let particle_type = value.particle_type();
        Filter {
            bin_name: bin_name.to_owned(),
            particle_type,
            begin: value.clone(),
            end: value,
        }
    }

    /// Create a range filter for queries; supports integer values.
    pub fn range(bin_name: &str, begin: Value, end: Value) -> Self {
        let particle_type = begin.particle_type();
        Filter {
            bin_name: bin_name.to_owned(),
            particle_type,
            begin,
            end,
        }
    }

    // On-wire size inside the INDEX_RANGE field, excluding the count byte.
    #[doc(hidden)]
    pub fn estimate_size(&self) -> usize {
        1 + self.bin_name.len() + 1 + 4 + self.begin.estimate_size() + 4 + self.end.estimate_size()
    }

    #[doc(hidden)]
    pub fn write(&self, buf: &mut Buffer) {
        buf.write_u8(self.bin_name.len() as u8);
        buf.write_str(&self.bin_name);
        buf.write_u8(self.particle_type as u8);

        buf.write_u32(self.begin.estimate_size() as u32);
        self.begin.write_to(buf);

        buf.write_u32(self.end.estimate_size() as u32);
        self.end.write_to(buf);
    }
}
