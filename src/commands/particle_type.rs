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

use crate::errors::{Error, Result};

/// On-wire type tags for bin values. The values align with the server-side
/// particle definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms, missing_docs)]
pub enum ParticleType {
    NULL = 0,
    INTEGER = 1,
    FLOAT = 2,
    STRING = 3,
    BLOB = 4,
    DIGEST = 6,
    BOOL = 17,
    HLL = 18,
    MAP = 19,
    LIST = 20,
    GEOJSON = 23,
}

impl ParticleType {
    pub(crate) fn try_from(val: u8) -> Result<ParticleType> {
        match val {
            0 => Ok(ParticleType::NULL),
            1 => Ok(ParticleType::INTEGER),
            2 => Ok(ParticleType::FLOAT),
            3 => Ok(ParticleType::STRING),
            4 => Ok(ParticleType::BLOB),
            6 => Ok(ParticleType::DIGEST),
            17 => Ok(ParticleType::BOOL),
            18 => Ok(ParticleType::HLL),
            19 => Ok(ParticleType::MAP),
            20 => Ok(ParticleType::LIST),
            23 => Ok(ParticleType::GEOJSON),
            _ => Err(Error::BadResponse(format!(
                "Unrecognized particle type: {}",
                val
            ))),
        }
    }
}
