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

use std::convert::From;

use crate::Value;

/// Container object for a record bin, comprising a name and a value.
#[derive(Debug, Clone)]
pub struct Bin<'a> {
    /// Bin name. Restricted to 15 bytes on the wire.
    pub name: &'a str,

    /// Bin value.
    pub value: Value,
}

impl<'a> Bin<'a> {
    /// Construct a new bin given a name and a value.
    pub const fn new(name: &'a str, val: Value) -> Self {
        Bin { name, value: val }
    }
}

/// Construct a new bin from a name and an optional value (defaults to the
/// empty value `nil`).
#[macro_export]
macro_rules! as_bin {
    ($bin_name:expr) => {{
        $crate::Bin::new($bin_name, $crate::Value::Nil)
    }};
    ($bin_name:expr, $val:expr) => {{
        $crate::Bin::new($bin_name, $crate::Value::from($val))
    }};
}

/// Specify which bins are to be returned with a record read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bins {
    /// Read all bins.
    All,

    /// Read only record meta data (generation, expiration), no bin data.
    None,

    /// Read only the bins listed here.
    Some(Vec<String>),
}

impl Bins {
    /// Returns `true` if the bins selector is a `Bins::None` value.
    pub const fn is_none(&self) -> bool {
        matches!(*self, Bins::None)
    }

    /// Returns `true` if the bins selector is a `Bins::All` value.
    pub const fn is_all(&self) -> bool {
        matches!(*self, Bins::All)
    }
}

impl<'a> From<&'a [&'a str]> for Bins {
    fn from(bins: &'a [&'a str]) -> Self {
        let bins = bins.iter().cloned().map(String::from).collect();
        Bins::Some(bins)
    }
}

impl<'a> From<[&'a str; 1]> for Bins {
    fn from(bins: [&'a str; 1]) -> Self {
        let bins = bins.iter().cloned().map(String::from).collect();
        Bins::Some(bins)
    }
}

impl<'a> From<[&'a str; 2]> for Bins {
    fn from(bins: [&'a str; 2]) -> Self {
        let bins = bins.iter().cloned().map(String::from).collect();
        Bins::Some(bins)
    }
}

impl<'a> From<[&'a str; 3]> for Bins {
    fn from(bins: [&'a str; 3]) -> Self {
        let bins = bins.iter().cloned().map(String::from).collect();
        Bins::Some(bins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_bins() {
        let bin_names = vec![String::from("a"), String::from("b"), String::from("c")];
        let expected = Bins::Some(bin_names);

        assert_eq!(expected, Bins::from(["a", "b", "c"]));
    }
}
