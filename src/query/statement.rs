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
use crate::query::Filter;
use crate::Bins;

/// Query statement parameters.
#[derive(Debug, Clone)]
pub struct Statement {
    /// Namespace
    pub namespace: String,

    /// Set name
    pub set_name: String,

    /// Optional index name
    pub index_name: Option<String>,

    /// Optional list of bin names to return in query.
    pub bins: Bins,

    /// Optional index filter. The server supports a single filter per
    /// query; when absent the query turns into a full scan of the set.
    pub filters: Option<Vec<Filter>>,
}

impl Statement {
    /// Create a new query statement with the given namespace, set name and
    /// bin selection.
    pub fn new(namespace: &str, set_name: &str, bins: Bins) -> Self {
        Statement {
            namespace: namespace.to_owned(),
            set_name: set_name.to_owned(),
            bins,
            index_name: None,
            filters: None,
        }
    }

    /// Add a query filter.
    pub fn add_filter(&mut self, filter: Filter) {
        match self.filters {
            Some(ref mut filters) => {
                filters.push(filter);
            }
            None => {
                self.filters = Some(vec![filter]);
            }
        }
    }

    /// Set the optional index name.
    pub fn set_index_name(&mut self, index_name: &str) {
        self.index_name = Some(index_name.to_owned());
    }

    /// Returns true when the statement has no index filter and therefore
    /// scans the whole set.
    pub fn is_scan(&self) -> bool {
        self.filters.as_ref().map_or(true, Vec::is_empty)
    }

    #[doc(hidden)]
    pub fn validate(&self) -> Result<()> {
        if let Some(ref filters) = self.filters {
            if filters.len() > 1 {
                return Err(Error::InvalidArgument(
                    "Too many filter expressions; the server supports a single query filter"
                        .to_string(),
                ));
            }
        }

        if self.set_name.is_empty() {
            return Err(Error::InvalidArgument("Empty set name".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Statement;
    use crate::query::Filter;
    use crate::Bins;

    #[test]
    fn scan_vs_query() {
        let mut stmt = Statement::new("test", "s", Bins::All);
        assert!(stmt.is_scan());

        stmt.add_filter(Filter::equal("a", crate::Value::from(1)));
        assert!(!stmt.is_scan());
        assert!(stmt.validate().is_ok());

        stmt.add_filter(Filter::equal("b", crate::Value::from(2)));
        assert!(stmt.validate().is_err());
    }
}
