//! Translation result types.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// The queries produced for one rule, keyed by target position.
///
/// Positions follow target order, but consumers should treat the result as
/// a set of queries rather than rely on that order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct QueryResult {
    queries: BTreeMap<usize, String>,
}

impl QueryResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a query and return its position.
    pub fn push(&mut self, query: String) -> usize {
        let index = self.queries.len();
        self.queries.insert(index, query);
        index
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.queries.get(&index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.queries.iter().map(|(i, q)| (*i, q.as_str()))
    }

    /// The query texts without their positions.
    pub fn queries(&self) -> impl Iterator<Item = &str> {
        self.queries.values().map(String::as_str)
    }

    pub fn into_inner(self) -> BTreeMap<usize, String> {
        self.queries
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (n, query) in self.queries().enumerate() {
            if n > 0 {
                f.write_str("\n")?;
            }
            f.write_str(query)?;
        }
        Ok(())
    }
}
