//! Column lineage atoms
//!
//! A [`ColumnResource`] names one physical base column. A [`SourceColumnSet`]
//! is the set of base columns a value is derived from; it only ever grows.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Output name used when nothing meaningful can be derived from an expression
pub const UNKNOWN_COLUMN_NAME: &str = "?column?";

/// One physical base-table column
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColumnResource {
    /// Database name
    pub database: String,

    /// Schema name
    pub schema: String,

    /// Table, view or sequence name
    pub table: String,

    /// Column name
    pub column: String,
}

impl ColumnResource {
    /// Create a new column resource
    pub fn new(
        database: impl Into<String>,
        schema: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            schema: schema.into(),
            table: table.into(),
            column: column.into(),
        }
    }

    /// The "whole database, unresolved" sentinel used on fail-open paths
    pub fn whole_database(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            schema: String::new(),
            table: String::new(),
            column: String::new(),
        }
    }

    /// Check if this is the whole-database sentinel
    pub fn is_whole_database(&self) -> bool {
        self.schema.is_empty() && self.table.is_empty() && self.column.is_empty()
    }
}

impl fmt::Display for ColumnResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_whole_database() {
            write!(f, "{}.*", self.database)
        } else {
            write!(f, "{}.{}.{}.{}", self.database, self.schema, self.table, self.column)
        }
    }
}

/// Set of base columns, ordered for stable output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceColumnSet(BTreeSet<ColumnResource>);

impl SourceColumnSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Create a set holding a single column
    pub fn single(column: ColumnResource) -> Self {
        let mut set = Self::new();
        set.insert(column);
        set
    }

    /// Insert a column, returning true if it was not present
    pub fn insert(&mut self, column: ColumnResource) -> bool {
        self.0.insert(column)
    }

    /// Merge another set into this one
    ///
    /// Returns true if this set grew. Merging a subset (including the set
    /// itself) is a no-op and returns false.
    pub fn merge(&mut self, other: &SourceColumnSet) -> bool {
        let before = self.0.len();
        self.0.extend(other.0.iter().cloned());
        self.0.len() != before
    }

    /// Consume this set and return its union with another
    pub fn union(mut self, other: &SourceColumnSet) -> Self {
        self.merge(other);
        self
    }

    /// Check if the set is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of distinct columns
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if a column is in the set
    pub fn contains(&self, column: &ColumnResource) -> bool {
        self.0.contains(column)
    }

    /// Check if the whole-database sentinel is in the set
    pub fn has_sentinel(&self) -> bool {
        self.0.iter().any(ColumnResource::is_whole_database)
    }

    /// Iterate over the columns in order
    pub fn iter(&self) -> impl Iterator<Item = &ColumnResource> {
        self.0.iter()
    }
}

impl FromIterator<ColumnResource> for SourceColumnSet {
    fn from_iter<I: IntoIterator<Item = ColumnResource>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for SourceColumnSet {
    type Item = ColumnResource;
    type IntoIter = std::collections::btree_set::IntoIter<ColumnResource>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a SourceColumnSet {
    type Item = &'a ColumnResource;
    type IntoIter = std::collections::btree_set::Iter<'a, ColumnResource>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A named output column with its lineage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultColumn {
    /// Output name (may be the unknown-name placeholder)
    pub name: String,

    /// Base columns this output is derived from
    pub sources: SourceColumnSet,
}

impl ResultColumn {
    /// Create a new result column
    pub fn new(name: impl Into<String>, sources: SourceColumnSet) -> Self {
        Self {
            name: name.into(),
            sources,
        }
    }

    /// Create a result column with no lineage
    pub fn unsourced(name: impl Into<String>) -> Self {
        Self::new(name, SourceColumnSet::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str) -> ColumnResource {
        ColumnResource::new("db", "public", "t", name)
    }

    #[test]
    fn merge_with_self_is_noop() {
        let mut set: SourceColumnSet = vec![col("a"), col("b")].into_iter().collect();
        let copy = set.clone();

        assert!(!set.merge(&copy));
        assert_eq!(set, copy);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn merge_is_monotone() {
        let mut set = SourceColumnSet::single(col("a"));
        let other: SourceColumnSet = vec![col("a"), col("c")].into_iter().collect();

        assert!(set.merge(&other));
        assert!(set.contains(&col("a")));
        assert!(set.contains(&col("c")));

        // Merging a smaller set never shrinks
        assert!(!set.merge(&SourceColumnSet::single(col("c"))));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn duplicates_collapse() {
        let set: SourceColumnSet = vec![col("a"), col("a"), col("a")].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn sentinel_detection() {
        let sentinel = ColumnResource::whole_database("db");
        assert!(sentinel.is_whole_database());
        assert!(!col("a").is_whole_database());
        assert_eq!(sentinel.to_string(), "db.*");

        let set = SourceColumnSet::single(col("a")).union(&SourceColumnSet::single(sentinel));
        assert!(set.has_sentinel());
    }

    #[test]
    fn display_and_order() {
        let set: SourceColumnSet = vec![col("b"), col("a")].into_iter().collect();
        let rendered: Vec<String> = set.iter().map(|c| c.to_string()).collect();
        assert_eq!(rendered, vec!["db.public.t.a", "db.public.t.b"]);
    }

    #[test]
    fn serializes_as_list() {
        let column = ResultColumn::new("a", SourceColumnSet::single(col("a")));
        let json = serde_json::to_value(&column).unwrap();
        assert_eq!(json["name"], "a");
        assert_eq!(json["sources"][0]["column"], "a");
    }
}
