//! Scope stack
//!
//! Holds the table sources visible while resolving one query level:
//! the FROM sources of the current level, the FROM sources of enclosing
//! levels (for correlated references), the CTEs in scope and, inside
//! function bodies, local variables.
//!
//! Nested resolvers get their own stack derived with [`ScopeStack::nested`],
//! so nothing a subquery pushes is ever visible to its parent.

use std::collections::HashMap;

use spanline_core::{ResultColumn, SourceColumnSet};

use crate::table_source::{PseudoTable, TableSource};

/// Restore point for FROM sources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FromMark(usize);

/// Restore point for CTEs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CteMark(usize);

#[derive(Debug, Clone, Default)]
pub struct ScopeStack {
    /// FROM sources of enclosing levels, outermost first
    outer: Vec<Vec<TableSource>>,

    /// FROM sources of the current level, in declaration order
    from: Vec<TableSource>,

    /// CTEs in scope, most recent last
    ctes: Vec<PseudoTable>,

    /// Local variables of a function body
    variables: HashMap<String, SourceColumnSet>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope for a subquery: the current FROM sources become the innermost
    /// outer level
    pub fn nested(&self) -> Self {
        let mut outer = self.outer.clone();
        outer.push(self.from.clone());
        Self {
            outer,
            from: Vec::new(),
            ctes: self.ctes.clone(),
            variables: self.variables.clone(),
        }
    }

    /// Scope for a non-lateral derived table: sibling FROM items stay hidden
    pub fn derived(&self) -> Self {
        Self {
            outer: self.outer.clone(),
            from: Vec::new(),
            ctes: self.ctes.clone(),
            variables: self.variables.clone(),
        }
    }

    pub fn from_mark(&self) -> FromMark {
        FromMark(self.from.len())
    }

    pub fn push_from_source(&mut self, source: TableSource) {
        self.from.push(source);
    }

    /// Insert a source at a restore point, ahead of anything pushed since
    pub fn insert_from_source(&mut self, mark: FromMark, source: TableSource) {
        let index = mark.0.min(self.from.len());
        self.from.insert(index, source);
    }

    pub fn pop_from_sources(&mut self, mark: FromMark) {
        self.from.truncate(mark.0);
    }

    /// FROM sources of the current level
    pub fn from_sources(&self) -> &[TableSource] {
        &self.from
    }

    pub fn cte_mark(&self) -> CteMark {
        CteMark(self.ctes.len())
    }

    /// Bring a CTE into scope, returning its index
    pub fn push_cte(&mut self, cte: PseudoTable) -> usize {
        self.ctes.push(cte);
        self.ctes.len() - 1
    }

    pub fn cte(&self, index: usize) -> Option<&PseudoTable> {
        self.ctes.get(index)
    }

    pub fn pop_ctes(&mut self, mark: CteMark) {
        self.ctes.truncate(mark.0);
    }

    /// Find a CTE by name; the most recent definition wins
    pub fn lookup_cte(&self, name: &str) -> Option<(usize, &PseudoTable)> {
        self.ctes
            .iter()
            .enumerate()
            .rev()
            .find(|(_, cte)| cte.name == name)
    }

    /// Merge columns into a CTE in place, returning true if it grew
    pub fn merge_cte_columns(&mut self, index: usize, columns: &[ResultColumn]) -> bool {
        match self.ctes.get_mut(index) {
            Some(cte) => cte.merge_columns(columns),
            None => false,
        }
    }

    /// Find a visible table source
    ///
    /// Current FROM sources are searched first, then enclosing levels from
    /// the innermost outwards.
    pub fn lookup_table(&self, schema: Option<&str>, name: &str) -> Option<&TableSource> {
        self.visible_sources()
            .find(|source| source_matches(source, None, schema, Some(name)))
    }

    /// Resolve a column reference
    ///
    /// `table`, `schema` and `database` narrow the search when present.
    /// Local variables are consulted last and only for bare names.
    pub fn lookup_column(
        &self,
        database: Option<&str>,
        schema: Option<&str>,
        table: Option<&str>,
        column: &str,
    ) -> Option<SourceColumnSet> {
        let found = self
            .visible_sources()
            .filter(|source| source_matches(source, database, schema, table))
            .find_map(|source| source.find_column(column));

        if found.is_some() {
            return found;
        }

        if database.is_none() && schema.is_none() && table.is_none() {
            return self.variables.get(column).cloned();
        }
        None
    }

    /// Bind or widen a local variable
    pub fn set_variable(&mut self, name: impl Into<String>, sources: SourceColumnSet) {
        self.variables.entry(name.into()).or_default().merge(&sources);
    }

    pub fn variable(&self, name: &str) -> Option<&SourceColumnSet> {
        self.variables.get(name)
    }

    fn visible_sources(&self) -> impl Iterator<Item = &TableSource> {
        self.from
            .iter()
            .chain(self.outer.iter().rev().flat_map(|level| level.iter()))
    }
}

fn source_matches(
    source: &TableSource,
    database: Option<&str>,
    schema: Option<&str>,
    table: Option<&str>,
) -> bool {
    if let Some(table) = table {
        if source.table_name() != table {
            return false;
        }
    }
    if let Some(schema) = schema {
        if source.schema_name() != schema {
            return false;
        }
    }
    if let Some(database) = database {
        if source.database_name() != Some(database) {
            return false;
        }
    }
    true
}
