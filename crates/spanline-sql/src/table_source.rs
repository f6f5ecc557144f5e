//! Table sources
//!
//! Anything that can stand in a FROM clause and produce named columns.

use spanline_core::{ColumnResource, ResultColumn, SourceColumnSet, SpanError};

/// Columns every sequence exposes
pub const SEQUENCE_COLUMNS: [&str; 3] = ["last_value", "log_cnt", "is_called"];

/// A catalog table or foreign table
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalTable {
    pub database: String,
    pub schema: String,
    pub name: String,

    /// Column names in catalog order
    pub columns: Vec<String>,
}

/// A view or materialized view, with lineage taken from its definition
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalView {
    pub database: String,
    pub schema: String,
    pub name: String,
    pub columns: Vec<ResultColumn>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SequenceSource {
    pub database: String,
    pub schema: String,
    pub name: String,
}

/// A synthesized table: CTE, subquery, join, set operation, function
/// result or VALUES list
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PseudoTable {
    pub name: String,
    pub columns: Vec<ResultColumn>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableSource {
    Physical(PhysicalTable),
    View(PhysicalView),
    Sequence(SequenceSource),
    Pseudo(PseudoTable),
}

impl PhysicalTable {
    fn resource(&self, column: &str) -> ColumnResource {
        ColumnResource::new(&self.database, &self.schema, &self.name, column)
    }
}

impl SequenceSource {
    fn resource(&self, column: &str) -> ColumnResource {
        ColumnResource::new(&self.database, &self.schema, &self.name, column)
    }
}

impl PseudoTable {
    pub fn new(name: impl Into<String>, columns: Vec<ResultColumn>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Merge another column list into this one position by position
    ///
    /// Returns true if any column's sources grew. Both lists must have the
    /// same length.
    pub fn merge_columns(&mut self, other: &[ResultColumn]) -> bool {
        let mut changed = false;
        for (column, incoming) in self.columns.iter_mut().zip(other) {
            changed |= column.sources.merge(&incoming.sources);
        }
        changed
    }
}

impl TableSource {
    /// Schema name, empty for pseudo tables
    pub fn schema_name(&self) -> &str {
        match self {
            Self::Physical(t) => &t.schema,
            Self::View(v) => &v.schema,
            Self::Sequence(s) => &s.schema,
            Self::Pseudo(_) => "",
        }
    }

    pub fn table_name(&self) -> &str {
        match self {
            Self::Physical(t) => &t.name,
            Self::View(v) => &v.name,
            Self::Sequence(s) => &s.name,
            Self::Pseudo(p) => &p.name,
        }
    }

    /// Database name, absent for pseudo tables
    pub fn database_name(&self) -> Option<&str> {
        match self {
            Self::Physical(t) => Some(&t.database),
            Self::View(v) => Some(&v.database),
            Self::Sequence(s) => Some(&s.database),
            Self::Pseudo(_) => None,
        }
    }

    /// Output columns in order
    pub fn columns(&self) -> Vec<ResultColumn> {
        match self {
            Self::Physical(t) => t
                .columns
                .iter()
                .map(|c| ResultColumn::new(c, SourceColumnSet::single(t.resource(c))))
                .collect(),
            Self::View(v) => v.columns.clone(),
            Self::Sequence(s) => SEQUENCE_COLUMNS
                .iter()
                .map(|c| ResultColumn::new(*c, SourceColumnSet::single(s.resource(c))))
                .collect(),
            Self::Pseudo(p) => p.columns.clone(),
        }
    }

    /// Sources of the first column with the given name
    pub fn find_column(&self, name: &str) -> Option<SourceColumnSet> {
        match self {
            Self::Physical(t) => t
                .columns
                .iter()
                .find(|c| c.as_str() == name)
                .map(|c| SourceColumnSet::single(t.resource(c))),
            Self::View(v) => v.columns.iter().find(|c| c.name == name).map(|c| c.sources.clone()),
            Self::Sequence(s) => SEQUENCE_COLUMNS
                .iter()
                .find(|c| **c == name)
                .map(|c| SourceColumnSet::single(s.resource(c))),
            Self::Pseudo(p) => p.columns.iter().find(|c| c.name == name).map(|c| c.sources.clone()),
        }
    }

    /// Union of all column sources; the lineage of a whole-row reference
    pub fn whole_row(&self) -> SourceColumnSet {
        self.columns()
            .into_iter()
            .fold(SourceColumnSet::new(), |acc, c| acc.union(&c.sources))
    }

    /// Apply `AS alias(c1, c2, ...)`
    ///
    /// The result is a pseudo table named `alias`. Column aliases rename the
    /// leading columns positionally; supplying more aliases than there are
    /// columns is an error.
    pub fn with_alias(self, alias: &str, column_aliases: &[String]) -> Result<TableSource, SpanError> {
        let mut columns = self.columns();
        if column_aliases.len() > columns.len() {
            return Err(SpanError::malformed(format!(
                "table \"{}\" has {} columns available but {} columns specified",
                alias,
                columns.len(),
                column_aliases.len()
            )));
        }
        for (column, name) in columns.iter_mut().zip(column_aliases) {
            column.name = name.clone();
        }
        Ok(TableSource::Pseudo(PseudoTable::new(alias, columns)))
    }
}

impl From<PseudoTable> for TableSource {
    fn from(table: PseudoTable) -> Self {
        Self::Pseudo(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table() -> TableSource {
        TableSource::Physical(PhysicalTable {
            database: "db".to_string(),
            schema: "public".to_string(),
            name: "t".to_string(),
            columns: vec!["a".to_string(), "b".to_string()],
        })
    }

    #[test]
    fn physical_columns_in_catalog_order() {
        let columns = table().columns();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].name, "a");
        assert_eq!(
            columns[1].sources,
            SourceColumnSet::single(ColumnResource::new("db", "public", "t", "b"))
        );
    }

    #[test]
    fn sequence_columns() {
        let seq = TableSource::Sequence(SequenceSource {
            database: "db".to_string(),
            schema: "public".to_string(),
            name: "s".to_string(),
        });
        let names: Vec<String> = seq.columns().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["last_value", "log_cnt", "is_called"]);
        assert!(seq.find_column("is_called").is_some());
    }

    #[test]
    fn alias_renames_prefix() {
        let aliased = table().with_alias("x", &["z".to_string()]).unwrap();
        assert_eq!(aliased.table_name(), "x");
        assert_eq!(aliased.schema_name(), "");
        let names: Vec<String> = aliased.columns().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["z", "b"]);
        assert_eq!(
            aliased.find_column("z"),
            Some(SourceColumnSet::single(ColumnResource::new("db", "public", "t", "a")))
        );
    }

    #[test]
    fn too_many_aliases() {
        let names = vec!["x".to_string(), "y".to_string(), "z".to_string()];
        let err = table().with_alias("x", &names).unwrap_err();
        assert!(matches!(err, SpanError::MalformedQuery { .. }));
    }

    #[test]
    fn whole_row_unions_columns() {
        assert_eq!(table().whole_row().len(), 2);
    }

    #[test]
    fn merge_columns_reports_growth() {
        let a = SourceColumnSet::single(ColumnResource::new("db", "public", "t", "a"));
        let mut cte = PseudoTable::new("r", vec![ResultColumn::new("x", a.clone())]);

        assert!(!cte.merge_columns(&[ResultColumn::new("x", a.clone())]));
        let b = SourceColumnSet::single(ColumnResource::new("db", "public", "t", "b"));
        assert!(cte.merge_columns(&[ResultColumn::new("y", b)]));
        assert_eq!(cte.columns[0].name, "x");
        assert_eq!(cte.columns[0].sources.len(), 2);
    }
}
