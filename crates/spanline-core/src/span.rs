//! Statement-level analysis result

use serde::Serialize;
use crate::error::SpanError;
use crate::lineage::{ColumnResource, ResultColumn, SourceColumnSet};

/// Kind of the analyzed top-level statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Select,
    Explain,
    Insert,
    Update,
    Delete,
    Other,
}

/// Lineage of one statement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuerySpan {
    /// Statement kind
    pub kind: StatementKind,

    /// Output columns in order
    pub results: Vec<ResultColumn>,

    /// Every base column the statement reads
    pub source_columns: SourceColumnSet,

    /// Set for EXPLAIN ANALYZE; results are left empty in that case
    pub explain_analyze: bool,

    /// Soft error that degraded this span
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_found_error: Option<SpanError>,
}

impl QuerySpan {
    /// Create an empty span of the given kind
    pub fn new(kind: StatementKind) -> Self {
        Self {
            kind,
            results: Vec::new(),
            source_columns: SourceColumnSet::new(),
            explain_analyze: false,
            not_found_error: None,
        }
    }

    /// Build the fail-open span for a soft error
    ///
    /// Results are dropped and the read set is widened with the
    /// whole-database sentinel.
    pub fn degraded(
        kind: StatementKind,
        database: &str,
        accessed: SourceColumnSet,
        error: SpanError,
    ) -> Self {
        let mut source_columns = accessed;
        source_columns.insert(ColumnResource::whole_database(database));
        Self {
            kind,
            results: Vec::new(),
            source_columns,
            explain_analyze: false,
            not_found_error: Some(error),
        }
    }

    /// Check if the span was widened after a soft error
    pub fn is_degraded(&self) -> bool {
        self.not_found_error.is_some()
    }

    /// Find an output column by name
    pub fn result(&self, name: &str) -> Option<&ResultColumn> {
        self.results.iter().find(|c| c.name == name)
    }
}
