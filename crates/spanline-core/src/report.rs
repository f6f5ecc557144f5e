//! Span report schema (stable v1)
//!
//! This is the JSON document the CLI emits for one analyzed statement.
//! Breaking changes require a new version.

use serde::Serialize;
use crate::diagnostic::{Diagnostic, Location, Severity};
use crate::span::QuerySpan;

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Span report (span.json v1)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpanReport {
    /// Schema version
    pub version: ReportVersion,

    /// Timestamp (ISO 8601)
    pub timestamp: String,

    /// Database the statement was analyzed against
    pub database: String,

    /// Analysis result
    pub span: QuerySpan,

    /// Diagnostics raised while analyzing
    pub diagnostics: Vec<Diagnostic>,
}

impl SpanReport {
    /// Build a report from a span, turning a degrading error into a diagnostic
    pub fn from_span(database: impl Into<String>, span: QuerySpan, location: Option<Location>) -> Self {
        let diagnostics = span
            .not_found_error
            .iter()
            .map(|error| {
                let diag = error.to_diagnostic();
                match &location {
                    Some(loc) => diag.with_location(loc.clone()),
                    None => diag,
                }
            })
            .collect();

        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            database: database.into(),
            span,
            diagnostics,
        }
    }

    /// Check if the report has any errors
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self.to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ResourceKind, SpanError};
    use crate::lineage::SourceColumnSet;
    use crate::span::StatementKind;

    #[test]
    fn clean_report() {
        let report = SpanReport::from_span("db", QuerySpan::new(StatementKind::Select), None);
        assert_eq!(report.version, ReportVersion::CURRENT);
        assert!(report.diagnostics.is_empty());
        assert!(!report.has_errors());
    }

    #[test]
    fn degraded_report_has_warning() {
        let span = QuerySpan::degraded(
            StatementKind::Select,
            "db",
            SourceColumnSet::new(),
            SpanError::not_found(ResourceKind::Table, "public.missing"),
        );
        let report = SpanReport::from_span("db", span, Some(Location::new("q.sql")));

        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].severity, Severity::Warn);
        assert!(!report.has_errors());
    }

    #[test]
    fn report_serialization() {
        let report = SpanReport::from_span("db", QuerySpan::new(StatementKind::Select), None);
        let json = report.to_json().unwrap();
        assert!(json.contains("\"version\""));
        assert!(json.contains("\"span\""));
        assert!(json.contains("\"select\""));
    }
}
