//! Diagnostics for span reports
//!
//! Every [`SpanError`](crate::SpanError) maps to one code here. Codes are
//! serialized into reports, so they are never renamed or reused; new
//! failure kinds get new codes.

use serde::{Deserialize, Serialize};

/// Diagnostic codes (report v1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    // Span analysis (1xxx)
    /// A referenced database, schema, table, column or function is missing
    SpanResourceNotFound,

    /// A user-defined function body cannot be interpreted
    SpanFunctionNotSupported,

    /// Unsupported function language or table function shape
    SpanTypeNotSupported,

    /// Overloaded function call matches several candidates in one schema
    SpanAmbiguousCall,

    /// Statement shape the database would also reject
    SpanMalformedQuery,

    /// Nesting exceeded the configured depth limit
    SpanDepthLimitExceeded,

    /// Statement reads user tables and system catalogs together
    SpanMixedSystemAccess,

    // Input issues (2xxx)
    /// Failed to parse SQL
    SqlParseError,

    /// Catalog snapshot could not be loaded
    CatalogError,
}

impl DiagnosticCode {
    /// Get the diagnostic code as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SpanResourceNotFound => "SPAN_RESOURCE_NOT_FOUND",
            Self::SpanFunctionNotSupported => "SPAN_FUNCTION_NOT_SUPPORTED",
            Self::SpanTypeNotSupported => "SPAN_TYPE_NOT_SUPPORTED",
            Self::SpanAmbiguousCall => "SPAN_AMBIGUOUS_CALL",
            Self::SpanMalformedQuery => "SPAN_MALFORMED_QUERY",
            Self::SpanDepthLimitExceeded => "SPAN_DEPTH_LIMIT_EXCEEDED",
            Self::SpanMixedSystemAccess => "SPAN_MIXED_SYSTEM_ACCESS",
            Self::SqlParseError => "SQL_PARSE_ERROR",
            Self::CatalogError => "CATALOG_ERROR",
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,

    /// Lineage is partial but usable
    Warn,

    /// Analysis of the statement failed
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Source location of the analyzed statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// File path, or `<stdin>` / `<inline>`
    pub file: String,

    /// Optional line number (1-indexed)
    pub line: Option<usize>,
}

impl Location {
    /// Create a new location with just a file path
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line: None,
        }
    }

    /// Create a location with file and line number
    pub fn with_line(file: impl Into<String>, line: usize) -> Self {
        Self {
            file: file.into(),
            line: Some(line),
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}", self.file, line),
            None => write!(f, "{}", self.file),
        }
    }
}

/// A diagnostic message with structured metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable diagnostic code
    pub code: DiagnosticCode,

    /// Severity level
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Source location (best-effort)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl Diagnostic {
    /// Create a new diagnostic with minimal fields
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            location: None,
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }
}
