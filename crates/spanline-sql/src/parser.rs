//! SQL parsing using datafusion-sqlparser-rs
//!
//! Parses PostgreSQL text into statements and converts failures into
//! diagnostics and span errors.

use sqlparser::ast::{Query, Statement};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::{Parser, ParserError};
use spanline_core::{Diagnostic, DiagnosticCode, Location, Severity, SpanError};
use std::path::{Path, PathBuf};

/// PostgreSQL SQL parser
#[derive(Debug, Default, Clone, Copy)]
pub struct SqlParser;

impl SqlParser {
    /// Create a new parser for the PostgreSQL dialect
    pub fn new() -> Self {
        Self
    }

    /// Parse SQL string into statements
    pub fn parse(&self, sql: &str, file_path: Option<&Path>) -> Result<ParsedSql, ParseError> {
        match Parser::parse_sql(&PostgreSqlDialect {}, sql) {
            Ok(statements) => Ok(ParsedSql {
                sql: sql.to_string(),
                statements,
                file_path: file_path.map(|p| p.to_path_buf()),
            }),
            Err(error) => Err(ParseError {
                error,
                file_path: file_path.map(|p| p.to_path_buf()),
            }),
        }
    }

    /// Parse SQL from a file
    pub fn parse_file(&self, path: &Path) -> Result<ParsedSql, ParseError> {
        let sql = std::fs::read_to_string(path).map_err(|e| ParseError {
            error: ParserError::ParserError(format!("Failed to read file: {}", e)),
            file_path: Some(path.to_path_buf()),
        })?;

        self.parse(&sql, Some(path))
    }

    /// Parse and return the statements, mapping failures to a span error
    ///
    /// `context` names what is being parsed, e.g. `view public.v`.
    pub fn parse_statements(&self, sql: &str, context: &str) -> Result<Vec<Statement>, SpanError> {
        Parser::parse_sql(&PostgreSqlDialect {}, sql)
            .map_err(|e| SpanError::parse(context, e.to_string()))
    }
}

/// Successfully parsed SQL
#[derive(Debug, Clone)]
pub struct ParsedSql {
    /// Original SQL string
    pub sql: String,

    /// Parsed statements
    pub statements: Vec<Statement>,

    /// Source file path (if parsed from file)
    pub file_path: Option<PathBuf>,
}

impl ParsedSql {
    /// Get the first statement
    pub fn first_statement(&self) -> Option<&Statement> {
        self.statements.first()
    }

    /// Check if this is a plain query
    pub fn is_select(&self) -> bool {
        matches!(self.first_statement(), Some(Statement::Query(_)))
    }

    /// Get the query if this is a plain query
    pub fn as_query(&self) -> Option<&Query> {
        match self.first_statement() {
            Some(Statement::Query(query)) => Some(query.as_ref()),
            _ => None,
        }
    }

    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }
}

/// SQL parsing error with diagnostic information
#[derive(Debug, thiserror::Error)]
#[error("SQL parse error: {error}")]
pub struct ParseError {
    /// Parser error from sqlparser
    pub error: ParserError,

    /// Source file path
    pub file_path: Option<PathBuf>,
}

impl ParseError {
    /// Convert to a diagnostic
    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut diag = Diagnostic::new(
            DiagnosticCode::SqlParseError,
            Severity::Error,
            format!("Failed to parse SQL: {}", self.error),
        );

        if let Some(path) = &self.file_path {
            diag = diag.with_location(Location::new(path.display().to_string()));
        }

        diag
    }

    /// Convert to a span error
    pub fn to_span_error(&self) -> SpanError {
        let context = match &self.file_path {
            Some(path) => path.display().to_string(),
            None => "statement".to_string(),
        };
        SpanError::parse(context, self.error.to_string())
    }
}
