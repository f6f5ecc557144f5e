//! Typed span analysis errors
//!
//! Errors are split into soft ones, which the extractor may turn into a
//! degraded span, and hard ones, which always abort analysis of a statement.

use serde::Serialize;
use std::fmt;
use crate::diagnostic::{Diagnostic, DiagnosticCode, Severity};

/// Kind of catalog object a lookup failed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Database,
    Schema,
    Table,
    Column,
    Function,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database => write!(f, "database"),
            Self::Schema => write!(f, "schema"),
            Self::Table => write!(f, "table"),
            Self::Column => write!(f, "column"),
            Self::Function => write!(f, "function"),
        }
    }
}

/// Span analysis error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpanError {
    #[error("{resource} not found: {name}")]
    ResourceNotFound { resource: ResourceKind, name: String },

    #[error("function {function} is not supported: {reason}")]
    FunctionNotSupported { function: String, reason: String },

    #[error("{what} is not supported: {detail}")]
    TypeNotSupported { what: String, detail: String },

    #[error("call to {function} is ambiguous: {candidates} candidates in schema {schema}")]
    AmbiguousCall {
        function: String,
        schema: String,
        candidates: usize,
    },

    #[error("malformed query: {message}")]
    MalformedQuery { message: String },

    #[error("nesting depth exceeds the limit of {limit}")]
    DepthLimitExceeded { limit: usize },

    #[error("failed to parse {context}: {message}")]
    Parse { context: String, message: String },

    #[error("catalog error: {message}")]
    Catalog { message: String },

    #[error("cannot access {user} and {system} in the same statement")]
    MixedSystemAccess { user: String, system: String },
}

impl SpanError {
    pub fn not_found(resource: ResourceKind, name: impl Into<String>) -> Self {
        Self::ResourceNotFound {
            resource,
            name: name.into(),
        }
    }

    pub fn function_not_supported(function: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FunctionNotSupported {
            function: function.into(),
            reason: reason.into(),
        }
    }

    pub fn type_not_supported(what: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::TypeNotSupported {
            what: what.into(),
            detail: detail.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedQuery {
            message: message.into(),
        }
    }

    pub fn parse(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Check if the error may be widened into a degraded span
    pub fn is_fail_open(&self) -> bool {
        matches!(
            self,
            Self::ResourceNotFound { .. }
                | Self::FunctionNotSupported { .. }
                | Self::TypeNotSupported { .. }
        )
    }

    /// Stable diagnostic code for this error
    pub fn code(&self) -> DiagnosticCode {
        match self {
            Self::ResourceNotFound { .. } => DiagnosticCode::SpanResourceNotFound,
            Self::FunctionNotSupported { .. } => DiagnosticCode::SpanFunctionNotSupported,
            Self::TypeNotSupported { .. } => DiagnosticCode::SpanTypeNotSupported,
            Self::AmbiguousCall { .. } => DiagnosticCode::SpanAmbiguousCall,
            Self::MalformedQuery { .. } => DiagnosticCode::SpanMalformedQuery,
            Self::DepthLimitExceeded { .. } => DiagnosticCode::SpanDepthLimitExceeded,
            Self::Parse { .. } => DiagnosticCode::SqlParseError,
            Self::Catalog { .. } => DiagnosticCode::CatalogError,
            Self::MixedSystemAccess { .. } => DiagnosticCode::SpanMixedSystemAccess,
        }
    }

    /// Convert to a diagnostic; soft errors are warnings
    pub fn to_diagnostic(&self) -> Diagnostic {
        let severity = if self.is_fail_open() {
            Severity::Warn
        } else {
            Severity::Error
        };
        Diagnostic::new(self.code(), severity, self.to_string())
    }
}
