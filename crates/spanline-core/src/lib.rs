//! spanline core
//!
//! Lineage model, typed errors and the stable output types shared by the
//! resolver, the catalog and the CLI.
//! Never rename diagnostic codes - they are part of the public API.

pub mod lineage;
pub mod span;
pub mod error;
pub mod diagnostic;
pub mod report;
pub mod config;

pub use lineage::{ColumnResource, SourceColumnSet, ResultColumn, UNKNOWN_COLUMN_NAME};
pub use span::{QuerySpan, StatementKind};
pub use error::{SpanError, ResourceKind};
pub use diagnostic::{Diagnostic, DiagnosticCode, Severity, Location};
pub use report::{SpanReport, ReportVersion};
pub use config::{Config, AnalysisConfig, CatalogConfig, ConfigError};
