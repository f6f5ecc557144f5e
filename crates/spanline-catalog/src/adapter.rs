//! Catalog resolver trait

use std::sync::Arc;
use crate::metadata::DatabaseMetadata;

/// Errors that can occur when resolving catalog metadata
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("Database not found: {0}")]
    DatabaseNotFound(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Query failed: {0}")]
    QueryError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Source of database metadata for the span resolver
///
/// Called synchronously, once per database per analysis; results are cached
/// by the caller.
pub trait CatalogResolver {
    /// Return the metadata snapshot of a database
    fn resolve(&self, database: &str) -> Result<Arc<DatabaseMetadata>, CatalogError>;
}

impl<F> CatalogResolver for F
where
    F: Fn(&str) -> Result<Arc<DatabaseMetadata>, CatalogError>,
{
    fn resolve(&self, database: &str) -> Result<Arc<DatabaseMetadata>, CatalogError> {
        self(database)
    }
}
