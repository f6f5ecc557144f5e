//! In-memory catalog
//!
//! Holds database snapshots keyed by database name. Snapshots are loaded
//! from JSON files (as written by `spanline sync-catalog`) or assembled in
//! code with [`CatalogBuilder`], which is what the tests use.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::adapter::{CatalogError, CatalogResolver};
use crate::metadata::{
    DatabaseMetadata, FunctionMetadata, SequenceMetadata, TableMetadata, ViewMetadata,
};

/// Catalog backed by snapshots kept in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    databases: HashMap<String, Arc<DatabaseMetadata>>,
}

impl InMemoryCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a database snapshot
    pub fn insert(&mut self, database: DatabaseMetadata) {
        self.databases.insert(database.name.clone(), Arc::new(database));
    }

    /// Load snapshots from a JSON string
    ///
    /// Accepts either a single database object or an array of them.
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| CatalogError::InvalidSnapshot(e.to_string()))?;

        let databases: Vec<DatabaseMetadata> = if value.is_array() {
            serde_json::from_value(value)
        } else {
            serde_json::from_value(value).map(|db| vec![db])
        }
        .map_err(|e| CatalogError::InvalidSnapshot(e.to_string()))?;

        let mut catalog = Self::new();
        for database in databases {
            if database.name.is_empty() {
                return Err(CatalogError::InvalidSnapshot(
                    "database snapshot without a name".to_string(),
                ));
            }
            catalog.insert(database);
        }

        tracing::debug!(databases = catalog.database_count(), "loaded catalog snapshot");
        Ok(catalog)
    }

    /// Load snapshots from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::IoError(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&contents)
    }

    /// Serialize all snapshots as a JSON array, sorted by database name
    pub fn to_json(&self) -> Result<String, CatalogError> {
        let mut databases: Vec<&DatabaseMetadata> = self.databases.values().map(|d| d.as_ref()).collect();
        databases.sort_by(|a, b| a.name.cmp(&b.name));
        serde_json::to_string_pretty(&databases)
            .map_err(|e| CatalogError::InvalidSnapshot(e.to_string()))
    }

    /// Get the number of databases stored
    pub fn database_count(&self) -> usize {
        self.databases.len()
    }

    /// Check if a snapshot exists for a database
    pub fn has_database(&self, name: &str) -> bool {
        self.databases.contains_key(name)
    }

    /// Get all database names, sorted
    pub fn database_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.databases.keys().cloned().collect();
        names.sort();
        names
    }

    /// Get a snapshot by database name
    pub fn database(&self, name: &str) -> Option<&DatabaseMetadata> {
        self.databases.get(name).map(|d| d.as_ref())
    }
}

impl CatalogResolver for InMemoryCatalog {
    fn resolve(&self, database: &str) -> Result<Arc<DatabaseMetadata>, CatalogError> {
        self.databases
            .get(database)
            .cloned()
            .ok_or_else(|| CatalogError::DatabaseNotFound(database.to_string()))
    }
}

/// Builder for a single-database catalog
///
/// # Example
///
/// ```rust,ignore
/// let catalog = CatalogBuilder::new("db")
///     .with_table("public", "t", &["a", "b", "c", "d"])
///     .with_view("public", "v", "SELECT a, b FROM t")
///     .with_function("public", "f", "CREATE FUNCTION public.f() RETURNS integer LANGUAGE sql AS $$ SELECT a FROM t $$")
///     .build();
/// ```
pub struct CatalogBuilder {
    database: DatabaseMetadata,
}

impl CatalogBuilder {
    /// Create a new builder for the named database
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: DatabaseMetadata::new(database),
        }
    }

    /// Add an empty schema
    pub fn with_schema(mut self, schema: &str) -> Self {
        self.database.schema_mut(schema);
        self
    }

    /// Add a table
    pub fn with_table(mut self, schema: &str, table: &str, columns: &[&str]) -> Self {
        self.database.schema_mut(schema).tables.push(TableMetadata::new(table, columns));
        self
    }

    /// Add a view defined by a SELECT
    pub fn with_view(mut self, schema: &str, view: &str, definition: &str) -> Self {
        self.database.schema_mut(schema).views.push(ViewMetadata {
            name: view.to_string(),
            definition: definition.to_string(),
        });
        self
    }

    /// Add a materialized view defined by a SELECT
    pub fn with_materialized_view(mut self, schema: &str, view: &str, definition: &str) -> Self {
        self.database.schema_mut(schema).materialized_views.push(ViewMetadata {
            name: view.to_string(),
            definition: definition.to_string(),
        });
        self
    }

    /// Add a sequence
    pub fn with_sequence(mut self, schema: &str, sequence: &str) -> Self {
        self.database.schema_mut(schema).sequences.push(SequenceMetadata {
            name: sequence.to_string(),
        });
        self
    }

    /// Add a foreign table
    pub fn with_external_table(mut self, schema: &str, table: &str, columns: &[&str]) -> Self {
        self.database
            .schema_mut(schema)
            .external_tables
            .push(TableMetadata::new(table, columns));
        self
    }

    /// Add a function from its `CREATE FUNCTION` text
    pub fn with_function(mut self, schema: &str, name: &str, definition: &str) -> Self {
        self.database.schema_mut(schema).functions.push(FunctionMetadata {
            name: name.to_string(),
            definition: definition.to_string(),
        });
        self
    }

    /// Get the snapshot built so far
    pub fn into_metadata(self) -> DatabaseMetadata {
        self.database
    }

    /// Build a catalog holding this database
    pub fn build(self) -> InMemoryCatalog {
        let mut catalog = InMemoryCatalog::new();
        catalog.insert(self.database);
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_and_resolve() {
        let catalog = CatalogBuilder::new("db")
            .with_table("public", "t", &["a", "b"])
            .with_sequence("public", "s")
            .build();

        assert!(catalog.has_database("db"));
        let db = catalog.resolve("db").unwrap();
        let search_path = vec!["public".to_string()];
        assert!(db.search_table(&search_path, "t").is_some());
        assert!(db.search_sequence(&search_path, "s").is_some());
    }

    #[test]
    fn missing_database() {
        let catalog = InMemoryCatalog::new();
        let err = catalog.resolve("nope").unwrap_err();
        assert_eq!(err, CatalogError::DatabaseNotFound("nope".to_string()));
    }

    #[test]
    fn json_single_and_array() {
        let single = r#"{"name": "a", "schemas": []}"#;
        assert_eq!(InMemoryCatalog::from_json_str(single).unwrap().database_names(), vec!["a"]);

        let many = r#"[{"name": "b"}, {"name": "a"}]"#;
        assert_eq!(InMemoryCatalog::from_json_str(many).unwrap().database_names(), vec!["a", "b"]);
    }

    #[test]
    fn json_rejects_unnamed_database() {
        let result = InMemoryCatalog::from_json_str(r#"{"name": ""}"#);
        assert!(matches!(result, Err(CatalogError::InvalidSnapshot(_))));
    }

    #[test]
    fn json_rejects_garbage() {
        let result = InMemoryCatalog::from_json_str("not json");
        assert!(matches!(result, Err(CatalogError::InvalidSnapshot(_))));
    }

    #[test]
    fn json_export_reloads() {
        let catalog = CatalogBuilder::new("db")
            .with_table("public", "t", &["a"])
            .with_view("public", "v", "SELECT a FROM t")
            .build();

        let json = catalog.to_json().unwrap();
        let reloaded = InMemoryCatalog::from_json_str(&json).unwrap();
        assert_eq!(reloaded.database("db"), catalog.database("db"));
    }
}
