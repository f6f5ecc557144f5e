//! Shared analysis state
//!
//! One context lives for one extractor run. Every nested resolver borrows
//! it, so catalog snapshots are fetched once per database and the read set
//! accumulates across subqueries, views and function bodies.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use spanline_catalog::{CatalogError, CatalogResolver, DatabaseMetadata};
use spanline_core::{ResourceKind, SourceColumnSet, SpanError};

pub struct AnalysisContext<'a> {
    catalog: &'a dyn CatalogResolver,
    default_database: String,
    search_path: Vec<String>,
    max_depth: usize,
    cache: RefCell<HashMap<String, Arc<DatabaseMetadata>>>,
    accessed: RefCell<SourceColumnSet>,
}

/// Where to look up a possibly qualified object name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectTarget {
    pub database: String,
    pub search_path: Vec<String>,
    pub name: String,
}

impl<'a> AnalysisContext<'a> {
    pub fn new(
        catalog: &'a dyn CatalogResolver,
        default_database: impl Into<String>,
        search_path: Vec<String>,
        max_depth: usize,
    ) -> Self {
        Self {
            catalog,
            default_database: default_database.into(),
            search_path,
            max_depth,
            cache: RefCell::new(HashMap::new()),
            accessed: RefCell::new(SourceColumnSet::new()),
        }
    }

    pub fn default_database(&self) -> &str {
        &self.default_database
    }

    pub fn search_path(&self) -> &[String] {
        &self.search_path
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Metadata of a database, fetched from the catalog at most once
    pub fn database(&self, name: &str) -> Result<Arc<DatabaseMetadata>, SpanError> {
        if let Some(metadata) = self.cache.borrow().get(name) {
            return Ok(Arc::clone(metadata));
        }

        let metadata = self.catalog.resolve(name).map_err(|e| match e {
            CatalogError::DatabaseNotFound(db) => SpanError::not_found(ResourceKind::Database, db),
            other => SpanError::Catalog {
                message: other.to_string(),
            },
        })?;

        tracing::debug!(database = name, "fetched catalog metadata");
        self.cache
            .borrow_mut()
            .insert(name.to_string(), Arc::clone(&metadata));
        Ok(metadata)
    }

    /// Split `[[database.]schema.]name` parts into a lookup target
    ///
    /// An explicit schema replaces the search path.
    pub fn target(&self, parts: &[String]) -> Result<ObjectTarget, SpanError> {
        let (database, schema, name) = match parts {
            [name] => (None, None, name),
            [schema, name] => (None, Some(schema), name),
            [database, schema, name] => (Some(database), Some(schema), name),
            _ => {
                return Err(SpanError::malformed(format!(
                    "improper qualified name: {}",
                    parts.join(".")
                )))
            }
        };

        Ok(ObjectTarget {
            database: database.cloned().unwrap_or_else(|| self.default_database.clone()),
            search_path: match schema {
                Some(schema) => vec![schema.clone()],
                None => self.search_path.clone(),
            },
            name: name.clone(),
        })
    }

    /// Add columns to the statement's read set
    pub fn record_access(&self, columns: &SourceColumnSet) {
        self.accessed.borrow_mut().merge(columns);
    }

    /// Copy of the read set gathered so far
    pub fn accessed(&self) -> SourceColumnSet {
        self.accessed.borrow().clone()
    }

    /// Take the read set, leaving it empty
    pub fn take_accessed(&self) -> SourceColumnSet {
        std::mem::take(&mut *self.accessed.borrow_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spanline_catalog::CatalogBuilder;
    use spanline_core::ColumnResource;
    use std::cell::Cell;

    #[test]
    fn caches_catalog_lookups() {
        let calls = Cell::new(0);
        let resolver = |name: &str| -> Result<Arc<DatabaseMetadata>, CatalogError> {
            calls.set(calls.get() + 1);
            Ok(Arc::new(DatabaseMetadata::new(name)))
        };

        let ctx = AnalysisContext::new(&resolver, "db", vec!["public".to_string()], 8);
        ctx.database("db").unwrap();
        ctx.database("db").unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn missing_database_is_soft() {
        let catalog = CatalogBuilder::new("db").build();
        let ctx = AnalysisContext::new(&catalog, "db", vec!["public".to_string()], 8);
        let err = ctx.database("other").unwrap_err();
        assert!(err.is_fail_open());
    }

    #[test]
    fn catalog_failure_is_hard() {
        let resolver = |_: &str| -> Result<Arc<DatabaseMetadata>, CatalogError> {
            Err(CatalogError::IoError("disk gone".to_string()))
        };
        let ctx = AnalysisContext::new(&resolver, "db", vec!["public".to_string()], 8);
        let err = ctx.database("db").unwrap_err();
        assert!(matches!(err, SpanError::Catalog { .. }));
        assert!(!err.is_fail_open());
    }

    #[test]
    fn qualified_targets() {
        let catalog = CatalogBuilder::new("db").build();
        let ctx = AnalysisContext::new(&catalog, "db", vec!["a".to_string(), "b".to_string()], 8);

        let target = ctx.target(&["t".to_string()]).unwrap();
        assert_eq!(target.database, "db");
        assert_eq!(target.search_path, vec!["a".to_string(), "b".to_string()]);

        let target = ctx
            .target(&["other".to_string(), "s".to_string(), "t".to_string()])
            .unwrap();
        assert_eq!(target.database, "other");
        assert_eq!(target.search_path, vec!["s".to_string()]);
    }

    #[test]
    fn read_set_accumulates() {
        let catalog = CatalogBuilder::new("db").build();
        let ctx = AnalysisContext::new(&catalog, "db", vec!["public".to_string()], 8);
        ctx.record_access(&SourceColumnSet::single(ColumnResource::new("db", "public", "t", "a")));
        ctx.record_access(&SourceColumnSet::single(ColumnResource::new("db", "public", "t", "b")));
        assert_eq!(ctx.accessed().len(), 2);
        assert_eq!(ctx.take_accessed().len(), 2);
        assert!(ctx.accessed().is_empty());
    }
}
