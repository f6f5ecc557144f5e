//! Database metadata snapshot
//!
//! A snapshot holds what the resolver needs about one database: table and
//! external-table column lists, view definitions, sequences and function
//! definitions, grouped by schema.

use serde::{Deserialize, Serialize};

/// Metadata of one database
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseMetadata {
    /// Database name
    pub name: String,

    /// Schemas in the database
    #[serde(default)]
    pub schemas: Vec<SchemaMetadata>,
}

/// Objects of one schema
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaMetadata {
    pub name: String,

    #[serde(default)]
    pub tables: Vec<TableMetadata>,

    #[serde(default)]
    pub views: Vec<ViewMetadata>,

    #[serde(default)]
    pub materialized_views: Vec<ViewMetadata>,

    #[serde(default)]
    pub sequences: Vec<SequenceMetadata>,

    /// Foreign tables
    #[serde(default)]
    pub external_tables: Vec<TableMetadata>,

    /// Functions; overloads share a name
    #[serde(default)]
    pub functions: Vec<FunctionMetadata>,
}

/// A table with its columns in catalog order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub name: String,

    #[serde(default)]
    pub columns: Vec<ColumnMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,

    /// Declared type, informational only
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}

/// A view or materialized view and its defining query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewMetadata {
    pub name: String,

    /// The SELECT the view is defined by
    pub definition: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceMetadata {
    pub name: String,
}

/// A function and its full `CREATE FUNCTION` text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionMetadata {
    pub name: String,

    /// Output of `pg_get_functiondef`
    pub definition: String,
}

impl TableMetadata {
    /// Create a table from column names
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| ColumnMetadata::new(*c)).collect(),
        }
    }

    /// Column names in catalog order
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: None,
        }
    }
}

impl SchemaMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl DatabaseMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schemas: Vec::new(),
        }
    }

    /// Get a schema by name
    pub fn schema(&self, name: &str) -> Option<&SchemaMetadata> {
        self.schemas.iter().find(|s| s.name == name)
    }

    /// Get a schema by name, creating it if missing
    pub fn schema_mut(&mut self, name: &str) -> &mut SchemaMetadata {
        let index = match self.schemas.iter().position(|s| s.name == name) {
            Some(index) => index,
            None => {
                self.schemas.push(SchemaMetadata::new(name));
                self.schemas.len() - 1
            }
        };
        &mut self.schemas[index]
    }

    /// Walk the search path and return the first schema holding a match
    fn search<'a, T, F>(&'a self, search_path: &[String], pick: F) -> Option<(&'a str, &'a T)>
    where
        F: Fn(&'a SchemaMetadata) -> Option<&'a T>,
    {
        search_path.iter().find_map(|schema_name| {
            let schema = self.schema(schema_name)?;
            pick(schema).map(|found| (schema.name.as_str(), found))
        })
    }

    pub fn search_table(&self, search_path: &[String], name: &str) -> Option<(&str, &TableMetadata)> {
        self.search(search_path, |s| s.tables.iter().find(|t| t.name == name))
    }

    pub fn search_view(&self, search_path: &[String], name: &str) -> Option<(&str, &ViewMetadata)> {
        self.search(search_path, |s| s.views.iter().find(|v| v.name == name))
    }

    pub fn search_materialized_view(
        &self,
        search_path: &[String],
        name: &str,
    ) -> Option<(&str, &ViewMetadata)> {
        self.search(search_path, |s| s.materialized_views.iter().find(|v| v.name == name))
    }

    pub fn search_sequence(&self, search_path: &[String], name: &str) -> Option<(&str, &SequenceMetadata)> {
        self.search(search_path, |s| s.sequences.iter().find(|q| q.name == name))
    }

    pub fn search_external_table(
        &self,
        search_path: &[String],
        name: &str,
    ) -> Option<(&str, &TableMetadata)> {
        self.search(search_path, |s| s.external_tables.iter().find(|t| t.name == name))
    }

    /// All functions with the given name, in search-path order
    ///
    /// Overloads are returned together; the caller ranks them.
    pub fn search_function(&self, search_path: &[String], name: &str) -> Vec<(&str, &FunctionMetadata)> {
        search_path
            .iter()
            .filter_map(|schema_name| self.schema(schema_name))
            .flat_map(|schema| {
                schema
                    .functions
                    .iter()
                    .filter(move |f| f.name == name)
                    .map(move |f| (schema.name.as_str(), f))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(schemas: &[&str]) -> Vec<String> {
        schemas.iter().map(|s| s.to_string()).collect()
    }

    fn sample() -> DatabaseMetadata {
        let mut db = DatabaseMetadata::new("db");
        db.schema_mut("public").tables.push(TableMetadata::new("t", &["a", "b"]));
        db.schema_mut("sales").tables.push(TableMetadata::new("t", &["x"]));
        db.schema_mut("sales").functions.push(FunctionMetadata {
            name: "f".to_string(),
            definition: "CREATE FUNCTION sales.f() ...".to_string(),
        });
        db.schema_mut("public").functions.push(FunctionMetadata {
            name: "f".to_string(),
            definition: "CREATE FUNCTION public.f() ...".to_string(),
        });
        db
    }

    #[test]
    fn search_path_order_wins() {
        let db = sample();

        let (schema, table) = db.search_table(&path(&["sales", "public"]), "t").unwrap();
        assert_eq!(schema, "sales");
        assert_eq!(table.column_names(), vec!["x".to_string()]);

        let (schema, _) = db.search_table(&path(&["public", "sales"]), "t").unwrap();
        assert_eq!(schema, "public");
    }

    #[test]
    fn missing_schema_is_skipped() {
        let db = sample();
        let (schema, _) = db.search_table(&path(&["nope", "public"]), "t").unwrap();
        assert_eq!(schema, "public");
        assert!(db.search_table(&path(&["nope"]), "t").is_none());
    }

    #[test]
    fn functions_across_schemas() {
        let db = sample();
        let found = db.search_function(&path(&["public", "sales"]), "f");
        let schemas: Vec<&str> = found.iter().map(|(s, _)| *s).collect();
        assert_eq!(schemas, vec!["public", "sales"]);
    }

    #[test]
    fn json_shape() {
        let json = r#"{
            "name": "db",
            "schemas": [{
                "name": "public",
                "tables": [{"name": "t", "columns": [{"name": "a", "type": "integer"}]}],
                "views": [{"name": "v", "definition": "SELECT a FROM t"}]
            }]
        }"#;

        let db: DatabaseMetadata = serde_json::from_str(json).unwrap();
        let public = db.schema("public").unwrap();
        assert_eq!(public.tables[0].columns[0].data_type.as_deref(), Some("integer"));
        assert_eq!(public.views[0].definition, "SELECT a FROM t");
        assert!(public.sequences.is_empty());
    }
}
