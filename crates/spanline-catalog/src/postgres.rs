//! PostgreSQL catalog loader
//!
//! Builds a [`DatabaseMetadata`] snapshot from a live PostgreSQL database:
//! - tables and foreign tables from information_schema.columns
//! - views from pg_views, materialized views from pg_matviews
//! - sequences from pg_sequences
//! - functions from pg_proc via pg_get_functiondef
//!
//! ## Usage
//!
//! ```rust,ignore
//! let loader = PostgresCatalogLoader::from_connection_string(
//!     "host=localhost port=5432 dbname=mydb user=postgres password=secret"
//! ).await?;
//! let snapshot = loader.load().await?;
//! ```

use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use tokio_postgres::{Client, Config as PgConfig, NoTls};

use crate::adapter::CatalogError;
use crate::metadata::{
    ColumnMetadata, DatabaseMetadata, FunctionMetadata, SequenceMetadata, TableMetadata,
    ViewMetadata,
};

const SYSTEM_SCHEMAS: &str = "'pg_catalog', 'information_schema', 'pg_toast'";

/// Loads catalog snapshots over a PostgreSQL connection
pub struct PostgresCatalogLoader {
    client: Client,
    database: String,
}

impl PostgresCatalogLoader {
    /// Connect with a PostgreSQL connection string
    ///
    /// `host=localhost port=5432 dbname=mydb user=postgres password=secret`
    pub async fn from_connection_string(conn_str: &str) -> Result<Self, CatalogError> {
        let database = Self::database_name(conn_str)?;

        let (client, connection) = tokio_postgres::connect(conn_str, NoTls)
            .await
            .map_err(|e| CatalogError::AuthenticationError(format!("Failed to connect: {}", e)))?;

        // Spawn connection handler in background
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "PostgreSQL connection error");
            }
        });

        Ok(Self { client, database })
    }

    /// Connect with a connection string over TLS
    pub async fn from_connection_string_with_tls(conn_str: &str) -> Result<Self, CatalogError> {
        let database = Self::database_name(conn_str)?;

        let connector = TlsConnector::builder()
            .build()
            .map_err(|e| CatalogError::ConfigError(format!("Failed to create TLS connector: {}", e)))?;
        let tls = MakeTlsConnector::new(connector);

        let (client, connection) = tokio_postgres::connect(conn_str, tls)
            .await
            .map_err(|e| CatalogError::AuthenticationError(format!("Failed to connect with TLS: {}", e)))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "PostgreSQL TLS connection error");
            }
        });

        Ok(Self { client, database })
    }

    fn database_name(conn_str: &str) -> Result<String, CatalogError> {
        let config: PgConfig = conn_str
            .parse()
            .map_err(|e| CatalogError::ConfigError(format!("Invalid connection string: {}", e)))?;
        Ok(config.get_dbname().unwrap_or("postgres").to_string())
    }

    /// Get the database name
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Load a full snapshot of the connected database
    pub async fn load(&self) -> Result<DatabaseMetadata, CatalogError> {
        let mut snapshot = DatabaseMetadata::new(self.database.clone());

        self.load_relations(&mut snapshot).await?;
        self.load_views(&mut snapshot).await?;
        self.load_materialized_views(&mut snapshot).await?;
        self.load_sequences(&mut snapshot).await?;
        self.load_functions(&mut snapshot).await?;

        tracing::info!(
            database = %self.database,
            schemas = snapshot.schemas.len(),
            "loaded catalog snapshot"
        );
        Ok(snapshot)
    }

    async fn query(&self, sql: &str) -> Result<Vec<tokio_postgres::Row>, CatalogError> {
        self.client.query(sql, &[]).await.map_err(|e| {
            let message = e.to_string();
            if message.contains("permission denied") {
                CatalogError::AuthenticationError(message)
            } else {
                CatalogError::QueryError(message)
            }
        })
    }

    async fn load_relations(&self, snapshot: &mut DatabaseMetadata) -> Result<(), CatalogError> {
        let sql = format!(
            r#"
            SELECT c.table_schema, c.table_name, c.column_name, c.data_type, t.table_type
            FROM information_schema.columns c
            JOIN information_schema.tables t
              ON t.table_schema = c.table_schema AND t.table_name = c.table_name
            WHERE c.table_schema NOT IN ({})
              AND t.table_type IN ('BASE TABLE', 'FOREIGN')
            ORDER BY c.table_schema, c.table_name, c.ordinal_position
            "#,
            SYSTEM_SCHEMAS
        );

        for row in self.query(&sql).await? {
            let schema: String = row.get(0);
            let table: String = row.get(1);
            let column = ColumnMetadata {
                name: row.get(2),
                data_type: Some(row.get(3)),
            };
            let table_type: String = row.get(4);

            let target = snapshot.schema_mut(&schema);
            let tables = if table_type == "FOREIGN" {
                &mut target.external_tables
            } else {
                &mut target.tables
            };

            match tables.iter().position(|t| t.name == table) {
                Some(index) => tables[index].columns.push(column),
                None => tables.push(TableMetadata {
                    name: table,
                    columns: vec![column],
                }),
            }
        }
        Ok(())
    }

    async fn load_views(&self, snapshot: &mut DatabaseMetadata) -> Result<(), CatalogError> {
        let sql = format!(
            "SELECT schemaname, viewname, definition FROM pg_catalog.pg_views WHERE schemaname NOT IN ({}) ORDER BY 1, 2",
            SYSTEM_SCHEMAS
        );
        for row in self.query(&sql).await? {
            let schema: String = row.get(0);
            snapshot.schema_mut(&schema).views.push(ViewMetadata {
                name: row.get(1),
                definition: row.get(2),
            });
        }
        Ok(())
    }

    async fn load_materialized_views(&self, snapshot: &mut DatabaseMetadata) -> Result<(), CatalogError> {
        let sql = format!(
            "SELECT schemaname, matviewname, definition FROM pg_catalog.pg_matviews WHERE schemaname NOT IN ({}) ORDER BY 1, 2",
            SYSTEM_SCHEMAS
        );
        for row in self.query(&sql).await? {
            let schema: String = row.get(0);
            snapshot.schema_mut(&schema).materialized_views.push(ViewMetadata {
                name: row.get(1),
                definition: row.get(2),
            });
        }
        Ok(())
    }

    async fn load_sequences(&self, snapshot: &mut DatabaseMetadata) -> Result<(), CatalogError> {
        let sql = format!(
            "SELECT schemaname, sequencename FROM pg_catalog.pg_sequences WHERE schemaname NOT IN ({}) ORDER BY 1, 2",
            SYSTEM_SCHEMAS
        );
        for row in self.query(&sql).await? {
            let schema: String = row.get(0);
            snapshot.schema_mut(&schema).sequences.push(SequenceMetadata { name: row.get(1) });
        }
        Ok(())
    }

    async fn load_functions(&self, snapshot: &mut DatabaseMetadata) -> Result<(), CatalogError> {
        // Aggregates and window functions have no function definition
        let sql = format!(
            r#"
            SELECT n.nspname, p.proname, pg_catalog.pg_get_functiondef(p.oid)
            FROM pg_catalog.pg_proc p
            JOIN pg_catalog.pg_namespace n ON n.oid = p.pronamespace
            WHERE n.nspname NOT IN ({})
              AND p.prokind IN ('f', 'p')
              AND NOT EXISTS (
                  SELECT 1 FROM pg_catalog.pg_depend d
                  WHERE d.objid = p.oid AND d.deptype = 'e'
              )
            ORDER BY 1, 2
            "#,
            SYSTEM_SCHEMAS
        );
        for row in self.query(&sql).await? {
            let schema: String = row.get(0);
            snapshot.schema_mut(&schema).functions.push(FunctionMetadata {
                name: row.get(1),
                definition: row.get(2),
            });
        }
        Ok(())
    }
}
