//! Catalog snapshots for span analysis
//!
//! The resolver asks a [`CatalogResolver`] for the metadata of one database
//! at a time and searches it by schema search path and name.
//!
//! ## Features
//!
//! - `postgres` - load a snapshot from a live PostgreSQL database
//!
//! ## Example
//!
//! ```rust,ignore
//! use spanline_catalog::{CatalogBuilder, CatalogResolver};
//!
//! let catalog = CatalogBuilder::new("db")
//!     .with_table("public", "users", &["id", "email"])
//!     .build();
//! let metadata = catalog.resolve("db")?;
//! let (schema, users) = metadata.search_table(&["public".to_string()], "users").unwrap();
//! ```

pub mod adapter;
pub mod metadata;
pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use adapter::{CatalogResolver, CatalogError};
pub use metadata::{
    DatabaseMetadata, SchemaMetadata, TableMetadata, ColumnMetadata, ViewMetadata,
    SequenceMetadata, FunctionMetadata,
};
pub use memory::{InMemoryCatalog, CatalogBuilder};

#[cfg(feature = "postgres")]
pub use postgres::PostgresCatalogLoader;
