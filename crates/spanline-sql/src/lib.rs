//! Column-level lineage for PostgreSQL queries
//!
//! This crate handles:
//! - Parsing PostgreSQL statements using datafusion-sqlparser-rs
//! - Resolving CTEs, views, subqueries, joins and set operations into the
//!   base columns each result column is derived from
//! - Analyzing the bodies of SQL and PL/pgSQL functions called by a query
//! - Collecting the set of base columns a statement reads
//! - Recognizing statements that read the system catalogs
//!
//! [`QuerySpanExtractor`] is the entry point.

pub mod parser;
pub mod naming;
pub mod builtin;
pub mod tokens;
pub mod declaration;
pub mod table_source;
pub mod scope;
pub mod context;
pub mod join;
pub mod set_operation;
pub mod system;
pub mod extractor;

mod resolver;
mod select;
mod from;
mod cte;
mod expression;
mod function;
mod plpgsql;

pub use parser::{SqlParser, ParsedSql, ParseError};
pub use extractor::{QuerySpanExtractor, DEFAULT_MAX_DEPTH};
pub use declaration::{FunctionDeclaration, FunctionParameter, ParameterMode};
pub use context::{AnalysisContext, ObjectTarget};
pub use scope::ScopeStack;
pub use table_source::{TableSource, PhysicalTable, PhysicalView, PseudoTable, SequenceSource};
pub use join::JoinOutput;
pub use set_operation::merge_set_operation;
pub use system::{RelationAccess, SYSTEM_SCHEMAS};
