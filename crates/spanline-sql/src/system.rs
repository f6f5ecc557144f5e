//! System catalog access
//!
//! Catalog snapshots never include the system schemas, so relations such as
//! `pg_catalog.pg_class` cannot be resolved. A statement that reads only
//! system relations has an empty span; one that reads system relations
//! together with user tables is rejected.

use std::collections::HashSet;
use std::ops::ControlFlow;

use sqlparser::ast::{Query, Statement, TableFactor, Visit, Visitor};
use spanline_core::SpanError;

use crate::naming::{normalize_ident, object_name_parts};

/// Schemas owned by the server
pub const SYSTEM_SCHEMAS: &[&str] = &["pg_catalog", "information_schema", "pg_toast"];

/// Relations of `pg_catalog` that are commonly referenced without a schema
const SYSTEM_RELATIONS: &[&str] = &[
    "pg_aggregate",
    "pg_am",
    "pg_attrdef",
    "pg_attribute",
    "pg_auth_members",
    "pg_authid",
    "pg_available_extensions",
    "pg_cast",
    "pg_class",
    "pg_collation",
    "pg_constraint",
    "pg_cursors",
    "pg_database",
    "pg_depend",
    "pg_description",
    "pg_enum",
    "pg_event_trigger",
    "pg_extension",
    "pg_foreign_data_wrapper",
    "pg_foreign_server",
    "pg_foreign_table",
    "pg_group",
    "pg_index",
    "pg_indexes",
    "pg_inherits",
    "pg_language",
    "pg_locks",
    "pg_matviews",
    "pg_namespace",
    "pg_opclass",
    "pg_operator",
    "pg_policies",
    "pg_policy",
    "pg_prepared_statements",
    "pg_proc",
    "pg_publication",
    "pg_range",
    "pg_replication_slots",
    "pg_rewrite",
    "pg_roles",
    "pg_rules",
    "pg_sequence",
    "pg_sequences",
    "pg_settings",
    "pg_shadow",
    "pg_shdescription",
    "pg_stat_activity",
    "pg_stat_all_tables",
    "pg_stat_database",
    "pg_stat_replication",
    "pg_stat_user_indexes",
    "pg_stat_user_tables",
    "pg_statio_user_tables",
    "pg_statistic",
    "pg_stats",
    "pg_subscription",
    "pg_tables",
    "pg_tablespace",
    "pg_timezone_names",
    "pg_trigger",
    "pg_type",
    "pg_user",
    "pg_user_mappings",
    "pg_views",
];

pub fn is_system_schema(schema: &str) -> bool {
    SYSTEM_SCHEMAS.contains(&schema) || schema.starts_with("pg_toast_temp") || schema.starts_with("pg_temp")
}

/// Why a relation name refers to a system relation, if it does
///
/// An explicit schema decides on its own. A bare name is a system relation
/// when it names one of the well-known `pg_catalog` relations, since
/// `pg_catalog` is searched before the search path.
pub fn system_relation(parts: &[String]) -> Option<String> {
    match parts {
        [name] if SYSTEM_RELATIONS.contains(&name.as_str()) => Some(format!("system relation \"{}\"", name)),
        [.., schema, _] if is_system_schema(schema) => Some(format!("system schema \"{}\"", schema)),
        _ => None,
    }
}

/// Relations a statement reads, split into user and system ones
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RelationAccess {
    /// First user relation, as written
    pub user: Option<String>,

    /// First system relation, with the reason it is one
    pub system: Option<String>,
}

impl RelationAccess {
    /// Classify every relation named in a FROM clause of the statement
    ///
    /// Names of CTEs defined anywhere in the statement are not relations.
    /// Views and function bodies are not looked into.
    pub fn scan(statement: &Statement) -> Self {
        let mut collector = RelationCollector::default();
        let _ = statement.visit(&mut collector);

        let mut access = Self::default();
        for parts in &collector.relations {
            if let [name] = parts.as_slice() {
                if collector.ctes.contains(name) {
                    continue;
                }
            }
            match system_relation(parts) {
                Some(reason) => {
                    access.system.get_or_insert(reason);
                }
                None => {
                    access.user.get_or_insert_with(|| parts.join("."));
                }
            }
        }
        access
    }

    /// Only system relations are read
    pub fn is_system_only(&self) -> bool {
        self.system.is_some() && self.user.is_none()
    }

    /// Reject statements reading user and system relations together
    pub fn check(&self) -> Result<(), SpanError> {
        match (&self.user, &self.system) {
            (Some(user), Some(system)) => Err(SpanError::MixedSystemAccess {
                user: format!("user table \"{}\"", user),
                system: system.clone(),
            }),
            _ => Ok(()),
        }
    }
}

#[derive(Default)]
struct RelationCollector {
    ctes: HashSet<String>,
    relations: Vec<Vec<String>>,
}

impl Visitor for RelationCollector {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        if let Some(with) = &query.with {
            self.ctes
                .extend(with.cte_tables.iter().map(|cte| normalize_ident(&cte.alias.name)));
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_table_factor(&mut self, table_factor: &TableFactor) -> ControlFlow<Self::Break> {
        // Relations only; function calls in FROM carry arguments
        if let TableFactor::Table { name, args: None, .. } = table_factor {
            self.relations.push(object_name_parts(name));
        }
        ControlFlow::Continue(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::SqlParser;
    use pretty_assertions::assert_eq;

    fn scan(sql: &str) -> RelationAccess {
        let statements = SqlParser::new().parse_statements(sql, "test").unwrap();
        RelationAccess::scan(&statements[0])
    }

    fn parts(name: &str) -> Vec<String> {
        name.split('.').map(str::to_string).collect()
    }

    #[test]
    fn recognizes_system_relations() {
        assert!(system_relation(&parts("pg_class")).is_some());
        assert!(system_relation(&parts("pg_catalog.pg_class")).is_some());
        assert!(system_relation(&parts("information_schema.columns")).is_some());
        assert!(system_relation(&parts("db.pg_catalog.anything")).is_some());

        assert_eq!(system_relation(&parts("public.pg_class")), None);
        assert_eq!(system_relation(&parts("columns")), None);
        assert_eq!(system_relation(&parts("t")), None);
    }

    #[test]
    fn scans_from_clauses() {
        let access = scan("SELECT relname FROM pg_catalog.pg_class JOIN pg_namespace n ON true");
        assert!(access.is_system_only());
        assert_eq!(access.system.as_deref(), Some("system schema \"pg_catalog\""));

        let access = scan("SELECT a FROM t WHERE b IN (SELECT oid FROM pg_class)");
        assert_eq!(access.user.as_deref(), Some("t"));
        assert!(access.check().is_err());
    }

    #[test]
    fn ctes_and_functions_are_not_relations() {
        let access = scan("WITH c AS (SELECT 1 AS x) SELECT * FROM c, generate_series(1, 3)");
        assert_eq!(access, RelationAccess::default());
        assert!(!access.is_system_only());

        let access = scan("WITH c AS (SELECT * FROM pg_tables) SELECT * FROM c");
        assert!(access.is_system_only());
    }
}
