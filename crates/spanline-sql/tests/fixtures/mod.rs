//! Test fixtures for span integration tests
//!
//! One database `db` with the four-column table `t(a, b, c, d)` used by
//! most lineage properties, plus views, functions and other relation kinds
//! built on top of it.

#![allow(dead_code)]

use spanline_catalog::{CatalogBuilder, InMemoryCatalog};
use spanline_core::{ColumnResource, SourceColumnSet};

pub fn catalog() -> InMemoryCatalog {
    CatalogBuilder::new("db")
        .with_table("public", "t", &["a", "b", "c", "d"])
        .with_table("public", "u", &["a", "x"])
        .with_table("app", "t", &["a", "z"])
        .with_view("public", "v_ab", "SELECT a, b AS bee FROM t")
        .with_view("public", "v_chain", "SELECT bee FROM v_ab")
        .with_materialized_view(
            "public",
            "mv_sum",
            "SELECT a, sum(b) AS total FROM t GROUP BY a",
        )
        .with_sequence("public", "t_seq")
        .with_external_table("public", "ext_events", &["id", "payload"])
        .with_function(
            "public",
            "t_pairs",
            "CREATE FUNCTION public.t_pairs() RETURNS TABLE(x integer, y integer) LANGUAGE sql AS $$ SELECT a, b FROM t $$",
        )
        .with_function(
            "public",
            "add_c",
            "CREATE FUNCTION public.add_c(v integer) RETURNS integer LANGUAGE sql AS $$ SELECT v + c FROM t $$",
        )
        .with_function(
            "public",
            "best_d",
            "CREATE FUNCTION public.best_d(min_a integer) RETURNS TABLE(d integer) LANGUAGE plpgsql AS $$
            BEGIN
                RETURN QUERY SELECT d FROM t WHERE a > min_a;
            END
            $$",
        )
        .with_function(
            "public",
            "guarded",
            "CREATE FUNCTION public.guarded() RETURNS SETOF integer LANGUAGE plpgsql AS $$
            BEGIN
                IF EXISTS (SELECT 1 FROM t WHERE d > 0) THEN
                    RETURN QUERY SELECT a FROM t;
                END IF;
            END
            $$",
        )
        .with_function(
            "public",
            "pick",
            "CREATE FUNCTION public.pick(p integer) RETURNS integer LANGUAGE sql AS 'SELECT c FROM t'",
        )
        .with_function(
            "public",
            "pick",
            "CREATE FUNCTION public.pick(p integer, q integer) RETURNS integer LANGUAGE sql AS 'SELECT d FROM t'",
        )
        .with_function(
            "public",
            "amb",
            "CREATE FUNCTION public.amb(p integer) RETURNS integer LANGUAGE sql AS 'SELECT c FROM t'",
        )
        .with_function(
            "public",
            "amb",
            "CREATE FUNCTION public.amb(p text) RETURNS integer LANGUAGE sql AS 'SELECT d FROM t'",
        )
        .with_function(
            "public",
            "native_hash",
            "CREATE FUNCTION public.native_hash(text) RETURNS integer LANGUAGE c AS 'hashlib', 'native_hash'",
        )
        .with_function(
            "public",
            "js_len",
            "CREATE FUNCTION public.js_len(s text) RETURNS integer LANGUAGE plv8 AS $$ return s.length $$",
        )
        .with_function(
            "public",
            "recurse",
            "CREATE FUNCTION public.recurse() RETURNS integer LANGUAGE sql AS $$ SELECT recurse() $$",
        )
        .build()
}

/// Column of `db.public.<table>`
pub fn col(table: &str, column: &str) -> ColumnResource {
    ColumnResource::new("db", "public", table, column)
}

/// Set of `db.public` columns given as `(table, column)` pairs
pub fn cols(columns: &[(&str, &str)]) -> SourceColumnSet {
    columns.iter().map(|(t, c)| col(t, c)).collect()
}
