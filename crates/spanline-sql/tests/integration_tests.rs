//! Integration tests for query span extraction

mod fixtures;

use fixtures::{catalog, col, cols};
use pretty_assertions::assert_eq;
use spanline_core::{ColumnResource, QuerySpan, ResourceKind, SourceColumnSet, SpanError, StatementKind};
use spanline_sql::QuerySpanExtractor;

fn span(sql: &str) -> QuerySpan {
    let catalog = catalog();
    QuerySpanExtractor::new(&catalog, "db")
        .get_query_span(sql)
        .unwrap()
}

fn span_err(sql: &str) -> SpanError {
    let catalog = catalog();
    QuerySpanExtractor::new(&catalog, "db")
        .get_query_span(sql)
        .unwrap_err()
}

fn names(span: &QuerySpan) -> Vec<&str> {
    span.results.iter().map(|c| c.name.as_str()).collect()
}

fn sources(span: &QuerySpan) -> Vec<SourceColumnSet> {
    span.results.iter().map(|c| c.sources.clone()).collect()
}

#[test]
fn select_star_follows_catalog_order() {
    let span = crate::span("SELECT * FROM t");

    assert_eq!(span.kind, StatementKind::Select);
    assert_eq!(names(&span), vec!["a", "b", "c", "d"]);
    for column in &span.results {
        assert_eq!(column.sources, SourceColumnSet::single(col("t", &column.name)));
    }
    assert_eq!(span.source_columns, cols(&[("t", "a"), ("t", "b"), ("t", "c"), ("t", "d")]));
}

#[test]
fn merging_a_set_with_itself_is_idempotent() {
    let mut set = cols(&[("t", "a"), ("t", "b")]);
    let copy = set.clone();
    assert!(!set.merge(&copy));
    assert_eq!(set, copy);
}

#[test]
fn union_arity_mismatch_is_hard() {
    let err = span_err("SELECT a, b FROM t UNION SELECT a FROM t");
    assert!(matches!(err, SpanError::MalformedQuery { .. }));

    let err = span_err("SELECT 1 UNION ALL SELECT 1, 2");
    assert!(matches!(err, SpanError::MalformedQuery { .. }));
}

#[test]
fn using_join_merges_listed_columns() {
    let span = crate::span("SELECT * FROM t AS t1 JOIN t AS t2 USING(a)");

    assert_eq!(names(&span), vec!["a", "b", "c", "d", "b", "c", "d"]);
    assert_eq!(
        sources(&span),
        vec![
            cols(&[("t", "a")]),
            cols(&[("t", "b")]),
            cols(&[("t", "c")]),
            cols(&[("t", "d")]),
            cols(&[("t", "b")]),
            cols(&[("t", "c")]),
            cols(&[("t", "d")]),
        ]
    );
}

#[test]
fn using_join_merges_both_sides() {
    let span = crate::span("SELECT a FROM t JOIN u USING (a)");
    assert_eq!(sources(&span), vec![cols(&[("t", "a"), ("u", "a")])]);
    assert!(span.source_columns.contains(&col("u", "a")));
}

#[test]
fn natural_join_merges_shared_names() {
    let span = crate::span("SELECT * FROM t AS t1 NATURAL JOIN t AS t2");
    assert_eq!(names(&span), vec!["a", "b", "c", "d"]);

    let span = crate::span("SELECT * FROM t NATURAL JOIN u");
    assert_eq!(names(&span), vec!["a", "b", "c", "d", "x"]);
    assert_eq!(span.results[0].sources, cols(&[("t", "a"), ("u", "a")]));
    assert_eq!(span.results[4].sources, cols(&[("u", "x")]));
}

#[test]
fn using_unknown_column() {
    let span = crate::span("SELECT * FROM t JOIN u USING (z)");
    assert!(span.is_degraded());
    assert!(matches!(
        span.not_found_error,
        Some(SpanError::ResourceNotFound {
            resource: ResourceKind::Column,
            ..
        })
    ));
}

#[test]
fn recursive_cte_reaches_fixed_point() {
    let span = crate::span(
        "WITH RECURSIVE t1(cc1, cc2, cc3, n) AS (
            SELECT a, b, c, 1 FROM t
            UNION
            SELECT cc1 * cc2, cc2 + cc1, cc3 * cc2, n + 1 FROM t1 WHERE n < 5
        )
        SELECT * FROM t1",
    );

    assert_eq!(names(&span), vec!["cc1", "cc2", "cc3", "n"]);
    assert_eq!(
        sources(&span),
        vec![
            cols(&[("t", "a"), ("t", "b")]),
            cols(&[("t", "a"), ("t", "b")]),
            cols(&[("t", "a"), ("t", "b"), ("t", "c")]),
            SourceColumnSet::new(),
        ]
    );
}

#[test]
fn recursive_cte_without_union_is_plain() {
    let span = crate::span("WITH RECURSIVE r AS (SELECT a FROM t) SELECT a FROM r");
    assert_eq!(sources(&span), vec![cols(&[("t", "a")])]);
}

#[test]
fn recursive_part_arity_mismatch() {
    let err = span_err(
        "WITH RECURSIVE r(x) AS (SELECT a FROM t UNION ALL SELECT x, x FROM r) SELECT * FROM r",
    );
    assert!(matches!(err, SpanError::MalformedQuery { .. }));
}

#[test]
fn correlated_subquery_sees_outer_alias() {
    let span = crate::span("SELECT a, (SELECT max(b) > y.a FROM t AS x) FROM t AS y");

    assert_eq!(span.results[0].sources, cols(&[("t", "a")]));
    assert_eq!(span.results[1].sources, cols(&[("t", "a"), ("t", "b")]));
}

#[test]
fn uncorrelated_subquery_uses_its_own_from() {
    let span = crate::span("SELECT t.a, (SELECT max(a) FROM t) FROM t AS t1 JOIN t ON t.a = t1.b");
    assert_eq!(span.results[0].sources, cols(&[("t", "a")]));
    assert_eq!(span.results[1].sources, cols(&[("t", "a")]));
    assert!(span.source_columns.contains(&col("t", "b")));

    let span = crate::span("SELECT y.a, (SELECT max(a) FROM u) AS top FROM t AS y");
    assert_eq!(span.results[1].name, "top");
    assert_eq!(span.results[1].sources, cols(&[("u", "a")]));
}

#[test]
fn exists_and_in_subqueries_feed_lineage() {
    let span = crate::span("SELECT a IN (SELECT x FROM u) AS hit FROM t");
    assert_eq!(span.results[0].sources, cols(&[("t", "a"), ("u", "x")]));

    let span = crate::span("SELECT EXISTS (SELECT 1 FROM u WHERE u.a = t.b) FROM t");
    assert_eq!(names(&span), vec!["exists"]);
    assert!(span.source_columns.contains(&col("u", "a")));
    assert!(span.source_columns.contains(&col("t", "b")));
}

#[test]
fn values_lists() {
    let span = crate::span("SELECT * FROM (VALUES (1, 'x'), (2, 'y')) AS v");
    assert_eq!(names(&span), vec!["column1", "column2"]);
    assert!(span.results.iter().all(|c| c.sources.is_empty()));

    let span = crate::span("SELECT v.x FROM t, LATERAL (VALUES (t.a), (t.b)) AS v(x)");
    assert_eq!(sources(&span), vec![cols(&[("t", "a"), ("t", "b")])]);

    let err = span_err("VALUES (1, 2), (3)");
    assert!(matches!(err, SpanError::MalformedQuery { .. }));
}

#[test]
fn except_keeps_left_and_intersect_unions() {
    let span = crate::span("SELECT a FROM t EXCEPT SELECT x FROM u");
    assert_eq!(sources(&span), vec![cols(&[("t", "a")])]);

    let span = crate::span("SELECT a FROM t INTERSECT SELECT x FROM u");
    assert_eq!(sources(&span), vec![cols(&[("t", "a"), ("u", "x")])]);

    let span = crate::span("SELECT a AS first FROM t UNION SELECT b FROM t UNION SELECT x FROM u");
    assert_eq!(names(&span), vec!["first"]);
    assert_eq!(sources(&span), vec![cols(&[("t", "a"), ("t", "b"), ("u", "x")])]);
}

#[test]
fn cte_columns_and_aliases() {
    let span = crate::span("WITH c AS (SELECT a AS x, b FROM t) SELECT x, b FROM c");
    assert_eq!(sources(&span), vec![cols(&[("t", "a")]), cols(&[("t", "b")])]);

    let span = crate::span("WITH c(p, q) AS (SELECT a, b FROM t), d AS (SELECT q FROM c) SELECT * FROM d");
    assert_eq!(names(&span), vec!["q"]);
    assert_eq!(sources(&span), vec![cols(&[("t", "b")])]);

    let err = span_err("WITH c(x, y) AS (SELECT a FROM t) SELECT * FROM c");
    assert!(matches!(err, SpanError::MalformedQuery { .. }));
}

#[test]
fn nested_with_shadows_outer_cte() {
    let span = crate::span(
        "WITH c AS (SELECT a AS v FROM t)
        SELECT (SELECT v FROM (WITH c AS (SELECT b AS v FROM t) SELECT v FROM c) s), v FROM c",
    );
    assert_eq!(sources(&span), vec![cols(&[("t", "b")]), cols(&[("t", "a")])]);
}

#[test]
fn table_alias_renames_columns() {
    let span = crate::span("SELECT p, b FROM t AS x(p)");
    assert_eq!(sources(&span), vec![cols(&[("t", "a")]), cols(&[("t", "b")])]);

    let err = span_err("SELECT * FROM u AS x(p, q, r)");
    assert!(matches!(err, SpanError::MalformedQuery { .. }));
}

#[test]
fn explain_analyze_reports_reads_only() {
    let span = crate::span("EXPLAIN ANALYZE SELECT a FROM t WHERE b > 0");
    assert_eq!(span.kind, StatementKind::Explain);
    assert!(span.explain_analyze);
    assert!(span.results.is_empty());
    assert_eq!(span.source_columns, cols(&[("t", "a"), ("t", "b")]));

    let span = crate::span("EXPLAIN SELECT a FROM t");
    assert!(!span.explain_analyze);
    assert_eq!(names(&span), vec!["a"]);
}

#[test]
fn missing_column_degrades_with_sentinel() {
    let span = crate::span("SELECT a, missing FROM t");

    assert!(span.is_degraded());
    assert!(span.results.is_empty());
    assert!(span.source_columns.contains(&col("t", "a")));
    assert!(span.source_columns.contains(&ColumnResource::whole_database("db")));
    assert!(span.source_columns.has_sentinel());
    assert_eq!(
        span.not_found_error,
        Some(SpanError::ResourceNotFound {
            resource: ResourceKind::Column,
            name: "missing".to_string(),
        })
    );
}

#[test]
fn missing_table_degrades() {
    let span = crate::span("SELECT * FROM nowhere");
    assert!(span.is_degraded());
    assert!(matches!(
        span.not_found_error,
        Some(SpanError::ResourceNotFound {
            resource: ResourceKind::Table,
            ..
        })
    ));
}

#[test]
fn fail_closed_returns_error() {
    let catalog = catalog();
    let extractor = QuerySpanExtractor::new(&catalog, "db").with_fail_open(false);
    let err = extractor.get_query_span("SELECT missing FROM t").unwrap_err();
    assert!(err.is_fail_open());
}

#[test]
fn exactly_one_statement() {
    let err = span_err("SELECT 1; SELECT 2");
    assert!(matches!(err, SpanError::MalformedQuery { .. }));

    let err = span_err("SELEC 1");
    assert!(matches!(err, SpanError::Parse { .. }));
}

#[test]
fn star_without_from_is_malformed() {
    let err = span_err("SELECT *");
    assert!(matches!(err, SpanError::MalformedQuery { .. }));
}

#[test]
fn views_expand_to_base_columns() {
    let span = crate::span("SELECT bee FROM v_ab");
    assert_eq!(sources(&span), vec![cols(&[("t", "b")])]);

    let span = crate::span("SELECT * FROM v_chain");
    assert_eq!(names(&span), vec!["bee"]);
    assert_eq!(sources(&span), vec![cols(&[("t", "b")])]);

    let span = crate::span("SELECT total FROM mv_sum");
    assert_eq!(sources(&span), vec![cols(&[("t", "b")])]);
    assert_eq!(span.source_columns, cols(&[("t", "a"), ("t", "b")]));
}

#[test]
fn other_relation_kinds() {
    let span = crate::span("SELECT last_value, is_called FROM t_seq");
    assert_eq!(
        sources(&span),
        vec![cols(&[("t_seq", "last_value")]), cols(&[("t_seq", "is_called")])]
    );

    let span = crate::span("SELECT payload FROM ext_events");
    assert_eq!(sources(&span), vec![cols(&[("ext_events", "payload")])]);
}

#[test]
fn search_path_order() {
    let catalog = catalog();
    let extractor = QuerySpanExtractor::new(&catalog, "db")
        .with_search_path(vec!["app".to_string(), "public".to_string()]);

    let span = extractor.get_query_span("SELECT z FROM t").unwrap();
    assert_eq!(
        span.results[0].sources,
        SourceColumnSet::single(ColumnResource::new("db", "app", "t", "z"))
    );

    let span = extractor.get_query_span("SELECT d FROM public.t").unwrap();
    assert_eq!(span.results[0].sources, cols(&[("t", "d")]));

    let span = extractor.get_query_span("SELECT x FROM u").unwrap();
    assert_eq!(span.results[0].sources, cols(&[("u", "x")]));
}

#[test]
fn qualified_column_references() {
    let span = crate::span("SELECT public.t.a, db.public.t.b FROM t");
    assert_eq!(sources(&span), vec![cols(&[("t", "a")]), cols(&[("t", "b")])]);

    let err = span_err("SELECT x.db.public.t.a FROM t");
    assert!(matches!(err, SpanError::MalformedQuery { .. }));
}

#[test]
fn sql_function_lineage() {
    let span = crate::span("SELECT add_c(a) FROM t");
    assert_eq!(names(&span), vec!["add_c"]);
    assert_eq!(sources(&span), vec![cols(&[("t", "a"), ("t", "c")])]);

    let span = crate::span("SELECT x, y FROM t_pairs()");
    assert_eq!(sources(&span), vec![cols(&[("t", "a")]), cols(&[("t", "b")])]);

    let span = crate::span("SELECT s FROM add_c(1) AS s");
    assert_eq!(sources(&span), vec![cols(&[("t", "c")])]);
}

#[test]
fn plpgsql_function_lineage() {
    let span = crate::span("SELECT * FROM best_d(1)");
    assert_eq!(names(&span), vec!["d"]);
    assert_eq!(sources(&span), vec![cols(&[("t", "d")])]);
}

#[test]
fn plpgsql_conditions_are_read() {
    let span = crate::span("SELECT * FROM guarded()");
    assert_eq!(names(&span), vec!["guarded"]);
    assert_eq!(sources(&span), vec![cols(&[("t", "a")])]);
    assert!(span.source_columns.contains(&col("t", "d")));
}

#[test]
fn overloads_resolve_by_arity() {
    let span = crate::span("SELECT pick(a) FROM t");
    assert_eq!(sources(&span), vec![cols(&[("t", "a"), ("t", "c")])]);

    let span = crate::span("SELECT pick(a, b) FROM t");
    assert_eq!(sources(&span), vec![cols(&[("t", "a"), ("t", "b"), ("t", "d")])]);

    let err = span_err("SELECT amb(a) FROM t");
    assert!(matches!(err, SpanError::AmbiguousCall { candidates: 2, .. }));
}

#[test]
fn unsupported_functions_degrade() {
    let span = crate::span("SELECT native_hash(b) FROM t");
    assert!(matches!(span.not_found_error, Some(SpanError::FunctionNotSupported { .. })));
    assert!(span.source_columns.contains(&col("t", "b")));

    let span = crate::span("SELECT js_len(b) FROM t");
    assert!(matches!(span.not_found_error, Some(SpanError::TypeNotSupported { .. })));
}

#[test]
fn unknown_scalar_function_is_treated_as_builtin() {
    let span = crate::span("SELECT mystery(a, b) FROM t");
    assert!(!span.is_degraded());
    assert_eq!(sources(&span), vec![cols(&[("t", "a"), ("t", "b")])]);
}

#[test]
fn whole_row_references() {
    let span = crate::span("SELECT row_to_json(t) FROM t");
    assert_eq!(sources(&span), vec![cols(&[("t", "a"), ("t", "b"), ("t", "c"), ("t", "d")])]);

    let span = crate::span("SELECT count(x.*) FROM u AS x");
    assert_eq!(sources(&span), vec![cols(&[("u", "a"), ("u", "x")])]);
}

#[test]
fn qualified_star() {
    let span = crate::span("SELECT u.*, t.d FROM t JOIN u ON u.a = t.a");
    assert_eq!(names(&span), vec!["a", "x", "d"]);
    assert_eq!(span.results[0].sources, cols(&[("u", "a")]));
    assert!(span.source_columns.contains(&col("t", "a")));

    let span = crate::span("SELECT nope.* FROM t");
    assert!(matches!(
        span.not_found_error,
        Some(SpanError::ResourceNotFound {
            resource: ResourceKind::Table,
            ..
        })
    ));
}

#[test]
fn set_returning_builtins() {
    let span = crate::span("SELECT g FROM generate_series(1, 3) AS g");
    assert_eq!(names(&span), vec!["g"]);
    assert!(span.results[0].sources.is_empty());

    let span = crate::span("SELECT e.key, e.value FROM t, jsonb_each(t.a) AS e");
    assert_eq!(sources(&span), vec![cols(&[("t", "a")]), cols(&[("t", "a")])]);

    let span = crate::span("SELECT w FROM t, regexp_split_to_table(t.b, t.c) AS w");
    assert_eq!(sources(&span), vec![cols(&[("t", "b"), ("t", "c")])]);

    let span = crate::span("SELECT r.k FROM t, json_to_record(t.d) AS r(k text)");
    assert_eq!(sources(&span), vec![cols(&[("t", "d")])]);

    let span = crate::span("SELECT * FROM json_to_record('{}')");
    assert!(matches!(span.not_found_error, Some(SpanError::TypeNotSupported { .. })));
}

#[test]
fn unnest_in_from() {
    let span = crate::span("SELECT n FROM t, unnest(ARRAY[t.a, t.b]) AS n");
    assert_eq!(sources(&span), vec![cols(&[("t", "a"), ("t", "b")])]);
}

#[test]
fn clauses_feed_the_read_set() {
    let span = crate::span(
        "SELECT a AS k, count(*) FROM t WHERE d > 1 GROUP BY k HAVING max(c) > 0 ORDER BY k",
    );
    assert_eq!(names(&span), vec!["k", "count"]);
    assert_eq!(sources(&span), vec![cols(&[("t", "a")]), SourceColumnSet::new()]);
    assert_eq!(
        span.source_columns,
        cols(&[("t", "a"), ("t", "c"), ("t", "d")])
    );
}

#[test]
fn order_by_prefers_output_names() {
    let span = crate::span("SELECT a AS b FROM t ORDER BY b");
    assert_eq!(sources(&span), vec![cols(&[("t", "a")])]);
    assert_eq!(span.source_columns, cols(&[("t", "a")]));

    let span = crate::span("SELECT a AS b FROM t GROUP BY b");
    assert_eq!(span.source_columns, cols(&[("t", "a"), ("t", "b")]));
}

#[test]
fn window_and_filter_clauses() {
    let span = crate::span(
        "SELECT sum(a) FILTER (WHERE b > 0) OVER (PARTITION BY c ORDER BY d) AS running FROM t",
    );
    assert_eq!(
        sources(&span),
        vec![cols(&[("t", "a"), ("t", "b"), ("t", "c"), ("t", "d")])]
    );
}

#[test]
fn output_naming_heuristics() {
    let span = crate::span("SELECT a + 1, coalesce(b, 0), CASE WHEN c > 0 THEN d END, c::text, current_user FROM t");
    assert_eq!(names(&span), vec!["?column?", "coalesce", "case", "c", "current_user"]);
    assert_eq!(span.results[2].sources, cols(&[("t", "c"), ("t", "d")]));
    assert!(span.results[4].sources.is_empty());
}

#[test]
fn dml_statements_have_empty_spans() {
    let span = crate::span("UPDATE t SET a = 1 WHERE b = 2");
    assert_eq!(span.kind, StatementKind::Update);
    assert!(span.results.is_empty());

    let span = crate::span("INSERT INTO t (a) VALUES (1)");
    assert_eq!(span.kind, StatementKind::Insert);
}

#[test]
fn depth_guard_stops_runaway_recursion() {
    let catalog = catalog();
    let extractor = QuerySpanExtractor::new(&catalog, "db").with_max_depth(8);
    let err = extractor.get_query_span("SELECT recurse()").unwrap_err();
    assert_eq!(err, SpanError::DepthLimitExceeded { limit: 8 });
}

#[test]
fn missing_database_degrades() {
    let span = crate::span("SELECT a FROM other.public.t");
    assert!(matches!(
        span.not_found_error,
        Some(SpanError::ResourceNotFound {
            resource: ResourceKind::Database,
            ..
        })
    ));
}

#[test]
fn system_only_reads_have_empty_span() {
    let span = crate::span("SELECT relname FROM pg_catalog.pg_class");
    assert!(!span.is_degraded());
    assert!(span.results.is_empty());
    assert!(span.source_columns.is_empty());

    let span = crate::span("SELECT table_name FROM information_schema.tables WHERE table_schema = 'public'");
    assert!(span.source_columns.is_empty());

    let span = crate::span("SELECT datname FROM pg_database");
    assert!(span.not_found_error.is_none());
}

#[test]
fn mixing_user_and_system_tables_is_rejected() {
    let err = span_err("SELECT a, relname FROM t, pg_catalog.pg_class");
    assert!(matches!(err, SpanError::MixedSystemAccess { .. }));
    assert!(!err.is_fail_open());

    let err = span_err("SELECT a FROM t WHERE b IN (SELECT oid FROM pg_class)");
    assert!(matches!(err, SpanError::MixedSystemAccess { .. }));

    // An explicit user schema is not a system relation
    let span = crate::span("SELECT * FROM public.pg_class");
    assert!(span.is_degraded());
}
