//! Query span extraction
//!
//! The entry point of the crate: parses one statement, resolves it against
//! the catalog and applies the fail-open policy to the result.

use sqlparser::ast::{Query, Statement, UtilityOption};
use spanline_catalog::CatalogResolver;
use spanline_core::{AnalysisConfig, QuerySpan, SpanError, StatementKind};

use crate::context::AnalysisContext;
use crate::parser::{ParsedSql, SqlParser};
use crate::resolver::SpanResolver;
use crate::system::RelationAccess;

/// Default nesting limit for subqueries, views and function bodies
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Computes the [`QuerySpan`] of single SQL statements
///
/// ```rust,ignore
/// let catalog = CatalogBuilder::new("shop")
///     .with_table("public", "users", &["id", "email"])
///     .build();
/// let extractor = QuerySpanExtractor::new(&catalog, "shop");
/// let span = extractor.get_query_span("SELECT email FROM users")?;
/// ```
pub struct QuerySpanExtractor<'a> {
    catalog: &'a dyn CatalogResolver,
    default_database: String,
    search_path: Vec<String>,
    max_depth: usize,
    fail_open: bool,
}

impl<'a> QuerySpanExtractor<'a> {
    /// Create an extractor with the `public` search path
    pub fn new(catalog: &'a dyn CatalogResolver, default_database: impl Into<String>) -> Self {
        Self {
            catalog,
            default_database: default_database.into(),
            search_path: vec!["public".to_string()],
            max_depth: DEFAULT_MAX_DEPTH,
            fail_open: true,
        }
    }

    /// Create an extractor from the `[analysis]` section of the config
    pub fn from_config(catalog: &'a dyn CatalogResolver, config: &AnalysisConfig) -> Self {
        Self {
            catalog,
            default_database: config.default_database.clone(),
            search_path: config.search_path.clone(),
            max_depth: config.max_depth,
            fail_open: config.fail_open,
        }
    }

    pub fn with_search_path(mut self, search_path: Vec<String>) -> Self {
        self.search_path = search_path;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Return degraded spans for soft errors instead of failing
    pub fn with_fail_open(mut self, fail_open: bool) -> Self {
        self.fail_open = fail_open;
        self
    }

    pub fn default_database(&self) -> &str {
        &self.default_database
    }

    /// Parse `sql`, which must hold exactly one statement, and compute its span
    pub fn get_query_span(&self, sql: &str) -> Result<QuerySpan, SpanError> {
        let statements = SqlParser::new().parse_statements(sql, "statement")?;
        self.span_single(&statements)
    }

    /// Compute the span of already parsed SQL, e.g. from [`SqlParser::parse_file`]
    pub fn get_parsed_span(&self, parsed: &ParsedSql) -> Result<QuerySpan, SpanError> {
        self.span_single(&parsed.statements)
    }

    fn span_single(&self, statements: &[Statement]) -> Result<QuerySpan, SpanError> {
        match statements {
            [statement] => self.span_statement(statement),
            [] => Err(SpanError::malformed("no statement to analyze")),
            many => Err(SpanError::malformed(format!(
                "expected exactly one statement, found {}",
                many.len()
            ))),
        }
    }

    /// Compute the span of a parsed statement
    pub fn span_statement(&self, statement: &Statement) -> Result<QuerySpan, SpanError> {
        let (kind, query, analyze) = classify(statement);

        let access = RelationAccess::scan(statement);
        access.check()?;
        if access.is_system_only() {
            tracing::debug!(?kind, "statement reads only system relations");
            let mut span = QuerySpan::new(kind);
            span.explain_analyze = analyze;
            return Ok(span);
        }

        let Some(query) = query else {
            tracing::debug!(?kind, "statement has no query to analyze");
            let mut span = QuerySpan::new(kind);
            span.explain_analyze = analyze;
            return Ok(span);
        };

        let ctx = AnalysisContext::new(
            self.catalog,
            self.default_database.as_str(),
            self.search_path.clone(),
            self.max_depth,
        );
        let mut resolver = SpanResolver::new(&ctx);

        match resolver.resolve_query(query) {
            Ok(results) => Ok(QuerySpan {
                kind,
                results: if analyze { Vec::new() } else { results },
                source_columns: ctx.take_accessed(),
                explain_analyze: analyze,
                not_found_error: None,
            }),
            Err(error) if self.fail_open && error.is_fail_open() => {
                tracing::warn!(%error, "span degraded to whole-database access");
                let mut span = QuerySpan::degraded(kind, &self.default_database, ctx.take_accessed(), error);
                span.explain_analyze = analyze;
                Ok(span)
            }
            Err(error) => Err(error),
        }
    }
}

/// Statement kind, the query to resolve and whether EXPLAIN runs it
fn classify(statement: &Statement) -> (StatementKind, Option<&Query>, bool) {
    match statement {
        Statement::Query(query) => (StatementKind::Select, Some(query.as_ref()), false),
        Statement::Explain {
            analyze,
            statement,
            options,
            ..
        } => {
            let analyze = *analyze || options.as_deref().is_some_and(has_analyze_option);
            let query = match statement.as_ref() {
                Statement::Query(query) => Some(query.as_ref()),
                _ => None,
            };
            (StatementKind::Explain, query, analyze)
        }
        Statement::Insert(_) => (StatementKind::Insert, None, false),
        Statement::Update { .. } => (StatementKind::Update, None, false),
        Statement::Delete(_) => (StatementKind::Delete, None, false),
        _ => (StatementKind::Other, None, false),
    }
}

/// `EXPLAIN (ANALYZE [true|on|1]) ...`
fn has_analyze_option(options: &[UtilityOption]) -> bool {
    options.iter().any(|option| {
        option.name.value.eq_ignore_ascii_case("analyze")
            && match &option.arg {
                None => true,
                Some(arg) => !matches!(arg.to_string().to_lowercase().as_str(), "false" | "off" | "0"),
            }
    })
}
