//! PL/pgSQL body analysis
//!
//! The body is not parsed as a whole. It is tokenized, split into
//! statements at top-level semicolons and stripped of block and control
//! keywords; the SQL embedded in each statement is then parsed and
//! resolved on its own.

use std::ops::ControlFlow;

use sqlparser::ast::{Query, Statement, Visit, Visitor};
use sqlparser::tokenizer::Token;
use spanline_core::{ResultColumn, SourceColumnSet, SpanError};

use crate::declaration::FunctionDeclaration;
use crate::function::rename_outputs;
use crate::parser::SqlParser;
use crate::resolver::SpanResolver;
use crate::tokens::{
    find_top_level, identifier, is_assignment, is_keyword, is_whitespace, render, split_top_level,
    tokenize, trim_start,
};

/// Keywords that open a block or branch and are followed by a statement
const BLOCK_KEYWORDS: &[&str] = &["BEGIN", "DECLARE", "ELSE", "EXCEPTION", "LOOP", "THEN"];

/// Keywords followed by a condition that runs up to THEN or LOOP
const CONDITION_KEYWORDS: &[&str] = &["ELSIF", "ELSEIF", "IF", "WHEN", "WHILE"];

/// What the statements of a body have produced so far
#[derive(Debug, Default)]
struct BodyLineage {
    /// Merged columns of every `RETURN QUERY`
    returned: Option<Vec<ResultColumn>>,

    /// Union of every other embedded query and returned expression
    fallback: SourceColumnSet,
}

impl<'a> SpanResolver<'a> {
    pub(crate) fn analyze_plpgsql_function(
        &mut self,
        declaration: &FunctionDeclaration,
    ) -> Result<Vec<ResultColumn>, SpanError> {
        let name = declaration.qualified_name();
        let body = declaration
            .body
            .as_deref()
            .ok_or_else(|| SpanError::function_not_supported(&name, "function has no body"))?;
        let tokens = tokenize(body).map_err(|e| SpanError::function_not_supported(&name, e))?;

        let mut body_resolver = self.detached()?;
        let outputs = declaration.output_names();
        for variable in declaration.input_names().into_iter().chain(outputs.iter().cloned()) {
            body_resolver.scope.set_variable(variable, SourceColumnSet::new());
        }
        body_resolver.scope.set_variable("found", SourceColumnSet::new());

        let mut lineage = BodyLineage::default();
        for statement in split_top_level(&tokens, |t| *t == Token::SemiColon) {
            body_resolver.analyze_plpgsql_statement(&name, statement, &mut lineage)?;
        }

        if let Some(columns) = lineage.returned {
            return rename_outputs(declaration, columns);
        }

        let mut sources = lineage.fallback;
        for output in &outputs {
            if let Some(assigned) = body_resolver.scope.variable(output) {
                sources.merge(assigned);
            }
        }
        if outputs.is_empty() {
            return Ok(vec![ResultColumn::new(declaration.name.clone(), sources)]);
        }
        Ok(outputs
            .into_iter()
            .map(|output| ResultColumn::new(output, sources.clone()))
            .collect())
    }

    fn analyze_plpgsql_statement(
        &mut self,
        function: &str,
        tokens: &[Token],
        lineage: &mut BodyLineage,
    ) -> Result<(), SpanError> {
        let tokens = trim_start(tokens);
        let Some(first) = tokens.first() else {
            return Ok(());
        };

        if is_keyword(first, "END") {
            return Ok(());
        }
        if BLOCK_KEYWORDS.iter().any(|kw| is_keyword(first, kw)) {
            return self.analyze_plpgsql_statement(function, &tokens[1..], lineage);
        }
        if is_keyword(first, "FOR") || is_keyword(first, "FOREACH") {
            return self.analyze_for_loop(function, tokens, lineage);
        }
        if is_keyword(first, "CASE") {
            return self.analyze_case(function, tokens, lineage);
        }
        if CONDITION_KEYWORDS.iter().any(|kw| is_keyword(first, kw)) {
            let Some(end) = find_top_level(&tokens[1..], |t| is_keyword(t, "THEN") || is_keyword(t, "LOOP"))
                .map(|i| i + 1)
            else {
                return Ok(());
            };
            self.analyze_condition(function, &tokens[1..end], lineage)?;
            return self.analyze_plpgsql_statement(function, &tokens[end + 1..], lineage);
        }

        if is_keyword(first, "RETURN") {
            return self.analyze_return(function, &tokens[1..], lineage);
        }
        if is_keyword(first, "PERFORM") {
            let text = format!("SELECT {}", render(&tokens[1..]));
            if let Some(query) = parse_embedded_query(function, &text) {
                let columns = self.resolve_query(&query)?;
                lineage.fallback.merge(&union_of(&columns));
            }
            return Ok(());
        }
        if is_keyword(first, "SELECT") || is_keyword(first, "WITH") {
            return self.analyze_select_into(function, tokens, lineage);
        }
        if let Some(at) = find_top_level(tokens, is_assignment) {
            return self.analyze_assignment(function, tokens, at);
        }

        self.analyze_other_statement(function, tokens, lineage)
    }

    /// `CASE selector WHEN ...`; a searched `CASE WHEN ...` has no selector
    fn analyze_case(
        &mut self,
        function: &str,
        tokens: &[Token],
        lineage: &mut BodyLineage,
    ) -> Result<(), SpanError> {
        let Some(when_at) = find_top_level(&tokens[1..], |t| is_keyword(t, "WHEN")).map(|i| i + 1) else {
            return Ok(());
        };
        self.analyze_condition(function, &tokens[1..when_at], lineage)?;
        self.analyze_plpgsql_statement(function, &tokens[when_at..], lineage)
    }

    /// Record what the condition of an IF, WHILE or WHEN reads
    ///
    /// Exception condition names and other words only PL/pgSQL knows do not
    /// resolve; such conditions are skipped.
    fn analyze_condition(
        &mut self,
        function: &str,
        condition: &[Token],
        lineage: &mut BodyLineage,
    ) -> Result<(), SpanError> {
        let condition = render(condition);
        if condition.is_empty() {
            return Ok(());
        }
        match parse_embedded_query(function, &format!("SELECT {}", condition)) {
            Some(query) => self.record_embedded_reads(function, &query, lineage),
            None => Ok(()),
        }
    }

    /// Statements with no lineage of their own, such as DML or RAISE
    ///
    /// The queries they embed are still resolved for the read set.
    fn analyze_other_statement(
        &mut self,
        function: &str,
        tokens: &[Token],
        lineage: &mut BodyLineage,
    ) -> Result<(), SpanError> {
        let text = render(tokens);
        let Ok(statements) = SqlParser::new().parse_statements(&text, function) else {
            tracing::debug!(function, statement = %text, "skipping PL/pgSQL statement");
            return Ok(());
        };

        let mut collector = QueryCollector::default();
        let _ = statements.visit(&mut collector);
        for query in &collector.queries {
            self.record_embedded_reads(function, query, lineage)?;
        }
        Ok(())
    }

    /// Resolve a query only for what it reads
    fn record_embedded_reads(
        &mut self,
        function: &str,
        query: &Query,
        lineage: &mut BodyLineage,
    ) -> Result<(), SpanError> {
        match self.resolve_query(query) {
            Ok(columns) => {
                lineage.fallback.merge(&union_of(&columns));
                Ok(())
            }
            Err(error) if error.is_fail_open() => {
                tracing::debug!(function, %error, "skipping unresolved embedded query");
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    /// `RETURN QUERY`, `RETURN NEXT` and plain `RETURN`
    fn analyze_return(
        &mut self,
        function: &str,
        rest: &[Token],
        lineage: &mut BodyLineage,
    ) -> Result<(), SpanError> {
        let rest = trim_start(rest);
        let Some(first) = rest.first() else {
            return Ok(());
        };

        if is_keyword(first, "QUERY") {
            let query_tokens = trim_start(&rest[1..]);
            if query_tokens.first().is_some_and(|t| is_keyword(t, "EXECUTE")) {
                return Err(SpanError::function_not_supported(
                    function,
                    "RETURN QUERY EXECUTE runs dynamic SQL",
                ));
            }
            let text = render(query_tokens);
            let query = SqlParser::new()
                .parse_statements(&text, function)
                .ok()
                .and_then(single_query)
                .ok_or_else(|| {
                    SpanError::function_not_supported(function, format!("cannot parse RETURN QUERY {}", text))
                })?;
            let columns = self.resolve_query(&query)?;
            return merge_returned(function, lineage, columns);
        }

        let expression = if is_keyword(first, "NEXT") { &rest[1..] } else { rest };
        let expression = render(expression);
        if expression.is_empty() {
            return Ok(());
        }
        if let Some(query) = parse_embedded_query(function, &format!("SELECT {}", expression)) {
            let columns = self.resolve_query(&query)?;
            lineage.fallback.merge(&union_of(&columns));
        }
        Ok(())
    }

    /// A query, possibly with `INTO` targets
    fn analyze_select_into(
        &mut self,
        function: &str,
        tokens: &[Token],
        lineage: &mut BodyLineage,
    ) -> Result<(), SpanError> {
        let (query_tokens, targets) = strip_into(tokens);
        let Some(query) = parse_embedded_query(function, &render(&query_tokens)) else {
            return Ok(());
        };

        let columns = self.resolve_query(&query)?;
        let sources = union_of(&columns);
        for target in targets {
            self.scope.set_variable(target, sources.clone());
        }
        lineage.fallback.merge(&sources);
        Ok(())
    }

    /// `var [type] := expr`
    fn analyze_assignment(&mut self, function: &str, tokens: &[Token], at: usize) -> Result<(), SpanError> {
        let Some(target) = tokens[..at].iter().find_map(identifier) else {
            return Ok(());
        };
        let expression = render(&tokens[at + 1..]);
        if expression.is_empty() {
            return Ok(());
        }
        if let Some(query) = parse_embedded_query(function, &format!("SELECT {}", expression)) {
            let columns = self.resolve_query(&query)?;
            self.scope.set_variable(target, union_of(&columns));
        }
        Ok(())
    }

    /// `FOR target IN query LOOP statement`
    ///
    /// The loop target is bound to the lineage of the query; integer ranges
    /// and dynamic `EXECUTE` sources leave it empty.
    fn analyze_for_loop(
        &mut self,
        function: &str,
        tokens: &[Token],
        lineage: &mut BodyLineage,
    ) -> Result<(), SpanError> {
        let Some(in_at) = find_top_level(tokens, |t| is_keyword(t, "IN")) else {
            return Ok(());
        };
        let Some(loop_at) = find_top_level(&tokens[in_at..], |t| is_keyword(t, "LOOP")).map(|i| in_at + i) else {
            return Ok(());
        };

        let targets: Vec<String> = tokens[1..in_at].iter().filter_map(identifier).collect();
        let source = trim_start(&tokens[in_at + 1..loop_at]);
        let mut sources = SourceColumnSet::new();
        if source
            .first()
            .is_some_and(|t| is_keyword(t, "SELECT") || is_keyword(t, "WITH"))
        {
            if let Some(query) = parse_embedded_query(function, &render(source)) {
                let columns = self.resolve_query(&query)?;
                sources = union_of(&columns);
                lineage.fallback.merge(&sources);
            }
        }
        for target in targets {
            self.scope.set_variable(target, sources.clone());
        }

        self.analyze_plpgsql_statement(function, &tokens[loop_at + 1..], lineage)
    }
}

/// Split `SELECT ... INTO [STRICT] a, b FROM ...` into the query without
/// the INTO clause and the target names
fn strip_into(tokens: &[Token]) -> (Vec<Token>, Vec<String>) {
    let Some(into_at) = find_top_level(tokens, |t| is_keyword(t, "INTO")) else {
        return (tokens.to_vec(), Vec::new());
    };

    let mut targets = Vec::new();
    let mut i = into_at + 1;
    let mut expect_target = true;
    while let Some(token) = tokens.get(i) {
        if is_whitespace(token) || is_keyword(token, "STRICT") || *token == Token::Period {
            i += 1;
            continue;
        }
        match token {
            Token::Word(_) if expect_target => {
                if let Some(name) = identifier(token) {
                    targets.push(name);
                }
                expect_target = false;
            }
            Token::Comma if !expect_target => expect_target = true,
            _ => break,
        }
        i += 1;
    }

    let mut query = tokens[..into_at].to_vec();
    query.extend_from_slice(&tokens[i..]);
    (query, targets)
}

/// Parse an embedded statement, keeping it only if it is a single query
fn parse_embedded_query(function: &str, text: &str) -> Option<Query> {
    match SqlParser::new().parse_statements(text, function) {
        Ok(statements) => single_query(statements),
        Err(e) => {
            tracing::debug!(function, error = %e, "skipping unparseable PL/pgSQL statement");
            None
        }
    }
}

/// Collects the outermost queries of a statement
#[derive(Default)]
struct QueryCollector {
    depth: usize,
    queries: Vec<Query>,
}

impl Visitor for QueryCollector {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        if self.depth == 0 {
            self.queries.push(query.clone());
        }
        self.depth += 1;
        ControlFlow::Continue(())
    }

    fn post_visit_query(&mut self, _query: &Query) -> ControlFlow<Self::Break> {
        self.depth -= 1;
        ControlFlow::Continue(())
    }
}

fn single_query(statements: Vec<Statement>) -> Option<Query> {
    let mut statements = statements.into_iter();
    match (statements.next(), statements.next()) {
        (Some(Statement::Query(query)), None) => Some(*query),
        _ => None,
    }
}

fn union_of(columns: &[ResultColumn]) -> SourceColumnSet {
    columns
        .iter()
        .fold(SourceColumnSet::new(), |acc, c| acc.union(&c.sources))
}

fn merge_returned(
    function: &str,
    lineage: &mut BodyLineage,
    columns: Vec<ResultColumn>,
) -> Result<(), SpanError> {
    match &mut lineage.returned {
        None => lineage.returned = Some(columns),
        Some(returned) => {
            if returned.len() != columns.len() {
                return Err(SpanError::malformed(format!(
                    "RETURN QUERY statements of {} return {} and {} columns",
                    function,
                    returned.len(),
                    columns.len()
                )));
            }
            for (column, incoming) in returned.iter_mut().zip(&columns) {
                column.sources.merge(&incoming.sources);
            }
        }
    }
    Ok(())
}
