//! User-defined function analysis
//!
//! A call to a catalog function is resolved to one overload, whose
//! definition is scanned and whose body is analyzed in a detached resolver.
//! Lineage of the body flows into the call site.

use sqlparser::ast::Statement;
use spanline_catalog::FunctionMetadata;
use spanline_core::{ResourceKind, ResultColumn, SourceColumnSet, SpanError};

use crate::context::ObjectTarget;
use crate::declaration::FunctionDeclaration;
use crate::parser::SqlParser;
use crate::resolver::SpanResolver;

/// An analyzed function call
#[derive(Debug, Clone)]
pub(crate) struct ResolvedFunction {
    pub(crate) declaration: FunctionDeclaration,
    pub(crate) columns: Vec<ResultColumn>,
}

impl<'a> SpanResolver<'a> {
    /// Find the called function in the catalog and analyze its body
    pub(crate) fn resolve_function_call(
        &mut self,
        parts: &[String],
        arg_count: usize,
    ) -> Result<ResolvedFunction, SpanError> {
        let target = self.ctx.target(parts)?;
        let database = self.ctx.database(&target.database)?;
        let candidates = database.search_function(&target.search_path, &target.name);
        if candidates.is_empty() {
            return Err(SpanError::not_found(ResourceKind::Function, parts.join(".")));
        }

        let declaration = select_overload(&target, &candidates, arg_count)?;
        tracing::debug!(
            function = %declaration.qualified_name(),
            language = %declaration.language,
            depth = self.depth(),
            "analyzing function body"
        );
        let columns = self.analyze_function(&declaration)?;
        Ok(ResolvedFunction {
            declaration,
            columns,
        })
    }

    fn analyze_function(&mut self, declaration: &FunctionDeclaration) -> Result<Vec<ResultColumn>, SpanError> {
        match declaration.language.as_str() {
            "sql" => self.analyze_sql_function(declaration),
            "plpgsql" => self.analyze_plpgsql_function(declaration),
            "c" | "internal" => Err(SpanError::function_not_supported(
                declaration.qualified_name(),
                format!("language {} has no analyzable body", declaration.language),
            )),
            other => Err(SpanError::type_not_supported(
                "function language",
                format!("{} ({})", other, declaration.qualified_name()),
            )),
        }
    }

    fn analyze_sql_function(&mut self, declaration: &FunctionDeclaration) -> Result<Vec<ResultColumn>, SpanError> {
        let name = declaration.qualified_name();
        let body = declaration
            .body
            .as_deref()
            .ok_or_else(|| SpanError::function_not_supported(&name, "function has no body"))?;

        let parser = SqlParser::new();
        let context = format!("body of {}", name);
        let last_query = parser
            .parse_statements(body, &context)
            .ok()
            .and_then(|statements| {
                statements.into_iter().rev().find_map(|statement| match statement {
                    Statement::Query(query) => Some(query),
                    _ => None,
                })
            });

        // `RETURN expr` bodies are a bare expression
        let query = match last_query {
            Some(query) => query,
            None => match parser.parse_statements(&format!("SELECT {}", body), &context) {
                Ok(statements) => match statements.into_iter().next() {
                    Some(Statement::Query(query)) => query,
                    _ => return Err(SpanError::function_not_supported(&name, "body has no query")),
                },
                Err(e) => return Err(SpanError::function_not_supported(&name, e.to_string())),
            },
        };

        let mut body_resolver = self.detached()?;
        for input in declaration.input_names() {
            body_resolver.scope.set_variable(input, SourceColumnSet::new());
        }
        let columns = body_resolver.resolve_query(&query)?;
        rename_outputs(declaration, columns)
    }
}

/// Pick the overload a call with `arg_count` arguments binds to
///
/// Candidates come grouped in search-path order; the first schema holding
/// an applicable declaration decides.
fn select_overload(
    target: &ObjectTarget,
    candidates: &[(&str, &FunctionMetadata)],
    arg_count: usize,
) -> Result<FunctionDeclaration, SpanError> {
    if let [(schema, only)] = candidates {
        return scan_definition(schema, only);
    }

    for schema in &target.search_path {
        let mut applicable: Vec<FunctionDeclaration> = Vec::new();
        for (candidate_schema, function) in candidates.iter().filter(|(s, _)| *s == schema.as_str()) {
            match scan_definition(candidate_schema, function) {
                Ok(declaration) if declaration.accepts(arg_count) => applicable.push(declaration),
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(function = %function.name, error = %e, "skipping unreadable overload");
                }
            }
        }

        match applicable.len() {
            0 => continue,
            1 => return Ok(applicable.remove(0)),
            n => {
                return Err(SpanError::AmbiguousCall {
                    function: target.name.clone(),
                    schema: schema.clone(),
                    candidates: n,
                })
            }
        }
    }

    Err(SpanError::not_found(
        ResourceKind::Function,
        format!("{} with {} arguments", target.name, arg_count),
    ))
}

fn scan_definition(schema: &str, function: &FunctionMetadata) -> Result<FunctionDeclaration, SpanError> {
    let mut declaration = FunctionDeclaration::parse(&function.definition).map_err(|e| match e {
        SpanError::FunctionNotSupported { reason, .. } => {
            SpanError::function_not_supported(format!("{}.{}", schema, function.name), reason)
        }
        other => other,
    })?;
    if declaration.schema.is_none() {
        declaration.schema = Some(schema.to_string());
    }
    Ok(declaration)
}

/// Rename body columns to the declared output names
///
/// Without declared names the body's own names are kept.
pub(crate) fn rename_outputs(
    declaration: &FunctionDeclaration,
    columns: Vec<ResultColumn>,
) -> Result<Vec<ResultColumn>, SpanError> {
    let names = declaration.output_names();
    if names.is_empty() {
        return Ok(columns);
    }
    if names.len() != columns.len() {
        return Err(SpanError::malformed(format!(
            "function {} declares {} output columns but its body returns {}",
            declaration.qualified_name(),
            names.len(),
            columns.len()
        )));
    }
    Ok(columns
        .into_iter()
        .zip(names)
        .map(|(mut column, name)| {
            column.name = name;
            column
        })
        .collect())
}
