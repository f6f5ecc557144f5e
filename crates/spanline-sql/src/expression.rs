//! Expression lineage
//!
//! The expression forms that carry lineage get explicit arms. Everything
//! else goes through [`ChildCollector`], which finds the immediate child
//! expressions and subqueries of a node with the sqlparser visitor, so an
//! unfamiliar node still contributes the lineage of its operands.

use std::ops::ControlFlow;

use sqlparser::ast::{
    Expr, Function, FunctionArg, FunctionArgExpr, FunctionArgumentClause, FunctionArguments,
    Ident, Query, Visit, Visitor, WindowType,
};
use spanline_core::{ResourceKind, SourceColumnSet, SpanError};

use crate::builtin::{is_builtin_function, is_value_keyword};
use crate::naming::{normalize_ident, object_name_parts};
use crate::resolver::SpanResolver;

/// Collects the immediate children of the visited root expression
#[derive(Default)]
struct ChildCollector {
    expr_depth: usize,
    query_depth: usize,
    exprs: Vec<Expr>,
    queries: Vec<Query>,
}

impl ChildCollector {
    fn at_child_level(&self) -> bool {
        self.query_depth == 0 && self.expr_depth == 1
    }
}

impl Visitor for ChildCollector {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        if self.at_child_level() {
            self.queries.push(query.clone());
        }
        self.query_depth += 1;
        ControlFlow::Continue(())
    }

    fn post_visit_query(&mut self, _query: &Query) -> ControlFlow<Self::Break> {
        self.query_depth -= 1;
        ControlFlow::Continue(())
    }

    fn pre_visit_expr(&mut self, expr: &Expr) -> ControlFlow<Self::Break> {
        if self.at_child_level() {
            self.exprs.push(expr.clone());
        }
        self.expr_depth += 1;
        ControlFlow::Continue(())
    }

    fn post_visit_expr(&mut self, _expr: &Expr) -> ControlFlow<Self::Break> {
        self.expr_depth -= 1;
        ControlFlow::Continue(())
    }
}

impl<'a> SpanResolver<'a> {
    /// Base columns a scalar expression is derived from
    pub(crate) fn resolve_expr(&mut self, expr: &Expr) -> Result<SourceColumnSet, SpanError> {
        match expr {
            Expr::Identifier(ident) => self.resolve_column_ref(std::slice::from_ref(ident)),
            Expr::CompoundIdentifier(idents) => self.resolve_column_ref(idents),
            Expr::Function(function) => self.resolve_function_expr(function),
            Expr::Subquery(query) => self.resolve_subquery_sources(query),
            Expr::Exists { subquery, .. } => self.resolve_subquery_sources(subquery),
            Expr::InSubquery { expr, subquery, .. } => {
                let sources = self.resolve_expr(expr)?;
                Ok(sources.union(&self.resolve_subquery_sources(subquery)?))
            }
            Expr::Case {
                operand,
                conditions,
                results,
                else_result,
                ..
            } => {
                let mut sources = SourceColumnSet::new();
                if let Some(operand) = operand {
                    sources.merge(&self.resolve_expr(operand)?);
                }
                for part in conditions.iter().chain(results) {
                    sources.merge(&self.resolve_expr(part)?);
                }
                if let Some(else_result) = else_result {
                    sources.merge(&self.resolve_expr(else_result)?);
                }
                Ok(sources)
            }
            Expr::Nested(inner) => self.resolve_expr(inner),
            Expr::BinaryOp { left, right, .. } => {
                let sources = self.resolve_expr(left)?;
                Ok(sources.union(&self.resolve_expr(right)?))
            }
            Expr::UnaryOp { expr, .. } => self.resolve_expr(expr),
            Expr::Cast { expr, .. } => self.resolve_expr(expr),
            Expr::Value(_) => Ok(SourceColumnSet::new()),
            other => self.resolve_children(other),
        }
    }

    /// Union of the lineage of every immediate child of `expr`
    fn resolve_children(&mut self, expr: &Expr) -> Result<SourceColumnSet, SpanError> {
        let mut collector = ChildCollector::default();
        let _ = expr.visit(&mut collector);

        let mut sources = SourceColumnSet::new();
        for child in &collector.exprs {
            sources.merge(&self.resolve_expr(child)?);
        }
        for query in &collector.queries {
            sources.merge(&self.resolve_subquery_sources(query)?);
        }
        Ok(sources)
    }

    /// Resolve a column reference of one to four parts
    ///
    /// A bare name that matches no column but names a visible table is a
    /// whole-row reference.
    fn resolve_column_ref(&mut self, idents: &[Ident]) -> Result<SourceColumnSet, SpanError> {
        let parts: Vec<String> = idents.iter().map(normalize_ident).collect();
        let (database, schema, table, column) = match parts.as_slice() {
            [column] => (None, None, None, column),
            [table, column] => (None, None, Some(table), column),
            [schema, table, column] => (None, Some(schema), Some(table), column),
            [database, schema, table, column] => (Some(database), Some(schema), Some(table), column),
            _ => {
                return Err(SpanError::malformed(format!(
                    "improper qualified name (too many dotted names): {}",
                    parts.join(".")
                )))
            }
        };

        let found = self.scope.lookup_column(
            database.map(String::as_str),
            schema.map(String::as_str),
            table.map(String::as_str),
            column,
        );
        if let Some(sources) = found {
            self.ctx.record_access(&sources);
            return Ok(sources);
        }

        if parts.len() == 1 {
            if let Some(source) = self.scope.lookup_table(None, column) {
                let sources = source.whole_row();
                self.ctx.record_access(&sources);
                return Ok(sources);
            }
            if idents[0].quote_style.is_none() && is_value_keyword(column) {
                return Ok(SourceColumnSet::new());
            }
        }

        Err(SpanError::not_found(ResourceKind::Column, parts.join(".")))
    }

    /// `t.*` passed as a function argument
    fn resolve_whole_row(&mut self, parts: &[String]) -> Result<SourceColumnSet, SpanError> {
        let (schema, table) = match parts {
            [table] => (None, table),
            [schema, table] => (Some(schema.as_str()), table),
            _ => {
                return Err(SpanError::malformed(format!(
                    "improper whole-row reference: {}.*",
                    parts.join(".")
                )))
            }
        };
        let source = self
            .scope
            .lookup_table(schema, table)
            .ok_or_else(|| SpanError::not_found(ResourceKind::Table, parts.join(".")))?;
        let sources = source.whole_row();
        self.ctx.record_access(&sources);
        Ok(sources)
    }

    /// Lineage of one function argument
    pub(crate) fn resolve_function_arg(&mut self, arg: &FunctionArg) -> Result<SourceColumnSet, SpanError> {
        let arg = match arg {
            FunctionArg::Unnamed(arg) => arg,
            FunctionArg::Named { arg, .. } => arg,
            #[allow(unreachable_patterns)]
            other => {
                tracing::debug!(arg = %other, "skipping unsupported function argument form");
                return Ok(SourceColumnSet::new());
            }
        };
        match arg {
            FunctionArgExpr::Expr(expr) => self.resolve_expr(expr),
            FunctionArgExpr::QualifiedWildcard(name) => self.resolve_whole_row(&object_name_parts(name)),
            FunctionArgExpr::Wildcard => Ok(SourceColumnSet::new()),
        }
    }

    /// Function call: arguments, aggregate clauses, window, and the body of
    /// user-defined functions
    fn resolve_function_expr(&mut self, function: &Function) -> Result<SourceColumnSet, SpanError> {
        let mut sources = SourceColumnSet::new();
        let mut arg_count = 0;

        match &function.args {
            FunctionArguments::None => {}
            FunctionArguments::Subquery(query) => {
                sources.merge(&self.resolve_subquery_sources(query)?);
            }
            FunctionArguments::List(list) => {
                arg_count = list.args.len();
                for arg in &list.args {
                    sources.merge(&self.resolve_function_arg(arg)?);
                }
                for clause in &list.clauses {
                    match clause {
                        FunctionArgumentClause::OrderBy(order_by) => {
                            for item in order_by {
                                sources.merge(&self.resolve_expr(&item.expr)?);
                            }
                        }
                        FunctionArgumentClause::Limit(limit) => {
                            sources.merge(&self.resolve_expr(limit)?);
                        }
                        _ => {}
                    }
                }
            }
        }

        if let Some(filter) = &function.filter {
            sources.merge(&self.resolve_expr(filter)?);
        }
        if let Some(WindowType::WindowSpec(spec)) = &function.over {
            for expr in &spec.partition_by {
                sources.merge(&self.resolve_expr(expr)?);
            }
            for item in &spec.order_by {
                sources.merge(&self.resolve_expr(&item.expr)?);
            }
        }
        for item in &function.within_group {
            sources.merge(&self.resolve_expr(&item.expr)?);
        }

        let parts = object_name_parts(&function.name);
        let (schema, name) = match parts.as_slice() {
            [.., schema, name] => (Some(schema.as_str()), name.as_str()),
            [name] => (None, name.as_str()),
            [] => return Ok(sources),
        };
        if is_builtin_function(schema, name) {
            return Ok(sources);
        }

        match self.resolve_function_call(&parts, arg_count) {
            Ok(resolved) => {
                for column in &resolved.columns {
                    sources.merge(&column.sources);
                }
            }
            Err(SpanError::ResourceNotFound {
                resource: ResourceKind::Function,
                name,
            }) => {
                tracing::debug!(function = %name, "function not in catalog, treating as built-in");
            }
            Err(e) => return Err(e),
        }
        Ok(sources)
    }

    /// Union of every output column of a correlated subquery
    pub(crate) fn resolve_subquery_sources(&mut self, query: &Query) -> Result<SourceColumnSet, SpanError> {
        let mut nested = self.nested()?;
        let columns = nested.resolve_query(query)?;
        Ok(columns
            .iter()
            .fold(SourceColumnSet::new(), |acc, c| acc.union(&c.sources)))
    }
}
