//! Query and SELECT resolution
//!
//! Resolves a query level into its ordered result columns: the WITH clause
//! first, then the body tree of SELECTs, VALUES lists and set operations.
//! Clauses that do not produce output (WHERE, GROUP BY, HAVING, ORDER BY,
//! DISTINCT ON) are still resolved so their columns land in the read set.

use sqlparser::ast::{
    Distinct, Expr, GroupByExpr, OrderByExpr, Query, Select, SelectItem, SetExpr, Values,
};
use spanline_core::{ResourceKind, ResultColumn, SourceColumnSet, SpanError};

use crate::naming::{field_name, normalize_ident, split_qualified};
use crate::resolver::SpanResolver;
use crate::set_operation::merge_set_operation;
use crate::table_source::{PseudoTable, TableSource};

impl<'a> SpanResolver<'a> {
    /// Resolve a query into its result columns
    ///
    /// CTEs defined by the query are only visible while it is resolved.
    pub(crate) fn resolve_query(&mut self, query: &Query) -> Result<Vec<ResultColumn>, SpanError> {
        let mark = self.scope.cte_mark();
        let result = self.resolve_query_body(query);
        self.scope.pop_ctes(mark);
        result
    }

    fn resolve_query_body(&mut self, query: &Query) -> Result<Vec<ResultColumn>, SpanError> {
        if let Some(with) = &query.with {
            self.resolve_with(with)?;
        }
        let order_by = query
            .order_by
            .as_ref()
            .map(|order_by| order_by.exprs.as_slice())
            .unwrap_or_default();
        self.resolve_set_expr(&query.body, order_by)
    }

    /// Resolve one node of a query body tree
    pub(crate) fn resolve_set_expr(
        &mut self,
        body: &SetExpr,
        order_by: &[OrderByExpr],
    ) -> Result<Vec<ResultColumn>, SpanError> {
        let columns = match body {
            SetExpr::Select(select) => return self.resolve_select(select, order_by),
            SetExpr::Query(query) => self.resolve_query(query)?,
            SetExpr::SetOperation {
                op, left, right, ..
            } => {
                let left = self.resolve_set_expr(left, &[])?;
                let right = self.resolve_set_expr(right, &[])?;
                merge_set_operation(op, left, right)?
            }
            SetExpr::Values(values) => self.resolve_values(values)?,
            other => return Err(SpanError::type_not_supported("query body", other.to_string())),
        };

        self.resolve_output_order_by(&columns, order_by)?;
        Ok(columns)
    }

    /// `ORDER BY` over a body that is not a plain SELECT sees only the
    /// output columns
    fn resolve_output_order_by(
        &mut self,
        columns: &[ResultColumn],
        order_by: &[OrderByExpr],
    ) -> Result<(), SpanError> {
        if order_by.is_empty() {
            return Ok(());
        }
        let mark = self.scope.from_mark();
        self.scope
            .push_from_source(PseudoTable::new("", columns.to_vec()).into());
        let result = order_by
            .iter()
            .try_for_each(|item| self.resolve_expr(&item.expr).map(|_| ()));
        self.scope.pop_from_sources(mark);
        result
    }

    /// `VALUES (..), (..)`: columns `column1..N`, each the union of its
    /// position over all rows
    fn resolve_values(&mut self, values: &Values) -> Result<Vec<ResultColumn>, SpanError> {
        let Some(first) = values.rows.first() else {
            return Ok(Vec::new());
        };
        let width = first.len();

        let mut columns: Vec<ResultColumn> = (1..=width)
            .map(|i| ResultColumn::unsourced(format!("column{}", i)))
            .collect();
        for row in &values.rows {
            if row.len() != width {
                return Err(SpanError::malformed("VALUES lists must all be the same length"));
            }
            for (column, expr) in columns.iter_mut().zip(row) {
                let sources = self.resolve_expr(expr)?;
                column.sources.merge(&sources);
            }
        }
        Ok(columns)
    }

    fn resolve_select(
        &mut self,
        select: &Select,
        order_by: &[OrderByExpr],
    ) -> Result<Vec<ResultColumn>, SpanError> {
        let mark = self.scope.from_mark();
        let result = self.resolve_select_in_scope(select, order_by);
        self.scope.pop_from_sources(mark);
        result
    }

    fn resolve_select_in_scope(
        &mut self,
        select: &Select,
        order_by: &[OrderByExpr],
    ) -> Result<Vec<ResultColumn>, SpanError> {
        let from = self.resolve_from_clause(&select.from)?;

        let mut columns = Vec::with_capacity(select.projection.len());
        for item in &select.projection {
            match item {
                SelectItem::UnnamedExpr(expr) => {
                    let sources = self.resolve_expr(expr)?;
                    columns.push(ResultColumn::new(field_name(expr), sources));
                }
                SelectItem::ExprWithAlias { expr, alias } => {
                    let sources = self.resolve_expr(expr)?;
                    columns.push(ResultColumn::new(normalize_ident(alias), sources));
                }
                SelectItem::Wildcard(_) => {
                    if from.is_empty() {
                        return Err(SpanError::malformed("SELECT * with no tables specified is not valid"));
                    }
                    for source in &from {
                        columns.extend(self.expand_star(source));
                    }
                }
                SelectItem::QualifiedWildcard(name, _) => {
                    let rendered = name.to_string();
                    let parts = split_qualified(rendered.trim_end_matches(".*"));
                    let source = match parts.as_slice() {
                        [table] => self.scope.lookup_table(None, table),
                        [schema, table] => self.scope.lookup_table(Some(schema.as_str()), table),
                        _ => None,
                    }
                    .cloned()
                    .ok_or_else(|| SpanError::not_found(ResourceKind::Table, parts.join(".")))?;
                    columns.extend(self.expand_star(&source));
                }
            }
        }

        if let Some(Distinct::On(exprs)) = &select.distinct {
            for expr in exprs {
                self.resolve_clause_expr(expr, &columns)?;
            }
        }
        if let Some(selection) = &select.selection {
            self.resolve_expr(selection)?;
        }
        if let GroupByExpr::Expressions(exprs, ..) = &select.group_by {
            for expr in exprs {
                self.resolve_clause_expr(expr, &columns)?;
            }
        }
        if let Some(having) = &select.having {
            self.resolve_expr(having)?;
        }
        for item in order_by {
            self.resolve_order_by_expr(&item.expr, &columns)?;
        }

        Ok(columns)
    }

    /// Columns of a star expansion; all of them are read
    fn expand_star(&self, source: &TableSource) -> Vec<ResultColumn> {
        let columns = source.columns();
        for column in &columns {
            self.ctx.record_access(&column.sources);
        }
        columns
    }

    /// A bare name in ORDER BY refers to an output column before an input one
    fn resolve_order_by_expr(
        &mut self,
        expr: &Expr,
        output: &[ResultColumn],
    ) -> Result<SourceColumnSet, SpanError> {
        if let Expr::Identifier(ident) = expr {
            let name = normalize_ident(ident);
            if let Some(column) = output.iter().find(|c| c.name == name) {
                return Ok(column.sources.clone());
            }
        }
        self.resolve_expr(expr)
    }

    /// Resolve an expression that may name an output column by its alias;
    /// input columns take precedence, as in GROUP BY
    fn resolve_clause_expr(
        &mut self,
        expr: &Expr,
        output: &[ResultColumn],
    ) -> Result<SourceColumnSet, SpanError> {
        if let Expr::Identifier(ident) = expr {
            let name = normalize_ident(ident);
            if self.scope.lookup_column(None, None, None, &name).is_none() {
                if let Some(column) = output.iter().find(|c| c.name == name) {
                    return Ok(column.sources.clone());
                }
            }
        }
        self.resolve_expr(expr)
    }
}
