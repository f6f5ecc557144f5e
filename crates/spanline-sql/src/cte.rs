//! Common table expressions
//!
//! Each CTE of a WITH clause is resolved in order and pushed as a pseudo
//! table, so later CTEs and the main body can reference earlier ones.
//! Recursive CTEs are solved as a fixed point: the base part seeds the
//! columns and the recursive part is re-resolved against the growing CTE
//! until no column gains a source.

use sqlparser::ast::{Query, SetExpr, SetOperator, TableAlias, With};
use spanline_core::{ResultColumn, SpanError};

use crate::naming::{leading_identifier, normalize_ident};
use crate::resolver::SpanResolver;
use crate::table_source::PseudoTable;

/// Column names of `alias(c1, c2, ...)`
pub(crate) fn alias_columns(alias: &TableAlias) -> Vec<String> {
    alias
        .columns
        .iter()
        .map(|column| leading_identifier(&column.to_string()))
        .collect()
}

/// Apply a CTE column alias list, which must name every column
fn rename_cte_columns(
    name: &str,
    aliases: &[String],
    mut columns: Vec<ResultColumn>,
) -> Result<Vec<ResultColumn>, SpanError> {
    if aliases.is_empty() {
        return Ok(columns);
    }
    if aliases.len() != columns.len() {
        return Err(SpanError::malformed(format!(
            "WITH query \"{}\" has {} columns available but {} columns specified",
            name,
            columns.len(),
            aliases.len()
        )));
    }
    for (column, alias) in columns.iter_mut().zip(aliases) {
        column.name = alias.clone();
    }
    Ok(columns)
}

impl<'a> SpanResolver<'a> {
    /// Resolve every CTE of a WITH clause and bring it into scope
    pub(crate) fn resolve_with(&mut self, with: &With) -> Result<(), SpanError> {
        for cte in &with.cte_tables {
            let name = normalize_ident(&cte.alias.name);
            let aliases = alias_columns(&cte.alias);
            let columns = if with.recursive {
                self.resolve_recursive_cte(&name, &aliases, &cte.query)?
            } else {
                self.resolve_plain_cte(&name, &aliases, &cte.query)?
            };
            self.scope.push_cte(PseudoTable::new(name, columns));
        }
        Ok(())
    }

    fn resolve_plain_cte(
        &mut self,
        name: &str,
        aliases: &[String],
        query: &Query,
    ) -> Result<Vec<ResultColumn>, SpanError> {
        let mut body = self.nested()?;
        let columns = body.resolve_query(query)?;
        rename_cte_columns(name, aliases, columns)
    }

    fn resolve_recursive_cte(
        &mut self,
        name: &str,
        aliases: &[String],
        query: &Query,
    ) -> Result<Vec<ResultColumn>, SpanError> {
        let SetExpr::SetOperation {
            op: SetOperator::Union,
            left,
            right,
            ..
        } = query.body.as_ref()
        else {
            return self.resolve_plain_cte(name, aliases, query);
        };

        let mut body = self.nested()?;
        if let Some(with) = &query.with {
            body.resolve_with(with)?;
        }

        let base = body.resolve_set_expr(left, &[])?;
        let base = rename_cte_columns(name, aliases, base)?;
        let width = base.len();
        let index = body.scope.push_cte(PseudoTable::new(name, base));

        let mut rounds = 0;
        loop {
            rounds += 1;
            let step = body.resolve_set_expr(right, &[])?;
            if step.len() != width {
                return Err(SpanError::malformed(format!(
                    "recursive query \"{}\" has {} columns in its base part but {} in its recursive part",
                    name,
                    width,
                    step.len()
                )));
            }
            if !body.scope.merge_cte_columns(index, &step) {
                break;
            }
        }
        tracing::debug!(cte = name, rounds, "recursive CTE reached a fixed point");

        Ok(body
            .scope
            .cte(index)
            .map(|cte| cte.columns.clone())
            .unwrap_or_default())
    }
}
