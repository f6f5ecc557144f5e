//! FROM clause resolution
//!
//! Turns each FROM item into a [`TableSource`] and pushes it into the
//! current scope. Catalog relations are looked up schema by schema along
//! the search path; views are expanded by resolving their definition.

use sqlparser::ast::{
    FunctionArg, JoinConstraint, JoinOperator, Statement, TableAlias, TableFactor, TableWithJoins,
};
use spanline_core::{ResourceKind, ResultColumn, SourceColumnSet, SpanError};

use crate::builtin::is_builtin_function;
use crate::cte::alias_columns;
use crate::join::{natural_join, plain_join, using_join, JoinOutput};
use crate::naming::{normalize_ident, object_name_parts, split_qualified};
use crate::parser::SqlParser;
use crate::resolver::SpanResolver;
use crate::table_source::{PhysicalTable, PhysicalView, PseudoTable, SequenceSource, TableSource};

/// Columns produced by a function in FROM
struct TableFunctionOutput {
    columns: Vec<ResultColumn>,

    /// Scalar results take the name of their alias
    scalar: bool,
}

impl TableFunctionOutput {
    fn scalar(column: ResultColumn) -> Self {
        Self {
            columns: vec![column],
            scalar: true,
        }
    }

    fn composite(columns: Vec<ResultColumn>) -> Self {
        Self {
            columns,
            scalar: false,
        }
    }
}

impl<'a> SpanResolver<'a> {
    /// Resolve and push every FROM item
    ///
    /// Returns one source per item; an item with joins is represented by
    /// its merged join result.
    pub(crate) fn resolve_from_clause(&mut self, from: &[TableWithJoins]) -> Result<Vec<TableSource>, SpanError> {
        let mut sources = Vec::with_capacity(from.len());
        for item in from {
            sources.push(self.resolve_table_with_joins(item)?);
        }
        Ok(sources)
    }

    fn resolve_table_with_joins(&mut self, item: &TableWithJoins) -> Result<TableSource, SpanError> {
        let mark = self.scope.from_mark();
        let mut current = self.resolve_table_factor(&item.relation)?;
        self.scope.push_from_source(current.clone());
        if item.joins.is_empty() {
            return Ok(current);
        }

        for join in &item.joins {
            let right = self.resolve_table_factor(&join.relation)?;
            self.scope.push_from_source(right.clone());
            let output = self.resolve_join(&current, &right, &join.join_operator)?;
            self.ctx.record_access(&output.key_sources);
            current = PseudoTable::new("", output.columns).into();
        }

        self.scope.insert_from_source(mark, current.clone());
        Ok(current)
    }

    fn resolve_join(
        &mut self,
        left: &TableSource,
        right: &TableSource,
        operator: &JoinOperator,
    ) -> Result<JoinOutput, SpanError> {
        let constraint = match operator {
            JoinOperator::Inner(c)
            | JoinOperator::LeftOuter(c)
            | JoinOperator::RightOuter(c)
            | JoinOperator::FullOuter(c)
            | JoinOperator::LeftSemi(c)
            | JoinOperator::RightSemi(c)
            | JoinOperator::LeftAnti(c)
            | JoinOperator::RightAnti(c) => Some(c),
            JoinOperator::AsOf { constraint, .. } => Some(constraint),
            _ => None,
        };

        let left_columns = left.columns();
        let right_columns = right.columns();
        match constraint {
            Some(JoinConstraint::On(condition)) => {
                self.resolve_expr(condition)?;
                Ok(plain_join(&left_columns, &right_columns))
            }
            Some(JoinConstraint::Using(names)) => {
                let names: Vec<String> = names
                    .iter()
                    .filter_map(|name| split_qualified(&name.to_string()).pop())
                    .collect();
                using_join(&left_columns, &right_columns, &names)
            }
            Some(JoinConstraint::Natural) => Ok(natural_join(&left_columns, &right_columns)),
            _ => Ok(plain_join(&left_columns, &right_columns)),
        }
    }

    fn resolve_table_factor(&mut self, factor: &TableFactor) -> Result<TableSource, SpanError> {
        match factor {
            TableFactor::Table {
                name, alias, args, ..
            } => {
                let parts = object_name_parts(name);
                match args {
                    Some(args) => self.resolve_table_function(&parts, &args.args, alias.as_ref()),
                    None => {
                        let source = self.lookup_relation(&parts)?;
                        apply_alias(source, alias.as_ref())
                    }
                }
            }
            TableFactor::Derived {
                lateral,
                subquery,
                alias,
                ..
            } => {
                let mut body = if *lateral { self.nested()? } else { self.derived()? };
                let columns = body.resolve_query(subquery)?;
                apply_alias(PseudoTable::new("", columns).into(), alias.as_ref())
            }
            TableFactor::Function {
                name, args, alias, ..
            } => self.resolve_table_function(&object_name_parts(name), args, alias.as_ref()),
            TableFactor::UNNEST {
                alias, array_exprs, ..
            } => {
                let mut columns = Vec::with_capacity(array_exprs.len());
                for expr in array_exprs {
                    columns.push(ResultColumn::new("unnest", self.resolve_expr(expr)?));
                }
                let output = TableFunctionOutput {
                    scalar: columns.len() == 1,
                    columns,
                };
                apply_function_alias(output, "unnest", alias.as_ref())
            }
            TableFactor::NestedJoin {
                table_with_joins,
                alias,
                ..
            } => {
                let source = self.resolve_table_with_joins(table_with_joins)?;
                apply_alias(source, alias.as_ref())
            }
            other => Err(SpanError::type_not_supported("FROM item", other.to_string())),
        }
    }

    /// Find a relation by name: CTEs first, then catalog relations
    fn lookup_relation(&mut self, parts: &[String]) -> Result<TableSource, SpanError> {
        if let [name] = parts {
            if let Some((_, cte)) = self.scope.lookup_cte(name) {
                return Ok(cte.clone().into());
            }
        }

        let target = self.ctx.target(parts)?;
        let database = self.ctx.database(&target.database)?;
        for schema in &target.search_path {
            let path = std::slice::from_ref(schema);

            if let Some((schema, table)) = database
                .search_table(path, &target.name)
                .or_else(|| database.search_external_table(path, &target.name))
            {
                return Ok(TableSource::Physical(PhysicalTable {
                    database: target.database.clone(),
                    schema: schema.to_string(),
                    name: table.name.clone(),
                    columns: table.column_names(),
                }));
            }

            if let Some((schema, view)) = database
                .search_view(path, &target.name)
                .or_else(|| database.search_materialized_view(path, &target.name))
            {
                return self.expand_view(&target.database, schema, &view.name, &view.definition);
            }

            if let Some((schema, sequence)) = database.search_sequence(path, &target.name) {
                return Ok(TableSource::Sequence(SequenceSource {
                    database: target.database.clone(),
                    schema: schema.to_string(),
                    name: sequence.name.clone(),
                }));
            }
        }

        Err(SpanError::not_found(ResourceKind::Table, parts.join(".")))
    }

    /// Resolve a view definition into a source carrying its lineage
    fn expand_view(
        &mut self,
        database: &str,
        schema: &str,
        name: &str,
        definition: &str,
    ) -> Result<TableSource, SpanError> {
        let context = format!("view {}.{}", schema, name);
        let statements = SqlParser::new().parse_statements(definition, &context)?;
        let query = match statements.as_slice() {
            [Statement::Query(query)] => query,
            [Statement::CreateView { query, .. }] => query,
            _ => {
                return Err(SpanError::malformed(format!(
                    "definition of {} is not a single query",
                    context
                )))
            }
        };

        tracing::debug!(view = %context, "expanding view definition");
        let mut body = self.detached()?;
        let columns = body.resolve_query(query)?;
        Ok(TableSource::View(PhysicalView {
            database: database.to_string(),
            schema: schema.to_string(),
            name: name.to_string(),
            columns,
        }))
    }

    /// A function call in FROM
    fn resolve_table_function(
        &mut self,
        parts: &[String],
        args: &[FunctionArg],
        alias: Option<&TableAlias>,
    ) -> Result<TableSource, SpanError> {
        let (schema, name) = match parts {
            [.., schema, name] => (Some(schema.as_str()), name.as_str()),
            [name] => (None, name.as_str()),
            [] => return Err(SpanError::malformed("table function without a name")),
        };

        let mut arg_sources = Vec::with_capacity(args.len());
        for arg in args {
            arg_sources.push(self.resolve_function_arg(arg)?);
        }

        let output = if is_builtin_function(schema, name) {
            builtin_table_function(name, &arg_sources, alias)?
        } else {
            let resolved = self.resolve_function_call(parts, args.len())?;
            let scalar = resolved.declaration.output_names().is_empty() && resolved.columns.len() == 1;
            TableFunctionOutput {
                columns: resolved.columns,
                scalar,
            }
        };
        apply_function_alias(output, name, alias)
    }
}

/// Columns of a set-returning built-in
fn builtin_table_function(
    name: &str,
    arg_sources: &[SourceColumnSet],
    alias: Option<&TableAlias>,
) -> Result<TableFunctionOutput, SpanError> {
    let first = arg_sources.first().cloned().unwrap_or_default();
    let all = arg_sources
        .iter()
        .fold(SourceColumnSet::new(), |acc, s| acc.union(s));

    let output = match name {
        "generate_series" | "generate_subscripts" => TableFunctionOutput::scalar(ResultColumn::unsourced(name)),
        "unnest" => TableFunctionOutput {
            columns: arg_sources
                .iter()
                .map(|s| ResultColumn::new("unnest", s.clone()))
                .collect(),
            scalar: arg_sources.len() == 1,
        },
        "json_each" | "jsonb_each" | "json_each_text" | "jsonb_each_text" => TableFunctionOutput::composite(vec![
            ResultColumn::new("key", first.clone()),
            ResultColumn::new("value", first),
        ]),
        "json_array_elements" | "jsonb_array_elements" | "json_array_elements_text"
        | "jsonb_array_elements_text" => TableFunctionOutput::composite(vec![ResultColumn::new("value", first)]),
        "regexp_split_to_table" | "string_to_table" | "regexp_matches" | "json_object_keys"
        | "jsonb_object_keys" => TableFunctionOutput::scalar(ResultColumn::new(name, all)),
        "json_populate_record" | "jsonb_populate_record" | "json_populate_recordset"
        | "jsonb_populate_recordset" => {
            return Err(SpanError::type_not_supported(
                "table function",
                format!("{} takes its columns from a composite type", name),
            ))
        }
        _ => {
            let names = alias.map(alias_columns).unwrap_or_default();
            if names.is_empty() {
                return Err(SpanError::type_not_supported(
                    "table function",
                    format!("{} in FROM requires a column definition list", name),
                ));
            }
            TableFunctionOutput::composite(
                names
                    .into_iter()
                    .map(|column| ResultColumn::new(column, all.clone()))
                    .collect(),
            )
        }
    };
    Ok(output)
}

fn apply_alias(source: TableSource, alias: Option<&TableAlias>) -> Result<TableSource, SpanError> {
    match alias {
        Some(alias) => source.with_alias(&normalize_ident(&alias.name), &alias_columns(alias)),
        None => Ok(source),
    }
}

/// Name a function result: the source is named after the function, or
/// after its alias, which also names a scalar result column
fn apply_function_alias(
    output: TableFunctionOutput,
    function: &str,
    alias: Option<&TableAlias>,
) -> Result<TableSource, SpanError> {
    let mut columns = output.columns;
    if output.scalar {
        if let Some(column) = columns.first_mut() {
            column.name = function.to_string();
        }
    }

    let Some(alias) = alias else {
        return Ok(PseudoTable::new(function, columns).into());
    };
    let alias_name = normalize_ident(&alias.name);
    let names = alias_columns(alias);
    if output.scalar && names.is_empty() {
        if let Some(column) = columns.first_mut() {
            column.name = alias_name.clone();
        }
    }
    TableSource::from(PseudoTable::new(function, columns)).with_alias(&alias_name, &names)
}
