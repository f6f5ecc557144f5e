//! Set-operation merging
//!
//! UNION and INTERSECT union the lineage of each output position; EXCEPT
//! only ever returns rows of its left side. Output names come from the
//! left branch.

use sqlparser::ast::SetOperator;
use spanline_core::{ResultColumn, SpanError};

pub fn merge_set_operation(
    op: &SetOperator,
    left: Vec<ResultColumn>,
    right: Vec<ResultColumn>,
) -> Result<Vec<ResultColumn>, SpanError> {
    if left.len() != right.len() {
        return Err(SpanError::malformed(format!(
            "each {} query must have the same number of columns: {} vs {}",
            op,
            left.len(),
            right.len()
        )));
    }

    if matches!(op, SetOperator::Except) {
        return Ok(left);
    }

    Ok(left
        .into_iter()
        .zip(right)
        .map(|(mut column, other)| {
            column.sources.merge(&other.sources);
            column
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spanline_core::{ColumnResource, SourceColumnSet};

    fn column(name: &str, table: &str) -> ResultColumn {
        ResultColumn::new(
            name,
            SourceColumnSet::single(ColumnResource::new("db", "public", table, name)),
        )
    }

    #[test]
    fn union_merges_and_keeps_left_names() {
        let merged = merge_set_operation(
            &SetOperator::Union,
            vec![column("a", "l")],
            vec![column("z", "r")],
        )
        .unwrap();
        assert_eq!(merged[0].name, "a");
        assert_eq!(merged[0].sources.len(), 2);
    }

    #[test]
    fn intersect_unions_lineage() {
        let merged = merge_set_operation(
            &SetOperator::Intersect,
            vec![column("a", "l")],
            vec![column("a", "r")],
        )
        .unwrap();
        assert_eq!(merged[0].sources.len(), 2);
    }

    #[test]
    fn except_keeps_left() {
        let merged = merge_set_operation(
            &SetOperator::Except,
            vec![column("a", "l")],
            vec![column("a", "r")],
        )
        .unwrap();
        assert_eq!(merged[0].sources.len(), 1);
    }

    #[test]
    fn arity_mismatch_is_hard() {
        let err = merge_set_operation(
            &SetOperator::Union,
            vec![column("a", "l"), column("b", "l")],
            vec![column("a", "r")],
        )
        .unwrap_err();
        assert!(matches!(err, SpanError::MalformedQuery { .. }));
        assert!(!err.is_fail_open());
    }
}
