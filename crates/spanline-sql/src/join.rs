//! Join column merging
//!
//! A plain join keeps every column of both sides. NATURAL and USING joins
//! merge the shared columns into one, whose lineage is the union of both
//! sides; left columns come first in their own order, followed by the
//! right-only columns.

use spanline_core::{ResourceKind, ResultColumn, SourceColumnSet, SpanError};

/// Columns of a join result and the lineage of its join keys
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutput {
    pub columns: Vec<ResultColumn>,
    pub key_sources: SourceColumnSet,
}

/// Cross, inner or outer join with an ON condition
pub fn plain_join(left: &[ResultColumn], right: &[ResultColumn]) -> JoinOutput {
    JoinOutput {
        columns: left.iter().chain(right).cloned().collect(),
        key_sources: SourceColumnSet::new(),
    }
}

/// NATURAL join: every name present on both sides is merged
pub fn natural_join(left: &[ResultColumn], right: &[ResultColumn]) -> JoinOutput {
    let shared: Vec<String> = left
        .iter()
        .filter(|l| right.iter().any(|r| r.name == l.name))
        .map(|l| l.name.clone())
        .collect();
    merge_on(left, right, &shared)
}

/// USING join: the listed names are merged; each must exist on both sides
pub fn using_join(
    left: &[ResultColumn],
    right: &[ResultColumn],
    names: &[String],
) -> Result<JoinOutput, SpanError> {
    for name in names {
        let on_left = left.iter().any(|c| &c.name == name);
        let on_right = right.iter().any(|c| &c.name == name);
        if !on_left || !on_right {
            let side = if on_left { "right" } else { "left" };
            return Err(SpanError::not_found(
                ResourceKind::Column,
                format!("{} (USING, {} side of join)", name, side),
            ));
        }
    }
    Ok(merge_on(left, right, names))
}

fn merge_on(left: &[ResultColumn], right: &[ResultColumn], names: &[String]) -> JoinOutput {
    let mut key_sources = SourceColumnSet::new();
    let mut columns: Vec<ResultColumn> = Vec::with_capacity(left.len() + right.len());

    for column in left {
        let mut merged = column.clone();
        if names.contains(&column.name) {
            if let Some(other) = right.iter().find(|r| r.name == column.name) {
                merged.sources.merge(&other.sources);
            }
            key_sources.merge(&merged.sources);
        }
        columns.push(merged);
    }
    columns.extend(right.iter().filter(|r| !names.contains(&r.name)).cloned());

    JoinOutput {
        columns,
        key_sources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use spanline_core::ColumnResource;

    fn side(table: &str, names: &[&str]) -> Vec<ResultColumn> {
        names
            .iter()
            .map(|n| {
                ResultColumn::new(
                    *n,
                    SourceColumnSet::single(ColumnResource::new("db", "public", table, *n)),
                )
            })
            .collect()
    }

    fn names(output: &JoinOutput) -> Vec<&str> {
        output.columns.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn plain_keeps_everything() {
        let output = plain_join(&side("l", &["a", "b"]), &side("r", &["a", "c"]));
        assert_eq!(names(&output), vec!["a", "b", "a", "c"]);
        assert!(output.key_sources.is_empty());
    }

    #[test]
    fn natural_merges_shared_names() {
        let output = natural_join(&side("l", &["a", "b"]), &side("r", &["b", "c"]));
        assert_eq!(names(&output), vec!["a", "b", "c"]);
        assert_eq!(output.columns[1].sources.len(), 2);
        assert_eq!(output.key_sources.len(), 2);
    }

    #[test]
    fn using_merges_listed_names_only() {
        let output = using_join(
            &side("l", &["a", "b"]),
            &side("r", &["a", "b"]),
            &["a".to_string()],
        )
        .unwrap();
        assert_eq!(names(&output), vec!["a", "b", "b"]);
        assert_eq!(output.columns[0].sources.len(), 2);
        assert_eq!(output.columns[1].sources.len(), 1);
    }

    #[test]
    fn using_missing_column() {
        let err = using_join(&side("l", &["a"]), &side("r", &["b"]), &["a".to_string()]).unwrap_err();
        assert!(matches!(
            err,
            SpanError::ResourceNotFound {
                resource: ResourceKind::Column,
                ..
            }
        ));
    }
}
