//! Identifier normalization and output-column naming
//!
//! PostgreSQL folds unquoted identifiers to lower case and keeps quoted
//! ones verbatim. Names are compared after folding.

use sqlparser::ast::{Expr, Ident, ObjectName, Query, SelectItem, SetExpr};
use spanline_core::UNKNOWN_COLUMN_NAME;

/// Fold an identifier the way PostgreSQL does
pub fn normalize_ident(ident: &Ident) -> String {
    if ident.quote_style.is_some() {
        ident.value.clone()
    } else {
        ident.value.to_lowercase()
    }
}

/// Normalized parts of a dotted object name
pub fn object_name_parts(name: &ObjectName) -> Vec<String> {
    split_qualified(&name.to_string())
}

/// Split rendered dotted SQL text into normalized parts
///
/// Dots inside double quotes do not split, and `""` inside quotes is a
/// literal quote.
pub fn split_qualified(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut was_quoted = false;
    let mut chars = text.trim().chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                chars.next();
                current.push('"');
            }
            '"' => {
                quoted = !quoted;
                was_quoted = true;
            }
            '.' if !quoted => {
                parts.push(finish_part(&current, was_quoted));
                current.clear();
                was_quoted = false;
            }
            _ => current.push(c),
        }
    }
    parts.push(finish_part(&current, was_quoted));
    parts
}

fn finish_part(raw: &str, quoted: bool) -> String {
    if quoted {
        raw.to_string()
    } else {
        raw.trim().to_lowercase()
    }
}

/// First identifier of rendered SQL text such as `"Col" int`
pub fn leading_identifier(text: &str) -> String {
    let text = text.trim();
    if let Some(rest) = text.strip_prefix('"') {
        let mut name = String::new();
        let mut chars = rest.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    name.push('"');
                    continue;
                }
                break;
            }
            name.push(c);
        }
        name
    } else {
        text.split_whitespace()
            .next()
            .unwrap_or_default()
            .to_lowercase()
    }
}

/// Derive the output name of an unaliased expression
pub fn field_name(expr: &Expr) -> String {
    derived_name(expr).unwrap_or_else(|| UNKNOWN_COLUMN_NAME.to_string())
}

fn derived_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(normalize_ident(ident)),
        Expr::CompoundIdentifier(idents) => idents.last().map(normalize_ident),
        Expr::Nested(inner) => derived_name(inner),
        Expr::Function(function) => object_name_parts(&function.name).pop(),
        Expr::Case { .. } => Some("case".to_string()),
        Expr::Array(_) => Some("array".to_string()),
        Expr::Tuple(_) => Some("row".to_string()),
        Expr::Exists { .. } => Some("exists".to_string()),
        Expr::Subquery(query) => query_single_target_name(query),
        Expr::Cast {
            expr, data_type, ..
        } => derived_name(expr).or_else(|| {
            let rendered = data_type.to_string().to_lowercase();
            rendered.split('(').next().map(|t| t.trim().to_string())
        }),
        Expr::Extract { .. } => Some("extract".to_string()),
        Expr::Substring { .. } => Some("substring".to_string()),
        Expr::Position { .. } => Some("position".to_string()),
        Expr::Overlay { .. } => Some("overlay".to_string()),
        Expr::Ceil { .. } => Some("ceil".to_string()),
        Expr::Floor { .. } => Some("floor".to_string()),
        _ => None,
    }
}

/// Name of the only output column of a scalar subquery
fn query_single_target_name(query: &Query) -> Option<String> {
    let mut body = query.body.as_ref();
    loop {
        match body {
            SetExpr::Select(select) if select.projection.len() == 1 => {
                return match &select.projection[0] {
                    SelectItem::ExprWithAlias { alias, .. } => Some(normalize_ident(alias)),
                    SelectItem::UnnamedExpr(expr) => derived_name(expr),
                    _ => None,
                };
            }
            SetExpr::Query(inner) => body = inner.body.as_ref(),
            SetExpr::SetOperation { left, .. } => body = left.as_ref(),
            _ => return None,
        }
    }
}
