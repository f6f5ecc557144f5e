//! Token-level helpers for text the SQL parser cannot take whole
//!
//! `CREATE FUNCTION` headers and PL/pgSQL bodies are scanned as token
//! streams from the sqlparser tokenizer; only the embedded SQL pieces are
//! handed to the parser.

use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::tokenizer::{Token, Tokenizer};

/// Tokenize PostgreSQL text, keeping whitespace and comments
pub fn tokenize(sql: &str) -> Result<Vec<Token>, String> {
    Tokenizer::new(&PostgreSqlDialect {}, sql)
        .tokenize()
        .map_err(|e| e.to_string())
}

pub fn is_whitespace(token: &Token) -> bool {
    matches!(token, Token::Whitespace(_))
}

/// Check for an unquoted word, ignoring case
pub fn is_keyword(token: &Token, keyword: &str) -> bool {
    matches!(token, Token::Word(w) if w.quote_style.is_none() && w.value.eq_ignore_ascii_case(keyword))
}

/// Folded identifier text of a word token
pub fn identifier(token: &Token) -> Option<String> {
    match token {
        Token::Word(w) if w.quote_style.is_some() => Some(w.value.clone()),
        Token::Word(w) => Some(w.value.to_lowercase()),
        _ => None,
    }
}

/// `:=`
pub fn is_assignment(token: &Token) -> bool {
    token.to_string() == ":="
}

/// Render tokens back to SQL text
pub fn render(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|t| t.to_string())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Positions of the non-whitespace tokens
pub fn significant_positions(tokens: &[Token]) -> Vec<usize> {
    tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| !is_whitespace(t))
        .map(|(i, _)| i)
        .collect()
}

/// Drop leading whitespace and comments
pub fn trim_start(tokens: &[Token]) -> &[Token] {
    let start = tokens
        .iter()
        .position(|t| !is_whitespace(t))
        .unwrap_or(tokens.len());
    &tokens[start..]
}

fn depth_change(token: &Token) -> isize {
    match token {
        Token::LParen | Token::LBracket => 1,
        Token::RParen | Token::RBracket => -1,
        _ => 0,
    }
}

/// Index of the first token outside any parentheses matching `pred`
pub fn find_top_level<F>(tokens: &[Token], pred: F) -> Option<usize>
where
    F: Fn(&Token) -> bool,
{
    let mut depth = 0isize;
    for (i, token) in tokens.iter().enumerate() {
        if depth == 0 && pred(token) {
            return Some(i);
        }
        depth += depth_change(token);
    }
    None
}

/// Split at separators outside parentheses; separators are dropped
pub fn split_top_level<F>(tokens: &[Token], is_separator: F) -> Vec<&[Token]>
where
    F: Fn(&Token) -> bool,
{
    let mut parts = Vec::new();
    let mut depth = 0isize;
    let mut start = 0;
    for (i, token) in tokens.iter().enumerate() {
        if depth == 0 && is_separator(token) {
            parts.push(&tokens[start..i]);
            start = i + 1;
            continue;
        }
        depth += depth_change(token);
    }
    parts.push(&tokens[start..]);
    parts
}
