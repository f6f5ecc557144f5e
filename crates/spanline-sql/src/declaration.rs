//! `CREATE FUNCTION` declaration scanning
//!
//! Function definitions come from the catalog as the text produced by
//! `pg_get_functiondef`. The header is scanned token by token for the name,
//! the parameter list, the return shape, the language and the body.

use sqlparser::tokenizer::Token;
use spanline_core::SpanError;

use crate::tokens::{
    find_top_level, identifier, is_keyword, render, significant_positions, split_top_level,
    tokenize,
};

/// Words that start a multi-word type name
const MULTI_WORD_TYPES: &[&str] = &["bit", "character", "double", "interval", "national", "time", "timestamp"];

/// Words that continue a multi-word type name
const TYPE_CONTINUATIONS: &[&str] = &[
    "char", "character", "day", "hour", "minute", "month", "precision", "second", "to",
    "varying", "with", "without", "year", "zone",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterMode {
    In,
    Out,
    InOut,
    Variadic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionParameter {
    pub mode: ParameterMode,
    pub name: Option<String>,
    pub has_default: bool,
}

/// Scanned function header and body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDeclaration {
    pub schema: Option<String>,
    pub name: String,
    pub parameters: Vec<FunctionParameter>,

    /// Text after RETURNS, absent for procedures
    pub returns: Option<String>,

    /// Columns of `RETURNS TABLE(...)`
    pub table_columns: Vec<String>,

    /// Lower-cased language name
    pub language: String,

    /// Function body: the `AS` string, the `RETURN` expression or the
    /// statements of a `BEGIN ATOMIC` block
    pub body: Option<String>,
}

impl FunctionParameter {
    fn is_input(&self) -> bool {
        !matches!(self.mode, ParameterMode::Out)
    }

    fn is_output(&self) -> bool {
        matches!(self.mode, ParameterMode::Out | ParameterMode::InOut)
    }
}

impl FunctionDeclaration {
    /// Scan a `CREATE [OR REPLACE] FUNCTION|PROCEDURE` statement
    pub fn parse(definition: &str) -> Result<Self, SpanError> {
        let unsupported = |reason: String| SpanError::function_not_supported("<definition>", reason);

        let tokens = tokenize(definition).map_err(|e| unsupported(format!("cannot tokenize definition: {}", e)))?;
        let sig = significant_positions(&tokens);
        let at = |i: usize| sig.get(i).map(|&p| &tokens[p]);

        let start = (0..sig.len())
            .find(|&i| at(i).is_some_and(|t| is_keyword(t, "FUNCTION") || is_keyword(t, "PROCEDURE")))
            .ok_or_else(|| unsupported("not a CREATE FUNCTION statement".to_string()))?;

        // Qualified name up to the parameter list
        let mut i = start + 1;
        let mut name_parts = Vec::new();
        while let Some(token) = at(i) {
            match token {
                Token::Word(_) => name_parts.push(identifier(token).unwrap_or_default()),
                Token::Period => {}
                Token::LParen => break,
                other => return Err(unsupported(format!("unexpected token {} in function name", other))),
            }
            i += 1;
        }
        let name = name_parts
            .pop()
            .ok_or_else(|| unsupported("missing function name".to_string()))?;
        let schema = name_parts.pop();

        // Parameter list between the parentheses
        let open = *sig.get(i).ok_or_else(|| unsupported(format!("missing parameter list of {}", name)))?;
        let close = open
            + 1
            + find_top_level(&tokens[open + 1..], |t| *t == Token::RParen)
                .ok_or_else(|| unsupported(format!("unterminated parameter list of {}", name)))?;
        let parameters = parse_parameters(&tokens[open + 1..close]);

        let mut declaration = Self {
            schema,
            name,
            parameters,
            returns: None,
            table_columns: Vec::new(),
            language: String::new(),
            body: None,
        };
        declaration.scan_clauses(&tokens, close + 1)?;

        if declaration.language.is_empty() && declaration.body.is_some() {
            declaration.language = "sql".to_string();
        }
        Ok(declaration)
    }

    /// Scan the clauses after the parameter list
    fn scan_clauses(&mut self, tokens: &[Token], from: usize) -> Result<(), SpanError> {
        let rest = &tokens[from..];
        let sig = significant_positions(rest);
        let mut i = 0;

        while let Some(&pos) = sig.get(i) {
            let token = &rest[pos];
            let next = sig.get(i + 1).map(|&p| &rest[p]);

            if is_keyword(token, "RETURNS") {
                let table_open = sig
                    .get(i + 2)
                    .copied()
                    .filter(|&p| next.is_some_and(|t| is_keyword(t, "TABLE")) && rest[p] == Token::LParen);
                if let Some(open) = table_open {
                    let close = find_top_level(&rest[open + 1..], |t| *t == Token::RParen)
                        .map(|c| open + 1 + c)
                        .unwrap_or(rest.len());
                    self.table_columns = split_top_level(&rest[open + 1..close], |t| *t == Token::Comma)
                        .into_iter()
                        .filter_map(|column| {
                            column
                                .iter()
                                .find(|t| matches!(t, Token::Word(_)))
                                .and_then(identifier)
                        })
                        .collect();
                    self.returns = Some("table".to_string());
                    i = sig.iter().position(|&p| p > close).unwrap_or(sig.len());
                    continue;
                }
                // Return type runs up to the next clause keyword
                let end = sig[i + 1..]
                    .iter()
                    .position(|&p| is_clause_start(&rest[p]))
                    .map(|offset| sig[i + 1 + offset])
                    .unwrap_or(rest.len());
                let type_start = sig.get(i + 1).copied().unwrap_or(end).min(end);
                self.returns = Some(render(&rest[type_start..end]).to_lowercase());
            } else if is_keyword(token, "LANGUAGE") {
                if let Some(next) = next {
                    self.language = match next {
                        Token::SingleQuotedString(s) => s.to_lowercase(),
                        other => identifier(other).unwrap_or_default().to_lowercase(),
                    };
                }
            } else if is_keyword(token, "AS") {
                match next {
                    Some(Token::DollarQuotedString(s)) => self.body = Some(s.value.clone()),
                    Some(Token::SingleQuotedString(s)) => self.body = Some(s.clone()),
                    _ => {}
                }
            } else if is_keyword(token, "RETURN") {
                let body = render(&rest[pos + 1..]);
                self.body = Some(body.trim_end_matches(';').trim().to_string());
                break;
            } else if is_keyword(token, "BEGIN") && next.is_some_and(|t| is_keyword(t, "ATOMIC")) {
                let body_start = sig[i + 1] + 1;
                let end = sig
                    .iter()
                    .rev()
                    .find(|&&p| p >= body_start && is_keyword(&rest[p], "END"))
                    .copied()
                    .unwrap_or(rest.len());
                self.body = Some(render(&rest[body_start..end]));
                break;
            }
            i += 1;
        }
        Ok(())
    }

    /// Schema-qualified name for messages
    pub fn qualified_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        }
    }

    /// Check if a call with `arg_count` arguments can bind to this function
    pub fn accepts(&self, arg_count: usize) -> bool {
        let inputs: Vec<&FunctionParameter> = self.parameters.iter().filter(|p| p.is_input()).collect();
        let variadic = inputs.iter().any(|p| p.mode == ParameterMode::Variadic);
        let required = inputs
            .iter()
            .filter(|p| !p.has_default && p.mode != ParameterMode::Variadic)
            .count();
        let maximum = inputs.len();

        arg_count >= required && (variadic || arg_count <= maximum)
    }

    /// Names of the output columns; empty when the body decides
    pub fn output_names(&self) -> Vec<String> {
        if !self.table_columns.is_empty() {
            return self.table_columns.clone();
        }
        self.parameters
            .iter()
            .filter(|p| p.is_output())
            .enumerate()
            .map(|(i, p)| p.name.clone().unwrap_or_else(|| format!("column{}", i + 1)))
            .collect()
    }

    /// Names of named input parameters
    pub fn input_names(&self) -> Vec<String> {
        self.parameters
            .iter()
            .filter(|p| p.is_input())
            .filter_map(|p| p.name.clone())
            .collect()
    }
}

fn is_clause_start(token: &Token) -> bool {
    [
        "LANGUAGE", "AS", "RETURN", "BEGIN", "IMMUTABLE", "STABLE", "VOLATILE", "STRICT",
        "CALLED", "SECURITY", "SET", "COST", "ROWS", "PARALLEL", "LEAKPROOF", "NOT", "WINDOW",
        "TRANSFORM", "SUPPORT", "EXTERNAL",
    ]
    .iter()
    .any(|kw| is_keyword(token, kw))
}

fn parse_parameters(tokens: &[Token]) -> Vec<FunctionParameter> {
    split_top_level(tokens, |t| *t == Token::Comma)
        .into_iter()
        .filter_map(parse_parameter)
        .collect()
}

fn parse_parameter(tokens: &[Token]) -> Option<FunctionParameter> {
    let mut sig: Vec<&Token> = tokens.iter().filter(|t| !crate::tokens::is_whitespace(t)).collect();
    if sig.is_empty() {
        return None;
    }

    let mode = match sig[0] {
        t if is_keyword(t, "IN") => Some(ParameterMode::In),
        t if is_keyword(t, "OUT") => Some(ParameterMode::Out),
        t if is_keyword(t, "INOUT") => Some(ParameterMode::InOut),
        t if is_keyword(t, "VARIADIC") => Some(ParameterMode::Variadic),
        _ => None,
    };
    if mode.is_some() {
        sig.remove(0);
    }

    let default_at = sig
        .iter()
        .position(|t| is_keyword(t, "DEFAULT") || **t == Token::Eq);
    let has_default = default_at.is_some();
    if let Some(index) = default_at {
        sig.truncate(index);
    }

    Some(FunctionParameter {
        mode: mode.unwrap_or(ParameterMode::In),
        name: parameter_name(&sig),
        has_default,
    })
}

/// A parameter is named when its first word is followed by another word
/// that does not continue a multi-word type
fn parameter_name(sig: &[&Token]) -> Option<String> {
    let (first, second) = match sig {
        [first, second, ..] => (*first, *second),
        _ => return None,
    };
    if !matches!(second, Token::Word(_)) {
        return None;
    }

    let first_word = identifier(first)?;
    let second_word = identifier(second).unwrap_or_default();
    let is_type_start = matches!(first, Token::Word(w) if w.quote_style.is_none())
        && MULTI_WORD_TYPES.contains(&first_word.as_str())
        && TYPE_CONTINUATIONS.contains(&second_word.as_str());
    if is_type_start {
        None
    } else {
        Some(first_word)
    }
}
