//! Restricted predicate evaluation for conditional context items
//!
//! Conditional context entries carry a `when` string evaluated against the
//! template context. The supported subset is deliberately small:
//!
//! - dotted-path lookups: `platform.name`, `profile`
//! - literals: single- or double-quoted strings, integers, `true`, `false`
//! - operators: `==`, `!=`, `in` (membership in an array, substring of a
//!   string, or key of an object)
//! - a bare operand, tested for truthiness
//!
//! Truthiness: booleans as-is; numbers when non-zero; strings when equal to
//! `"true"`, `"1"` or `"yes"` (case-insensitive); arrays and objects when
//! non-empty; null, missing paths and everything else are false.
//!
//! Evaluation is never fatal: a malformed or failing predicate simply makes
//! the conditional item resolve to false.

use serde_json::Value;

use super::template::lookup_path;

#[derive(Debug, PartialEq)]
enum Token {
    Operand(String),
    Eq,
    Ne,
    In,
}

/// Evaluate a predicate against the template context
///
/// Any parse or lookup failure yields `false`.
pub fn evaluate(expression: &str, context: &Value) -> bool {
    eval_inner(expression, context).unwrap_or(false)
}

fn eval_inner(expression: &str, context: &Value) -> Option<bool> {
    let tokens = tokenize(expression)?;

    match tokens.as_slice() {
        [Token::Operand(single)] => Some(is_truthy(&resolve_operand(single, context)?)),
        [Token::Operand(lhs), op, Token::Operand(rhs)] => {
            let left = resolve_operand(lhs, context)?;
            let right = resolve_operand(rhs, context)?;
            match op {
                Token::Eq => Some(values_equal(&left, &right)),
                Token::Ne => Some(!values_equal(&left, &right)),
                Token::In => Some(contains(&right, &left)),
                Token::Operand(_) => None,
            }
        }
        _ => None,
    }
}

/// Split an expression into operands and operators, honoring quotes
fn tokenize(expression: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in expression.chars() {
        match quote {
            Some(q) => {
                current.push(ch);
                if ch == q {
                    quote = None;
                }
            }
            None if ch == '\'' || ch == '"' => {
                current.push(ch);
                quote = Some(ch);
            }
            None if ch.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(word_to_token(&current));
                    current.clear();
                }
            }
            None => current.push(ch),
        }
    }

    // Unterminated quote
    if quote.is_some() {
        return None;
    }
    if !current.is_empty() {
        tokens.push(word_to_token(&current));
    }
    if tokens.is_empty() {
        return None;
    }

    Some(tokens)
}

fn word_to_token(word: &str) -> Token {
    match word {
        "==" => Token::Eq,
        "!=" => Token::Ne,
        "in" => Token::In,
        other => Token::Operand(other.to_string()),
    }
}

/// Turn an operand word into a JSON value: literal or context lookup
fn resolve_operand(word: &str, context: &Value) -> Option<Value> {
    if word.len() >= 2 {
        let first = word.chars().next()?;
        if (first == '\'' || first == '"') && word.ends_with(first) {
            return Some(Value::String(word[1..word.len() - 1].to_string()));
        }
    }

    match word {
        "true" => return Some(Value::Bool(true)),
        "false" => return Some(Value::Bool(false)),
        _ => {}
    }

    if let Ok(number) = word.parse::<i64>() {
        return Some(Value::Number(number.into()));
    }

    // A dotted path that resolves to nothing is a valid, falsy outcome
    Some(lookup_path(context, word).cloned().unwrap_or(Value::Null))
}

fn values_equal(left: &Value, right: &Value) -> bool {
    left == right
}

fn contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::Array(items) => items.iter().any(|item| item == needle),
        Value::String(s) => match needle {
            Value::String(sub) => s.contains(sub.as_str()),
            _ => false,
        },
        Value::Object(map) => match needle {
            Value::String(key) => map.contains_key(key),
            _ => false,
        },
        _ => false,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => {
            let lowered = s.to_lowercase();
            lowered == "true" || lowered == "1" || lowered == "yes"
        }
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Null => false,
    }
}
