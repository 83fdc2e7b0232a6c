//! Brace expansion over a [`Bindings`] environment.
//!
//! `{name}` is replaced by the string form of a bound variable,
//! `{name|default}` falls back to the (recursively expanded) default when the
//! name is not bound, and `{U+hhhh}` produces a Unicode character. Anything
//! else between braces is left untouched, so literal JSON survives expansion.
use crate::bindings::Bindings;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use valu3::prelude::*;

static VARIABLE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-\w.$]+$").expect("valid variable name regex"));

static CODE_POINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[Uu]\+[0-9A-Fa-f]{4}$").expect("valid code point regex"));

pub fn is_variable_name(name: &str) -> bool {
    VARIABLE_NAME.is_match(name)
}

pub fn is_code_point(name: &str) -> bool {
    CODE_POINT.is_match(name)
}

/// `U+0041` -> `A`. Surrogates have no `char` and yield `None`.
pub fn code_point(name: &str) -> Option<char> {
    if !is_code_point(name) {
        return None;
    }

    let digits = &name[name.len() - 4..];
    u32::from_str_radix(digits, 16).ok().and_then(char::from_u32)
}

/// String form of a bound value as it appears in expanded text.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::String(value) => value.as_string(),
        Value::Null | Value::Undefined => "null".to_string(),
        Value::Boolean(value) => value.to_string(),
        other => other.to_json(JsonMode::Inline),
    }
}

pub fn expand(text: &str, bindings: &Bindings) -> String {
    if !text.contains('{') || !text.contains('}') {
        return text.to_string();
    }

    let chars: Vec<char> = text.chars().collect();
    expand_chars(&chars, bindings)
}

/// Rebuilds a JSON tree with every string and object key expanded.
pub fn expand_value(value: &Value, bindings: &Bindings) -> Value {
    match value {
        Value::String(text) => Value::from(expand(text.as_str(), bindings)),
        Value::Array(array) => Value::from(
            array
                .into_iter()
                .map(|item| expand_value(item, bindings))
                .collect::<Vec<Value>>(),
        ),
        Value::Object(object) => {
            let mut map = HashMap::new();
            for (key, item) in object.iter() {
                map.insert(expand(&key.to_string(), bindings), expand_value(item, bindings));
            }
            Value::from(map)
        }
        other => other.clone(),
    }
}

fn expand_chars(chars: &[char], bindings: &Bindings) -> String {
    let mut result = String::with_capacity(chars.len());
    let mut position = 0;

    while position < chars.len() {
        if chars[position] != '{' {
            result.push(chars[position]);
            position += 1;
            continue;
        }

        match closing_brace(chars, position) {
            Some(end) => {
                result.push_str(&resolve_token(&chars[position + 1..end], bindings));
                position = end + 1;
            }
            None => {
                result.push('{');
                position += 1;
            }
        }
    }

    result
}

fn closing_brace(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;

    for (index, c) in chars.iter().enumerate().skip(open) {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(index);
                }
            }
            _ => {}
        }
    }

    None
}

fn lookup(name: &str, bindings: &Bindings) -> Option<String> {
    if !is_variable_name(name) {
        return None;
    }

    bindings.binding(name).map(to_text)
}

/// Resolves the text between a `{` and its matching `}`.
fn resolve_token(body: &[char], bindings: &Bindings) -> String {
    for (index, c) in body.iter().enumerate() {
        match c {
            '{' => {
                // The nested expression replaces the whole token.
                return match closing_brace(body, index) {
                    Some(end) => expand_chars(&body[index..=end], bindings),
                    None => format!("{{{}}}", body.iter().collect::<String>()),
                };
            }
            '|' => {
                let name: String = body[..index].iter().collect();

                return match lookup(&name, bindings) {
                    Some(value) => value,
                    None => expand_chars(&body[index + 1..], bindings),
                };
            }
            _ => {}
        }
    }

    let name: String = body.iter().collect();

    if let Some(value) = lookup(&name, bindings) {
        return value;
    }

    if let Some(c) = code_point(&name) {
        return c.to_string();
    }

    format!("{{{}}}", name)
}
