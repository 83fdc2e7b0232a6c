use super::as_pattern;
use crate::{
    call::Call,
    context::Context,
    error::ScriptError,
    plugins::{option, Assertion, PluginRegistry},
    script::Script,
    variable::to_text,
};
use regex::Regex;
use rester_script::truthy;
use valu3::prelude::*;

pub fn register(registry: &mut PluginRegistry, languages: &[String]) {
    registry.register_assertion("status", |scriptlet| {
        Ok(Box::new(StatusAssertion::try_from_scriptlet(scriptlet)?))
    });
    registry.register_assertion("header", |scriptlet| {
        Ok(Box::new(HeaderAssertion::try_from_scriptlet(scriptlet)?))
    });
    registry.register_assertion("body", |scriptlet| {
        Ok(Box::new(BodyAssertion::try_from_scriptlet(scriptlet)?))
    });

    for language in languages {
        let tag = language.clone();
        registry.register_assertion(language, move |scriptlet| {
            Ok(Box::new(ExpressionAssertion::try_from_scriptlet(
                &tag, scriptlet,
            )?))
        });
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expected {
    Codes(Vec<u16>),
    Range { min: u16, max: u16 },
}

/// `{ "status": 201 }`, `{ "status": [200, 204] }` or
/// `{ "status": { "min": 200, "max": 299 } }`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusAssertion {
    expected: Expected,
}

impl StatusAssertion {
    /// The check applied after invocation when no `status` assertion exists.
    pub fn success() -> Self {
        Self {
            expected: Expected::Range { min: 200, max: 299 },
        }
    }

    pub fn try_from_scriptlet(scriptlet: &Value) -> Result<Self, ScriptError> {
        let expected = match option(scriptlet, "status")? {
            Value::Array(array) => Expected::Codes(
                array
                    .into_iter()
                    .map(status_code)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Value::Object(range) => {
                let bound = |key: &str, default: u16| match range.get(key) {
                    Some(value) => status_code(value),
                    None => Ok(default),
                };
                Expected::Range {
                    min: bound("min", 100)?,
                    max: bound("max", 599)?,
                }
            }
            other => Expected::Codes(vec![status_code(other)?]),
        };

        Ok(Self { expected })
    }

    fn accepts(&self, status: u16) -> bool {
        match &self.expected {
            Expected::Codes(codes) => codes.contains(&status),
            Expected::Range { min, max } => *min <= status && status <= *max,
        }
    }

    fn describe(&self) -> String {
        match &self.expected {
            Expected::Codes(codes) => codes
                .iter()
                .map(|code| code.to_string())
                .collect::<Vec<_>>()
                .join(" or "),
            Expected::Range { min, max } => format!("{}..={}", min, max),
        }
    }
}

fn status_code(value: &Value) -> Result<u16, ScriptError> {
    let code = match value {
        Value::Number(_) => value.to_u64(),
        Value::String(text) => text.as_str().trim().parse::<u64>().ok(),
        _ => None,
    };

    code.filter(|code| *code <= u16::MAX as u64)
        .map(|code| code as u16)
        .ok_or_else(|| {
            ScriptError::invalid(format!(
                "status must be an HTTP status code, got {}",
                value.to_json(JsonMode::Inline)
            ))
        })
}

impl Assertion for StatusAssertion {
    fn check(&self, _: &mut Context, _: &Script, call: &Call) -> Result<(), ScriptError> {
        match call.status {
            Some(status) if self.accepts(status) => Ok(()),
            Some(status) => Err(ScriptError::assertion(format!(
                "expected status {}, got {}",
                self.describe(),
                status
            ))),
            None => Err(ScriptError::assertion("no response status")),
        }
    }
}

/// `{ "header": { "Content-Type": "application/json" } }`; an expected value
/// written as `/pattern/` is matched as a regular expression.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderAssertion {
    expected: Vec<(String, String)>,
}

impl HeaderAssertion {
    pub fn try_from_scriptlet(scriptlet: &Value) -> Result<Self, ScriptError> {
        match option(scriptlet, "header")? {
            Value::Object(headers) => Ok(Self {
                expected: headers
                    .iter()
                    .map(|(name, value)| (name.to_string(), to_text(value)))
                    .collect(),
            }),
            other => Err(ScriptError::invalid(format!(
                "header assertion expects an object, got {}",
                other.to_json(JsonMode::Inline)
            ))),
        }
    }
}

impl Assertion for HeaderAssertion {
    fn check(&self, context: &mut Context, _: &Script, call: &Call) -> Result<(), ScriptError> {
        for (name, expected) in self.expected.iter() {
            let name = context.expand(name);
            let expected = context.expand(expected);

            let actual = call
                .response_header(&name)
                .ok_or_else(|| ScriptError::assertion(format!("missing header {}", name)))?;

            let matched = match as_pattern(&expected) {
                Some(pattern) => Regex::new(pattern)
                    .map_err(|err| ScriptError::invalid(format!("header {}: {}", name, err)))?
                    .is_match(actual),
                None => actual == expected,
            };

            if !matched {
                return Err(ScriptError::assertion(format!(
                    "header {} is {:?}, expected {:?}",
                    name, actual, expected
                )));
            }
        }

        Ok(())
    }
}

/// `{ "body": { "contains": "..." } }`, `{ "body": { "matches": "regex" } }`
/// or `{ "body": { "equals": <json or text> } }`.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyAssertion {
    Contains(String),
    Matches(String),
    Equals(Value),
}

impl BodyAssertion {
    pub fn try_from_scriptlet(scriptlet: &Value) -> Result<Self, ScriptError> {
        let body = option(scriptlet, "body")?;

        if let Value::Object(check) = body {
            if let Some(text) = check.get("contains") {
                return Ok(BodyAssertion::Contains(to_text(text)));
            }
            if let Some(pattern) = check.get("matches") {
                return Ok(BodyAssertion::Matches(to_text(pattern)));
            }
            if let Some(value) = check.get("equals") {
                return Ok(BodyAssertion::Equals(value.clone()));
            }
        }

        Err(ScriptError::invalid(format!(
            "body assertion expects contains, matches or equals, got {}",
            body.to_json(JsonMode::Inline)
        )))
    }
}

impl Assertion for BodyAssertion {
    fn check(&self, context: &mut Context, _: &Script, call: &Call) -> Result<(), ScriptError> {
        let text = call.response_text();

        match self {
            BodyAssertion::Contains(expected) => {
                let expected = context.expand(expected);
                if text.contains(&expected) {
                    Ok(())
                } else {
                    Err(ScriptError::assertion(format!(
                        "body does not contain {:?}",
                        expected
                    )))
                }
            }
            BodyAssertion::Matches(pattern) => {
                let pattern = context.expand(pattern);
                let regex = Regex::new(&pattern)
                    .map_err(|err| ScriptError::invalid(format!("body pattern: {}", err)))?;
                if regex.is_match(&text) {
                    Ok(())
                } else {
                    Err(ScriptError::assertion(format!(
                        "body does not match /{}/",
                        pattern
                    )))
                }
            }
            BodyAssertion::Equals(expected) => {
                let equal = match context.expand_value(expected) {
                    Value::String(expected) => text == expected.as_string(),
                    expected => call.response_value() == expected,
                };
                if equal {
                    Ok(())
                } else {
                    Err(ScriptError::assertion(format!(
                        "body {} differs from {}",
                        text,
                        expected.to_json(JsonMode::Inline)
                    )))
                }
            }
        }
    }
}

/// `{ "<language>": "expression" }`, passing when the result is truthy.
/// The response is in scope as `response`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionAssertion {
    language: String,
    expression: String,
}

impl ExpressionAssertion {
    pub fn try_from_scriptlet(language: &str, scriptlet: &Value) -> Result<Self, ScriptError> {
        match option(scriptlet, language)? {
            Value::String(expression) => Ok(Self {
                language: language.to_string(),
                expression: expression.as_string(),
            }),
            other => Err(ScriptError::invalid(format!(
                "{} assertion expects a string, got {}",
                language,
                other.to_json(JsonMode::Inline)
            ))),
        }
    }
}

impl Assertion for ExpressionAssertion {
    fn check(&self, context: &mut Context, _: &Script, call: &Call) -> Result<(), ScriptError> {
        let value = context.evaluate_with(
            &self.language,
            &self.expression,
            vec![("response".to_string(), call.response_snapshot())],
        )?;

        if truthy(&value) {
            Ok(())
        } else {
            Err(ScriptError::assertion(format!(
                "{} is {}",
                self.expression,
                value.to_json(JsonMode::Inline)
            )))
        }
    }
}
