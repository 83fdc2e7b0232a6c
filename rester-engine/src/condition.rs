use crate::{context::Context, error::ScriptError, script::Script, variable::is_variable_name};
use log::debug;
use rester_script::truthy;
use valu3::prelude::*;

/// `if` of the whole template chain, oldest ancestor first. Evaluation stops
/// at the first false condition, so later side effects never happen.
///
/// A chain without any condition runs only while nothing has failed yet.
pub fn evaluate(context: &mut Context, script: &Script) -> Result<bool, ScriptError> {
    let mut found = false;

    for ancestor in script.chain() {
        let condition = match ancestor.own("if") {
            Some(condition) => condition,
            None => continue,
        };
        found = true;

        let holds = evaluate_condition(context, condition)?;
        debug!(
            "[{}] if {} -> {}",
            ancestor.name(),
            condition.to_json(JsonMode::Inline),
            holds
        );

        if !holds {
            return Ok(false);
        }
    }

    if found {
        Ok(true)
    } else {
        Ok(context.failed() == 0)
    }
}

fn evaluate_condition(context: &mut Context, condition: &Value) -> Result<bool, ScriptError> {
    match condition {
        Value::Boolean(value) => Ok(*value),
        Value::String(text) => {
            let text = text.as_string();
            let text = text.trim();

            if is_variable_name(text) {
                if let Some(value) = context.binding(text) {
                    return Ok(truthy(value));
                }
            }

            let language = context.default_language().to_string();
            let value = context.evaluate(&language, text)?;
            Ok(truthy(&value))
        }
        Value::Object(object) => {
            let mut entries: Vec<(String, &Value)> = object
                .iter()
                .map(|(key, value)| (key.to_string(), value))
                .filter(|(key, _)| context.evaluators().get(key).is_some())
                .collect();

            if entries.len() > 1 {
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                let languages: Vec<String> = entries.into_iter().map(|(key, _)| key).collect();
                return Err(ScriptError::invalid(format!(
                    "condition names more than one language: {}",
                    languages.join(", ")
                )));
            }

            match entries.pop() {
                Some((language, Value::String(expression))) => {
                    let value = context.evaluate(&language, expression.as_str())?;
                    Ok(truthy(&value))
                }
                Some((language, other)) => Err(ScriptError::invalid(format!(
                    "{} condition must be a string, got {}",
                    language,
                    other.to_json(JsonMode::Inline)
                ))),
                None => Err(ScriptError::invalid(format!(
                    "condition names no known language: {}",
                    condition.to_json(JsonMode::Inline)
                ))),
            }
        }
        other => Ok(truthy(other)),
    }
}
