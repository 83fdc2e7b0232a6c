use crate::{
    call::Call,
    context::Context,
    error::ScriptError,
    plugins::{option, Extractor, PluginRegistry},
    script::Script,
    variable::to_text,
};
use valu3::prelude::*;

pub fn register(registry: &mut PluginRegistry, languages: &[String]) {
    registry.register_extractor("header", |scriptlet| {
        Ok(Box::new(HeaderExtractor {
            targets: targets(scriptlet, "header")?,
        }))
    });
    registry.register_extractor("json", |scriptlet| {
        Ok(Box::new(JsonExtractor {
            targets: targets(scriptlet, "json")?,
        }))
    });
    registry.register_extractor("body", |scriptlet| {
        Ok(Box::new(BodyExtractor::try_from_scriptlet(scriptlet)?))
    });

    for language in languages {
        let tag = language.clone();
        registry.register_extractor(language, move |scriptlet| {
            Ok(Box::new(ExpressionExtractor {
                language: tag.clone(),
                targets: targets(scriptlet, &tag)?,
            }))
        });
    }
}

/// `{ "<key>": { "<binding>": "<source>" } }` as (binding, source) pairs.
fn targets(scriptlet: &Value, key: &str) -> Result<Vec<(String, String)>, ScriptError> {
    match option(scriptlet, key)? {
        Value::Object(object) => Ok(object
            .iter()
            .map(|(binding, source)| (binding.to_string(), to_text(source)))
            .collect()),
        other => Err(ScriptError::invalid(format!(
            "{} extractor expects an object of bindings, got {}",
            key,
            other.to_json(JsonMode::Inline)
        ))),
    }
}

/// Walks `a.b.0.c` through objects and arrays. A segment past a scalar finds
/// nothing.
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;

    for segment in path.split('.').filter(|segment| !segment.is_empty()) {
        current = match current {
            Value::Array(array) => array.into_iter().nth(segment.parse::<usize>().ok()?)?,
            Value::Object(object) => object.get(segment)?,
            _ => return None,
        };
    }

    Some(current)
}

/// `{ "header": { "etag": "ETag" } }` binds `etag` to the response's ETag.
pub struct HeaderExtractor {
    targets: Vec<(String, String)>,
}

impl Extractor for HeaderExtractor {
    fn extract(&self, context: &mut Context, _: &Script, call: &Call) -> Result<(), ScriptError> {
        for (binding, header) in self.targets.iter() {
            let header = context.expand(header);
            let value = call
                .response_header(&header)
                .ok_or_else(|| ScriptError::assertion(format!("missing header {}", header)))?
                .to_string();

            context.bind(binding, Value::from(value))?;
        }

        Ok(())
    }
}

/// `{ "json": { "id": "data.items.0.id" } }`
pub struct JsonExtractor {
    targets: Vec<(String, String)>,
}

impl Extractor for JsonExtractor {
    fn extract(&self, context: &mut Context, _: &Script, call: &Call) -> Result<(), ScriptError> {
        let body = call.response_value();

        for (binding, path) in self.targets.iter() {
            let path = context.expand(path);
            let value = lookup_path(&body, &path)
                .cloned()
                .ok_or_else(|| ScriptError::assertion(format!("body has no {}", path)))?;

            context.bind(binding, value)?;
        }

        Ok(())
    }
}

/// `{ "body": "binding" }` binds the whole body, as JSON when it parses.
pub struct BodyExtractor {
    binding: String,
}

impl BodyExtractor {
    pub fn try_from_scriptlet(scriptlet: &Value) -> Result<Self, ScriptError> {
        match option(scriptlet, "body")? {
            Value::String(binding) => Ok(Self {
                binding: binding.as_string(),
            }),
            other => Err(ScriptError::invalid(format!(
                "body extractor expects a binding name, got {}",
                other.to_json(JsonMode::Inline)
            ))),
        }
    }
}

impl Extractor for BodyExtractor {
    fn extract(&self, context: &mut Context, _: &Script, call: &Call) -> Result<(), ScriptError> {
        context.bind(&self.binding, call.response_value())
    }
}

/// `{ "<language>": { "<binding>": "expression" } }`, with the response in
/// scope as `response`.
pub struct ExpressionExtractor {
    language: String,
    targets: Vec<(String, String)>,
}

impl Extractor for ExpressionExtractor {
    fn extract(&self, context: &mut Context, _: &Script, call: &Call) -> Result<(), ScriptError> {
        let response = call.response_snapshot();

        for (binding, expression) in self.targets.iter() {
            let value = context.evaluate_with(
                &self.language,
                expression,
                vec![("response".to_string(), response.clone())],
            )?;
            context.bind(binding, value)?;
        }

        Ok(())
    }
}
