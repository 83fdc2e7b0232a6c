use crate::{
    call::Call,
    context::Context,
    error::ScriptError,
    plugins::{option, BodyGenerator, PluginRegistry},
    script::Script,
    variable::to_text,
};
use valu3::prelude::*;

pub fn register(registry: &mut PluginRegistry) {
    registry.register_generator("json", |body| {
        Ok(Box::new(JsonGenerator {
            template: option(body, "json")?.clone(),
        }))
    });
    registry.register_generator("text", |body| {
        Ok(Box::new(TextGenerator {
            template: to_text(option(body, "text")?),
        }))
    });
}

/// Serialized body of a `body` without generator key: strings are sent as
/// expanded text, anything else as expanded JSON.
pub fn literal(context: &Context, body: &Value) -> Vec<u8> {
    match context.expand_value(body) {
        Value::String(text) => text.as_string().into_bytes(),
        other => other.to_json(JsonMode::Inline).into_bytes(),
    }
}

/// `{ "json": <tree> }`, expanded and serialized.
pub struct JsonGenerator {
    template: Value,
}

impl BodyGenerator for JsonGenerator {
    fn generate(&self, context: &mut Context, _: &Script, _: &Call) -> Result<Vec<u8>, ScriptError> {
        Ok(context
            .expand_value(&self.template)
            .to_json(JsonMode::Inline)
            .into_bytes())
    }
}

/// `{ "text": "..." }`, expanded.
pub struct TextGenerator {
    template: String,
}

impl BodyGenerator for TextGenerator {
    fn generate(&self, context: &mut Context, _: &Script, _: &Call) -> Result<Vec<u8>, ScriptError> {
        Ok(context.expand(&self.template).into_bytes())
    }
}
