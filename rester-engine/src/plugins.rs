//! Plugin registry: scriptlet keys mapped to factories.
//!
//! A scriptlet is a JSON object such as `{ "status": 201 }`. Its plugin key is
//! the one key registered for the requested kind; the remaining keys are
//! options the plugin may read. Object keys carry no order, so a scriptlet
//! naming two plugins of the same kind is rejected. The factory receives the
//! whole scriptlet and builds the instance that is then invoked once.
use crate::{
    builtin,
    call::Call,
    context::Context,
    error::{PluginKind, ScriptError},
    script::Script,
};
use std::{collections::HashMap, sync::Arc};
use valu3::prelude::*;

pub trait Assertion {
    /// Fails with [`ScriptError::AssertionFailed`].
    fn check(&self, context: &mut Context, script: &Script, call: &Call)
        -> Result<(), ScriptError>;
}

pub trait Extractor {
    fn extract(
        &self,
        context: &mut Context,
        script: &Script,
        call: &Call,
    ) -> Result<(), ScriptError>;
}

pub trait BodyGenerator {
    fn generate(
        &self,
        context: &mut Context,
        script: &Script,
        call: &Call,
    ) -> Result<Vec<u8>, ScriptError>;
}

pub trait Auth {
    /// Runs before the transport; usually adds request headers to `call`.
    fn authorize(
        &self,
        context: &mut Context,
        script: &Script,
        call: &mut Call,
    ) -> Result<(), ScriptError>;
}

pub type AssertionFactory =
    Arc<dyn Fn(&Value) -> Result<Box<dyn Assertion>, ScriptError> + Send + Sync>;
pub type ExtractorFactory =
    Arc<dyn Fn(&Value) -> Result<Box<dyn Extractor>, ScriptError> + Send + Sync>;
pub type GeneratorFactory =
    Arc<dyn Fn(&Value) -> Result<Box<dyn BodyGenerator>, ScriptError> + Send + Sync>;
pub type AuthFactory = Arc<dyn Fn(&Value) -> Result<Box<dyn Auth>, ScriptError> + Send + Sync>;

#[derive(Clone, Default)]
pub struct PluginRegistry {
    assertions: HashMap<String, AssertionFactory>,
    extractors: HashMap<String, ExtractorFactory>,
    generators: HashMap<String, GeneratorFactory>,
    auths: HashMap<String, AuthFactory>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in plugins; one expression assertion and one
    /// expression extractor per language in `languages`.
    pub fn with_builtins(languages: &[String]) -> Self {
        let mut registry = Self::new();
        builtin::register(&mut registry, languages);
        registry
    }

    pub fn register_assertion<F>(&mut self, key: &str, factory: F)
    where
        F: Fn(&Value) -> Result<Box<dyn Assertion>, ScriptError> + Send + Sync + 'static,
    {
        self.assertions.insert(key.to_string(), Arc::new(factory));
    }

    pub fn register_extractor<F>(&mut self, key: &str, factory: F)
    where
        F: Fn(&Value) -> Result<Box<dyn Extractor>, ScriptError> + Send + Sync + 'static,
    {
        self.extractors.insert(key.to_string(), Arc::new(factory));
    }

    pub fn register_generator<F>(&mut self, key: &str, factory: F)
    where
        F: Fn(&Value) -> Result<Box<dyn BodyGenerator>, ScriptError> + Send + Sync + 'static,
    {
        self.generators.insert(key.to_string(), Arc::new(factory));
    }

    pub fn register_auth<F>(&mut self, key: &str, factory: F)
    where
        F: Fn(&Value) -> Result<Box<dyn Auth>, ScriptError> + Send + Sync + 'static,
    {
        self.auths.insert(key.to_string(), Arc::new(factory));
    }

    pub fn contains(&self, kind: PluginKind, key: &str) -> bool {
        match kind {
            PluginKind::Assertion => self.assertions.contains_key(key),
            PluginKind::Extractor => self.extractors.contains_key(key),
            PluginKind::Generator => self.generators.contains_key(key),
            PluginKind::Auth => self.auths.contains_key(key),
        }
    }

    fn registered_keys(&self, kind: PluginKind, scriptlet: &Value) -> Vec<String> {
        let mut keys: Vec<String> = match scriptlet {
            Value::Object(object) => object
                .iter()
                .map(|(key, _)| key.to_string())
                .filter(|key| self.contains(kind, key))
                .collect(),
            _ => Vec::new(),
        };
        keys.sort();
        keys
    }

    /// Plugin key of `scriptlet` for `kind` when exactly one of its keys is
    /// registered.
    pub fn find_key(&self, kind: PluginKind, scriptlet: &Value) -> Option<String> {
        let mut keys = self.registered_keys(kind, scriptlet);
        if keys.len() == 1 {
            keys.pop()
        } else {
            None
        }
    }

    pub fn resolve_key(&self, kind: PluginKind, scriptlet: &Value) -> Result<String, ScriptError> {
        let keys = self.registered_keys(kind, scriptlet);

        match keys.len() {
            1 => Ok(keys[0].clone()),
            0 => {
                let key = match scriptlet {
                    Value::Object(object) => {
                        let mut keys: Vec<String> =
                            object.iter().map(|(key, _)| key.to_string()).collect();
                        keys.sort();
                        keys.join(", ")
                    }
                    other => other.to_json(JsonMode::Inline),
                };
                Err(ScriptError::UnknownPlugin(kind, key))
            }
            _ => Err(ScriptError::invalid(format!(
                "scriptlet names more than one {} plugin: {}",
                kind,
                keys.join(", ")
            ))),
        }
    }

    pub fn assertion(
        &self,
        scriptlet: &Value,
    ) -> Result<(String, Box<dyn Assertion>), ScriptError> {
        let key = self.resolve_key(PluginKind::Assertion, scriptlet)?;
        let factory = &self.assertions[&key];
        Ok((key, factory(scriptlet)?))
    }

    pub fn extractor(
        &self,
        scriptlet: &Value,
    ) -> Result<(String, Box<dyn Extractor>), ScriptError> {
        let key = self.resolve_key(PluginKind::Extractor, scriptlet)?;
        let factory = &self.extractors[&key];
        Ok((key, factory(scriptlet)?))
    }

    /// A generator only when `body` is an object with a single key naming
    /// one; every other body is sent literally.
    pub fn generator(
        &self,
        body: &Value,
    ) -> Result<Option<(String, Box<dyn BodyGenerator>)>, ScriptError> {
        let key = match body {
            Value::Object(object) if object.len() == 1 => object
                .iter()
                .map(|(key, _)| key.to_string())
                .find(|key| self.generators.contains_key(key)),
            _ => None,
        };

        match key {
            Some(key) => {
                let factory = &self.generators[&key];
                Ok(Some((key, factory(body)?)))
            }
            None => Ok(None),
        }
    }

    pub fn auth(&self, scriptlet: &Value) -> Result<(String, Box<dyn Auth>), ScriptError> {
        let key = self.resolve_key(PluginKind::Auth, scriptlet)?;
        let factory = &self.auths[&key];
        Ok((key, factory(scriptlet)?))
    }
}

fn sorted_keys<T>(map: &HashMap<String, T>) -> Vec<String> {
    let mut keys: Vec<String> = map.keys().cloned().collect();
    keys.sort();
    keys
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("assertions", &sorted_keys(&self.assertions))
            .field("extractors", &sorted_keys(&self.extractors))
            .field("generators", &sorted_keys(&self.generators))
            .field("auths", &sorted_keys(&self.auths))
            .finish()
    }
}

/// `value[key]` for objects, `None` for every other shape.
pub fn entry<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(object) => object.get(key),
        _ => None,
    }
}

/// Reads the value stored under a scriptlet's plugin key.
pub fn option<'a>(scriptlet: &'a Value, key: &str) -> Result<&'a Value, ScriptError> {
    entry(scriptlet, key)
        .ok_or_else(|| ScriptError::invalid(format!("scriptlet has no {} entry", key)))
}
