use crate::{
    bindings::Bindings,
    error::ScriptError,
    transport::METHODS,
    variable::{expand, to_text},
};
use chrono::Utc;
use log::warn;
use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use valu3::prelude::*;

/// Names ending with this suffix declare templates.
pub const TEMPLATE_SUFFIX: &str = ".template";

static GENERATED: AtomicUsize = AtomicUsize::new(0);

pub type Templates = HashMap<String, Arc<Script>>;

#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    name: String,
    root: Value,
    template: Option<Arc<Script>>,
    method: Option<String>,
    uri: Option<String>,
    headers: Vec<(String, String)>,
    runnable: bool,
}

impl Script {
    /// Builds a script, resolving its template chain against `templates`.
    /// The `template` reference is expanded with `bindings` before lookup.
    pub fn try_build(
        value: &Value,
        templates: &Templates,
        bindings: &Bindings,
    ) -> Result<Self, ScriptError> {
        if !value.is_object() {
            return Err(ScriptError::invalid(format!(
                "script must be an object, got {}",
                value.to_json(JsonMode::Inline)
            )));
        }

        let name = match value.get("name") {
            Some(Value::String(name)) => name.as_string(),
            Some(other) => {
                return Err(ScriptError::invalid(format!(
                    "name must be a string, got {}",
                    other.to_json(JsonMode::Inline)
                )))
            }
            None => Self::generated_name(),
        };

        let template = match value.get("template") {
            Some(Value::String(reference)) => {
                let key = Self::template_key(&expand(reference.as_str(), bindings));
                let template = templates
                    .get(&key)
                    .cloned()
                    .ok_or_else(|| ScriptError::TemplateNotFound(key.clone()))?;

                Self::check_cycle(&name, &template)?;
                Some(template)
            }
            Some(other) => {
                return Err(ScriptError::invalid(format!(
                    "template of {} must be a string, got {}",
                    name,
                    other.to_json(JsonMode::Inline)
                )))
            }
            None => None,
        };

        let (method, uri) = match Self::own_request(&name, value)? {
            Some((method, uri)) => {
                if let Some(inherited) = template.as_ref().and_then(|t| t.method.as_ref()) {
                    warn!(
                        "Script {} overrides inherited {} with {}",
                        name, inherited, method
                    );
                }
                (Some(method), Some(uri))
            }
            None => match &template {
                Some(template) => (template.method.clone(), template.uri.clone()),
                None => (None, None),
            },
        };

        let mut headers = match &template {
            Some(template) => template.headers.clone(),
            None => Vec::new(),
        };
        headers.extend(Self::own_headers(&name, value)?);

        let runnable = !Self::is_template_name(&name);

        Ok(Self {
            name,
            root: value.clone(),
            template,
            method,
            uri,
            headers,
            runnable,
        })
    }

    pub fn is_template_name(name: &str) -> bool {
        name.ends_with(TEMPLATE_SUFFIX)
    }

    /// `base` and `base.template` both refer to the template `base.template`.
    pub fn template_key(reference: &str) -> String {
        if Self::is_template_name(reference) {
            reference.to_string()
        } else {
            format!("{}{}", reference, TEMPLATE_SUFFIX)
        }
    }

    fn generated_name() -> String {
        let sequence = GENERATED.fetch_add(1, Ordering::Relaxed);
        format!(
            "script-{}-{}",
            Utc::now().format("%Y%m%dT%H%M%S%.3f"),
            sequence
        )
    }

    fn check_cycle(name: &str, template: &Arc<Script>) -> Result<(), ScriptError> {
        let mut visited = HashSet::new();
        let mut path = vec![name.to_string()];
        visited.insert(name.to_string());

        let mut current = Some(template);
        while let Some(script) = current {
            path.push(script.name.clone());
            if !visited.insert(script.name.clone()) {
                return Err(ScriptError::TemplateCycle(path.join(" -> ")));
            }
            current = script.template.as_ref();
        }

        Ok(())
    }

    fn own_request(name: &str, value: &Value) -> Result<Option<(String, String)>, ScriptError> {
        let mut found: Option<(String, String)> = None;

        for method in METHODS {
            let uri = match value.get(method) {
                Some(Value::String(uri)) => uri.as_string(),
                Some(other) => {
                    return Err(ScriptError::invalid(format!(
                        "{} of {} must be a string, got {}",
                        method,
                        name,
                        other.to_json(JsonMode::Inline)
                    )))
                }
                None => continue,
            };

            match &found {
                Some((first, _)) => warn!(
                    "Script {} already uses {}, ignoring {} {}",
                    name, first, method, uri
                ),
                None => found = Some((method.to_string(), uri)),
            }
        }

        Ok(found)
    }

    fn own_headers(name: &str, value: &Value) -> Result<Vec<(String, String)>, ScriptError> {
        match value.get("headers") {
            Some(headers) => Ok(entries(headers)
                .ok_or_else(|| {
                    ScriptError::invalid(format!(
                        "headers of {} must be an object or a list of objects, got {}",
                        name,
                        headers.to_json(JsonMode::Inline)
                    ))
                })?
                .into_iter()
                .map(|(key, value)| (key, to_text(&value)))
                .collect()),
            None => Ok(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn template(&self) -> Option<&Arc<Script>> {
        self.template.as_ref()
    }

    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    /// Header list, oldest ancestor first, duplicates kept.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn is_runnable(&self) -> bool {
        self.runnable
    }

    pub fn own(&self, key: &str) -> Option<&Value> {
        self.root.get(key)
    }

    /// Ancestors first, this script last.
    pub fn chain(&self) -> Vec<&Script> {
        let mut chain = match &self.template {
            Some(template) => template.chain(),
            None => Vec::new(),
        };
        chain.push(self);
        chain
    }

    /// Nearest definition of `key`, looking at this script before its ancestors.
    pub fn inherited(&self, key: &str) -> Option<&Value> {
        match self.own(key) {
            Some(value) => Some(value),
            None => self.template.as_ref().and_then(|t| t.inherited(key)),
        }
    }

    /// Own entries of a stage field: arrays as-is, a single object or string
    /// as a one-element list.
    pub fn scriptlets(&self, key: &str) -> Result<Vec<Value>, ScriptError> {
        match self.own(key) {
            Some(Value::Array(array)) => Ok(array.into_iter().cloned().collect()),
            Some(value @ Value::Object(_)) | Some(value @ Value::String(_)) => {
                Ok(vec![value.clone()])
            }
            Some(other) => Err(ScriptError::invalid(format!(
                "{} of {} must be an array, object or string, got {}",
                key,
                self.name,
                other.to_json(JsonMode::Inline)
            ))),
            None => Ok(Vec::new()),
        }
    }

    /// Stage entries of the whole chain, oldest ancestor first.
    pub fn chain_scriptlets(&self, key: &str) -> Result<Vec<Value>, ScriptError> {
        let mut scriptlets = Vec::new();
        for script in self.chain() {
            scriptlets.extend(script.scriptlets(key)?);
        }
        Ok(scriptlets)
    }
}

/// Name/value pairs of a `headers` or `env` field. A list of objects keeps
/// its order; the keys of a single object come sorted, since objects carry no
/// order of their own.
pub fn entries(value: &Value) -> Option<Vec<(String, Value)>> {
    fn sorted(object: &Object) -> Vec<(String, Value)> {
        let mut pairs: Vec<(String, Value)> = object
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        pairs
    }

    match value {
        Value::Object(object) => Some(sorted(object)),
        Value::Array(array) => {
            let mut pairs = Vec::new();
            for item in array.into_iter() {
                match item {
                    Value::Object(object) => pairs.extend(sorted(object)),
                    _ => return None,
                }
            }
            Some(pairs)
        }
        _ => None,
    }
}
