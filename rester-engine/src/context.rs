use crate::{
    bindings::Bindings,
    call::{Call, CallState},
    error::ScriptError,
    pipeline,
    plugins::PluginRegistry,
    script::{Script, Templates},
    transport::Transport,
    variable,
};
use log::{debug, info};
use rester_script::Evaluators;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use valu3::prelude::*;

/// Batch strings starting with this prefix are replaced by the documents
/// they reference.
pub const INCLUDE_PREFIX: &str = "include:";

const MAX_INCLUDES: usize = 256;

/// Reads the documents behind an `include:` reference.
pub trait DocumentSource {
    fn load(&self, reference: &str) -> Result<Vec<Value>, ScriptError>;
}

/// Everything a run shares: bindings, named scripts and templates, call
/// history and the cancellation flag.
///
/// Calls driven against the same context see each other's bindings. Use
/// [`Context::child`] for a sub-flow that must not leak into its parent.
pub struct Context {
    bindings: Bindings,
    scripts: HashMap<String, Arc<Script>>,
    templates: Templates,
    calls: Vec<Call>,
    failed: usize,
    cancelled: Arc<AtomicBool>,
    plugins: Arc<PluginRegistry>,
    evaluators: Arc<Evaluators>,
    transport: Arc<dyn Transport>,
    documents: Option<Arc<dyn DocumentSource>>,
}

impl Context {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let evaluators = Evaluators::default();
        let plugins = PluginRegistry::with_builtins(&evaluators.languages());

        Self {
            bindings: Bindings::new(),
            scripts: HashMap::new(),
            templates: Templates::new(),
            calls: Vec::new(),
            failed: 0,
            cancelled: Arc::new(AtomicBool::new(false)),
            plugins: Arc::new(plugins),
            evaluators: Arc::new(evaluators),
            transport,
            documents: None,
        }
    }

    pub fn with_plugins(mut self, plugins: PluginRegistry) -> Self {
        self.plugins = Arc::new(plugins);
        self
    }

    pub fn with_evaluators(mut self, evaluators: Evaluators) -> Self {
        self.evaluators = Arc::new(evaluators);
        self
    }

    pub fn with_documents(mut self, documents: Arc<dyn DocumentSource>) -> Self {
        self.documents = Some(documents);
        self
    }

    /// A context seeded with a copy of the current bindings and registries.
    /// Its calls and later bindings stay local; cancellation is shared.
    pub fn child(&self) -> Context {
        Context {
            bindings: self.bindings.clone(),
            scripts: self.scripts.clone(),
            templates: self.templates.clone(),
            calls: Vec::new(),
            failed: 0,
            cancelled: self.cancelled.clone(),
            plugins: self.plugins.clone(),
            evaluators: self.evaluators.clone(),
            transport: self.transport.clone(),
            documents: self.documents.clone(),
        }
    }

    pub fn expand(&self, text: &str) -> String {
        variable::expand(text, &self.bindings)
    }

    pub fn expand_value(&self, value: &Value) -> Value {
        variable::expand_value(value, &self.bindings)
    }

    pub fn bind(&mut self, name: &str, value: Value) -> Result<(), ScriptError> {
        debug!("bind {} = {}", name, value.to_json(JsonMode::Inline));
        self.bindings.bind(name, value)?;
        Ok(())
    }

    pub fn unbind(&mut self, name: &str) -> Option<Value> {
        self.bindings.unbind(name)
    }

    pub fn binding(&self, name: &str) -> Option<&Value> {
        self.bindings.binding(name)
    }

    pub fn bound(&self, name: &str) -> bool {
        self.bindings.bound(name)
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn plugins(&self) -> &Arc<PluginRegistry> {
        &self.plugins
    }

    pub fn evaluators(&self) -> &Arc<Evaluators> {
        &self.evaluators
    }

    pub fn default_language(&self) -> &str {
        self.evaluators.default_language()
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn cancel(&self) {
        info!("Run cancelled");
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Shared flag, for cancelling from outside the run.
    pub fn cancellation(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// Number of calls that recorded a failed assertion or an error.
    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn script(&self, name: &str) -> Option<&Arc<Script>> {
        self.scripts.get(name)
    }

    pub fn template(&self, name: &str) -> Option<&Arc<Script>> {
        self.templates.get(name)
    }

    /// Evaluates `expression` against a snapshot of the bindings; variables
    /// the expression declares are bound afterwards.
    pub fn evaluate(&mut self, language: &str, expression: &str) -> Result<Value, ScriptError> {
        self.evaluate_with(language, expression, Vec::new())
    }

    /// Like [`Context::evaluate`], with extra read-only names in scope.
    pub fn evaluate_with(
        &mut self,
        language: &str,
        expression: &str,
        extra: Vec<(String, Value)>,
    ) -> Result<Value, ScriptError> {
        let mut snapshot = self.bindings.snapshot();
        for (name, value) in extra {
            snapshot.insert(name, value);
        }

        let evaluation = self.evaluators.evaluate(language, expression, &snapshot)?;

        for (name, value) in evaluation.bindings {
            self.bind(&name, value)?;
        }

        Ok(evaluation.value)
    }

    /// Builds a script from `value` and registers it by name, as a template
    /// when its name carries the template suffix.
    pub fn ingest(&mut self, value: &Value) -> Result<Arc<Script>, ScriptError> {
        let script = Arc::new(Script::try_build(value, &self.templates, &self.bindings)?);

        if script.is_runnable() {
            self.scripts
                .insert(script.name().to_string(), script.clone());
        } else {
            self.templates
                .insert(script.name().to_string(), script.clone());
        }

        debug!("Script {} registered", script.name());
        Ok(script)
    }

    /// Runs one script. Assertion failures are recorded on its call and
    /// counted; any other error is returned after the call is recorded.
    pub fn run_script(&mut self, script: Arc<Script>) -> Result<(), ScriptError> {
        if !script.is_runnable() || self.is_cancelled() {
            return Ok(());
        }

        let mut call = Call::new(script.name());
        let result = pipeline::execute(self, &script, &mut call);

        let result = match result {
            Ok(()) => Ok(()),
            Err(err) if err.is_assertion_failure() => {
                call.state = CallState::Failed;
                Ok(())
            }
            Err(err) => {
                call.error = Some(err.to_string());
                call.state = CallState::Error;
                Err(err)
            }
        };

        if call.is_failed() {
            self.failed += 1;
        }

        info!(
            "{} {}: {} passed, {} failed, {} skipped",
            call.script,
            call.state,
            call.passed.len(),
            call.failed.len(),
            call.skipped.len()
        );

        self.calls.push(call);
        result
    }

    pub fn run_named(&mut self, name: &str) -> Result<(), ScriptError> {
        let script = self
            .scripts
            .get(name)
            .cloned()
            .ok_or_else(|| ScriptError::ScriptNotFound(name.to_string()))?;

        self.run_script(script)
    }

    /// Runs a document: an array is a batch, anything else a batch of one.
    pub fn run_document(&mut self, document: &Value) -> Result<(), ScriptError> {
        match document {
            Value::Array(array) => self.run_batch(array.into_iter().cloned().collect()),
            other => self.run_batch(vec![other.clone()]),
        }
    }

    pub fn run_batch(&mut self, documents: Vec<Value>) -> Result<(), ScriptError> {
        let mut documents = documents;
        let mut includes = 0;
        let mut index = 0;

        while index < documents.len() {
            if self.is_cancelled() {
                info!(
                    "Batch cancelled, {} element(s) not run",
                    documents.len() - index
                );
                break;
            }

            match &documents[index] {
                Value::String(reference) => {
                    let reference = reference.as_string();

                    if let Some(target) = reference.strip_prefix(INCLUDE_PREFIX) {
                        includes += 1;
                        if includes > MAX_INCLUDES {
                            return Err(ScriptError::Include(format!(
                                "more than {} includes in one batch",
                                MAX_INCLUDES
                            )));
                        }

                        let included = self.load_documents(&self.expand(target.trim()))?;
                        documents.splice(index..=index, included);
                        continue;
                    }

                    self.run_named(&reference)?;
                }
                Value::Object(_) => {
                    let script = self.ingest(&documents[index])?;
                    self.run_script(script)?;
                }
                other => {
                    return Err(ScriptError::invalid(format!(
                        "batch element must be an object or a string, got {}",
                        other.to_json(JsonMode::Inline)
                    )))
                }
            }

            index += 1;
        }

        Ok(())
    }

    fn load_documents(&self, reference: &str) -> Result<Vec<Value>, ScriptError> {
        debug!("Including {}", reference);

        match &self.documents {
            Some(documents) => documents.load(reference),
            None => Err(ScriptError::Include(format!(
                "no document source to include {}",
                reference
            ))),
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("bindings", &self.bindings)
            .field("scripts", &self.scripts.keys().collect::<Vec<_>>())
            .field("templates", &self.templates.keys().collect::<Vec<_>>())
            .field("calls", &self.calls.len())
            .field("failed", &self.failed)
            .field("cancelled", &self.is_cancelled())
            .field("plugins", &self.plugins)
            .field("evaluators", &self.evaluators)
            .finish()
    }
}
