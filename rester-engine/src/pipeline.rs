//! The staged execution of one call.
//!
//! ```text
//! START -> CONDITION_CHECK -> ENV_BINDING -> PRECONDITIONS -> BODY_GENERATION
//!       -> INVOCATION -> EXTRACTION -> ASSERTIONS -> DONE
//! ```
//!
//! Cancellation is checked before every stage. A failing scriptlet is recorded
//! on the call, the rest of its stage is skipped and the stage returns
//! [`ScriptError::AssertionFailed`].
use crate::{
    builtin::{assertions::StatusAssertion, generators},
    call::{Call, CallState, Outcome, Stage},
    condition,
    context::Context,
    error::{PluginKind, ScriptError},
    plugins::{entry, Assertion},
    script::{entries, Script},
    transport::Request,
};
use log::debug;
use std::collections::HashMap;
use valu3::prelude::*;

const STAGES: [Stage; 8] = [
    Stage::ConditionCheck,
    Stage::EnvBinding,
    Stage::Preconditions,
    Stage::BodyGeneration,
    Stage::Invocation,
    Stage::Extraction,
    Stage::Assertions,
    Stage::Done,
];

pub fn execute(context: &mut Context, script: &Script, call: &mut Call) -> Result<(), ScriptError> {
    let span = tracing::info_span!(
        "call",
        script = %script.name(),
        method = script.method().unwrap_or_default(),
    );
    let _guard = span.enter();

    call.stage = Stage::Start;

    for stage in STAGES {
        if context.is_cancelled() {
            debug!("[{}] cancelled before {}", script.name(), stage);
            call.state = CallState::Cancelled;
            return Ok(());
        }

        call.stage = stage;
        tracing::debug!(stage = %stage, "entering stage");

        match stage {
            Stage::ConditionCheck => {
                if !condition::evaluate(context, script)? {
                    debug!("[{}] condition is false, skipping", script.name());
                    call.state = CallState::Skipped;
                    return Ok(());
                }
            }
            Stage::EnvBinding => bind_env(context, script)?,
            Stage::Preconditions | Stage::Extraction => {
                if let Err(err) = run_stage(context, script, call, stage) {
                    if err.is_assertion_failure() {
                        skip_stage(context, script, call, Stage::Assertions)?;
                    }
                    return Err(err);
                }
            }
            Stage::BodyGeneration => generate_body(context, script, call)?,
            Stage::Invocation => invoke(context, script, call)?,
            Stage::Assertions => run_stage(context, script, call, stage)?,
            Stage::Done => {
                call.state = if call.is_failed() {
                    CallState::Failed
                } else {
                    CallState::Passed
                };
            }
            Stage::Start => {}
        }
    }

    Ok(())
}

fn field(stage: Stage) -> &'static str {
    match stage {
        Stage::Preconditions => "preconditions",
        Stage::Extraction => "bind",
        _ => "assert",
    }
}

fn kind(stage: Stage) -> PluginKind {
    match stage {
        Stage::Extraction => PluginKind::Extractor,
        _ => PluginKind::Assertion,
    }
}

/// Bare strings are expressions in the default language.
fn normalize(scriptlet: &Value, language: &str) -> Value {
    match scriptlet {
        Value::String(_) => {
            let mut object = HashMap::new();
            object.insert(language.to_string(), scriptlet.clone());
            Value::from(object)
        }
        other => other.clone(),
    }
}

fn bind_env(context: &mut Context, script: &Script) -> Result<(), ScriptError> {
    context.bind("name", Value::from(script.name()))?;

    for ancestor in script.chain() {
        let env = match ancestor.own("env") {
            Some(env) => entries(env).ok_or_else(|| {
                ScriptError::invalid(format!(
                    "env of {} must be an object or a list of objects, got {}",
                    ancestor.name(),
                    env.to_json(JsonMode::Inline)
                ))
            })?,
            None => continue,
        };

        for (key, value) in env.iter() {
            let value = context.expand_value(value);
            context.bind(key, value)?;
        }
    }

    Ok(())
}

fn run_stage(
    context: &mut Context,
    script: &Script,
    call: &mut Call,
    stage: Stage,
) -> Result<(), ScriptError> {
    let scriptlets = script.chain_scriptlets(field(stage))?;
    let language = context.default_language().to_string();

    for (index, scriptlet) in scriptlets.iter().enumerate() {
        let scriptlet = normalize(scriptlet, &language);

        let (key, result) = match kind(stage) {
            PluginKind::Extractor => {
                let (key, extractor) = context.plugins().extractor(&scriptlet)?;
                (key, extractor.extract(context, script, call))
            }
            _ => {
                let (key, assertion) = context.plugins().assertion(&scriptlet)?;
                (key, assertion.check(context, script, call))
            }
        };

        match result {
            Ok(()) => call.pass(Outcome::new(stage, &key, &scriptlet)),
            Err(err) if err.is_assertion_failure() => {
                debug!("[{}] {} failed: {}", script.name(), stage, err);
                call.fail(Outcome::new(stage, &key, &scriptlet).with_message(err.to_string()));
                skip(context, call, stage, &scriptlets[index + 1..]);
                return Err(err);
            }
            Err(err) => return Err(err),
        }
    }

    Ok(())
}

fn skip(context: &Context, call: &mut Call, stage: Stage, scriptlets: &[Value]) {
    let language = context.default_language();

    for scriptlet in scriptlets {
        let scriptlet = normalize(scriptlet, language);
        let key = context
            .plugins()
            .find_key(kind(stage), &scriptlet)
            .unwrap_or_default();
        call.skip(Outcome::new(stage, &key, &scriptlet));
    }
}

fn skip_stage(
    context: &Context,
    script: &Script,
    call: &mut Call,
    stage: Stage,
) -> Result<(), ScriptError> {
    let scriptlets = script.chain_scriptlets(field(stage))?;
    skip(context, call, stage, &scriptlets);
    Ok(())
}

fn generate_body(context: &mut Context, script: &Script, call: &mut Call) -> Result<(), ScriptError> {
    let body = match script.inherited("body") {
        Some(Value::Null) | None => return Ok(()),
        Some(body) => body,
    };

    let generator = context.plugins().generator(body)?;
    call.request_body = match generator {
        Some((key, generator)) => {
            debug!("[{}] body generated by {}", script.name(), key);
            generator.generate(context, script, call)?
        }
        None => generators::literal(context, body),
    };

    Ok(())
}

fn invoke(context: &mut Context, script: &Script, call: &mut Call) -> Result<(), ScriptError> {
    let method = script
        .method()
        .ok_or_else(|| ScriptError::MissingMethod(script.name().to_string()))?;
    let uri = context.expand(script.uri().unwrap_or_default());

    call.method = Some(method.to_string());
    call.uri = Some(uri.clone());
    call.request_headers = script
        .headers()
        .iter()
        .map(|(key, value)| (context.expand(key), context.expand(value)))
        .collect();

    if let Some(auth) = script.inherited("auth") {
        let (key, plugin) = context.plugins().auth(auth)?;

        if let Err(err) = plugin.authorize(context, script, call) {
            if err.is_assertion_failure() {
                call.fail(Outcome::new(Stage::Invocation, &key, auth).with_message(err.to_string()));
                skip_stage(context, script, call, Stage::Extraction)?;
                skip_stage(context, script, call, Stage::Assertions)?;
            }
            return Err(err);
        }
    }

    let request = Request {
        method: method.to_string(),
        uri,
        headers: call.request_headers.clone(),
        body: call.request_body.clone(),
    };

    debug!("[{}] {} {}", script.name(), request.method, request.uri);

    let response = context
        .transport()
        .invoke(&request)
        .map_err(|err| ScriptError::Transport(err.to_string()))?;

    call.status = Some(response.status);
    call.response_headers = response.headers;
    call.response_body = response.body;
    context.bind("status", Value::from(response.status as i64))?;

    if has_status_assertion(script)? {
        return Ok(());
    }

    let scriptlet = Value::from({
        let mut range = HashMap::new();
        range.insert("min".to_string(), Value::from(200i64));
        range.insert("max".to_string(), Value::from(299i64));
        let mut status = HashMap::new();
        status.insert("status".to_string(), Value::from(range));
        status
    });

    match StatusAssertion::success().check(context, script, call) {
        Ok(()) => {
            call.pass(Outcome::new(Stage::Invocation, "status", &scriptlet));
            Ok(())
        }
        Err(err) => {
            call.fail(Outcome::new(Stage::Invocation, "status", &scriptlet).with_message(err.to_string()));
            skip_stage(context, script, call, Stage::Extraction)?;
            skip_stage(context, script, call, Stage::Assertions)?;
            Err(err)
        }
    }
}

fn has_status_assertion(script: &Script) -> Result<bool, ScriptError> {
    Ok(script
        .chain_scriptlets("assert")?
        .iter()
        .any(|scriptlet| entry(scriptlet, "status").is_some()))
}
