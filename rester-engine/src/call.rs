use std::fmt::Display;
use valu3::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Start,
    ConditionCheck,
    EnvBinding,
    Preconditions,
    BodyGeneration,
    Invocation,
    Extraction,
    Assertions,
    Done,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Start => write!(f, "start"),
            Stage::ConditionCheck => write!(f, "condition"),
            Stage::EnvBinding => write!(f, "env"),
            Stage::Preconditions => write!(f, "preconditions"),
            Stage::BodyGeneration => write!(f, "body"),
            Stage::Invocation => write!(f, "invocation"),
            Stage::Extraction => write!(f, "bind"),
            Stage::Assertions => write!(f, "assert"),
            Stage::Done => write!(f, "done"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Pending,
    /// The `if` condition evaluated to false.
    Skipped,
    Cancelled,
    Passed,
    Failed,
    Error,
}

impl Display for CallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallState::Pending => write!(f, "pending"),
            CallState::Skipped => write!(f, "skipped"),
            CallState::Cancelled => write!(f, "cancelled"),
            CallState::Passed => write!(f, "passed"),
            CallState::Failed => write!(f, "failed"),
            CallState::Error => write!(f, "error"),
        }
    }
}

/// One checked scriptlet.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub stage: Stage,
    pub key: String,
    pub scriptlet: Value,
    pub message: Option<String>,
}

impl Outcome {
    pub fn new(stage: Stage, key: &str, scriptlet: &Value) -> Self {
        Self {
            stage,
            key: key.to_string(),
            scriptlet: scriptlet.clone(),
            message: None,
        }
    }

    pub fn with_message<T: Into<String>>(mut self, message: T) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}",
            self.stage,
            self.scriptlet.to_json(JsonMode::Inline)
        )?;
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub script: String,
    pub stage: Stage,
    pub state: CallState,
    pub method: Option<String>,
    pub uri: Option<String>,
    pub request_headers: Vec<(String, String)>,
    pub request_body: Vec<u8>,
    pub status: Option<u16>,
    pub response_headers: Vec<(String, String)>,
    pub response_body: Vec<u8>,
    pub passed: Vec<Outcome>,
    pub failed: Vec<Outcome>,
    pub skipped: Vec<Outcome>,
    pub error: Option<String>,
}

impl Call {
    pub fn new(script: &str) -> Self {
        Self {
            script: script.to_string(),
            stage: Stage::Start,
            state: CallState::Pending,
            method: None,
            uri: None,
            request_headers: Vec::new(),
            request_body: Vec::new(),
            status: None,
            response_headers: Vec::new(),
            response_body: Vec::new(),
            passed: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            error: None,
        }
    }

    pub fn pass(&mut self, outcome: Outcome) {
        self.passed.push(outcome);
    }

    pub fn fail(&mut self, outcome: Outcome) {
        self.failed.push(outcome);
    }

    pub fn skip(&mut self, outcome: Outcome) {
        self.skipped.push(outcome);
    }

    /// True once the call got past its condition check.
    pub fn has_run(&self) -> bool {
        matches!(
            self.state,
            CallState::Passed | CallState::Failed | CallState::Error
        )
    }

    pub fn is_failed(&self) -> bool {
        !self.failed.is_empty() || self.error.is_some()
    }

    pub fn response_header(&self, name: &str) -> Option<&str> {
        self.response_headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn response_text(&self) -> String {
        String::from_utf8_lossy(&self.response_body).to_string()
    }

    /// Response body as JSON, falling back to the raw text.
    pub fn response_value(&self) -> Value {
        let text = self.response_text();
        if text.trim().is_empty() {
            return Value::Null;
        }

        match Value::json_to_value(&text) {
            Ok(value) => value,
            Err(_) => Value::from(text),
        }
    }

    /// `{ status, headers, body }`, the response as seen by expressions.
    pub fn response_snapshot(&self) -> Value {
        let mut headers = std::collections::HashMap::new();
        for (key, value) in self.response_headers.iter() {
            headers.insert(key.to_ascii_lowercase(), Value::from(value.as_str()));
        }

        let mut response = std::collections::HashMap::new();
        response.insert(
            "status".to_string(),
            match self.status {
                Some(status) => Value::from(status as i64),
                None => Value::Null,
            },
        );
        response.insert("headers".to_string(), Value::from(headers));
        response.insert("body".to_string(), self.response_value());

        Value::from(response)
    }
}
