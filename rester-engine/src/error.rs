use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    Assertion,
    Extractor,
    Generator,
    Auth,
}

impl Display for PluginKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PluginKind::Assertion => write!(f, "assertion"),
            PluginKind::Extractor => write!(f, "extractor"),
            PluginKind::Generator => write!(f, "body generator"),
            PluginKind::Auth => write!(f, "auth"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptError {
    InvalidScript(String),
    TemplateNotFound(String),
    TemplateCycle(String),
    ScriptNotFound(String),
    UnknownPlugin(PluginKind, String),
    ReservedName(String),
    MissingMethod(String),
    AssertionFailed(String),
    Expression(String),
    Transport(String),
    Include(String),
}

impl ScriptError {
    /// Assertion failures fail a single call; everything else aborts the batch.
    pub fn is_assertion_failure(&self) -> bool {
        matches!(self, ScriptError::AssertionFailed(_))
    }

    pub fn assertion<T: Into<String>>(message: T) -> Self {
        ScriptError::AssertionFailed(message.into())
    }

    pub fn invalid<T: Into<String>>(message: T) -> Self {
        ScriptError::InvalidScript(message.into())
    }
}

impl Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScriptError::InvalidScript(err) => write!(f, "Invalid script: {}", err),
            ScriptError::TemplateNotFound(name) => write!(f, "Template not found: {}", name),
            ScriptError::TemplateCycle(chain) => write!(f, "Template cycle: {}", chain),
            ScriptError::ScriptNotFound(name) => write!(f, "Script not found: {}", name),
            ScriptError::UnknownPlugin(kind, key) => write!(f, "Unknown {} plugin: {}", kind, key),
            ScriptError::ReservedName(name) => write!(f, "Reserved variable name: {}", name),
            ScriptError::MissingMethod(name) => {
                write!(f, "Script {} does not define an HTTP method", name)
            }
            ScriptError::AssertionFailed(err) => write!(f, "Assertion failed: {}", err),
            ScriptError::Expression(err) => write!(f, "Expression error: {}", err),
            ScriptError::Transport(err) => write!(f, "Transport error: {}", err),
            ScriptError::Include(err) => write!(f, "Include error: {}", err),
        }
    }
}

impl std::error::Error for ScriptError {}

impl From<rester_script::ScriptError> for ScriptError {
    fn from(err: rester_script::ScriptError) -> Self {
        ScriptError::Expression(err.to_string())
    }
}
