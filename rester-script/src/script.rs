use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use rhai::{
    serde::{from_dynamic, to_dynamic},
    Engine, EvalAltResult, ParseError, Scope,
};
use std::{collections::HashMap, fmt::Display, sync::Arc};
use valu3::prelude::*;

/// Immutable view over the bindings handed to an evaluator.
pub type Context = IndexMap<String, Value>;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

static NULL_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bnull\b").expect("valid null regex"));

#[derive(Debug)]
pub enum ScriptError {
    EvalError(Box<EvalAltResult>),
    InvalidType(Value),
    CompileError(String, ParseError),
    UnknownLanguage(String),
}

impl Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScriptError::EvalError(err) => write!(f, "Eval error: {}", err),
            ScriptError::InvalidType(value) => write!(f, "Invalid type: {}", value),
            ScriptError::CompileError(code, err) => write!(f, "Compile error: {}: {}", code, err),
            ScriptError::UnknownLanguage(language) => {
                write!(f, "Unknown expression language: {}", language)
            }
        }
    }
}

impl std::error::Error for ScriptError {}

/// Result of one expression evaluation.
///
/// `bindings` holds the variables the expression declared at its top level,
/// in declaration order. The evaluator never writes them anywhere; callers
/// decide whether they become bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub value: Value,
    pub bindings: Vec<(String, Value)>,
}

impl Evaluation {
    pub fn is_truthy(&self) -> bool {
        truthy(&self.value)
    }
}

pub trait ExpressionEvaluator: Send + Sync {
    /// Language tag used as a scriptlet key, e.g. `rhai`.
    fn language(&self) -> &str;

    fn evaluate(&self, expression: &str, context: &Context) -> Result<Evaluation, ScriptError>;
}

#[derive(Clone)]
pub struct Evaluators {
    evaluators: HashMap<String, Arc<dyn ExpressionEvaluator>>,
    default_language: String,
}

impl Evaluators {
    pub fn new(default: Arc<dyn ExpressionEvaluator>) -> Self {
        let default_language = default.language().to_string();
        let mut evaluators = HashMap::new();
        evaluators.insert(default_language.clone(), default);

        Self {
            evaluators,
            default_language,
        }
    }

    pub fn register(&mut self, evaluator: Arc<dyn ExpressionEvaluator>) {
        self.evaluators
            .insert(evaluator.language().to_string(), evaluator);
    }

    pub fn set_default_language(&mut self, language: &str) -> Result<(), ScriptError> {
        if !self.evaluators.contains_key(language) {
            return Err(ScriptError::UnknownLanguage(language.to_string()));
        }
        self.default_language = language.to_string();
        Ok(())
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    pub fn get(&self, language: &str) -> Option<&Arc<dyn ExpressionEvaluator>> {
        self.evaluators.get(language)
    }

    pub fn languages(&self) -> Vec<String> {
        let mut languages: Vec<String> = self.evaluators.keys().cloned().collect();
        languages.sort();
        languages
    }

    pub fn evaluate(
        &self,
        language: &str,
        expression: &str,
        context: &Context,
    ) -> Result<Evaluation, ScriptError> {
        match self.evaluators.get(language) {
            Some(evaluator) => evaluator.evaluate(expression, context),
            None => Err(ScriptError::UnknownLanguage(language.to_string())),
        }
    }
}

impl Default for Evaluators {
    fn default() -> Self {
        Self::new(Arc::new(RhaiEvaluator::default()))
    }
}

impl std::fmt::Debug for Evaluators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluators")
            .field("languages", &self.languages())
            .field("default_language", &self.default_language)
            .finish()
    }
}

pub struct RhaiEvaluator {
    engine: Arc<Engine>,
}

impl RhaiEvaluator {
    pub const LANGUAGE: &'static str = "rhai";

    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    /// Strips an optional `{{ … }}` wrapper and maps `null` onto rhai's unit.
    pub fn to_code_string(code: &str) -> String {
        let code = code.trim();
        let code = if code.starts_with("{{") && code.ends_with("}}") && code.len() >= 4 {
            &code[2..code.len() - 2]
        } else {
            code
        };

        replace_nulls(code)
    }
}

/// `null` outside string and character literals becomes `()`.
fn replace_nulls(code: &str) -> String {
    let mut out = String::with_capacity(code.len());
    let mut start = 0;
    let mut chars = code.char_indices();

    while let Some((index, quote)) = chars.next() {
        if quote != '"' && quote != '`' && quote != '\'' {
            continue;
        }

        out.push_str(&NULL_KEYWORD.replace_all(&code[start..index], "()"));

        let mut end = code.len();
        let mut escaped = false;
        for (position, c) in chars.by_ref() {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == quote {
                end = position + c.len_utf8();
                break;
            }
        }

        out.push_str(&code[index..end]);
        start = end;
    }

    out.push_str(&NULL_KEYWORD.replace_all(&code[start..], "()"));
    out
}

impl Default for RhaiEvaluator {
    fn default() -> Self {
        Self::new(crate::build_engine())
    }
}

impl ExpressionEvaluator for RhaiEvaluator {
    fn language(&self) -> &str {
        Self::LANGUAGE
    }

    fn evaluate(&self, expression: &str, context: &Context) -> Result<Evaluation, ScriptError> {
        let code = Self::to_code_string(expression);
        let ast = self
            .engine
            .compile(&code)
            .map_err(|err| ScriptError::CompileError(code.clone(), err))?;

        let mut scope = Scope::new();

        for (key, value) in context.iter() {
            if !IDENTIFIER.is_match(key) {
                continue;
            }
            let value = to_dynamic(value).map_err(ScriptError::EvalError)?;
            scope.push_constant(key.as_str(), value);
        }

        let declared_from = scope.len();

        let result = self
            .engine
            .eval_ast_with_scope::<rhai::Dynamic>(&mut scope, &ast)
            .map_err(ScriptError::EvalError)?;

        let value: Value = from_dynamic(&result).map_err(ScriptError::EvalError)?;

        let mut bindings = Vec::new();
        for (name, _, dynamic) in scope.iter().skip(declared_from) {
            let declared: Value = from_dynamic(&dynamic).map_err(ScriptError::EvalError)?;
            bindings.push((name.to_string(), declared));
        }

        Ok(Evaluation { value, bindings })
    }
}

/// Loose truthiness used for conditions and expression assertions.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Boolean(value) => *value,
        Value::Null | Value::Undefined => false,
        Value::Number(number) => match number.to_f64() {
            Some(number) => number != 0.0,
            None => true,
        },
        Value::String(value) => {
            let value = value.as_str();
            !value.is_empty() && value != "false"
        }
        Value::Array(array) => array.len() > 0,
        Value::Object(object) => object.len() > 0,
        _ => true,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn context(entries: &[(&str, Value)]) -> Context {
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn test_evaluate_arithmetic() {
        let evaluator = RhaiEvaluator::default();
        let result = evaluator
            .evaluate("let a = 10; let b = 20; a + b", &Context::new())
            .unwrap();

        assert_eq!(result.value, Value::from(30i64));
    }

    #[test]
    fn test_evaluate_reads_bindings() {
        let evaluator = RhaiEvaluator::default();
        let context = context(&[("status", Value::from(404i64))]);

        let result = evaluator.evaluate("status == 404", &context).unwrap();
        assert_eq!(result.value, Value::from(true));
    }

    #[test]
    fn test_evaluate_skips_non_identifier_bindings() {
        let evaluator = RhaiEvaluator::default();
        let context = context(&[
            ("a.b", Value::from(1i64)),
            ("ok", Value::from(true)),
        ]);

        let result = evaluator.evaluate("ok", &context).unwrap();
        assert!(result.is_truthy());
    }

    #[test]
    fn test_evaluate_reports_declared_variables() {
        let evaluator = RhaiEvaluator::default();
        let context = context(&[("seed", Value::from(2i64))]);

        let result = evaluator
            .evaluate("let touched = seed * 21; true", &context)
            .unwrap();

        assert_eq!(result.value, Value::from(true));
        assert_eq!(
            result.bindings,
            vec![("touched".to_string(), Value::from(42i64))]
        );
    }

    #[test]
    fn test_evaluate_wrapped_code_and_null() {
        let evaluator = RhaiEvaluator::default();
        let result = evaluator
            .evaluate("{{ let x = null; x == () }}", &Context::new())
            .unwrap();

        assert_eq!(result.value, Value::from(true));
    }

    #[test]
    fn test_null_inside_literals_is_kept() {
        assert_eq!(
            RhaiEvaluator::to_code_string(r#"x == null && y == "null value""#),
            r#"x == () && y == "null value""#
        );
        assert_eq!(
            RhaiEvaluator::to_code_string(r#"`null ${n}` + "a \" null" + nullable"#),
            r#"`null ${n}` + "a \" null" + nullable"#
        );

        let evaluator = RhaiEvaluator::default();
        let result = evaluator
            .evaluate(r#"let v = null; if v == () { "null value" } else { "set" }"#, &Context::new())
            .unwrap();
        assert_eq!(result.value, Value::from("null value"));
    }

    #[test]
    fn test_process_environment_is_not_in_scope() {
        let evaluator = RhaiEvaluator::default();

        assert!(matches!(
            evaluator.evaluate("envs", &Context::new()),
            Err(ScriptError::EvalError(_))
        ));
    }

    #[test]
    fn test_evaluate_compile_error() {
        let evaluator = RhaiEvaluator::default();
        let result = evaluator.evaluate("let = ;", &Context::new());

        assert!(matches!(result, Err(ScriptError::CompileError(_, _))));
    }

    #[test]
    fn test_evaluators_unknown_language() {
        let evaluators = Evaluators::default();

        assert_eq!(evaluators.default_language(), "rhai");
        assert!(matches!(
            evaluators.evaluate("lua", "1", &Context::new()),
            Err(ScriptError::UnknownLanguage(_))
        ));
    }

    #[test]
    fn test_truthy() {
        assert!(truthy(&Value::from(true)));
        assert!(!truthy(&Value::Null));
        assert!(!truthy(&Value::from(0i64)));
        assert!(truthy(&Value::from("yes")));
        assert!(!truthy(&Value::from("false")));
        assert!(!truthy(&Value::from("")));
    }
}
