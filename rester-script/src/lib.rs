//! Expression evaluators for rester scripts.
//!
//! Conditions (`if`), expression assertions and expression extractors are
//! written in an embedded language selected by a tag. Each language is an
//! [`ExpressionEvaluator`]; [`RhaiEvaluator`] is the default one.
pub mod functions;
pub mod script;

use functions::build_functions;
use rhai::Engine;
use std::sync::Arc;

pub use script::{
    truthy, Context, Evaluation, Evaluators, ExpressionEvaluator, RhaiEvaluator, ScriptError,
};

pub fn build_engine() -> Arc<Engine> {
    let mut engine = build_functions();
    engine.set_max_expr_depths(128, 64);

    Arc::new(engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use valu3::value::Value;

    #[test]
    fn test_build_engine_eval() {
        let engine = build_engine();
        let result: Value = rhai::serde::from_dynamic(&engine.eval::<rhai::Dynamic>("1 + 2").unwrap())
            .unwrap();

        assert_eq!(result, Value::from(3i64));
    }
}
