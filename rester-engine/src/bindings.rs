use crate::{error::ScriptError, variable::is_code_point};
use indexmap::IndexMap;
use valu3::value::Value;

/// Ordered variable store shared by every call of a context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    values: IndexMap<String, Value>,
}

impl Bindings {
    pub fn new() -> Self {
        Self {
            values: IndexMap::new(),
        }
    }

    /// Binds `name`, returning the value it replaces. `U+hhhh` names are
    /// reserved for code point literals.
    pub fn bind(&mut self, name: &str, value: Value) -> Result<Option<Value>, ScriptError> {
        if is_code_point(name) {
            return Err(ScriptError::ReservedName(name.to_string()));
        }

        Ok(self.values.insert(name.to_string(), value))
    }

    pub fn unbind(&mut self, name: &str) -> Option<Value> {
        self.values.shift_remove(name)
    }

    pub fn binding(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn bound(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Copy handed to expression evaluators.
    pub fn snapshot(&self) -> rester_script::Context {
        self.values.clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_bind_overwrites_and_keeps_order() {
        let mut bindings = Bindings::new();
        bindings.bind("b", Value::from(1i64)).unwrap();
        bindings.bind("a", Value::from(2i64)).unwrap();

        let previous = bindings.bind("b", Value::from(3i64)).unwrap();

        assert_eq!(previous, Some(Value::from(1i64)));
        assert_eq!(bindings.binding("b"), Some(&Value::from(3i64)));
        let names: Vec<&String> = bindings.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let mut bindings = Bindings::new();
        bindings.bind("Token", Value::from("x")).unwrap();

        assert!(bindings.bound("Token"));
        assert!(!bindings.bound("token"));
    }

    #[test]
    fn test_code_point_names_are_reserved() {
        let mut bindings = Bindings::new();

        assert_eq!(
            bindings.bind("U+0041", Value::from("x")),
            Err(ScriptError::ReservedName("U+0041".to_string()))
        );
        assert!(bindings.is_empty());
    }

    #[test]
    fn test_unbind() {
        let mut bindings = Bindings::new();
        bindings.bind("a", Value::Null).unwrap();

        assert_eq!(bindings.unbind("a"), Some(Value::Null));
        assert!(!bindings.bound("a"));
        assert_eq!(bindings.unbind("a"), None);
    }
}
