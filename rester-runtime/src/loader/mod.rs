mod error;

pub use error::Error;
use log::debug;
use rester_engine::{DocumentSource, ScriptError};
use serde_yaml::Value as Yaml;
use std::{collections::HashMap, path::Path};
use valu3::prelude::*;

/// Script fields whose key order matters. Their mappings are handed to the
/// engine as lists of single-entry objects, in document order.
const ORDERED_FIELDS: [&str; 2] = ["headers", "env"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl From<&str> for DocumentFormat {
    fn from(extension: &str) -> Self {
        match extension {
            "yaml" => DocumentFormat::Yaml,
            "yml" => DocumentFormat::Yaml,
            _ => DocumentFormat::Json,
        }
    }
}

impl DocumentFormat {
    /// Format of a path or URL, by extension; JSON when there is none.
    pub fn of(target: &str) -> Self {
        let path = target
            .split(|c| c == '?' || c == '#')
            .next()
            .unwrap_or(target);

        let extension = Path::new(path)
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();

        DocumentFormat::from(extension.as_str())
    }
}

fn is_url(target: &str) -> bool {
    target.starts_with("http://") || target.starts_with("https://")
}

/// Reads script documents from files and URLs.
#[derive(Debug, Clone, Default)]
pub struct Loader {
    client: reqwest::blocking::Client,
}

impl Loader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self, target: &str) -> Result<String, Error> {
        if is_url(target) {
            debug!("Fetching {}", target);
            return self
                .client
                .get(target)
                .send()
                .and_then(|response| response.error_for_status())
                .and_then(|response| response.text())
                .map_err(Error::GetFileError);
        }

        debug!("Reading {}", target);
        std::fs::read_to_string(target).map_err(|err| Error::FileNotFound(target.to_string(), err))
    }

    /// Parses a document keeping the key order of `headers` and `env`.
    /// JSON is read as YAML, its superset, falling back to the JSON parser
    /// for the error report.
    pub fn parse(content: &str, format: DocumentFormat) -> Result<Value, Error> {
        let document = match (serde_yaml::from_str::<Yaml>(content), format) {
            (Ok(document), _) => document,
            (Err(_), DocumentFormat::Json) => {
                return Value::json_to_value(content).map_err(Error::LoaderErrorJsonValu3)
            }
            (Err(err), DocumentFormat::Yaml) => return Err(Error::LoaderErrorScript(err)),
        };

        match document {
            Yaml::Sequence(items) => Ok(Value::from(
                items
                    .into_iter()
                    .map(script_value)
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            document => script_value(document),
        }
    }

    /// The scripts of a document: the elements of a top-level array, or the
    /// document itself.
    pub fn load_documents(&self, target: &str) -> Result<Vec<Value>, Error> {
        let value = Self::parse(&self.read(target)?, DocumentFormat::of(target))?;

        match &value {
            Value::Array(array) => Ok(array.into_iter().cloned().collect()),
            Value::Object(_) | Value::String(_) => Ok(vec![value.clone()]),
            other => Err(Error::InvalidDocument(format!(
                "{} must hold an object or an array, got {}",
                target,
                other.to_json(JsonMode::Inline)
            ))),
        }
    }
}

fn script_value(document: Yaml) -> Result<Value, Error> {
    match document {
        Yaml::Mapping(mapping) => {
            let mut script = HashMap::new();
            for (key, value) in mapping {
                let key = key_text(&key)?;
                let value = match value {
                    Yaml::Mapping(fields) if ORDERED_FIELDS.contains(&key.as_str()) => {
                        ordered_entries(fields)?
                    }
                    value => to_value(value)?,
                };
                script.insert(key, value);
            }
            Ok(Value::from(script))
        }
        Yaml::Tagged(tagged) => script_value(tagged.value),
        other => to_value(other),
    }
}

fn ordered_entries(mapping: serde_yaml::Mapping) -> Result<Value, Error> {
    let mut entries = Vec::new();
    for (key, value) in mapping {
        let mut entry = HashMap::new();
        entry.insert(key_text(&key)?, to_value(value)?);
        entries.push(Value::from(entry));
    }
    Ok(Value::from(entries))
}

fn to_value(yaml: Yaml) -> Result<Value, Error> {
    Ok(match yaml {
        Yaml::Null => Value::Null,
        Yaml::Bool(value) => Value::from(value),
        Yaml::Number(number) => {
            if let Some(value) = number.as_i64() {
                Value::from(value)
            } else if let Some(value) = number.as_u64() {
                Value::from(value)
            } else {
                Value::from(number.as_f64().unwrap_or(f64::NAN))
            }
        }
        Yaml::String(value) => Value::from(value),
        Yaml::Sequence(items) => Value::from(
            items
                .into_iter()
                .map(to_value)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Yaml::Mapping(mapping) => {
            let mut object = HashMap::new();
            for (key, value) in mapping {
                object.insert(key_text(&key)?, to_value(value)?);
            }
            Value::from(object)
        }
        Yaml::Tagged(tagged) => to_value(tagged.value)?,
    })
}

fn key_text(key: &Yaml) -> Result<String, Error> {
    match key {
        Yaml::String(key) => Ok(key.clone()),
        Yaml::Number(number) => Ok(number.to_string()),
        Yaml::Bool(value) => Ok(value.to_string()),
        Yaml::Null => Ok("null".to_string()),
        other => Err(Error::InvalidDocument(format!(
            "unsupported mapping key {:?}",
            other
        ))),
    }
}

impl DocumentSource for Loader {
    fn load(&self, reference: &str) -> Result<Vec<Value>, ScriptError> {
        self.load_documents(reference)
            .map_err(|err| ScriptError::Include(format!("{}: {}", reference, err)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_format_of() {
        assert_eq!(DocumentFormat::of("suite.json"), DocumentFormat::Json);
        assert_eq!(DocumentFormat::of("suite.YML"), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::of("https://host/suite.yaml?v=2"), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::of("suite"), DocumentFormat::Json);
    }

    #[test]
    fn test_parse_yaml_and_json() {
        let yaml = Loader::parse("name: get-user\nGET: /users/1\n", DocumentFormat::Yaml).unwrap();
        assert_eq!(yaml.get("GET"), Some(&Value::from("/users/1")));

        let json = Loader::parse(r#"[{"name": "a"}]"#, DocumentFormat::Json).unwrap();
        assert!(json.is_array());

        assert!(Loader::parse("{", DocumentFormat::Json).is_err());
    }

    #[test]
    fn test_headers_and_env_keep_document_order() {
        let expected = vec!["Z-First", "A-Second", "M-Third"];
        let documents = [
            (
                "name: h\nheaders:\n  Z-First: z\n  A-Second: a\n  M-Third: m\n",
                DocumentFormat::Yaml,
            ),
            (
                r#"{"name": "h", "headers": {"Z-First": "z", "A-Second": "a", "M-Third": "m"}}"#,
                DocumentFormat::Json,
            ),
        ];

        for (content, format) in documents {
            let script = Loader::parse(content, format).unwrap();
            let headers = script.get("headers").unwrap();
            let keys: Vec<String> = rester_engine::entries(headers)
                .unwrap()
                .into_iter()
                .map(|(key, _)| key)
                .collect();
            assert_eq!(keys, expected);
        }

        let batch = Loader::parse(
            "- name: a\n  env:\n    second: 2\n    first: \"{second}\"\n",
            DocumentFormat::Yaml,
        )
        .unwrap();
        let env = batch.get(0usize).unwrap().get("env").unwrap();
        let keys: Vec<String> = rester_engine::entries(env)
            .unwrap()
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        assert_eq!(keys, vec!["second", "first"]);
    }

    #[test]
    fn test_missing_file_is_an_include_error() {
        let loader = Loader::new();

        assert!(matches!(
            DocumentSource::load(&loader, "does/not/exist.json"),
            Err(ScriptError::Include(_))
        ));
    }
}
