use cli::Cli;
use envs::Envs;
use log::LevelFilter;
use rester_script::RhaiEvaluator;
use std::time::Duration;
use valu3::value::Value;

pub mod cli;
pub mod envs;

pub use cli::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub files: Vec<String>,
    pub log_level: LevelFilter,
    pub bindings: Vec<(String, Value)>,
    pub timeout: Option<Duration>,
    pub language: String,
}

impl Settings {
    pub fn try_load() -> Result<Self, Error> {
        let cli = Cli::load()?;
        let envs = Envs::load();

        Ok(Self::merge(cli, envs))
    }

    /// Command line values win over environment variables.
    pub fn merge(cli: Cli, envs: Envs) -> Self {
        let log_level = if cli.quiet {
            LevelFilter::Error
        } else if cli.verbose {
            LevelFilter::Debug
        } else {
            envs.log
                .as_deref()
                .and_then(|level| level.parse::<LevelFilter>().ok())
                .unwrap_or(LevelFilter::Info)
        };

        let bindings = cli
            .bindings
            .into_iter()
            .map(|(name, value)| (name, parse_value(&value)))
            .collect();

        let timeout = cli
            .timeout
            .or(envs.timeout_seconds)
            .map(Duration::from_secs);

        let language = cli
            .language
            .or(envs.default_language)
            .unwrap_or_else(|| RhaiEvaluator::LANGUAGE.to_string());

        Self {
            files: cli.files,
            log_level,
            bindings,
            timeout,
            language,
        }
    }
}

/// JSON when it parses, the raw text otherwise.
fn parse_value(text: &str) -> Value {
    match Value::json_to_value(text) {
        Ok(value) => value,
        Err(_) => Value::from(text),
    }
}
