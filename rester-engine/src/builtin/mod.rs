//! Plugins every registry starts with.
//!
//! | kind      | keys                                  |
//! |-----------|---------------------------------------|
//! | assertion | `status`, `header`, `body`, languages |
//! | extractor | `header`, `body`, `json`, languages   |
//! | generator | `json`, `text`                        |
//! | auth      | `basic`, `bearer`, `script`           |
//!
//! "languages" stands for one plugin per registered expression language,
//! keyed by the language tag (`rhai`).
pub mod assertions;
pub mod auth;
pub mod extractors;
pub mod generators;

use crate::plugins::PluginRegistry;

pub fn register(registry: &mut PluginRegistry, languages: &[String]) {
    assertions::register(registry, languages);
    extractors::register(registry, languages);
    generators::register(registry);
    auth::register(registry);
}

/// `/pattern/` strings are regular expressions.
pub(crate) fn as_pattern(expected: &str) -> Option<&str> {
    if expected.len() >= 2 && expected.starts_with('/') && expected.ends_with('/') {
        Some(&expected[1..expected.len() - 1])
    } else {
        None
    }
}
