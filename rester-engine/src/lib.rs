//! # rester-engine - JSON-scripted REST API validation
//!
//! A script is a JSON object describing one HTTP call together with the
//! checks to run around it. Scripts inherit from templates, share variables
//! through a [`Context`] and are executed in batches.
//!
//! ```rust
//! use rester_engine::{Context, Request, Response, Transport, TransportError};
//! use std::sync::Arc;
//! use valu3::{json, prelude::*};
//!
//! struct Echo;
//!
//! impl Transport for Echo {
//!     fn invoke(&self, request: &Request) -> Result<Response, TransportError> {
//!         Ok(Response {
//!             status: 200,
//!             headers: vec![("Content-Type".to_string(), "application/json".to_string())],
//!             body: format!("{{\"path\": \"{}\"}}", request.uri).into_bytes(),
//!         })
//!     }
//! }
//!
//! let mut context = Context::new(Arc::new(Echo));
//! context.bind("id", Value::from(42i64)).unwrap();
//!
//! context
//!     .run_document(&json!([
//!         { "name": "api.template", "headers": { "Accept": "application/json" } },
//!         {
//!             "name": "get-item",
//!             "template": "api",
//!             "GET": "/items/{id}",
//!             "bind": { "json": { "path": "path" } },
//!             "assert": ["status == 200", { "header": { "content-type": "/json/" } }]
//!         }
//!     ]))
//!     .unwrap();
//!
//! assert_eq!(context.failed(), 0);
//! assert_eq!(context.binding("path"), Some(&Value::from("/items/42")));
//! ```
//!
//! ## Script fields
//!
//! | field           | meaning                                                   |
//! |-----------------|-----------------------------------------------------------|
//! | `name`          | script name; a `.template` suffix declares a template     |
//! | `template`      | parent template (`base` or `base.template`)               |
//! | `if`            | condition: boolean, bound variable or expression          |
//! | `env`           | variables bound before the call                           |
//! | `GET`, `POST`.. | method and URI                                            |
//! | `headers`       | request headers, accumulated along the template chain     |
//! | `body`          | request body, literal or produced by a generator          |
//! | `auth`          | authorization plugin applied before sending               |
//! | `preconditions` | assertions run before the call                            |
//! | `bind`          | extractors run on the response                            |
//! | `assert`        | assertions run on the response                            |
//!
//! ## Modules
//!
//! - [`variable`] - `{name}`, `{name|default}` and `{U+hhhh}` expansion.
//! - [`bindings`] - the variable store.
//! - [`script`] - scripts, templates and chain resolution.
//! - [`context`] - shared state and batch execution.
//! - [`pipeline`] - the stages of a single call.
//! - [`condition`] - `if` evaluation.
//! - [`plugins`] - the plugin registry, [`builtin`] its default plugins.
//! - [`transport`] - the HTTP collaborator contract.
pub mod bindings;
pub mod builtin;
pub mod call;
pub mod condition;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod plugins;
pub mod script;
pub mod transport;
pub mod variable;

pub use bindings::Bindings;
pub use call::{Call, CallState, Outcome, Stage};
pub use context::{Context, DocumentSource, INCLUDE_PREFIX};
pub use error::{PluginKind, ScriptError};
pub use plugins::{Assertion, Auth, BodyGenerator, Extractor, PluginRegistry};
pub use script::{entries, Script, TEMPLATE_SUFFIX};
pub use transport::{Request, Response, Transport, TransportError, METHODS};
pub use variable::{expand, expand_value};
