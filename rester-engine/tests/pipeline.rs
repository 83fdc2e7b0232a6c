use rester_engine::{
    Call, CallState, Context, DocumentSource, PluginKind, PluginRegistry, Request, Response,
    Script, ScriptError, Stage, Transport, TransportError,
};
use std::{cell::RefCell, collections::HashMap, sync::Arc};
use valu3::{json, prelude::*};

/// Answers every request with `respond`, keeping what was sent.
struct MockTransport {
    respond: Box<dyn Fn(&Request) -> Response>,
    requests: RefCell<Vec<Request>>,
}

impl MockTransport {
    fn new<F: Fn(&Request) -> Response + 'static>(respond: F) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            requests: RefCell::new(Vec::new()),
        })
    }

    fn ok() -> Arc<Self> {
        Self::new(|_| response(200, "{}"))
    }

    fn sent(&self) -> Vec<Request> {
        self.requests.borrow().clone()
    }
}

impl Transport for MockTransport {
    fn invoke(&self, request: &Request) -> Result<Response, TransportError> {
        self.requests.borrow_mut().push(request.clone());
        Ok((self.respond)(request))
    }
}

fn response(status: u16, body: &str) -> Response {
    Response {
        status,
        headers: vec![("Content-Type".to_string(), "application/json".to_string())],
        body: body.as_bytes().to_vec(),
    }
}

fn call<'a>(context: &'a Context, name: &str) -> &'a Call {
    context
        .calls()
        .iter()
        .find(|call| call.script == name)
        .unwrap_or_else(|| panic!("no call for {}", name))
}

#[test]
fn false_parent_condition_short_circuits_child_side_effect() {
    let transport = MockTransport::ok();
    let mut context = Context::new(transport.clone());

    context
        .run_document(&json!([
            { "name": "off.template", "if": false },
            {
                "name": "child",
                "template": "off",
                "if": "let side_effect = 1; true",
                "GET": "/never"
            }
        ]))
        .unwrap();

    assert!(!context.bound("side_effect"));
    assert_eq!(call(&context, "child").state, CallState::Skipped);
    assert!(transport.sent().is_empty());
}

#[test]
fn failed_assertion_skips_the_rest_of_its_stage() {
    let mut context = Context::new(MockTransport::ok());

    context
        .run_document(&json!({
            "name": "checked",
            "GET": "/",
            "assert": [
                "let a_ran = true; true",
                "false",
                "let c_ran = true; true"
            ]
        }))
        .unwrap();

    let checked = call(&context, "checked");
    assert_eq!(checked.state, CallState::Failed);
    assert_eq!(checked.passed.len(), 2);
    assert_eq!(checked.passed[1].stage, Stage::Assertions);
    assert_eq!(checked.failed.len(), 1);
    assert_eq!(checked.skipped.len(), 1);
    assert_eq!(checked.skipped[0].key, "rhai");
    assert!(context.bound("a_ran"));
    assert!(!context.bound("c_ran"));
    assert_eq!(context.failed(), 1);
}

#[test]
fn non_success_status_fails_once_without_assertions() {
    let mut context = Context::new(MockTransport::new(|_| response(404, "")));

    context
        .run_document(&json!({ "name": "missing", "GET": "/missing" }))
        .unwrap();

    let missing = call(&context, "missing");
    assert_eq!(missing.failed.len(), 1);
    assert_eq!(missing.failed[0].key, "status");
    assert_eq!(missing.state, CallState::Failed);
    assert_eq!(context.failed(), 1);
    assert_eq!(context.binding("status").and_then(|status| status.to_i64()), Some(404));
}

#[test]
fn explicit_status_assertion_replaces_the_implicit_check() {
    let mut context = Context::new(MockTransport::new(|_| response(404, "")));

    context
        .run_document(&json!({ "name": "gone", "GET": "/gone", "assert": { "status": 404 } }))
        .unwrap();

    let gone = call(&context, "gone");
    assert_eq!(gone.state, CallState::Passed);
    assert_eq!(gone.passed.len(), 1);
    assert_eq!(context.failed(), 0);
}

#[test]
fn extracted_binding_flows_into_next_uri() {
    let transport = MockTransport::new(|request| match request.uri.as_str() {
        "/items" => response(201, r#"{"id": 42}"#),
        _ => response(200, "{}"),
    });
    let mut context = Context::new(transport.clone());

    context
        .run_document(&json!([
            { "name": "create", "POST": "/items", "bind": { "json": { "id": "id" } } },
            { "name": "read", "GET": "/items/{id}" }
        ]))
        .unwrap();

    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].uri, "/items/42");
    assert_eq!(context.failed(), 0);
}

#[test]
fn cancellation_stops_the_batch() {
    let transport = MockTransport::ok();
    let mut plugins = PluginRegistry::with_builtins(&["rhai".to_string()]);
    plugins.register_assertion("cancel", |_| Ok(Box::new(Cancel)));

    let mut context = Context::new(transport.clone()).with_plugins(plugins);

    context
        .run_document(&json!([
            { "name": "s1", "GET": "/1", "assert": { "cancel": true } },
            { "name": "s2", "GET": "/2", "env": { "from_s2": true } },
            { "name": "s3", "GET": "/3", "env": { "from_s3": true } }
        ]))
        .unwrap();

    assert!(context.is_cancelled());
    assert_eq!(transport.sent().len(), 1);
    assert_eq!(context.calls().len(), 1);
    assert_eq!(call(&context, "s1").state, CallState::Cancelled);
    assert!(!context.bound("from_s2"));
    assert!(!context.bound("from_s3"));
}

struct Cancel;

impl rester_engine::Assertion for Cancel {
    fn check(&self, context: &mut Context, _: &Script, _: &Call) -> Result<(), ScriptError> {
        context.cancel();
        Ok(())
    }
}

#[test]
fn template_headers_accumulate_without_dedup() {
    let transport = MockTransport::ok();
    let mut context = Context::new(transport.clone());
    context.bind("second", Value::from("2")).unwrap();

    context
        .run_document(&json!([
            { "name": "base.template", "headers": { "X": "1" } },
            { "name": "leaf", "template": "base", "GET": "/", "headers": { "X": "{second}" } }
        ]))
        .unwrap();

    assert_eq!(
        transport.sent()[0].headers,
        vec![
            ("X".to_string(), "1".to_string()),
            ("X".to_string(), "2".to_string())
        ]
    );
}

#[test]
fn unknown_plugin_aborts_the_batch() {
    let transport = MockTransport::ok();
    let mut context = Context::new(transport.clone());

    let result = context.run_document(&json!([
        { "name": "broken", "GET": "/", "assert": { "nope": 1 } },
        { "name": "after", "GET": "/after" }
    ]));

    assert_eq!(
        result,
        Err(ScriptError::UnknownPlugin(PluginKind::Assertion, "nope".to_string()))
    );
    assert_eq!(call(&context, "broken").state, CallState::Error);
    assert!(context.script("after").is_none());
    assert_eq!(transport.sent().len(), 1);
}

#[test]
fn reserved_names_cannot_be_bound() {
    let mut context = Context::new(MockTransport::ok());

    assert_eq!(
        context.bind("U+0041", Value::from(1i64)),
        Err(ScriptError::ReservedName("U+0041".to_string()))
    );

    let result = context.run_document(&json!({ "name": "s", "GET": "/", "env": { "u+00e9": 1 } }));
    assert_eq!(result, Err(ScriptError::ReservedName("u+00e9".to_string())));
    assert_eq!(context.expand("{U+0041}"), "A");
}

#[test]
fn template_cycle_aborts_the_batch() {
    let mut context = Context::new(MockTransport::ok());

    let result = context.run_document(&json!([
        { "name": "a.template" },
        { "name": "b.template", "template": "a" },
        { "name": "a.template", "template": "b" }
    ]));

    assert!(matches!(result, Err(ScriptError::TemplateCycle(_))));
}

#[test]
fn precondition_failure_skips_call_and_assertions() {
    let transport = MockTransport::ok();
    let mut context = Context::new(transport.clone());
    context.bind("ready", Value::from(false)).unwrap();

    context
        .run_document(&json!({
            "name": "guarded",
            "GET": "/",
            "preconditions": "ready",
            "assert": ["true", { "status": 200 }]
        }))
        .unwrap();

    let guarded = call(&context, "guarded");
    assert_eq!(guarded.failed.len(), 1);
    assert_eq!(guarded.failed[0].stage, Stage::Preconditions);
    assert_eq!(guarded.skipped.len(), 2);
    assert!(transport.sent().is_empty());
}

#[test]
fn scripts_without_condition_stop_after_a_failure() {
    let transport = MockTransport::new(|request| match request.uri.as_str() {
        "/fails" => response(500, ""),
        _ => response(200, "{}"),
    });
    let mut context = Context::new(transport.clone());

    context
        .run_document(&json!([
            { "name": "fails", "GET": "/fails" },
            { "name": "plain", "GET": "/plain" },
            { "name": "forced", "GET": "/forced", "if": true }
        ]))
        .unwrap();

    assert_eq!(call(&context, "plain").state, CallState::Skipped);
    assert_eq!(call(&context, "forced").state, CallState::Passed);
    assert_eq!(transport.sent().len(), 2);
}

#[test]
fn missing_method_is_fatal() {
    let mut context = Context::new(MockTransport::ok());

    let result = context.run_document(&json!({ "name": "nothing" }));

    assert_eq!(result, Err(ScriptError::MissingMethod("nothing".to_string())));
    assert!(call(&context, "nothing").error.is_some());
}

#[test]
fn env_and_name_are_bound_before_the_call() {
    let transport = MockTransport::ok();
    let mut context = Context::new(transport.clone());
    context.bind("host", Value::from("api.test")).unwrap();

    context
        .run_document(&json!([
            { "name": "base.template", "env": { "root": "http://{host}" } },
            {
                "name": "leaf",
                "template": "base",
                "env": { "limit": 5, "query": { "q": "{name}" } },
                "GET": "{root}/search?limit={limit}",
                "body": { "json": { "query": "{name}" } }
            }
        ]))
        .unwrap();

    let sent = transport.sent();
    assert_eq!(sent[0].uri, "http://api.test/search?limit=5");
    assert_eq!(
        context.binding("query").and_then(|query| query.get("q")).cloned(),
        Some(Value::from("leaf"))
    );

    let body = Value::json_to_value(&String::from_utf8(sent[0].body.clone()).unwrap()).unwrap();
    assert_eq!(body.get("query"), Some(&Value::from("leaf")));
}

#[test]
fn auth_script_runs_in_a_child_context() {
    let transport = MockTransport::new(|request| match request.uri.as_str() {
        "/login" => response(200, r#"{"token": "t-1"}"#),
        _ => response(200, "{}"),
    });
    let mut context = Context::new(transport.clone());
    context
        .ingest(&json!({ "name": "login", "POST": "/login", "bind": { "json": { "token": "token" } } }))
        .unwrap();

    context
        .run_document(&json!({
            "name": "profile",
            "GET": "/me",
            "auth": { "script": "login", "binding": "token" }
        }))
        .unwrap();

    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[1]
        .headers
        .contains(&("Authorization".to_string(), "Bearer t-1".to_string())));

    assert!(!context.bound("token"));
    assert_eq!(context.calls().len(), 1);
    assert_eq!(call(&context, "profile").state, CallState::Passed);
}

#[test]
fn failing_auth_script_fails_the_call() {
    let transport = MockTransport::new(|request| match request.uri.as_str() {
        "/login" => response(401, ""),
        _ => response(200, "{}"),
    });
    let mut context = Context::new(transport.clone());
    context
        .ingest(&json!({ "name": "login", "POST": "/login" }))
        .unwrap();

    context
        .run_document(&json!({
            "name": "profile",
            "GET": "/me",
            "auth": { "script": "login" },
            "assert": "true"
        }))
        .unwrap();

    let profile = call(&context, "profile");
    assert_eq!(profile.state, CallState::Failed);
    assert_eq!(profile.failed[0].key, "script");
    assert_eq!(profile.skipped.len(), 1);
    assert_eq!(context.failed(), 1);
    assert_eq!(transport.sent().len(), 1);
}

#[test]
fn child_context_does_not_leak() {
    let mut context = Context::new(MockTransport::ok());
    context.bind("shared", Value::from(1i64)).unwrap();

    let mut child = context.child();
    child.bind("local", Value::from(2i64)).unwrap();
    child
        .run_document(&json!({ "name": "in-child", "GET": "/" }))
        .unwrap();

    assert!(child.bound("shared"));
    assert!(!context.bound("local"));
    assert!(context.calls().is_empty());

    child.cancel();
    assert!(context.is_cancelled());
}

struct Documents(HashMap<String, Vec<Value>>);

impl DocumentSource for Documents {
    fn load(&self, reference: &str) -> Result<Vec<Value>, ScriptError> {
        self.0
            .get(reference)
            .cloned()
            .ok_or_else(|| ScriptError::Include(reference.to_string()))
    }
}

#[test]
fn include_is_spliced_in_place() {
    let transport = MockTransport::ok();
    let mut documents = HashMap::new();
    documents.insert(
        "common.json".to_string(),
        vec![json!({ "name": "two", "GET": "/2" }), json!({ "name": "three", "GET": "/3" })],
    );

    let mut context =
        Context::new(transport.clone()).with_documents(Arc::new(Documents(documents)));
    context.bind("file", Value::from("common")).unwrap();

    context
        .run_document(&json!([
            { "name": "one", "GET": "/1" },
            "include:{file}.json",
            { "name": "four", "GET": "/4" },
            "two"
        ]))
        .unwrap();

    let uris: Vec<String> = transport.sent().into_iter().map(|request| request.uri).collect();
    assert_eq!(uris, vec!["/1", "/2", "/3", "/4", "/2"]);

    assert!(matches!(
        context.run_document(&json!(["include:missing.json"])),
        Err(ScriptError::Include(_))
    ));
    assert!(matches!(
        context.run_document(&json!(["unknown-script"])),
        Err(ScriptError::ScriptNotFound(_))
    ));
}

#[test]
fn bare_expression_assertions_keep_the_implicit_status_check() {
    let mut context = Context::new(MockTransport::ok());

    context
        .run_document(&json!([
            { "name": "holds", "GET": "/", "assert": "true", "if": true },
            { "name": "breaks", "GET": "/", "assert": "false", "if": true }
        ]))
        .unwrap();

    let holds = call(&context, "holds");
    assert_eq!(holds.state, CallState::Passed);
    assert_eq!(holds.passed.len(), 2);
    assert_eq!(holds.passed[0].key, "status");

    let breaks = call(&context, "breaks");
    assert_eq!(breaks.state, CallState::Failed);
    assert_eq!(breaks.failed[0].stage, Stage::Assertions);
}

#[test]
fn literal_body_with_generator_field_names_is_sent_unchanged() {
    let transport = MockTransport::ok();
    let mut context = Context::new(transport.clone());

    context
        .run_document(&json!({
            "name": "note",
            "POST": "/notes",
            "body": { "title": "t", "text": "hello" }
        }))
        .unwrap();

    let sent = transport.sent();
    let body = Value::json_to_value(&String::from_utf8(sent[0].body.clone()).unwrap()).unwrap();
    assert_eq!(body.get("title"), Some(&Value::from("t")));
    assert_eq!(body.get("text"), Some(&Value::from("hello")));
}

#[test]
fn extraction_failure_skips_the_assertions() {
    let transport = MockTransport::new(|_| response(200, "plain text"));
    let mut context = Context::new(transport);

    context
        .run_document(&json!({
            "name": "extract",
            "GET": "/",
            "bind": { "json": { "id": "data.id" } },
            "assert": ["true", { "status": 200 }]
        }))
        .unwrap();

    let extract = call(&context, "extract");
    assert_eq!(extract.state, CallState::Failed);
    assert_eq!(extract.failed.len(), 1);
    assert_eq!(extract.failed[0].stage, Stage::Extraction);
    assert_eq!(extract.skipped.len(), 2);
    assert!(extract.skipped.iter().all(|outcome| outcome.stage == Stage::Assertions));
    assert!(!context.bound("id"));
}

#[test]
fn listed_headers_are_sent_in_order() {
    let transport = MockTransport::ok();
    let mut context = Context::new(transport.clone());

    context
        .run_document(&json!({
            "name": "ordered",
            "GET": "/",
            "headers": [{ "Z-First": "z" }, { "A-Second": "a" }, { "M-Third": "m" }]
        }))
        .unwrap();

    let names: Vec<String> = transport.sent()[0]
        .headers
        .iter()
        .map(|(name, _)| name.clone())
        .collect();
    assert_eq!(names, vec!["Z-First", "A-Second", "M-Third"]);
}
