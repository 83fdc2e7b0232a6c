use crate::{
    call::Call,
    context::Context,
    error::ScriptError,
    plugins::{entry, option, Auth, PluginRegistry},
    script::Script,
    variable::to_text,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use log::debug;
use valu3::prelude::*;

pub const AUTHORIZATION: &str = "Authorization";

pub fn register(registry: &mut PluginRegistry) {
    registry.register_auth("basic", |scriptlet| {
        let basic = option(scriptlet, "basic")?;
        Ok(Box::new(BasicAuth {
            user: field(basic, "basic", "user")?,
            password: field(basic, "basic", "password")?,
        }))
    });
    registry.register_auth("bearer", |scriptlet| {
        let token = match option(scriptlet, "bearer")? {
            Value::String(token) => token.as_string(),
            bearer => field(bearer, "bearer", "token")?,
        };
        Ok(Box::new(BearerAuth { token }))
    });
    registry.register_auth("script", |scriptlet| {
        let script = option(scriptlet, "script")?;
        Ok(Box::new(ScriptAuth {
            script: to_text(script),
            binding: match entry(scriptlet, "binding") {
                Some(binding) => to_text(binding),
                None => "token".to_string(),
            },
        }))
    });
}

fn field(value: &Value, plugin: &str, key: &str) -> Result<String, ScriptError> {
    entry(value, key)
        .map(to_text)
        .ok_or_else(|| ScriptError::invalid(format!("{} auth needs {}", plugin, key)))
}

/// `{ "basic": { "user": "...", "password": "..." } }`
pub struct BasicAuth {
    user: String,
    password: String,
}

impl Auth for BasicAuth {
    fn authorize(
        &self,
        context: &mut Context,
        _: &Script,
        call: &mut Call,
    ) -> Result<(), ScriptError> {
        let credentials = format!(
            "{}:{}",
            context.expand(&self.user),
            context.expand(&self.password)
        );

        call.request_headers.push((
            AUTHORIZATION.to_string(),
            format!("Basic {}", BASE64.encode(credentials)),
        ));
        Ok(())
    }
}

/// `{ "bearer": "token" }` or `{ "bearer": { "token": "..." } }`
pub struct BearerAuth {
    token: String,
}

impl Auth for BearerAuth {
    fn authorize(
        &self,
        context: &mut Context,
        _: &Script,
        call: &mut Call,
    ) -> Result<(), ScriptError> {
        call.request_headers.push((
            AUTHORIZATION.to_string(),
            format!("Bearer {}", context.expand(&self.token)),
        ));
        Ok(())
    }
}

/// `{ "script": "login", "binding": "token" }` runs `login` in a child
/// context and sends the binding it produced as a bearer token. Nothing the
/// login script binds or records reaches the calling context.
pub struct ScriptAuth {
    script: String,
    binding: String,
}

impl Auth for ScriptAuth {
    fn authorize(
        &self,
        context: &mut Context,
        script: &Script,
        call: &mut Call,
    ) -> Result<(), ScriptError> {
        let login = context.expand(&self.script);
        debug!("[{}] authorizing through {}", script.name(), login);

        let mut child = context.child();
        child.unbind(&self.binding);
        child.run_named(&login)?;

        if child.failed() > 0 {
            return Err(ScriptError::assertion(format!(
                "auth script {} failed",
                login
            )));
        }

        let token = child.binding(&self.binding).map(to_text).ok_or_else(|| {
            ScriptError::assertion(format!("auth script {} did not bind {}", login, self.binding))
        })?;

        call.request_headers
            .push((AUTHORIZATION.to_string(), format!("Bearer {}", token)));
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{script::Templates, transport::mock::Offline, Bindings};
    use std::sync::Arc;
    use valu3::json;

    fn authorize(context: &mut Context, scriptlet: Value) -> Result<Call, ScriptError> {
        let script =
            Script::try_build(&json!({"name": "s", "GET": "/"}), &Templates::new(), &Bindings::new())
                .unwrap();
        let mut call = Call::new("s");

        let (_, auth) = context.plugins().auth(&scriptlet)?;
        auth.authorize(context, &script, &mut call)?;
        Ok(call)
    }

    #[test]
    fn test_basic_auth_header() {
        let mut context = Context::new(Arc::new(Offline));
        context.bind("pass", Value::from("secret")).unwrap();

        let call = authorize(
            &mut context,
            json!({"basic": {"user": "ada", "password": "{pass}"}}),
        )
        .unwrap();

        assert_eq!(
            call.request_headers,
            vec![(
                "Authorization".to_string(),
                "Basic YWRhOnNlY3JldA==".to_string()
            )]
        );
    }

    #[test]
    fn test_bearer_forms() {
        let mut context = Context::new(Arc::new(Offline));
        context.bind("jwt", Value::from("abc")).unwrap();

        let short = authorize(&mut context, json!({"bearer": "{jwt}"})).unwrap();
        let long = authorize(&mut context, json!({"bearer": {"token": "{jwt}"}})).unwrap();

        assert_eq!(short.request_headers, long.request_headers);
        assert_eq!(short.request_headers[0].1, "Bearer abc");
    }

    #[test]
    fn test_unknown_auth_plugin() {
        let mut context = Context::new(Arc::new(Offline));

        assert!(matches!(
            authorize(&mut context, json!({"digest": "x"})),
            Err(ScriptError::UnknownPlugin(_, _))
        ));
    }
}
