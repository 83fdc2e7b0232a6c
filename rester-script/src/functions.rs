use regex::Regex;
use rhai::Engine;

pub fn build_functions() -> Engine {
    let mut engine = Engine::new();

    match engine.register_custom_operator("starts_with", 80) {
        Ok(engine) => {
            engine.register_fn("starts_with", |x: String, y: String| x.starts_with(&y));
        }
        Err(err) => log::error!("Error on register custom operator starts_with: {}", err),
    };

    match engine.register_custom_operator("ends_with", 81) {
        Ok(engine) => {
            engine.register_fn("ends_with", |x: String, y: String| x.ends_with(&y));
        }
        Err(err) => log::error!("Error on register custom operator ends_with: {}", err),
    };

    match engine.register_custom_operator("search", 82) {
        Ok(engine) => {
            engine.register_fn("search", |pattern: String, text: String| {
                match Regex::new(&pattern) {
                    Ok(re) => re.is_match(&text),
                    Err(_) => false,
                }
            });
        }
        Err(err) => log::error!("Error on register custom operator search: {}", err),
    };

    engine
}
