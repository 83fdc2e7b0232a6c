use crate::loader::Loader;
use crate::report::Report;
use crate::settings::Settings;
use crate::transport::HttpTransport;
use anyhow::Context as _;
use log::{debug, error, info};
use rester_engine::{Context, PluginRegistry, Transport};
use rester_script::Evaluators;
use std::sync::Arc;

pub struct Runtime {}

impl Runtime {
    /// Runs every file of `settings` against one shared context, in order.
    pub fn run(settings: &Settings) -> anyhow::Result<Report> {
        let transport =
            HttpTransport::new(settings.timeout).context("Failed to build the HTTP client")?;

        Self::run_with(settings, Arc::new(transport))
    }

    pub fn run_with(settings: &Settings, transport: Arc<dyn Transport>) -> anyhow::Result<Report> {
        let mut evaluators = Evaluators::default();
        evaluators
            .set_default_language(&settings.language)
            .with_context(|| format!("Cannot use language {}", settings.language))?;

        let plugins = PluginRegistry::with_builtins(&evaluators.languages());
        let loader = Arc::new(Loader::new());

        let mut context = Context::new(transport)
            .with_evaluators(evaluators)
            .with_plugins(plugins)
            .with_documents(loader.clone());

        for (name, value) in settings.bindings.iter() {
            context
                .bind(name, value.clone())
                .with_context(|| format!("Cannot bind {}", name))?;
        }

        let mut report = Report::new();

        for file in settings.files.iter() {
            if context.is_cancelled() {
                info!("Run cancelled, skipping {}", file);
                break;
            }

            debug!("Running {}", file);

            let documents = match loader.load_documents(file) {
                Ok(documents) => documents,
                Err(err) => {
                    error!("{}: {}", file, err);
                    report.add_error(format!("{}: {}", file, err));
                    continue;
                }
            };

            if let Err(err) = context.run_batch(documents) {
                error!("{}: {}", file, err);
                report.add_error(format!("{}: {}", file, err));
            }
        }

        report.calls = context.calls().to_vec();

        Ok(report)
    }
}
