use log::LevelFilter;
use tracing_core::LevelFilter as TracingLevel;
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::Layer;
use tracing_subscriber::{fmt, Registry};

fn tracing_level(level: LevelFilter) -> TracingLevel {
    match level {
        LevelFilter::Off => TracingLevel::OFF,
        LevelFilter::Error => TracingLevel::ERROR,
        LevelFilter::Warn => TracingLevel::WARN,
        LevelFilter::Info => TracingLevel::INFO,
        LevelFilter::Debug => TracingLevel::DEBUG,
        LevelFilter::Trace => TracingLevel::TRACE,
    }
}

/// `log` records go through env_logger, call spans and stage events through
/// a tracing fmt layer; both use `level`.
pub fn init_logging(level: LevelFilter) {
    if let Err(err) = env_logger::Builder::new().filter_level(level).try_init() {
        eprintln!("Logger already initialised: {}", err);
    }

    init_tracing(level);
}

pub fn init_tracing(level: LevelFilter) {
    let subscriber = Registry::default().with(fmt::layer().with_filter(tracing_level(level)));

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        log::debug!("Tracing subscriber not installed: {}", err);
    }
}
