pub mod loader;
pub mod log;
pub mod report;
pub mod runtime;
pub mod settings;
pub mod transport;

pub use loader::Loader;
pub use report::Report;
pub use runtime::Runtime;
pub use settings::Settings;
pub use transport::HttpTransport;
