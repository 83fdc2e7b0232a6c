use log::debug;
use std::env;

pub struct Envs {
    /**
     * Log level
     *
     * Level used when neither --quiet nor --verbose is given.
     * Environment variable: RESTER_LOG
     * Default: info
     */
    pub log: Option<String>,
    /**
     * HTTP timeout in seconds
     *
     * Environment variable: RESTER_TIMEOUT_SECONDS
     * Default: no timeout
     */
    pub timeout_seconds: Option<u64>,
    /**
     * Default expression language
     *
     * Language of bare string conditions and assertions.
     * Environment variable: RESTER_DEFAULT_LANGUAGE
     * Default: rhai
     */
    pub default_language: Option<String>,
}

impl Envs {
    pub fn load() -> Self {
        let log = env::var("RESTER_LOG").ok();

        let timeout_seconds = env::var("RESTER_TIMEOUT_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok());

        let default_language = env::var("RESTER_DEFAULT_LANGUAGE").ok();

        debug!("RESTER_LOG = {:?}", log);
        debug!("RESTER_TIMEOUT_SECONDS = {:?}", timeout_seconds);
        debug!("RESTER_DEFAULT_LANGUAGE = {:?}", default_language);

        Self {
            log,
            timeout_seconds,
            default_language,
        }
    }
}
