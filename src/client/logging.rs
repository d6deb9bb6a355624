use super::config::LogLevel;
use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Initialize the process-wide subscriber once. An embedding application
/// that already installed its own subscriber wins; `try_init` failure is
/// not an error.
pub(crate) fn init_logging(level: LogLevel) {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let directives = format!("{},hyper=warn,reqwest=warn,h2=warn", level.as_str());
        let filter = EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new("info"));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .compact()
            .try_init();
    });
}
