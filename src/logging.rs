//! Tracing subscriber setup driven by [`LoggingConfig`].
//!
//! `RUST_LOG` takes precedence over the configured level, so deployments can
//! raise verbosity without touching configuration files.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install a global tracing subscriber. Safe to call more than once; later
/// calls are ignored (useful in tests where several servers share a
/// process).
pub fn init(config: &LoggingConfig) {
    if !config.log_to_console {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string().to_lowercase()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    // A subscriber may already be installed by the host application.
    let _ = result;
}
