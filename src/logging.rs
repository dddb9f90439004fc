//! Logging setup for the `tryon` binary.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the application. `RUST_LOG` takes precedence over the level passed in.

use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a global subscriber writing to stderr.
///
/// Returns `false` when a subscriber was already installed, which is common
/// in tests.
pub fn init_logging(log_level: &str, json_format: bool) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let subscriber = tracing_subscriber::registry().with(env_filter);

    let result = if json_format {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };

    if result.is_err() {
        return false;
    }
    info!(
        level = log_level,
        format = if json_format { "json" } else { "text" },
        "logging initialized"
    );
    true
}
