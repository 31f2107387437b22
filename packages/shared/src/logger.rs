//! Logging setup for the study room binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Both the server library crate and the binary log at `default_log_level`
/// unless `RUST_LOG` is set, in which case it takes precedence.
///
/// # Arguments
///
/// * `binary_name` - The name of the binary (e.g., "studyroom_server")
/// * `default_log_level` - The default log level (e.g., "debug", "info")
///
/// # Examples
///
/// ```no_run
/// use studyroom_shared::logger::setup_logger;
///
/// setup_logger("studyroom_server", "info");
/// ```
pub fn setup_logger(binary_name: &str, default_log_level: &str) {
    let binary_target = binary_name.replace('-', "_");
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "studyroom_server={level},studyroom_shared={level},{binary}={level},tower_http={level}",
                    level = default_log_level,
                    binary = binary_target,
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}
