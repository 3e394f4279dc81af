//! Logging setup for host applications.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Install the global subscriber.
///
/// # Arguments
/// * `level` - Filter used when `RUST_LOG` is not set (e.g. "info", "clinic_billing_core=debug")
/// * `json_format` - JSON lines instead of human-readable output
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(level: &str, json_format: bool) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    let layer = if json_format {
        fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer().with_target(true).with_ansi(true).boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layer)
        .try_init()?;

    tracing::info!(level = %level, json = json_format, "Logging initialized");
    Ok(())
}
