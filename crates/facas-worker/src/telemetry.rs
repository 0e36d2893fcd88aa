//! Structured logging setup (`§6`, AMBIENT STACK).

use facas_core::config::TelemetryConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global `tracing` subscriber once at process startup.
///
/// Level is controlled by `RUST_LOG`, defaulting to `info` when unset.
pub fn init(config: &TelemetryConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();

    tracing::info!(meter_name = %config.meter_name, "telemetry initialized");
}
