//! Tracing setup for applications embedding FlashMC.
//!
//! The library itself only emits `tracing` events; installing a subscriber is
//! left to the host. [`init_tracing`] is the stock choice.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs a global fmt subscriber filtered by `RUST_LOG`.
///
/// `default_directive` (e.g. `"info"` or `"flashmc=debug"`) applies when
/// `RUST_LOG` is unset or invalid.
///
/// # Errors
///
/// Returns an error if the directive does not parse or a global subscriber
/// is already installed.
pub fn init_tracing(default_directive: &str) -> anyhow::Result<()> {
    let env_filter = create_env_filter(default_directive)?;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .with(env_filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))
}

fn create_env_filter(default_directive: &str) -> anyhow::Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {e}"))
}
