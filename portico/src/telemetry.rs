//! Tracing initialization.
//!
//! Sets up the `tracing` subscriber with an environment filter (`RUST_LOG`)
//! and a compact fmt layer. Request-level spans come from the router's
//! `TraceLayer`; repository methods carry their own `#[instrument]` spans.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global tracing subscriber.
///
/// Defaults to `info` for the crate and `warn` elsewhere when `RUST_LOG` is
/// not set. Safe to call once at startup; a second call returns an error from
/// the subscriber registry, which callers can ignore in tests.
pub fn init_telemetry() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,portico=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| anyhow::anyhow!("initialize tracing subscriber: {e}"))?;

    Ok(())
}
