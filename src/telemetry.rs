//! Optional structured tracing (cargo feature `telemetry`).
//!
//! Enabled when `EXTEDIT_TRACING_FMT=1` or `RUST_LOG` is set. Without the feature
//! `telemetry_init` is a no-op and only the stderr helpers in `color.rs` are used.

#[cfg(feature = "telemetry")]
use once_cell::sync::OnceCell;

#[cfg(feature = "telemetry")]
static INIT: OnceCell<()> = OnceCell::new();

/// Guard returned by `telemetry_init`; kept alive for the duration of `main`.
#[derive(Debug)]
pub struct TelemetryGuard {
    _private: (),
}

#[cfg(feature = "telemetry")]
fn telemetry_enabled_env() -> bool {
    let fmt = std::env::var("EXTEDIT_TRACING_FMT").ok().as_deref() == Some("1");
    let rust_log = std::env::var("RUST_LOG")
        .ok()
        .map(|s| !s.trim().is_empty())
        .unwrap_or(false);
    fmt || rust_log
}

#[cfg(feature = "telemetry")]
pub fn telemetry_init() -> Option<TelemetryGuard> {
    use tracing_subscriber::prelude::*;

    if INIT.get().is_some() || !telemetry_enabled_env() {
        return None;
    }

    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string());
    let env_filter = tracing_subscriber::EnvFilter::new(filter);
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    if tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .is_err()
    {
        eprintln!("extedit: telemetry init skipped (global subscriber already set)");
        return None;
    }

    let _ = INIT.set(());
    Some(TelemetryGuard { _private: () })
}

#[cfg(not(feature = "telemetry"))]
pub fn telemetry_init() -> Option<TelemetryGuard> {
    None
}
