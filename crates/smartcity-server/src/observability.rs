//! Log subscriber setup.
//!
//! Tracing starts at a fixed level before the config is read, then
//! [`apply_logging_level`] swaps in the configured filter through a reload
//! handle.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

type FilterHandle = reload::Handle<EnvFilter, Registry>;

static FILTER_HANDLE: OnceLock<FilterHandle> = OnceLock::new();

fn rust_log_is_set() -> bool {
    std::env::var_os("RUST_LOG").is_some()
}

pub fn init_tracing() {
    init_tracing_with_level("info");
}

/// Install the global subscriber. `RUST_LOG` overrides `level` when set.
/// Calling this twice keeps the first subscriber.
pub fn init_tracing_with_level(level: &str) {
    let filter = if rust_log_is_set() {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    };

    let (filter_layer, handle) = reload::Layer::new(filter);
    if FILTER_HANDLE.set(handle).is_err() {
        return;
    }

    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_target(true))
        .try_init();
}

/// Switch to the configured level. No-op when `RUST_LOG` is set or tracing
/// was never initialised.
pub fn apply_logging_level(level: &str) {
    if rust_log_is_set() {
        return;
    }
    let Some(handle) = FILTER_HANDLE.get() else {
        return;
    };
    if let Err(e) = handle.modify(|filter| *filter = EnvFilter::new(level)) {
        tracing::warn!(error = %e, level = %level, "failed to apply logging level");
    }
}
