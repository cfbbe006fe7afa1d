//! Tracing subscriber setup for the binary.
//!
//! Library code only emits `tracing` events; installing a subscriber is left
//! to whoever owns the process.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Builds the filter: `RUST_LOG` when set, otherwise `base_level` for this
/// crate with quieter HTTP dependencies.
pub fn env_filter(base_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "meal_benefit_engine={base_level},tower=warn,hyper=warn,reqwest=warn,axum={base_level}"
        ))
    })
}

/// Installs a formatted subscriber. Calling it twice is harmless.
pub fn init_tracing(base_level: &str) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(base_level))
        .with(fmt::layer().with_target(true))
        .try_init();
}
