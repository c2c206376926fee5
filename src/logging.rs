//! Tracing subscriber setup.
//!
//! The library only emits `tracing` events. Applications (and tests that want
//! output) call [`init`] once to print them.

use tracing_subscriber::EnvFilter;

use crate::config::Settings;

/// Installs a formatting subscriber filtered by `RUST_LOG`, falling back to
/// `logging.level` (or `debug` when `settings.debug` is set).
///
/// # Returns
/// `false` if a global subscriber was already installed.
pub fn init(settings: &Settings) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(settings));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}

fn default_filter(settings: &Settings) -> EnvFilter {
    EnvFilter::new(default_directive(settings))
}

fn default_directive(settings: &Settings) -> &str {
    if settings.debug {
        "debug"
    } else {
        &settings.logging.level
    }
}
