//! Tracing/logging initialization.
//!
//! Production output is one JSON object per line with timestamps, filtered by
//! `RUST_LOG` (default `info`). Every `init*` function installs the global
//! subscriber at most once; later calls return `false` and change nothing.

use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "info";

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Initialize JSON logging for the process, filtered by `RUST_LOG`.
pub fn init() -> bool {
    install_json(env_filter(DEFAULT_FILTER))
}

/// Like [`init`], but with explicit filter directives (e.g. `"workshop_infra=debug"`).
/// `RUST_LOG` is ignored.
pub fn init_with_filter(directives: &str) -> bool {
    install_json(EnvFilter::new(directives))
}

/// Compact, human-readable output captured by the test harness.
pub fn init_for_tests() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter("warn"))
        .compact()
        .with_test_writer()
        .try_init()
        .is_ok()
}

fn install_json(filter: EnvFilter) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_a_no_op() {
        init_with_filter("debug");
        assert!(!init());
        assert!(!init_for_tests());
        tracing::info!("still logging after repeated init");
    }
}
