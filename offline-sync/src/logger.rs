//! Tracing setup
//!
//! `RUST_LOG` wins when set. Otherwise the configured filter is used, and
//! without one debug builds log this crate at debug and everything else at
//! info.

use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn default_filter() -> EnvFilter {
    if cfg!(debug_assertions) {
        EnvFilter::new("offline_sync=debug,info")
    } else {
        EnvFilter::new("info")
    }
}

/// Install the global subscriber. Does nothing if one is already set.
pub fn init(directive: Option<&str>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match directive {
        Some(directive) => EnvFilter::try_new(directive).unwrap_or_else(|_| default_filter()),
        None => default_filter(),
    });

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Elapsed time for log lines, e.g. `850ms` or `2.41s`.
pub fn fmt_elapsed(elapsed: Duration) -> String {
    if elapsed < Duration::from_secs(1) {
        format!("{}ms", elapsed.as_millis())
    } else {
        format!("{:.2}s", elapsed.as_secs_f64())
    }
}
