//! Structured logging with `tracing`.
//!
//! - [`init_subscriber`] installs the global stderr subscriber, compact or JSON
//! - [`capture_logs`] installs a thread-local capturing subscriber for tests
//!
//! `RUST_LOG` always wins over the configured level.

#![deny(unsafe_code)]

pub mod test_utils;

pub use hubrelay_settings::LogFormat;
pub use test_utils::{CapturedLogs, capture_logs};

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber writing to stderr.
///
/// Call once at startup. Subsequent calls are no-ops.
pub fn init_subscriber(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    // try_init is a no-op if a global subscriber is already set
    let _ = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
    };
}
