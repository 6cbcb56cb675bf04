//! Utility functions for UUID generation and timestamp handling.

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

/// Generates a new v4 UUID for execution identifiers.
#[must_use]
pub fn generate_uuid() -> Uuid {
    Uuid::new_v4()
}

/// Returns the current time as an RFC3339 timestamp string.
#[must_use]
pub fn iso_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Formats a datetime as an RFC3339 timestamp string.
#[must_use]
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Installs the global tracing subscriber, filtered by `RUST_LOG`.
///
/// Idempotent; a second call is a no-op so embedders that already
/// installed a subscriber keep theirs.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
