//! Time utilities
//!
//! Safe wall-clock helpers that never panic on clock skew.

use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

/// Get current Unix timestamp in milliseconds
///
/// Returns 0 if system time is before epoch.
pub fn current_timestamp_millis() -> u64 {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| {
            warn!("System time is before UNIX epoch, using zero duration");
            std::time::Duration::from_secs(0)
        });
    u64::try_from(since_epoch.as_millis()).unwrap_or(u64::MAX)
}
