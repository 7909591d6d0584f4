//! Error handling utilities for graceful degradation
//!
//! Helpers for logging failures of non-critical operations and for turning
//! caught panics into readable messages.

use std::any::Any;
use tracing::warn;

/// Execute an operation and log errors without failing
///
/// Returns `Some(T)` on success, `None` on error (after logging).
pub fn log_error<F, T, E>(operation: F, context: &str) -> Option<T>
where
    F: FnOnce() -> Result<T, E>,
    E: std::fmt::Display,
{
    match operation() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("{}: {}", context, e);
            None
        }
    }
}

/// Execute an async operation and log errors without failing
///
/// Returns `Some(T)` on success, `None` on error (after logging).
pub async fn log_error_async<F, Fut, T, E>(operation: F, context: &str) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    match operation().await {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("{}: {}", context, e);
            None
        }
    }
}

/// Extract the message from a caught panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_error_swallows_failure() {
        let ok: Option<u32> = log_error(|| Ok::<_, String>(7), "never logged");
        assert_eq!(ok, Some(7));
        let failed: Option<u32> = log_error(|| Err("boom".to_string()), "operation failed");
        assert_eq!(failed, None);
    }

    #[test]
    fn test_panic_message() {
        let caught = std::panic::catch_unwind(|| panic!("hook exploded")).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "hook exploded");

        let caught = std::panic::catch_unwind(|| panic!("{} failed", "reload")).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "reload failed");
    }
}
