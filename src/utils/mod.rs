//! Utility modules shared by the module host

pub mod error;
pub mod logging;
pub mod time;

// Re-export commonly used items
pub use error::{log_error, log_error_async, panic_message};
pub use logging::{init_logging, init_logging_from_config};
#[cfg(feature = "json-logging")]
pub use logging::init_json_logging;
pub use time::current_timestamp_millis;
