//! Module loading system
//!
//! Handles module construction and first-time registration.

pub mod loader;

pub use loader::{ModuleLoader, PackageScan};
