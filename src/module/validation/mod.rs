//! Module validation framework
//!
//! Validates module descriptors before they reach the resolver: name format,
//! version format and dependency names.

pub mod descriptor_validator;

pub use descriptor_validator::{DescriptorValidator, ValidationResult};
