//! Descriptor validation
//!
//! Validates module descriptors for structure before resolution.

use tracing::{debug, warn};

use crate::module::descriptor::ModuleDescriptor;
use crate::module::traits::ModuleError;

/// Validation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Descriptor is valid
    Valid,
    /// Descriptor is invalid with specific errors
    Invalid(Vec<String>),
}

impl ValidationResult {
    /// Convert into a `Result`, joining all messages
    pub fn into_result(self) -> Result<(), ModuleError> {
        match self {
            ValidationResult::Valid => Ok(()),
            ValidationResult::Invalid(errors) => {
                Err(ModuleError::InvalidManifest(errors.join("; ")))
            }
        }
    }
}

/// Descriptor validator
pub struct DescriptorValidator {
    /// Maximum module name length
    max_name_len: usize,
}

impl DescriptorValidator {
    /// Create a new descriptor validator
    pub fn new() -> Self {
        Self { max_name_len: 64 }
    }

    /// Validate a module descriptor.
    ///
    /// Only the shape of the descriptor is checked. Graph problems, a module
    /// depending on itself included, are left to the resolver, which reports
    /// them as cycles.
    pub fn validate(&self, descriptor: &ModuleDescriptor) -> ValidationResult {
        let mut errors = Vec::new();

        if descriptor.name.is_empty() {
            errors.push("Module name cannot be empty".to_string());
        } else if !self.is_valid_name(&descriptor.name) {
            errors.push(format!(
                "Invalid module name: {} (must be alphanumeric with dashes/underscores, at most {} chars)",
                descriptor.name, self.max_name_len
            ));
        }

        if let Some(version) = &descriptor.version {
            if !self.is_valid_version(version) {
                errors.push(format!(
                    "Invalid version format: {} (expected semantic versioning)",
                    version
                ));
            }
        }

        for dep in descriptor
            .hard_dependencies
            .iter()
            .chain(descriptor.soft_dependencies.iter())
        {
            if !self.is_valid_name(dep) {
                errors.push(format!("Invalid dependency name: {}", dep));
            }
        }

        if errors.is_empty() {
            debug!(module = %descriptor.name, "Descriptor validation passed");
            ValidationResult::Valid
        } else {
            warn!(
                module = %descriptor.name,
                ?errors,
                "Descriptor validation failed"
            );
            ValidationResult::Invalid(errors)
        }
    }

    /// Validate module name format
    #[inline]
    fn is_valid_name(&self, name: &str) -> bool {
        if name.is_empty() || name.len() > self.max_name_len {
            return false;
        }

        if !name.chars().next().map_or(false, |c| c.is_alphanumeric()) {
            return false;
        }

        name.chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    }

    /// Accepts: major.minor[.patch][-prerelease][+build]
    #[inline]
    fn is_valid_version(&self, version: &str) -> bool {
        let base = version.split('+').next().unwrap_or_default();
        let version_part = base.split('-').next().unwrap_or_default();

        let nums: Vec<&str> = version_part.split('.').collect();
        if nums.len() < 2 || nums.len() > 3 {
            return false;
        }

        nums.iter().all(|n| {
            !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()) && n.parse::<u32>().is_ok()
        })
    }
}

impl Default for DescriptorValidator {
    fn default() -> Self {
        Self::new()
    }
}
