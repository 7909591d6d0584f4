//! Module manifest parsing
//!
//! A manifest is a TOML document listing module declarations:
//!
//! ```toml
//! [[module]]
//! name = "core"
//! version = "1.0.0"
//! priority = "highest"
//!
//! [[module]]
//! name = "data"
//! depends = ["core"]
//! soft_depends = ["analytics"]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::module::descriptor::ModuleDescriptor;
use crate::module::traits::{ModuleError, Priority};

/// One `[[module]]` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Module name
    pub name: String,
    /// Module version (semantic versioning)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Hard dependencies
    #[serde(default)]
    pub depends: BTreeSet<String>,
    /// Soft dependencies
    #[serde(default)]
    pub soft_depends: BTreeSet<String>,
    /// Load priority
    #[serde(default)]
    pub priority: Priority,
}

impl From<&ManifestEntry> for ModuleDescriptor {
    fn from(entry: &ManifestEntry) -> Self {
        ModuleDescriptor {
            name: entry.name.clone(),
            version: entry.version.clone(),
            description: entry.description.clone(),
            hard_dependencies: entry.depends.clone(),
            soft_dependencies: entry.soft_depends.clone(),
            priority: entry.priority,
        }
    }
}

impl From<&ModuleDescriptor> for ManifestEntry {
    fn from(descriptor: &ModuleDescriptor) -> Self {
        ManifestEntry {
            name: descriptor.name.clone(),
            version: descriptor.version.clone(),
            description: descriptor.description.clone(),
            depends: descriptor.hard_dependencies.clone(),
            soft_depends: descriptor.soft_dependencies.clone(),
            priority: descriptor.priority,
        }
    }
}

/// Parsed manifest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleManifest {
    #[serde(rename = "module", default)]
    pub modules: Vec<ManifestEntry>,
}

impl ModuleManifest {
    /// Load manifest from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ModuleError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ModuleError::InvalidManifest(format!("Failed to read manifest file: {}", e))
        })?;
        Self::parse(&contents)
    }

    /// Parse manifest TOML
    pub fn parse(contents: &str) -> Result<Self, ModuleError> {
        let manifest: ModuleManifest = toml::from_str(contents).map_err(|e| {
            ModuleError::InvalidManifest(format!("Failed to parse manifest TOML: {}", e))
        })?;

        if let Some(entry) = manifest.modules.iter().find(|m| m.name.trim().is_empty()) {
            return Err(ModuleError::InvalidManifest(format!(
                "Module name cannot be empty (entry with depends {:?})",
                entry.depends
            )));
        }

        Ok(manifest)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ModuleError> {
        toml::to_string_pretty(self).map_err(|e| {
            ModuleError::InvalidManifest(format!("Failed to serialize manifest: {}", e))
        })
    }

    /// Build a manifest from descriptors
    pub fn from_descriptors<'a, I>(descriptors: I) -> Self
    where
        I: IntoIterator<Item = &'a ModuleDescriptor>,
    {
        Self {
            modules: descriptors.into_iter().map(ManifestEntry::from).collect(),
        }
    }

    /// Descriptors in manifest order
    pub fn descriptors(&self) -> Vec<ModuleDescriptor> {
        self.modules.iter().map(ModuleDescriptor::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [[module]]
        name = "core"
        version = "1.0.0"
        priority = "highest"

        [[module]]
        name = "data"
        depends = ["core"]

        [[module]]
        name = "feature"
        depends = ["data"]
        soft_depends = ["analytics"]
        priority = "low"
    "#;

    #[test]
    fn test_parse_manifest() {
        let manifest = ModuleManifest::parse(SAMPLE).unwrap();
        let descriptors = manifest.descriptors();
        assert_eq!(descriptors.len(), 3);
        assert_eq!(descriptors[0].priority, Priority::Highest);
        assert_eq!(descriptors[1].priority, Priority::Normal);
        assert!(descriptors[2].hard_dependencies.contains("data"));
        assert!(descriptors[2].soft_dependencies.contains("analytics"));
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = ModuleManifest::parse("[[module]]\nname = \"\"\n").unwrap_err();
        assert!(matches!(err, ModuleError::InvalidManifest(_)));
    }

    #[test]
    fn test_unknown_priority_rejected() {
        let err = ModuleManifest::parse("[[module]]\nname = \"a\"\npriority = \"urgent\"\n")
            .unwrap_err();
        assert!(matches!(err, ModuleError::InvalidManifest(_)));
    }

    #[test]
    fn test_to_toml_preserves_descriptors() {
        let manifest = ModuleManifest::parse(SAMPLE).unwrap();
        let rendered = manifest.to_toml().unwrap();
        let reparsed = ModuleManifest::parse(&rendered).unwrap();
        assert_eq!(reparsed.descriptors(), manifest.descriptors());
    }
}
