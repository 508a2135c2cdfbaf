//! Project configuration for the satchel CLI
//!
//! A project opts into satchel by carrying a `satchel.toml` at its root:
//!
//! ```toml
//! [project]
//! platform = "claude"
//! default_registry = "https://plugins.example.com"
//!
//! [registries]
//! internal = "https://registry.internal.example.com"
//! local = "~/plugin-registry"
//!
//! [plugins]
//! code-review = "^1.0"
//! deploy-helper = { version = "2.1.0", registry = "internal" }
//! scratch = { source = "../plugins/scratch" }
//! ```
//!
//! Plugin entries are either a bare version requirement string or a table
//! with `version`, `source` and `registry` fields. `source` bypasses the
//! registry lookup entirely and names the package bytes directly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the project configuration file
pub const CONFIG_FILE_NAME: &str = "satchel.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse {CONFIG_FILE_NAME}: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize {CONFIG_FILE_NAME}: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// A requested plugin install, as declared in `satchel.toml` or on the
/// command line. Exactly one resolution path applies: a direct `source`
/// locator, or a registry lookup (named, literal URL, or project default).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PluginSpec {
    /// Exact version or version requirement (e.g. "1.2.0", "^1.0")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Direct locator for the package bytes (path, URL, git+..., s3://...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Named registry or literal registry URL to resolve against
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
}

impl PluginSpec {
    /// Spec pinned to an exact version string
    pub fn version(version: impl Into<String>) -> Self {
        PluginSpec {
            version: Some(version.into()),
            ..Default::default()
        }
    }

    /// Spec resolved from a direct source locator
    pub fn source(source: impl Into<String>) -> Self {
        PluginSpec {
            source: Some(source.into()),
            ..Default::default()
        }
    }
}

/// Serde shape for plugin entries: either `"^1.0"` or a full table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum SpecEntry {
    Version(String),
    Full(PluginSpec),
}

impl From<SpecEntry> for PluginSpec {
    fn from(entry: SpecEntry) -> Self {
        match entry {
            SpecEntry::Version(version) => PluginSpec::version(version),
            SpecEntry::Full(spec) => spec,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSection {
    /// Host platform the installed files are shaped for
    #[serde(default = "default_platform")]
    pub platform: String,

    /// Registry consulted when a spec names neither a source nor a registry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_registry: Option<String>,
}

impl Default for ProjectSection {
    fn default() -> Self {
        ProjectSection {
            platform: default_platform(),
            default_registry: None,
        }
    }
}

fn default_platform() -> String {
    "claude".to_string()
}

/// Parsed `satchel.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub project: ProjectSection,

    /// Named registry table: name -> base locator
    #[serde(default)]
    pub registries: BTreeMap<String, String>,

    #[serde(default)]
    plugins: BTreeMap<String, SpecEntry>,
}

impl ProjectConfig {
    /// Path of the configuration file for a project root
    pub fn path(project_root: &Path) -> PathBuf {
        project_root.join(CONFIG_FILE_NAME)
    }

    /// Load the configuration for a project root, defaulting when the file
    /// does not exist
    pub fn load(project_root: &Path) -> Result<Self, ConfigError> {
        let path = Self::path(project_root);
        if !path.exists() {
            return Ok(ProjectConfig::default());
        }

        let content = fs::read_to_string(&path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save the configuration back to the project root
    pub fn save(&self, project_root: &Path) -> Result<(), ConfigError> {
        let path = Self::path(project_root);
        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// Whether the project carries a `satchel.toml`
    pub fn exists(project_root: &Path) -> bool {
        Self::path(project_root).exists()
    }

    /// Declared plugin specs, sorted by name
    pub fn plugins(&self) -> Vec<(String, PluginSpec)> {
        self.plugins
            .iter()
            .map(|(name, entry)| (name.clone(), entry.clone().into()))
            .collect()
    }

    /// Declared spec for a single plugin, if any
    pub fn plugin_spec(&self, name: &str) -> Option<PluginSpec> {
        self.plugins.get(name).map(|entry| entry.clone().into())
    }

    /// Declare or replace a plugin spec
    pub fn set_plugin_spec(&mut self, name: &str, spec: PluginSpec) {
        self.plugins
            .insert(name.to_string(), SpecEntry::Full(spec));
    }

    /// Look up a named registry's base locator
    pub fn registry_url(&self, name: &str) -> Option<&str> {
        self.registries.get(name).map(String::as_str)
    }

    /// The registry used when a spec names neither source nor registry
    pub fn default_registry(&self) -> Option<&str> {
        self.project.default_registry.as_deref()
    }
}
