//! Lockfile - exact versions last installed
//!
//! `satchel.lock` lives at the project root and records, per plugin, the
//! exact resolved version, the locator the bytes came from and the content
//! integrity digest. Resolution consults it to re-pin installs; every
//! successful install overwrites the plugin's whole entry (entries are never
//! partially written).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::errors::StoreError;

/// Lockfile name at the project root
pub const LOCKFILE_NAME: &str = "satchel.lock";

/// Exact resolved install for one plugin
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockEntry {
    pub version: String,

    /// Locator the package bytes were fetched from
    pub source: String,

    /// Content digest of the fetched package (sha256, hex)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub integrity: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lockfile {
    #[serde(default)]
    plugins: BTreeMap<String, LockEntry>,
}

impl Lockfile {
    /// Path of the lockfile for a project root
    pub fn path(project_root: &Path) -> PathBuf {
        project_root.join(LOCKFILE_NAME)
    }

    /// Load the lockfile, empty when none exists yet
    pub fn load(project_root: &Path) -> Result<Self, StoreError> {
        let path = Self::path(project_root);
        if !path.exists() {
            return Ok(Lockfile::default());
        }

        let content = std::fs::read_to_string(&path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save the lockfile with an atomic write (temp file + rename)
    pub fn save(&self, project_root: &Path) -> Result<(), StoreError> {
        let content = toml::to_string_pretty(self)?;

        let path = Self::path(project_root);
        let temp_path = path.with_extension("lock.tmp");
        {
            let file = std::fs::File::create(&temp_path)?;
            let mut writer = std::io::BufWriter::new(file);
            writer.write_all(content.as_bytes())?;
            writer.flush()?;
        }
        std::fs::rename(&temp_path, &path)?;

        tracing::debug!(plugins = self.plugins.len(), "saved lockfile");
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn is_locked(&self, plugin: &str) -> bool {
        self.plugins.contains_key(plugin)
    }

    pub fn locked_version(&self, plugin: &str) -> Option<&str> {
        self.plugins.get(plugin).map(|entry| entry.version.as_str())
    }

    pub fn locked_entry(&self, plugin: &str) -> Option<&LockEntry> {
        self.plugins.get(plugin)
    }

    /// Replace a plugin's whole entry
    pub fn set_entry(&mut self, plugin: &str, entry: LockEntry) {
        self.plugins.insert(plugin.to_string(), entry);
    }

    pub fn remove_entry(&mut self, plugin: &str) -> Option<LockEntry> {
        self.plugins.remove(plugin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(version: &str) -> LockEntry {
        LockEntry {
            version: version.to_string(),
            source: "https://plugins.example.com/demo".to_string(),
            integrity: "abc123".to_string(),
        }
    }

    #[test]
    fn test_load_missing_is_empty() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let lockfile = Lockfile::load(dir.path());
        assert!(lockfile.is_ok_and(|l| l.is_empty()));
    }

    #[test]
    fn test_roundtrip() {
        let Ok(dir) = TempDir::new() else {
            return;
        };

        let mut lockfile = Lockfile::default();
        lockfile.set_entry("demo", entry("1.2.0"));
        assert!(lockfile.save(dir.path()).is_ok());

        let Ok(loaded) = Lockfile::load(dir.path()) else {
            return;
        };
        assert!(loaded.is_locked("demo"));
        assert_eq!(loaded.locked_version("demo"), Some("1.2.0"));
        assert_eq!(loaded.locked_entry("demo"), Some(&entry("1.2.0")));
        assert!(!loaded.is_locked("other"));
    }

    #[test]
    fn test_set_entry_replaces_whole_entry() {
        let mut lockfile = Lockfile::default();
        lockfile.set_entry("demo", entry("1.2.0"));
        lockfile.set_entry(
            "demo",
            LockEntry {
                version: "1.3.0".to_string(),
                source: "../plugins/demo".to_string(),
                integrity: String::new(),
            },
        );

        let locked = lockfile.locked_entry("demo");
        assert!(locked.is_some_and(|e| e.version == "1.3.0" && e.source == "../plugins/demo"));
    }

    #[test]
    fn test_remove_entry() {
        let mut lockfile = Lockfile::default();
        lockfile.set_entry("demo", entry("1.2.0"));
        assert!(lockfile.remove_entry("demo").is_some());
        assert!(!lockfile.is_locked("demo"));
    }
}
