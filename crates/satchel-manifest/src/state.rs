//! Install state - the record of what satchel manages
//!
//! The state file maps each installed plugin to every file path, directory
//! and side-effect registration (MCP server names, granted permission
//! patterns) satchel created on its behalf. It is the sole source of truth
//! for "is this path managed": the conflict scan, the stale-file cleanup and
//! `satchel remove` all read it, and nothing else may claim a managed path.
//!
//! All paths are stored relative to the project root, with forward slashes.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::errors::StoreError;

/// Directory under the project root holding satchel's own files
pub const STATE_DIR_NAME: &str = ".satchel";

/// State file name inside [`STATE_DIR_NAME`]
pub const STATE_FILE_NAME: &str = "state.toml";

/// Per-plugin managed file set and side-effect registrations
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PluginState {
    /// Version recorded at install time, for display purposes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub directories: Vec<String>,

    /// Names of auxiliary (MCP) server entries attributed to this plugin
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mcp_servers: Vec<String>,

    /// Permission patterns granted on this plugin's behalf
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
}

impl PluginState {
    /// All managed paths (files and directories) of this plugin
    pub fn paths(&self) -> BTreeSet<String> {
        self.files
            .iter()
            .chain(self.directories.iter())
            .cloned()
            .collect()
    }
}

/// The persisted state file, keyed by plugin name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    pub version: String,
    pub generated_at: String,

    #[serde(default)]
    plugins: BTreeMap<String, PluginState>,
}

impl Default for StateFile {
    fn default() -> Self {
        StateFile {
            version: "1".to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            plugins: BTreeMap::new(),
        }
    }
}

/// The satchel-owned directory for a project root
pub fn state_dir(project_root: &Path) -> PathBuf {
    project_root.join(STATE_DIR_NAME)
}

impl StateFile {
    /// Path of the state file for a project root
    pub fn path(project_root: &Path) -> PathBuf {
        state_dir(project_root).join(STATE_FILE_NAME)
    }

    /// Load the state for a project root, empty when no file exists yet
    pub fn load(project_root: &Path) -> Result<Self, StoreError> {
        let path = Self::path(project_root);
        if !path.exists() {
            return Ok(StateFile::default());
        }

        let content = std::fs::read_to_string(&path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save the state with an atomic write (temp file + rename)
    ///
    /// Also drops a `.gitignore` into the state directory so backups and
    /// scratch space never end up under version control.
    pub fn save(&self, project_root: &Path) -> Result<(), StoreError> {
        let dir = state_dir(project_root);
        std::fs::create_dir_all(&dir)?;

        let gitignore = dir.join(".gitignore");
        if !gitignore.exists() {
            std::fs::write(&gitignore, "backups/\nscratch/\n")?;
        }

        let mut stamped = self.clone();
        stamped.generated_at = chrono::Utc::now().to_rfc3339();
        let content = toml::to_string_pretty(&stamped)?;

        let path = Self::path(project_root);
        let temp_path = path.with_extension("toml.tmp");
        {
            let file = std::fs::File::create(&temp_path)?;
            let mut writer = std::io::BufWriter::new(file);
            writer.write_all(content.as_bytes())?;
            writer.flush()?;
        }
        std::fs::rename(&temp_path, &path)?;

        tracing::debug!(plugins = self.plugins.len(), "saved state file");
        Ok(())
    }

    /// Managed entry for one plugin
    pub fn plugin(&self, name: &str) -> Option<&PluginState> {
        self.plugins.get(name)
    }

    /// Installed plugin names, sorted
    pub fn plugin_names(&self) -> Vec<String> {
        self.plugins.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    fn entry(&mut self, plugin: &str) -> &mut PluginState {
        self.plugins.entry(plugin.to_string()).or_default()
    }

    /// Record the installed version for display
    pub fn set_version(&mut self, plugin: &str, version: &str) {
        self.entry(plugin).version = Some(version.to_string());
    }

    /// Detach a path from every plugin except `owner`
    ///
    /// A path belongs to at most one plugin at a time; whoever wrote it
    /// last owns it.
    fn detach_path(&mut self, owner: &str, relative_path: &str) {
        for (name, entry) in &mut self.plugins {
            if name != owner {
                entry.files.retain(|f| f != relative_path);
                entry.directories.retain(|d| d != relative_path);
            }
        }
    }

    /// Record a file as managed by a plugin
    pub fn add_file(&mut self, plugin: &str, relative_path: &str) {
        self.detach_path(plugin, relative_path);
        let entry = self.entry(plugin);
        let path = relative_path.to_string();
        if !entry.files.contains(&path) {
            entry.files.push(path);
        }
    }

    /// Record a directory as managed by a plugin
    pub fn add_directory(&mut self, plugin: &str, relative_path: &str) {
        self.detach_path(plugin, relative_path);
        let entry = self.entry(plugin);
        let path = relative_path.to_string();
        if !entry.directories.contains(&path) {
            entry.directories.push(path);
        }
    }

    /// Record an auxiliary (MCP) server registration for a plugin
    pub fn add_mcp_server(&mut self, plugin: &str, server_name: &str) {
        let entry = self.entry(plugin);
        let name = server_name.to_string();
        if !entry.mcp_servers.contains(&name) {
            entry.mcp_servers.push(name);
        }
    }

    /// Record a granted permission pattern for a plugin
    pub fn add_permission(&mut self, plugin: &str, pattern: &str) {
        let entry = self.entry(plugin);
        let pattern = pattern.to_string();
        if !entry.permissions.contains(&pattern) {
            entry.permissions.push(pattern);
        }
    }

    /// Remove a plugin's entry entirely, returning the old state
    ///
    /// Re-installation clears the previous entry first so the new managed
    /// set is computed from scratch; the returned snapshot feeds the
    /// conflict-exclusion set and the stale-file cleanup.
    pub fn remove_plugin(&mut self, plugin: &str) -> Option<PluginState> {
        self.plugins.remove(plugin)
    }

    /// Restore a previously removed entry (rollback path)
    pub fn restore_plugin(&mut self, plugin: &str, state: PluginState) {
        self.plugins.insert(plugin.to_string(), state);
    }

    /// Every managed path across all plugins, flattened
    pub fn all_managed_paths(&self) -> BTreeSet<String> {
        self.plugins
            .values()
            .flat_map(|entry| entry.paths())
            .collect()
    }

    /// Whether any plugin manages the given relative path
    pub fn is_managed(&self, relative_path: &str) -> bool {
        self.plugins.values().any(|entry| {
            entry.files.iter().any(|f| f == relative_path)
                || entry.directories.iter().any(|d| d == relative_path)
        })
    }

    /// Permission patterns granted for `plugin` that no other plugin also
    /// references, i.e. exactly the ones safe to revoke when it is removed
    pub fn revocable_permissions(&self, plugin: &str) -> Vec<String> {
        let Some(entry) = self.plugins.get(plugin) else {
            return Vec::new();
        };

        entry
            .permissions
            .iter()
            .filter(|pattern| {
                !self
                    .plugins
                    .iter()
                    .any(|(other, state)| other != plugin && state.permissions.contains(pattern))
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_is_empty() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let state = StateFile::load(dir.path());
        assert!(state.is_ok_and(|s| s.is_empty()));
    }

    #[test]
    fn test_roundtrip() {
        let Ok(dir) = TempDir::new() else {
            return;
        };

        let mut state = StateFile::default();
        state.set_version("demo", "1.0.0");
        state.add_file("demo", ".claude/skills/hello/SKILL.md");
        state.add_directory("demo", ".claude/skills/hello");
        state.add_mcp_server("demo", "demo-db");
        state.add_permission("demo", "skill:demo:*");

        assert!(state.save(dir.path()).is_ok());

        let Ok(loaded) = StateFile::load(dir.path()) else {
            return;
        };
        let entry = loaded.plugin("demo").cloned().unwrap_or_default();
        assert_eq!(entry.version.as_deref(), Some("1.0.0"));
        assert_eq!(entry.files, vec![".claude/skills/hello/SKILL.md"]);
        assert_eq!(entry.mcp_servers, vec!["demo-db"]);
        assert!(loaded.is_managed(".claude/skills/hello/SKILL.md"));
        assert!(loaded.is_managed(".claude/skills/hello"));
        assert!(!loaded.is_managed("CLAUDE.md"));
    }

    #[test]
    fn test_save_writes_gitignore() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let state = StateFile::default();
        assert!(state.save(dir.path()).is_ok());

        let gitignore = state_dir(dir.path()).join(".gitignore");
        let content = std::fs::read_to_string(gitignore).unwrap_or_default();
        assert!(content.contains("backups/"));
    }

    #[test]
    fn test_all_managed_paths_flattens_plugins() {
        let mut state = StateFile::default();
        state.add_file("a", "x.md");
        state.add_directory("a", "dir-a");
        state.add_file("b", "y.md");

        let all = state.all_managed_paths();
        assert_eq!(all.len(), 3);
        assert!(all.contains("x.md"));
        assert!(all.contains("dir-a"));
        assert!(all.contains("y.md"));
    }

    #[test]
    fn test_remove_plugin_returns_snapshot() {
        let mut state = StateFile::default();
        state.add_file("demo", "x.md");

        let snapshot = state.remove_plugin("demo");
        assert!(snapshot.is_some_and(|s| s.files == vec!["x.md"]));
        assert!(!state.is_managed("x.md"));
        assert!(state.remove_plugin("demo").is_none());
    }

    #[test]
    fn test_path_belongs_to_one_plugin_at_a_time() {
        let mut state = StateFile::default();
        state.add_file("a", "shared.md");
        state.add_file("b", "shared.md");

        let a = state.plugin("a").cloned().unwrap_or_default();
        let b = state.plugin("b").cloned().unwrap_or_default();
        assert!(a.files.is_empty());
        assert_eq!(b.files, vec!["shared.md"]);
    }

    #[test]
    fn test_revocable_permissions_excludes_shared() {
        let mut state = StateFile::default();
        state.add_permission("a", "skill:shared:*");
        state.add_permission("a", "skill:a-only:*");
        state.add_permission("b", "skill:shared:*");

        assert_eq!(state.revocable_permissions("a"), vec!["skill:a-only:*"]);
        assert_eq!(state.revocable_permissions("b"), Vec::<String>::new());
        assert_eq!(state.revocable_permissions("missing"), Vec::<String>::new());
    }
}
