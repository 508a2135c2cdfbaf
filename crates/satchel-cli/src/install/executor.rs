//! Transactional plan execution
//!
//! Executes one installation plan against the project tree with
//! all-or-nothing intent on a filesystem with no native transactions:
//!
//! 1. scan every destination for conflicts with unmanaged files, before any
//!    mutation (skipped in force mode)
//! 2. create declared directories
//! 3. back up any existing destination file into the run's backup area,
//!    then write/copy over it
//!
//! The accumulated `(original, backup)` pairs live in a per-install
//! [`Transaction`]; on failure the caller replays them in reverse, on
//! success it discards them. Backups sit under `.satchel/backups/`, which
//! the state store keeps out of version control.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use satchel_logger as logger;
use satchel_manifest::{state, StateFile};

use super::error::{ConflictError, InstallError};
use super::plan::InstallationPlan;

/// Per-install transaction context: the plugin being installed and the
/// backups accumulated so far. Reset at the start of every single-plugin
/// install; never shared across plugins.
#[derive(Debug)]
pub struct Transaction {
    pub plugin: String,
    backup_dir: PathBuf,
    backups: Vec<(PathBuf, PathBuf)>,
}

impl Transaction {
    pub fn new(plugin: &str, project_root: &Path) -> Self {
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S%.3f");
        let backup_dir = state::state_dir(project_root)
            .join("backups")
            .join(format!("{stamp}-{plugin}"));
        Transaction {
            plugin: plugin.to_string(),
            backup_dir,
            backups: Vec::new(),
        }
    }

    pub fn backup_count(&self) -> usize {
        self.backups.len()
    }

    /// Restore every backup pair in reverse order, then drop the backup area
    pub fn rollback(&mut self) {
        logger::info(&format!(
            "Rolling back {} file(s) for plugin '{}'",
            self.backups.len(),
            self.plugin
        ));

        for (original, backup) in self.backups.drain(..).rev() {
            if let Err(err) = fs::copy(&backup, &original) {
                logger::warn(&format!(
                    "Failed to restore '{}' from backup: {}",
                    original.display(),
                    err
                ));
                continue;
            }
            let _ = fs::remove_file(&backup);
        }

        let _ = fs::remove_dir_all(&self.backup_dir);
    }

    /// Success path: the backups are no longer needed
    pub fn discard_backups(&mut self) {
        self.backups.clear();
        let _ = fs::remove_dir_all(&self.backup_dir);
    }

    /// Copy a destination file into the backup area before it is replaced
    fn backup_existing(&mut self, relative: &str, destination: &Path) -> Result<(), InstallError> {
        if !destination.exists() {
            return Ok(());
        }

        let backup_path = self.backup_dir.join(relative);
        if let Some(parent) = backup_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(destination, &backup_path)?;
        self.backups.push((destination.to_path_buf(), backup_path));
        Ok(())
    }
}

/// Executes installation plans for the plugin named by the transaction
pub struct Executor<'a> {
    project_root: &'a Path,
    force: bool,
}

impl<'a> Executor<'a> {
    pub fn new(project_root: &'a Path, force: bool) -> Self {
        Executor {
            project_root,
            force,
        }
    }

    /// Apply one plan, recording every created path as managed
    ///
    /// `exclude` holds the previous version of the same plugin's paths, so
    /// re-installs never conflict with themselves.
    pub fn execute(
        &self,
        plan: &InstallationPlan,
        state: &mut StateFile,
        tx: &mut Transaction,
        exclude: &BTreeSet<String>,
    ) -> Result<(), InstallError> {
        if !self.force {
            self.check_conflicts(plan, state, exclude)?;
        }

        for dir in &plan.directories {
            fs::create_dir_all(self.project_root.join(dir))?;
            state.add_directory(&tx.plugin, dir);
        }

        for write in &plan.files {
            let destination = self.project_root.join(&write.path);
            tx.backup_existing(&write.path, &destination)?;
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&destination, &write.contents)?;
            state.add_file(&tx.plugin, &write.path);
        }

        for copy in &plan.copies {
            let destination = self.project_root.join(&copy.dest);
            tx.backup_existing(&copy.dest, &destination)?;
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&copy.source, &destination)?;
            state.add_file(&tx.plugin, &copy.dest);
        }

        Ok(())
    }

    /// Pre-mutation conflict scan: existing on disk, managed by nobody, and
    /// not excluded. Any hit aborts the whole plan before a single write.
    fn check_conflicts(
        &self,
        plan: &InstallationPlan,
        state: &StateFile,
        exclude: &BTreeSet<String>,
    ) -> Result<(), InstallError> {
        let managed = state.all_managed_paths();
        let conflicts: Vec<String> = plan
            .destinations()
            .filter(|relative| {
                self.project_root.join(relative).exists()
                    && !managed.contains(*relative)
                    && !exclude.contains(*relative)
            })
            .map(str::to_string)
            .collect();

        if conflicts.is_empty() {
            Ok(())
        } else {
            Err(ConflictError::new(conflicts).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn plan_writing(path: &str, contents: &str) -> InstallationPlan {
        let mut plan = InstallationPlan::new();
        plan.add_file(path, contents);
        plan
    }

    #[test]
    fn test_execute_records_managed_paths() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let mut state = StateFile::default();
        let mut tx = Transaction::new("demo", dir.path());
        let executor = Executor::new(dir.path(), false);

        let mut plan = InstallationPlan::new();
        plan.add_directory(".claude/skills/hello");
        plan.add_file(".claude/skills/hello/SKILL.md", "content");

        let result = executor.execute(&plan, &mut state, &mut tx, &BTreeSet::new());
        assert!(result.is_ok());
        assert!(dir.path().join(".claude/skills/hello/SKILL.md").is_file());
        assert!(state.is_managed(".claude/skills/hello"));
        assert!(state.is_managed(".claude/skills/hello/SKILL.md"));
        assert_eq!(tx.backup_count(), 0);
    }

    #[test]
    fn test_conflict_detected_before_any_write() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        if fs::write(dir.path().join("existing.md"), "user content").is_err() {
            return;
        }

        let mut state = StateFile::default();
        let mut tx = Transaction::new("demo", dir.path());
        let executor = Executor::new(dir.path(), false);

        let mut plan = InstallationPlan::new();
        plan.add_file("fresh.md", "new");
        plan.add_file("existing.md", "overwrite");

        let result = executor.execute(&plan, &mut state, &mut tx, &BTreeSet::new());
        assert!(matches!(result, Err(InstallError::Conflict(_))));
        if let Err(InstallError::Conflict(conflict)) = result {
            assert_eq!(conflict.paths, vec!["existing.md"]);
        }

        // Nothing on disk changed: no partial writes for this plan
        let untouched = fs::read_to_string(dir.path().join("existing.md")).unwrap_or_default();
        assert_eq!(untouched, "user content");
        assert!(!dir.path().join("fresh.md").exists());
        assert!(!state.is_managed("fresh.md"));
    }

    #[test]
    fn test_exclude_prevents_self_conflict() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        if fs::write(dir.path().join("mine.md"), "v1").is_err() {
            return;
        }

        let mut state = StateFile::default();
        let mut tx = Transaction::new("demo", dir.path());
        let executor = Executor::new(dir.path(), false);

        let mut exclude = BTreeSet::new();
        exclude.insert("mine.md".to_string());

        let plan = plan_writing("mine.md", "v2");
        let result = executor.execute(&plan, &mut state, &mut tx, &exclude);
        assert!(result.is_ok());
        let content = fs::read_to_string(dir.path().join("mine.md")).unwrap_or_default();
        assert_eq!(content, "v2");
        // The overwrite was backed up anyway
        assert_eq!(tx.backup_count(), 1);
    }

    #[test]
    fn test_rollback_restores_bytes() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        if fs::write(dir.path().join("target.md"), "original bytes").is_err() {
            return;
        }

        let mut state = StateFile::default();
        state.add_file("demo", "target.md");
        let mut tx = Transaction::new("demo", dir.path());
        let executor = Executor::new(dir.path(), false);

        let plan = plan_writing("target.md", "replacement");
        assert!(executor
            .execute(&plan, &mut state, &mut tx, &BTreeSet::new())
            .is_ok());
        let replaced = fs::read_to_string(dir.path().join("target.md")).unwrap_or_default();
        assert_eq!(replaced, "replacement");

        tx.rollback();
        let restored = fs::read_to_string(dir.path().join("target.md")).unwrap_or_default();
        assert_eq!(restored, "original bytes");
        assert_eq!(tx.backup_count(), 0);
    }

    #[test]
    fn test_force_bypasses_conflicts_but_still_backs_up() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        if fs::write(dir.path().join("user.md"), "precious").is_err() {
            return;
        }

        let mut state = StateFile::default();
        let mut tx = Transaction::new("demo", dir.path());
        let executor = Executor::new(dir.path(), true);

        let plan = plan_writing("user.md", "forced");
        assert!(executor
            .execute(&plan, &mut state, &mut tx, &BTreeSet::new())
            .is_ok());
        assert_eq!(tx.backup_count(), 1);

        tx.rollback();
        let restored = fs::read_to_string(dir.path().join("user.md")).unwrap_or_default();
        assert_eq!(restored, "precious");
    }

    #[test]
    fn test_discard_backups_clears_backup_area() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        if fs::write(dir.path().join("a.md"), "old").is_err() {
            return;
        }

        let mut state = StateFile::default();
        state.add_file("demo", "a.md");
        let mut tx = Transaction::new("demo", dir.path());
        let executor = Executor::new(dir.path(), false);

        let plan = plan_writing("a.md", "new");
        assert!(executor
            .execute(&plan, &mut state, &mut tx, &BTreeSet::new())
            .is_ok());
        tx.discard_backups();

        assert_eq!(tx.backup_count(), 0);
        assert!(!state::state_dir(dir.path())
            .join("backups")
            .read_dir()
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false));
    }
}
