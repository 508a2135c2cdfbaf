//! Error types for the installation core

use thiserror::Error;

use satchel_manifest::{DescriptorError, StoreError};

use crate::render::RenderFailure;

/// How many conflicting paths a conflict message lists before truncating
pub const CONFLICT_PREVIEW_LIMIT: usize = 5;

/// Pre-write conflict: the plan would touch existing files satchel does not
/// manage. Raised before any mutation, so there is nothing to roll back.
#[derive(Debug, Clone)]
pub struct ConflictError {
    /// Offending relative paths (capped preview)
    pub paths: Vec<String>,
    /// How many further conflicts were truncated from the preview
    pub remainder: usize,
}

impl ConflictError {
    pub fn new(mut all_paths: Vec<String>) -> Self {
        let remainder = all_paths.len().saturating_sub(CONFLICT_PREVIEW_LIMIT);
        all_paths.truncate(CONFLICT_PREVIEW_LIMIT);
        ConflictError {
            paths: all_paths,
            remainder,
        }
    }
}

impl std::fmt::Display for ConflictError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "existing unmanaged files would be overwritten: {}",
            self.paths.join(", ")
        )?;
        if self.remainder > 0 {
            write!(f, " (and {} more)", self.remainder)?;
        }
        write!(f, "; re-run with --force to overwrite")
    }
}

impl std::error::Error for ConflictError {}

/// Errors raised while installing one plugin
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("failed to fetch '{plugin}': {reason}")]
    Fetch { plugin: String, reason: String },

    #[error("invalid plugin manifest: {0}")]
    ManifestParse(#[from] DescriptorError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    TemplateRender(#[from] RenderFailure),

    #[error("platform adapter error: {0}")]
    Adapter(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl InstallError {
    /// Conflicts are detected before any write; everything else may have
    /// mutated the filesystem and needs the backups replayed.
    pub fn needs_rollback(&self) -> bool {
        !matches!(self, InstallError::Conflict(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_preview_is_capped() {
        let paths: Vec<String> = (0..8).map(|i| format!("file-{i}.md")).collect();
        let error = ConflictError::new(paths);
        assert_eq!(error.paths.len(), CONFLICT_PREVIEW_LIMIT);
        assert_eq!(error.remainder, 3);

        let message = error.to_string();
        assert!(message.contains("file-0.md"));
        assert!(message.contains("(and 3 more)"));
        assert!(message.contains("--force"));
    }

    #[test]
    fn test_small_conflict_has_no_remainder() {
        let error = ConflictError::new(vec!["a.md".to_string()]);
        assert_eq!(error.remainder, 0);
        assert!(!error.to_string().contains("more"));
    }

    #[test]
    fn test_rollback_classification() {
        let conflict = InstallError::Conflict(ConflictError::new(vec!["a.md".to_string()]));
        assert!(!conflict.needs_rollback());

        let fetch = InstallError::Fetch {
            plugin: "demo".to_string(),
            reason: "network".to_string(),
        };
        assert!(fetch.needs_rollback());
    }
}
