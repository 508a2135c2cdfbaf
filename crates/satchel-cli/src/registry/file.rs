//! Local filesystem registry
//!
//! Layout under the registry base directory:
//!
//! ```text
//! <base>/<plugin>/index.toml
//! <base>/<plugin>/<plugin>-<version>.tar.gz
//! ```
//!
//! Artifacts may also be plain directories, which is handy for registries
//! checked out of version control.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::install::resolver::ResolvedPackage;

use super::{best_match, join_artifact_path, parse_index, RegistryClient, INDEX_FILE_NAME};

pub struct FileRegistry {
    base: PathBuf,
}

impl FileRegistry {
    pub fn new(base: PathBuf) -> Self {
        FileRegistry { base }
    }

    fn plugin_dir(&self, name: &str) -> PathBuf {
        self.base.join(name)
    }
}

impl RegistryClient for FileRegistry {
    fn resolve_package(
        &self,
        name: &str,
        version_spec: Option<&str>,
    ) -> Result<Option<ResolvedPackage>> {
        let index_path = self.plugin_dir(name).join(INDEX_FILE_NAME);
        if !index_path.is_file() {
            tracing::debug!(name, registry = %self.base.display(), "no registry index");
            return Ok(None);
        }

        let content = fs::read_to_string(&index_path)
            .with_context(|| format!("read {}", index_path.display()))?;
        let index = parse_index(&content)
            .with_context(|| format!("parse {}", index_path.display()))?;

        let Some(entry) = best_match(&index.versions, version_spec) else {
            return Ok(None);
        };

        let artifact_path = join_artifact_path(&self.plugin_dir(name), &entry.artifact);
        if !artifact_path.exists() {
            anyhow::bail!(
                "registry index for '{name}' names a missing artifact: {}",
                artifact_path.display()
            );
        }

        Ok(Some(ResolvedPackage {
            name: name.to_string(),
            version: entry.version.clone(),
            locator: artifact_path.to_string_lossy().to_string(),
            integrity: None,
            local_path: Some(artifact_path),
        }))
    }
}
