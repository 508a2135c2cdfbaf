//! Registry abstraction
//!
//! A registry is a base locator under which each plugin has a directory
//! holding an `index.toml` (its published versions) and the per-version
//! artifacts. Two backends are provided: a local filesystem registry and an
//! http(s) registry with the same index shape. Resolution is
//! adapter-agnostic: the resolver only sees the [`RegistryClient`] trait.

pub mod archive;
pub mod fetch;
pub mod integrity;
pub mod locator;

mod file;
mod http;

use anyhow::Result;
use semver::{Version, VersionReq};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::install::resolver::ResolvedPackage;

pub use fetch::FetchedSource;
pub use file::FileRegistry;
pub use http::HttpRegistry;
pub use locator::Locator;

/// Index file name inside a plugin's registry directory
pub const INDEX_FILE_NAME: &str = "index.toml";

/// Parsed registry index for one plugin
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryIndex {
    #[serde(default)]
    pub versions: Vec<IndexVersion>,
}

/// One published version in a registry index
#[derive(Debug, Clone, Deserialize)]
pub struct IndexVersion {
    pub version: String,

    /// Artifact reference: a file or URL relative to the plugin's registry
    /// directory, or fully qualified
    pub artifact: String,
}

/// Turns version specs into fetchable package references
pub trait RegistryClient {
    /// Resolve a name and optional version spec to a concrete package,
    /// `None` when the registry does not offer a match
    fn resolve_package(&self, name: &str, version_spec: Option<&str>)
        -> Result<Option<ResolvedPackage>>;

    /// Fetch a resolved package's source tree into `scratch`
    fn fetch_package(&self, resolved: &ResolvedPackage, scratch: &Path) -> Result<PathBuf> {
        let fetched = fetch::fetch_locator(&resolved.to_locator()?, scratch, &resolved.name)?;
        Ok(fetched.dir)
    }
}

/// Build a registry client for a base locator
pub fn client_for(base: &str, project_root: &Path) -> Option<Box<dyn RegistryClient>> {
    match locator::parse(base, project_root)? {
        Locator::Path(path) => Some(Box::new(FileRegistry::new(path))),
        Locator::Http(url) => Some(Box::new(HttpRegistry::new(url))),
        _ => None,
    }
}

/// Pick the best index entry for a version spec
///
/// Exact string matches win; otherwise the spec is a semver requirement and
/// the highest matching version is chosen. No spec means the highest
/// published version. The range-matching semantics themselves are semver's.
pub fn best_match<'a>(
    versions: &'a [IndexVersion],
    version_spec: Option<&str>,
) -> Option<&'a IndexVersion> {
    if versions.is_empty() {
        return None;
    }

    if let Some(spec) = version_spec {
        if let Some(exact) = versions.iter().find(|entry| entry.version == spec) {
            return Some(exact);
        }

        let requirement = VersionReq::parse(spec).ok()?;
        return versions
            .iter()
            .filter_map(|entry| {
                Version::parse(&entry.version)
                    .ok()
                    .filter(|version| requirement.matches(version))
                    .map(|version| (version, entry))
            })
            .max_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, entry)| entry);
    }

    versions
        .iter()
        .filter_map(|entry| {
            Version::parse(&entry.version)
                .ok()
                .map(|version| (version, entry))
        })
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, entry)| entry)
        .or_else(|| versions.last())
}

/// Load and parse an index file's text
pub(crate) fn parse_index(content: &str) -> Result<RegistryIndex> {
    Ok(toml::from_str(content)?)
}

/// Join a possibly-relative artifact reference onto a base path
pub(crate) fn join_artifact_path(plugin_dir: &Path, artifact: &str) -> PathBuf {
    let candidate = Path::new(artifact);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        plugin_dir.join(artifact)
    }
}
