//! Plugin spec resolution
//!
//! Turns a `(name, spec)` pair plus lockfile state into a concrete,
//! fetchable package reference. Resolution never fails the batch: a spec
//! that resolves to nothing is logged and skipped by the caller.

use std::path::{Path, PathBuf};

use satchel_config::{PluginSpec, ProjectConfig};
use satchel_logger as logger;
use satchel_manifest::{Lockfile, PluginManifest};

use crate::registry::{self, locator, Locator};

/// Output of resolution: immutable once produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPackage {
    pub name: String,
    pub version: String,

    /// URL or path the package bytes come from
    pub locator: String,

    /// Content digest, when the resolving registry knows it up front
    pub integrity: Option<String>,

    /// Directory or archive already on disk; `None` means the bytes must be
    /// fetched via `locator`
    pub local_path: Option<PathBuf>,
}

impl ResolvedPackage {
    /// The parsed locator to fetch this package from
    pub fn to_locator(&self) -> anyhow::Result<Locator> {
        if let Some(path) = &self.local_path {
            return Ok(Locator::Path(path.clone()));
        }
        locator::parse(&self.locator, Path::new("."))
            .ok_or_else(|| anyhow::anyhow!("unrecognized locator '{}'", self.locator))
    }
}

pub struct Resolver<'a> {
    project_root: &'a Path,
    config: &'a ProjectConfig,
    lockfile: &'a Lockfile,
}

impl<'a> Resolver<'a> {
    pub fn new(project_root: &'a Path, config: &'a ProjectConfig, lockfile: &'a Lockfile) -> Self {
        Resolver {
            project_root,
            config,
            lockfile,
        }
    }

    /// Resolve one spec; `None` means the plugin is skipped
    pub fn resolve(
        &self,
        name: &str,
        spec: &PluginSpec,
        use_lock: bool,
    ) -> Option<ResolvedPackage> {
        let effective_version = self.effective_version(name, spec, use_lock);

        if let Some(source) = &spec.source {
            return self.resolve_direct(name, source, effective_version.as_deref());
        }

        self.resolve_via_registry(name, effective_version.as_deref(), spec.registry.as_deref())
    }

    /// Apply the lock re-pinning policy
    ///
    /// An absent version, or an explicit version equal to the locked one,
    /// re-pins to the locked version. Any *different* explicit version
    /// overrides the lock: explicit upgrade/downgrade intent wins. This
    /// equal-version case deliberately still goes through the lock.
    fn effective_version(&self, name: &str, spec: &PluginSpec, use_lock: bool) -> Option<String> {
        if use_lock && spec.source.is_none() {
            if let Some(locked) = self.lockfile.locked_version(name) {
                match spec.version.as_deref() {
                    None => {
                        tracing::debug!(name, locked, "re-pinning to locked version");
                        return Some(locked.to_string());
                    }
                    Some(requested) if requested == locked => {
                        return Some(locked.to_string());
                    }
                    Some(_) => {}
                }
            }
        }
        spec.version.clone()
    }

    /// Single-package mode: the locator names exactly one package
    fn resolve_direct(
        &self,
        name: &str,
        source: &str,
        effective_version: Option<&str>,
    ) -> Option<ResolvedPackage> {
        let Some(parsed) = locator::parse(source, self.project_root) else {
            logger::warn(&format!(
                "Cannot resolve plugin '{}': unrecognized source '{}'",
                name, source
            ));
            return None;
        };

        // A local directory can tell us its version right away; everything
        // else settles on the descriptor version after fetch.
        let (local_path, peeked_version) = match &parsed {
            Locator::Path(path) => {
                if !path.exists() {
                    logger::warn(&format!(
                        "Cannot resolve plugin '{}': source '{}' does not exist",
                        name,
                        path.display()
                    ));
                    return None;
                }
                let peeked = if path.is_dir() {
                    PluginManifest::load(path).ok().map(|m| m.plugin.version)
                } else {
                    None
                };
                (Some(path.clone()), peeked)
            }
            _ => (None, None),
        };

        let version = peeked_version
            .or_else(|| effective_version.map(str::to_string))
            .unwrap_or_else(|| "0.0.0".to_string());

        Some(ResolvedPackage {
            name: name.to_string(),
            version,
            locator: locator::to_locator_string(&parsed),
            integrity: None,
            local_path,
        })
    }

    fn resolve_via_registry(
        &self,
        name: &str,
        effective_version: Option<&str>,
        registry_spec: Option<&str>,
    ) -> Option<ResolvedPackage> {
        let base = match registry_spec {
            // A fully-qualified locator is used directly
            Some(raw) if locator::is_locator(raw) => raw.to_string(),
            Some(named) => match self.config.registry_url(named) {
                Some(url) => url.to_string(),
                None => {
                    logger::warn(&format!(
                        "Cannot resolve plugin '{}': unknown registry '{}'",
                        name, named
                    ));
                    return None;
                }
            },
            None => match self.config.default_registry() {
                Some(url) => url.to_string(),
                None => {
                    logger::warn(&format!(
                        "Cannot resolve plugin '{}': no registry configured",
                        name
                    ));
                    return None;
                }
            },
        };

        let Some(client) = registry::client_for(&base, self.project_root) else {
            logger::warn(&format!(
                "Cannot resolve plugin '{}': unsupported registry locator '{}'",
                name, base
            ));
            return None;
        };

        match client.resolve_package(name, effective_version) {
            Ok(Some(resolved)) => Some(resolved),
            Ok(None) => {
                logger::warn(&format!(
                    "Plugin '{}' not found in registry '{}' (requested {})",
                    name,
                    base,
                    effective_version.unwrap_or("any version")
                ));
                None
            }
            Err(err) => {
                logger::warn(&format!("Failed to resolve plugin '{}': {:#}", name, err));
                None
            }
        }
    }
}
