//! Installation orchestrator
//!
//! The top-level driver for a batch install: resolves every requested
//! plugin, fetches and parses packages, asks the platform adapter to turn
//! each declared component into an installation plan, runs each plan
//! through the transactional executor and keeps the state file and lockfile
//! current. Plugins are processed strictly sequentially; one plugin's
//! failure never aborts its siblings.

pub mod error;
pub mod executor;
pub mod plan;
pub mod resolver;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use satchel_config::{PluginSpec, ProjectConfig};
use satchel_logger as logger;
use satchel_manifest::{state, ComponentKind, LockEntry, Lockfile, PluginManifest, PluginState, StateFile};

use crate::adapter::PlatformAdapter;
use crate::registry::fetch::{self, FetchedSource};
use crate::render;

use error::InstallError;
use executor::{Executor, Transaction};
use resolver::{ResolvedPackage, Resolver};

/// Knobs for one install batch
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Consult the lockfile during resolution
    pub use_lock: bool,
    /// Write resolved versions back to the lockfile
    pub update_lock: bool,
    /// Skip the pre-write conflict scan
    pub force: bool,
}

impl Default for InstallOptions {
    fn default() -> Self {
        InstallOptions {
            use_lock: true,
            update_lock: true,
            force: false,
        }
    }
}

/// Per-plugin outcome; built fresh per install call, never persisted
#[derive(Debug, Clone)]
pub struct InstallResult {
    pub plugin: String,
    pub success: bool,
    pub message: String,
    pub warnings: Vec<String>,
}

/// Aggregate outcome of one batch
#[derive(Debug, Clone, Default)]
pub struct InstallSummary {
    pub results: Vec<InstallResult>,
    /// Plugins whose specs resolved to nothing (logged, not failed)
    pub skipped: Vec<String>,
    /// Required-but-unset environment variables across installed plugins
    pub env_warnings: Vec<String>,
}

impl InstallSummary {
    pub fn installed(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

/// What a successful single-plugin install hands back to the batch driver
struct PluginOutcome {
    manifest: PluginManifest,
    warnings: Vec<String>,
    mcp_fragments: Vec<Value>,
    integrity: String,
}

pub struct Installer<'a> {
    project_root: PathBuf,
    config: &'a ProjectConfig,
    adapter: Box<dyn PlatformAdapter>,
    options: InstallOptions,
}

impl<'a> Installer<'a> {
    pub fn new(
        project_root: PathBuf,
        config: &'a ProjectConfig,
        adapter: Box<dyn PlatformAdapter>,
        options: InstallOptions,
    ) -> Self {
        Installer {
            project_root,
            config,
            adapter,
            options,
        }
    }

    /// Install a batch of `(name, spec)` pairs
    ///
    /// Always returns a summary with one result per attempted plugin; the
    /// caller decides whether any failure is fatal to the overall
    /// operation. The state file is persisted unconditionally and scratch
    /// space is purged regardless of outcome.
    pub fn install(&mut self, requests: &[(String, PluginSpec)]) -> Result<InstallSummary, InstallError> {
        let mut lockfile = Lockfile::load(&self.project_root)?;
        let mut state = StateFile::load(&self.project_root)?;
        let scratch_root = state::state_dir(&self.project_root).join("scratch");

        // Resolution failures drop the plugin from the batch without
        // aborting the others.
        let mut resolved_set: Vec<(String, ResolvedPackage)> = Vec::new();
        let mut skipped = Vec::new();
        {
            let resolver = Resolver::new(&self.project_root, self.config, &lockfile);
            for (name, spec) in requests {
                match resolver.resolve(name, spec, self.options.use_lock) {
                    Some(resolved) => resolved_set.push((name.clone(), resolved)),
                    None => skipped.push(name.clone()),
                }
            }
        }

        // Best-effort pre-install preview: fetch-and-parse returns an
        // optional value, absence is a valid outcome. Successful fetches
        // are cached for the per-plugin installs below.
        let mut fetched: BTreeMap<String, FetchedSource> = BTreeMap::new();
        let mut previews: Vec<PluginManifest> = Vec::new();
        for (name, resolved) in &resolved_set {
            if let Some(source) = self.fetch_quietly(name, resolved, &scratch_root) {
                if let Ok(manifest) = PluginManifest::load(&source.dir) {
                    previews.push(manifest);
                }
                fetched.insert(name.clone(), source);
            }
        }
        self.adapter.pre_install(&self.project_root, &previews)?;

        let mut results = Vec::new();
        let mut mcp_fragments: Vec<Value> = Vec::new();
        let mut succeeded: Vec<PluginManifest> = Vec::new();

        for (name, resolved) in &resolved_set {
            match self.install_one(name, resolved, &mut state, &fetched, &scratch_root) {
                Ok(outcome) => {
                    let mut warnings = outcome.warnings;
                    if self.options.use_lock {
                        if let Some(locked) = lockfile.locked_entry(name) {
                            if !locked.integrity.is_empty()
                                && !outcome.integrity.is_empty()
                                && locked.integrity != outcome.integrity
                            {
                                warnings.push(format!(
                                    "content of '{}' no longer matches the locked integrity digest",
                                    name
                                ));
                            }
                        }
                    }
                    if self.options.update_lock {
                        lockfile.set_entry(
                            name,
                            LockEntry {
                                version: outcome.manifest.plugin.version.clone(),
                                source: resolved.locator.clone(),
                                integrity: outcome.integrity.clone(),
                            },
                        );
                    }

                    results.push(InstallResult {
                        plugin: name.clone(),
                        success: true,
                        message: format!("installed {} {}", name, outcome.manifest.plugin.version),
                        warnings,
                    });
                    mcp_fragments.extend(outcome.mcp_fragments);
                    succeeded.push(outcome.manifest);
                }
                Err(err) => {
                    logger::error(&format!("Failed to install '{}': {}", name, err));
                    results.push(InstallResult {
                        plugin: name.clone(),
                        success: false,
                        message: err.to_string(),
                        warnings: Vec::new(),
                    });
                }
            }
        }

        // Auxiliary server config is merged and persisted once for the
        // whole batch, then the post-install hook sees what stuck.
        let tail = self
            .write_aux_config(&mcp_fragments)
            .and_then(|()| self.adapter.post_install(&self.project_root, &succeeded));

        if self.options.update_lock {
            if let Err(err) = lockfile.save(&self.project_root) {
                logger::warn(&format!("Failed to write lockfile: {}", err));
            }
        }
        let state_saved = state.save(&self.project_root);

        let _ = fs::remove_dir_all(&scratch_root);

        tail?;
        state_saved?;

        let env_warnings = collect_env_warnings(&succeeded);
        Ok(InstallSummary {
            results,
            skipped,
            env_warnings,
        })
    }

    /// Fetch for the preview pass; failures here are expected and quiet
    fn fetch_quietly(
        &self,
        name: &str,
        resolved: &ResolvedPackage,
        scratch_root: &Path,
    ) -> Option<FetchedSource> {
        let locator = resolved.to_locator().ok()?;
        match fetch::fetch_locator(&locator, scratch_root, name) {
            Ok(source) => Some(source),
            Err(err) => {
                logger::debug(&format!("Preview fetch of '{}' failed: {:#}", name, err));
                None
            }
        }
    }

    /// The transactional unit: install one plugin, rolling its backups
    /// back on any failure after the first write
    fn install_one(
        &mut self,
        name: &str,
        resolved: &ResolvedPackage,
        state: &mut StateFile,
        fetched: &BTreeMap<String, FetchedSource>,
        scratch_root: &Path,
    ) -> Result<PluginOutcome, InstallError> {
        let mut tx = Transaction::new(name, &self.project_root);
        let mut previous: Option<PluginState> = None;

        let result = self.try_install(name, resolved, state, fetched, scratch_root, &mut tx, &mut previous);

        match result {
            Ok(outcome) => {
                tx.discard_backups();
                Ok(outcome)
            }
            Err(err) => {
                // Conflicts are detected before the offending plan writes
                // anything, so there is nothing to undo for them.
                if err.needs_rollback() {
                    tx.rollback();
                }
                // The failed attempt does not keep a claim on the plugin's
                // entry: restore the pre-install snapshot, or drop the
                // partial entry for a first-time install.
                state.remove_plugin(name);
                if let Some(previous) = previous {
                    state.restore_plugin(name, previous);
                }
                Err(err)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn try_install(
        &mut self,
        name: &str,
        resolved: &ResolvedPackage,
        state: &mut StateFile,
        fetched: &BTreeMap<String, FetchedSource>,
        scratch_root: &Path,
        tx: &mut Transaction,
        previous: &mut Option<PluginState>,
    ) -> Result<PluginOutcome, InstallError> {
        let source = match fetched.get(name) {
            Some(source) => source.clone(),
            None => {
                let locator = resolved.to_locator().map_err(|err| InstallError::Fetch {
                    plugin: name.to_string(),
                    reason: format!("{err:#}"),
                })?;
                fetch::fetch_locator(&locator, scratch_root, name).map_err(|err| {
                    InstallError::Fetch {
                        plugin: name.to_string(),
                        reason: format!("{err:#}"),
                    }
                })?
            }
        };

        let manifest = PluginManifest::load(&source.dir)?;
        let warnings = self.adapter.validate_compatibility(&manifest);
        for warning in &warnings {
            logger::warn(warning);
        }

        let context = self.render_context(&manifest);

        // Snapshot the previous managed set, then clear the entry: the new
        // set is computed from scratch, and the old one feeds the
        // conflict-exclusion set and the stale-file cleanup.
        let snapshot = state.remove_plugin(name);
        let exclude: BTreeSet<String> = snapshot
            .as_ref()
            .map(PluginState::paths)
            .unwrap_or_default();
        *previous = snapshot;

        state.set_version(name, &manifest.plugin.version);

        let executor = Executor::new(&self.project_root, self.options.force);

        for kind in ComponentKind::ALL {
            for component in manifest.components(kind) {
                let rendered = match &component.context {
                    Some(spec) => render::resolve_context(spec, &source.dir, &context)?,
                    None => String::new(),
                };
                let plan = self.adapter.plan_component(
                    kind,
                    component,
                    &manifest,
                    &rendered,
                    &self.project_root,
                    &source.dir,
                )?;
                executor.execute(&plan, state, tx, &exclude)?;
            }
        }

        if let Some(injection) = &manifest.agent_file {
            let rendered = render::resolve_context(&injection.context, &source.dir, &context)?;
            let plan = self
                .adapter
                .plan_agent_file(&manifest, &rendered, &self.project_root)?;
            executor.execute(&plan, state, tx, &exclude)?;
        }

        let mut mcp_fragments = Vec::new();
        for decl in &manifest.mcp_servers {
            let fragment =
                self.adapter
                    .mcp_server_config(decl, &manifest, &self.project_root, &source.dir)?;
            mcp_fragments.push(fragment);
            state.add_mcp_server(name, &decl.name);
        }

        for pattern in &manifest.plugin.permissions {
            state.add_permission(name, pattern);
        }

        // Files present in the previous version but absent from the new
        // one are deleted, pruning now-empty parents up to the project root.
        if let Some(snapshot) = previous.as_ref() {
            let current = state.plugin(name).map(PluginState::paths).unwrap_or_default();
            self.remove_stale(snapshot, &current)?;
        }

        Ok(PluginOutcome {
            manifest,
            warnings,
            mcp_fragments,
            integrity: source.integrity,
        })
    }

    /// The render context: platform variables plus the plugin's own
    fn render_context(&self, manifest: &PluginManifest) -> Value {
        let mut context = self
            .adapter
            .template_variables(&self.project_root, manifest);
        if !context.is_object() {
            context = json!({});
        }
        if let Some(map) = context.as_object_mut() {
            map.insert(
                "plugin".to_string(),
                json!({
                    "name": manifest.plugin.name,
                    "version": manifest.plugin.version,
                    "description": manifest.plugin.description.clone().unwrap_or_default(),
                }),
            );
        }
        context
    }

    /// Delete paths the previous version managed that the new one dropped
    fn remove_stale(
        &self,
        snapshot: &PluginState,
        current: &BTreeSet<String>,
    ) -> Result<(), InstallError> {
        for file in &snapshot.files {
            if current.contains(file) {
                continue;
            }
            let full = self.project_root.join(file);
            if full.is_file() {
                logger::debug(&format!("Removing stale file {}", file));
                fs::remove_file(&full)?;
            }
            if let Some(parent) = full.parent() {
                prune_upward(&self.project_root, parent);
            }
        }

        for dir in &snapshot.directories {
            if current.contains(dir) {
                continue;
            }
            let full = self.project_root.join(dir);
            prune_upward(&self.project_root, &full);
        }

        Ok(())
    }

    /// Merge collected auxiliary server fragments into the adapter's config
    /// file: markup-config formats get tables, everything else JSON
    fn write_aux_config(&self, fragments: &[Value]) -> Result<(), InstallError> {
        if fragments.is_empty() {
            return Ok(());
        }
        let Some(path) = self.adapter.mcp_config_path(&self.project_root) else {
            return Ok(());
        };

        let is_toml = path.extension().is_some_and(|ext| ext == "toml");
        let existing: Value = if path.is_file() {
            let content = fs::read_to_string(&path)?;
            if is_toml {
                toml::from_str::<toml::Value>(&content)
                    .ok()
                    .and_then(|value| serde_json::to_value(value).ok())
                    .unwrap_or_else(|| json!({}))
            } else {
                serde_json::from_str(&content).unwrap_or_else(|_| json!({}))
            }
        } else {
            json!({})
        };

        let mut merged = existing;
        for fragment in fragments {
            merged = self.adapter.merge_mcp_config(merged, fragment);
        }

        let mut content = if is_toml {
            let value = toml::Value::try_from(&merged)
                .map_err(|err| InstallError::Adapter(format!("auxiliary config: {err}")))?;
            toml::to_string_pretty(&value)
                .map_err(|err| InstallError::Adapter(format!("auxiliary config: {err}")))?
        } else {
            serde_json::to_string_pretty(&merged)
                .map_err(|err| InstallError::Adapter(format!("auxiliary config: {err}")))?
        };
        if !content.ends_with('\n') {
            content.push('\n');
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(())
    }
}

/// Remove empty directories from `start` up to (never including) the
/// project root
pub fn prune_upward(project_root: &Path, start: &Path) {
    let mut candidate = start.to_path_buf();
    while candidate.starts_with(project_root) && candidate != project_root {
        let is_empty = fs::read_dir(&candidate)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if !is_empty || fs::remove_dir(&candidate).is_err() {
            break;
        }
        match candidate.parent() {
            Some(parent) => candidate = parent.to_path_buf(),
            None => break,
        }
    }
}

/// Warnings for declared-but-unset environment variables
fn collect_env_warnings(manifests: &[PluginManifest]) -> Vec<String> {
    let mut warnings = Vec::new();
    for manifest in manifests {
        for variable in &manifest.env.required {
            if std::env::var_os(variable).is_none() {
                warnings.push(format!(
                    "plugin '{}' requires environment variable '{}' which is not set",
                    manifest.plugin.name, variable
                ));
            }
        }
    }
    warnings
}
