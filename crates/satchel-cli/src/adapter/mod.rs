//! Platform adapters
//!
//! The orchestrator is platform-agnostic: it renders component content and
//! asks the adapter where and in what shape that content lands on disk. One
//! concrete implementation exists per supported host platform; the
//! orchestrator only ever calls through this trait and never inspects
//! platform identity itself.

mod claude;

use std::path::{Path, PathBuf};

use serde_json::Value;

use satchel_manifest::{Component, ComponentKind, McpServerDecl, PluginManifest};

use crate::install::error::InstallError;
use crate::install::plan::InstallationPlan;

pub use claude::ClaudeAdapter;

/// Maps plugin components to concrete filesystem installation plans
pub trait PlatformAdapter {
    /// Platform identifier, as used in `satchel.toml`
    fn name(&self) -> &'static str;

    /// Version of the platform conventions this adapter targets
    fn platform_version(&self) -> &'static str;

    /// Hook run once before any plugin installs, with every manifest the
    /// pre-install preview could parse (side-effecting, not retried)
    fn pre_install(
        &self,
        project_root: &Path,
        manifests: &[PluginManifest],
    ) -> Result<(), InstallError>;

    /// Hook run once after the batch, with the manifests that installed
    /// successfully
    fn post_install(
        &self,
        project_root: &Path,
        manifests: &[PluginManifest],
    ) -> Result<(), InstallError>;

    /// Compatibility warnings for a manifest; never blocks installation
    fn validate_compatibility(&self, manifest: &PluginManifest) -> Vec<String>;

    /// Platform-supplied template variables for the render context
    fn template_variables(&self, project_root: &Path, manifest: &PluginManifest) -> Value;

    /// Directory (relative to the project root) holding one component kind
    fn component_dir(&self, kind: ComponentKind) -> &'static str;

    /// Plan the installation of one rendered component
    fn plan_component(
        &self,
        kind: ComponentKind,
        component: &Component,
        manifest: &PluginManifest,
        rendered: &str,
        project_root: &Path,
        source_dir: &Path,
    ) -> Result<InstallationPlan, InstallError>;

    /// Plan the agent-file injection (a rewrite of the platform's top-level
    /// agent file with this plugin's tagged block spliced in)
    fn plan_agent_file(
        &self,
        manifest: &PluginManifest,
        rendered: &str,
        project_root: &Path,
    ) -> Result<InstallationPlan, InstallError>;

    /// Config fragment for one auxiliary (MCP) server declaration
    fn mcp_server_config(
        &self,
        decl: &McpServerDecl,
        manifest: &PluginManifest,
        project_root: &Path,
        source_dir: &Path,
    ) -> Result<Value, InstallError>;

    /// Merge an incoming config fragment into the existing auxiliary config
    fn merge_mcp_config(&self, existing: Value, incoming: &Value) -> Value;

    /// Where the auxiliary config file lives; `None` disables the step
    fn mcp_config_path(&self, project_root: &Path) -> Option<PathBuf>;

    /// Withdraw previously granted permission patterns (used on removal,
    /// with exactly the patterns no other plugin still references)
    fn revoke_permissions(
        &self,
        project_root: &Path,
        patterns: &[String],
    ) -> Result<(), InstallError>;
}

/// Look up the adapter for a configured platform name
pub fn adapter_for(platform: &str) -> Option<Box<dyn PlatformAdapter>> {
    match platform {
        "claude" => Some(Box::new(ClaudeAdapter::new())),
        _ => None,
    }
}
