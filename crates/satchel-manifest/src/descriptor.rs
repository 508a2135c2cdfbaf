//! Plugin descriptor parsing
//!
//! Every plugin package carries a declarative descriptor at its root,
//! `plugin.toml` (or `plugin.yaml`), naming the package and listing the
//! components it installs:
//!
//! ```toml
//! [plugin]
//! name = "code-review"
//! version = "1.2.0"
//! description = "Review helpers"
//! permissions = ["skill:code-review:*"]
//!
//! [[skills]]
//! name = "review"
//! context = "./skills/review.md"
//!
//! [[commands]]
//! name = "review-pr"
//! context = [
//!     "./commands/review-pr.md",
//!     { path = "./commands/strict.md", when = "profile == 'strict'" },
//! ]
//!
//! [agent_file]
//! context = "./agent.md"
//!
//! [[mcp_servers]]
//! name = "review-db"
//! command = "npx"
//! args = ["-y", "review-db-server"]
//!
//! [env]
//! required = ["REVIEW_API_KEY"]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::errors::DescriptorError;

/// Descriptor file names probed at the package root, in order
const DESCRIPTOR_NAMES: [&str; 3] = ["plugin.toml", "plugin.yaml", "plugin.yml"];

/// The kinds of installable components a plugin may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Skill,
    Command,
    Agent,
    Rule,
    Instruction,
    Prompt,
}

impl ComponentKind {
    /// All kinds, in installation order
    pub const ALL: [ComponentKind; 6] = [
        ComponentKind::Skill,
        ComponentKind::Command,
        ComponentKind::Agent,
        ComponentKind::Rule,
        ComponentKind::Instruction,
        ComponentKind::Prompt,
    ];

    /// Human-readable singular label
    pub fn label(self) -> &'static str {
        match self {
            ComponentKind::Skill => "skill",
            ComponentKind::Command => "command",
            ComponentKind::Agent => "agent",
            ComponentKind::Rule => "rule",
            ComponentKind::Instruction => "instruction",
            ComponentKind::Prompt => "prompt",
        }
    }
}

/// A context spec: one file, or an ordered list of plain and conditional items
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ContextSpec {
    Single(String),
    Many(Vec<ContextItem>),
}

/// One entry of a list-form context spec
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ContextItem {
    Plain(String),
    Conditional { path: String, when: String },
}

/// One declared component (skill, command, agent, rule, instruction, prompt)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Context file(s) rendered into the installed artifact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextSpec>,

    /// Additional files copied verbatim next to the rendered artifact,
    /// relative to the package root
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

/// Optional injection into the platform's top-level agent file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentFileInjection {
    pub context: ContextSpec,
}

/// Declarative descriptor for one auxiliary (MCP) server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerDecl {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    /// Remote server URL, for servers that are not spawned locally
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvSection {
    /// Environment variables the plugin needs at runtime; unset ones are
    /// surfaced as warnings after a successful install
    #[serde(default)]
    pub required: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformSection {
    /// Minimum host platform version the plugin was authored against
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginSection {
    pub name: String,
    pub version: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Permission patterns the plugin asks the platform to grant
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
}

/// Parsed plugin descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    pub plugin: PluginSection,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<Component>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<Component>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<Component>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Component>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instructions: Vec<Component>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prompts: Vec<Component>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_file: Option<AgentFileInjection>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mcp_servers: Vec<McpServerDecl>,

    #[serde(default)]
    pub env: EnvSection,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<PlatformSection>,
}

impl PluginManifest {
    /// Load and validate the descriptor at a package root
    pub fn load(package_dir: &Path) -> Result<Self, DescriptorError> {
        let path = DESCRIPTOR_NAMES
            .iter()
            .map(|name| package_dir.join(name))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| DescriptorError::NotFound(package_dir.to_path_buf()))?;

        let content = fs::read_to_string(&path)?;
        let manifest: PluginManifest = if path.extension().is_some_and(|ext| ext == "toml") {
            toml::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };

        manifest.validate()?;
        tracing::debug!(
            plugin = %manifest.plugin.name,
            version = %manifest.plugin.version,
            "loaded plugin descriptor"
        );
        Ok(manifest)
    }

    fn validate(&self) -> Result<(), DescriptorError> {
        if self.plugin.name.trim().is_empty() {
            return Err(DescriptorError::Invalid(
                "plugin name must not be empty".to_string(),
            ));
        }
        if self.plugin.version.trim().is_empty() {
            return Err(DescriptorError::Invalid(
                "plugin version must not be empty".to_string(),
            ));
        }
        for decl in &self.mcp_servers {
            if decl.command.is_none() && decl.url.is_none() {
                return Err(DescriptorError::Invalid(format!(
                    "mcp server '{}' declares neither a command nor a url",
                    decl.name
                )));
            }
        }
        Ok(())
    }

    /// Declared components of one kind, in declaration order
    pub fn components(&self, kind: ComponentKind) -> &[Component] {
        match kind {
            ComponentKind::Skill => &self.skills,
            ComponentKind::Command => &self.commands,
            ComponentKind::Agent => &self.agents,
            ComponentKind::Rule => &self.rules,
            ComponentKind::Instruction => &self.instructions,
            ComponentKind::Prompt => &self.prompts,
        }
    }

    /// Total number of declared components across all kinds
    pub fn component_count(&self) -> usize {
        ComponentKind::ALL
            .iter()
            .map(|kind| self.components(*kind).len())
            .sum()
    }
}
