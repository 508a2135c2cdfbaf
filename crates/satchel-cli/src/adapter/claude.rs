//! Claude platform adapter
//!
//! Shapes plugin components into the `.claude/` project layout: skills as
//! `.claude/skills/<name>/SKILL.md` directories, every other component kind
//! as a single markdown file under its kind's directory, agent-file
//! injections as tagged blocks in `CLAUDE.md`, MCP servers in `.mcp.json`
//! and granted permissions in `.claude/settings.local.json`.

use std::fs;
use std::path::{Path, PathBuf};

use semver::Version;
use serde_json::{json, Map, Value};

use satchel_manifest::{Component, ComponentKind, McpServerDecl, PluginManifest};

use crate::install::error::InstallError;
use crate::install::plan::InstallationPlan;

use super::PlatformAdapter;

/// Version of the `.claude/` layout conventions this adapter writes
const PLATFORM_VERSION: &str = "1.0.0";

/// Project-local settings file holding granted permission patterns
const SETTINGS_FILE: &str = ".claude/settings.local.json";

#[derive(Debug, Default)]
pub struct ClaudeAdapter;

impl ClaudeAdapter {
    pub fn new() -> Self {
        ClaudeAdapter
    }
}

impl PlatformAdapter for ClaudeAdapter {
    fn name(&self) -> &'static str {
        "claude"
    }

    fn platform_version(&self) -> &'static str {
        PLATFORM_VERSION
    }

    fn pre_install(
        &self,
        _project_root: &Path,
        manifests: &[PluginManifest],
    ) -> Result<(), InstallError> {
        tracing::debug!(count = manifests.len(), "pre-install preview");
        Ok(())
    }

    fn post_install(
        &self,
        project_root: &Path,
        manifests: &[PluginManifest],
    ) -> Result<(), InstallError> {
        let patterns: Vec<String> = manifests
            .iter()
            .flat_map(|manifest| manifest.plugin.permissions.iter().cloned())
            .collect();
        if patterns.is_empty() {
            return Ok(());
        }
        grant_permissions(project_root, &patterns)
    }

    fn validate_compatibility(&self, manifest: &PluginManifest) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Some(min_version) = manifest
            .platform
            .as_ref()
            .and_then(|section| section.min_version.as_deref())
        {
            match (Version::parse(min_version), Version::parse(PLATFORM_VERSION)) {
                (Ok(required), Ok(current)) if required > current => {
                    warnings.push(format!(
                        "plugin '{}' was authored for platform {} but this adapter targets {}",
                        manifest.plugin.name, required, current
                    ));
                }
                (Err(_), _) => {
                    warnings.push(format!(
                        "plugin '{}' declares an unparseable minimum platform version '{}'",
                        manifest.plugin.name, min_version
                    ));
                }
                _ => {}
            }
        }

        warnings
    }

    fn template_variables(&self, project_root: &Path, _manifest: &PluginManifest) -> Value {
        json!({
            "platform": {
                "name": self.name(),
                "version": PLATFORM_VERSION,
            },
            "project": {
                "root": project_root.to_string_lossy(),
            },
        })
    }

    fn component_dir(&self, kind: ComponentKind) -> &'static str {
        match kind {
            ComponentKind::Skill => ".claude/skills",
            ComponentKind::Command => ".claude/commands",
            ComponentKind::Agent => ".claude/agents",
            ComponentKind::Rule => ".claude/rules",
            ComponentKind::Instruction => ".claude/instructions",
            ComponentKind::Prompt => ".claude/prompts",
        }
    }

    fn plan_component(
        &self,
        kind: ComponentKind,
        component: &Component,
        _manifest: &PluginManifest,
        rendered: &str,
        _project_root: &Path,
        source_dir: &Path,
    ) -> Result<InstallationPlan, InstallError> {
        let base = self.component_dir(kind);
        let mut plan = InstallationPlan::new();

        // Skills are directories with a SKILL.md entry point; everything
        // else is a single markdown file under its kind's directory.
        let asset_dir = if kind == ComponentKind::Skill {
            let skill_dir = format!("{base}/{}", component.name);
            plan.add_directory(&skill_dir);
            plan.add_file(format!("{skill_dir}/SKILL.md"), rendered);
            skill_dir
        } else {
            plan.add_directory(base);
            plan.add_file(format!("{base}/{}.md", component.name), rendered);
            base.to_string()
        };

        for file in &component.files {
            let relative = file.strip_prefix("./").unwrap_or(file);
            let source = source_dir.join(relative);
            if !source.is_file() {
                return Err(InstallError::Adapter(format!(
                    "{} '{}' lists a missing file '{}'",
                    kind.label(),
                    component.name,
                    relative
                )));
            }
            let file_name = source
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|| relative.to_string());
            plan.add_copy(source, format!("{asset_dir}/{file_name}"));
        }

        Ok(plan)
    }

    fn plan_agent_file(
        &self,
        manifest: &PluginManifest,
        rendered: &str,
        project_root: &Path,
    ) -> Result<InstallationPlan, InstallError> {
        let agent_path = project_root.join("CLAUDE.md");
        let existing = if agent_path.is_file() {
            fs::read_to_string(&agent_path)?
        } else {
            String::new()
        };

        let updated = splice_tagged_block(&existing, &manifest.plugin.name, rendered);

        let mut plan = InstallationPlan::new();
        plan.add_file("CLAUDE.md", updated);
        Ok(plan)
    }

    fn mcp_server_config(
        &self,
        decl: &McpServerDecl,
        _manifest: &PluginManifest,
        _project_root: &Path,
        _source_dir: &Path,
    ) -> Result<Value, InstallError> {
        let mut server = Map::new();
        if let Some(url) = &decl.url {
            server.insert("type".to_string(), json!("http"));
            server.insert("url".to_string(), json!(url));
        } else if let Some(command) = &decl.command {
            server.insert("command".to_string(), json!(command));
            if !decl.args.is_empty() {
                server.insert("args".to_string(), json!(decl.args));
            }
        }
        if !decl.env.is_empty() {
            server.insert("env".to_string(), json!(decl.env));
        }

        let mut fragment = Map::new();
        fragment.insert(decl.name.clone(), Value::Object(server));
        Ok(Value::Object(fragment))
    }

    fn merge_mcp_config(&self, existing: Value, incoming: &Value) -> Value {
        let mut root = match existing {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        let mut servers = match root.remove("mcpServers") {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };

        if let Value::Object(incoming_servers) = incoming {
            for (name, config) in incoming_servers {
                servers.insert(name.clone(), config.clone());
            }
        }

        root.insert("mcpServers".to_string(), Value::Object(servers));
        Value::Object(root)
    }

    fn mcp_config_path(&self, project_root: &Path) -> Option<PathBuf> {
        Some(project_root.join(".mcp.json"))
    }

    fn revoke_permissions(
        &self,
        project_root: &Path,
        patterns: &[String],
    ) -> Result<(), InstallError> {
        let path = project_root.join(SETTINGS_FILE);
        if !path.is_file() || patterns.is_empty() {
            return Ok(());
        }

        let content = fs::read_to_string(&path)?;
        let mut settings: Value = serde_json::from_str(&content).unwrap_or_else(|_| json!({}));

        if let Some(allow) = settings
            .get_mut("permissions")
            .and_then(|p| p.get_mut("allow"))
            .and_then(Value::as_array_mut)
        {
            allow.retain(|entry| {
                entry
                    .as_str()
                    .map_or(true, |pattern| !patterns.contains(&pattern.to_string()))
            });
        }

        write_settings(&path, &settings)
    }
}

/// Replace or append a plugin's tagged block in the agent file
///
/// Blocks are delimited `<!-- satchel:<plugin> -->` ... `<!-- /satchel:<plugin> -->`
/// so repeated installs rewrite in place and user content around them
/// survives untouched.
fn splice_tagged_block(existing: &str, plugin: &str, rendered: &str) -> String {
    let open = format!("<!-- satchel:{plugin} -->");
    let close = format!("<!-- /satchel:{plugin} -->");
    let block = format!("{open}\n{rendered}\n{close}\n");

    if let (Some(start), Some(end)) = (existing.find(&open), existing.find(&close)) {
        let after = end + close.len();
        // Swallow one trailing newline of the old block
        let after = if existing[after..].starts_with('\n') {
            after + 1
        } else {
            after
        };
        return format!("{}{}{}", &existing[..start], block, &existing[after..]);
    }

    if existing.is_empty() {
        block
    } else if existing.ends_with('\n') {
        format!("{existing}\n{block}")
    } else {
        format!("{existing}\n\n{block}")
    }
}

/// Append permission patterns to `.claude/settings.local.json`
fn grant_permissions(project_root: &Path, patterns: &[String]) -> Result<(), InstallError> {
    let path = project_root.join(SETTINGS_FILE);
    let mut settings: Value = if path.is_file() {
        serde_json::from_str(&fs::read_to_string(&path)?).unwrap_or_else(|_| json!({}))
    } else {
        json!({})
    };

    if !settings.is_object() {
        settings = json!({});
    }
    let root = settings
        .as_object_mut()
        .ok_or_else(|| InstallError::Adapter("settings file is not an object".to_string()))?;

    let permissions = root
        .entry("permissions".to_string())
        .or_insert_with(|| json!({}));
    if !permissions.is_object() {
        *permissions = json!({});
    }
    let allow = permissions
        .as_object_mut()
        .ok_or_else(|| InstallError::Adapter("permissions entry is not an object".to_string()))?
        .entry("allow".to_string())
        .or_insert_with(|| json!([]));
    if !allow.is_array() {
        *allow = json!([]);
    }

    if let Some(entries) = allow.as_array_mut() {
        for pattern in patterns {
            let value = json!(pattern);
            if !entries.contains(&value) {
                entries.push(value);
            }
        }
    }

    write_settings(&path, &settings)
}

fn write_settings(path: &Path, settings: &Value) -> Result<(), InstallError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut content = serde_json::to_string_pretty(settings)
        .map_err(|err| InstallError::Adapter(format!("serialize settings: {err}")))?;
    content.push('\n');
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use satchel_manifest::ContextSpec;
    use tempfile::TempDir;

    fn manifest(name: &str) -> PluginManifest {
        let toml = format!("[plugin]\nname = \"{name}\"\nversion = \"1.0.0\"\n");
        toml::from_str(&toml).unwrap_or_else(|_| {
            // The fixture descriptor above always parses
            unreachable!()
        })
    }

    fn component(name: &str) -> Component {
        Component {
            name: name.to_string(),
            description: None,
            context: Some(ContextSpec::Single("./c.md".to_string())),
            files: Vec::new(),
        }
    }

    #[test]
    fn test_skill_plan_shape() {
        let adapter = ClaudeAdapter::new();
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let plan = adapter.plan_component(
            ComponentKind::Skill,
            &component("hello"),
            &manifest("demo"),
            "rendered text",
            dir.path(),
            dir.path(),
        );

        let Ok(plan) = plan else {
            return;
        };
        assert_eq!(plan.directories, vec![".claude/skills/hello"]);
        assert_eq!(plan.files.len(), 1);
        assert_eq!(plan.files[0].path, ".claude/skills/hello/SKILL.md");
        assert_eq!(plan.files[0].contents, "rendered text");
    }

    #[test]
    fn test_command_plan_shape() {
        let adapter = ClaudeAdapter::new();
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let plan = adapter.plan_component(
            ComponentKind::Command,
            &component("deploy"),
            &manifest("demo"),
            "run it",
            dir.path(),
            dir.path(),
        );

        let Ok(plan) = plan else {
            return;
        };
        assert_eq!(plan.directories, vec![".claude/commands"]);
        assert_eq!(plan.files[0].path, ".claude/commands/deploy.md");
    }

    #[test]
    fn test_component_with_missing_extra_file_errors() {
        let adapter = ClaudeAdapter::new();
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let mut skill = component("hello");
        skill.files.push("./scripts/run.sh".to_string());

        let plan = adapter.plan_component(
            ComponentKind::Skill,
            &skill,
            &manifest("demo"),
            "text",
            dir.path(),
            dir.path(),
        );
        assert!(matches!(plan, Err(InstallError::Adapter(_))));
    }

    #[test]
    fn test_splice_into_empty_agent_file() {
        let spliced = splice_tagged_block("", "demo", "guidance");
        assert_eq!(
            spliced,
            "<!-- satchel:demo -->\nguidance\n<!-- /satchel:demo -->\n"
        );
    }

    #[test]
    fn test_splice_preserves_user_content() {
        let existing = "# My project\n\nUser notes.\n";
        let spliced = splice_tagged_block(existing, "demo", "guidance");
        assert!(spliced.starts_with("# My project"));
        assert!(spliced.contains("User notes."));
        assert!(spliced.contains("<!-- satchel:demo -->\nguidance\n"));
    }

    #[test]
    fn test_splice_replaces_previous_block() {
        let first = splice_tagged_block("# Top\n", "demo", "v1");
        let second = splice_tagged_block(&first, "demo", "v2");
        assert!(second.contains("v2"));
        assert!(!second.contains("v1"));
        assert_eq!(second.matches("<!-- satchel:demo -->").count(), 1);
    }

    #[test]
    fn test_mcp_config_merge_overwrites_own_names() {
        let adapter = ClaudeAdapter::new();
        let existing = json!({
            "mcpServers": {
                "keep-me": {"command": "keep"},
                "demo-db": {"command": "old"}
            }
        });
        let incoming = json!({"demo-db": {"command": "new"}});

        let merged = adapter.merge_mcp_config(existing, &incoming);
        assert_eq!(merged["mcpServers"]["keep-me"]["command"], "keep");
        assert_eq!(merged["mcpServers"]["demo-db"]["command"], "new");
    }

    #[test]
    fn test_grant_and_revoke_permissions() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let adapter = ClaudeAdapter::new();
        let patterns = vec!["skill:demo:*".to_string(), "skill:shared:*".to_string()];

        assert!(grant_permissions(dir.path(), &patterns).is_ok());
        let settings_path = dir.path().join(SETTINGS_FILE);
        let content = fs::read_to_string(&settings_path).unwrap_or_default();
        assert!(content.contains("skill:demo:*"));

        let revoked = adapter.revoke_permissions(dir.path(), &["skill:demo:*".to_string()]);
        assert!(revoked.is_ok());
        let content = fs::read_to_string(&settings_path).unwrap_or_default();
        assert!(!content.contains("skill:demo:*"));
        assert!(content.contains("skill:shared:*"));
    }

    #[test]
    fn test_compatibility_warning_for_newer_platform_requirement() {
        let adapter = ClaudeAdapter::new();
        let mut m = manifest("demo");
        m.platform = Some(satchel_manifest::descriptor::PlatformSection {
            min_version: Some("99.0.0".to_string()),
        });

        let warnings = adapter.validate_compatibility(&m);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("99.0.0"));

        assert!(adapter.validate_compatibility(&manifest("demo")).is_empty());
    }
}
