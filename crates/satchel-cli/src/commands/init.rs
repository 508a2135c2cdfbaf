use colored::Colorize;
use std::fs;

use satchel_config::{ProjectConfig, CONFIG_FILE_NAME};
use satchel_logger as logger;

use crate::GlobalOpts;

const STARTER_CONFIG: &str = r#"# satchel project configuration
#
# Declare the host platform and the plugins this project uses, then run
# `satchel install`.

[project]
platform = "claude"
# default_registry = "https://plugins.example.com"

# [registries]
# internal = "https://registry.internal.example.com"

# [plugins]
# code-review = "^1.0"
# scratch = { source = "../plugins/scratch" }
"#;

/// Write a starter satchel.toml into the project
pub fn init_project(opts: &GlobalOpts) -> Result<(), String> {
    let project_root = opts.project_root()?;

    if ProjectConfig::exists(&project_root) {
        logger::warn(&format!(
            "{} already exists in {}",
            CONFIG_FILE_NAME,
            project_root.display()
        ));
        return Ok(());
    }

    let path = ProjectConfig::path(&project_root);
    fs::write(&path, STARTER_CONFIG)
        .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;

    logger::success(&format!("Created {}", CONFIG_FILE_NAME));
    println!(
        "{}",
        "Edit it to declare plugins, then run `satchel install`.".dimmed()
    );
    Ok(())
}
