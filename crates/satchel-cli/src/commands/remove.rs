use std::fs;

use colored::Colorize;
use serde_json::{json, Value};

use satchel_logger as logger;
use satchel_manifest::{Lockfile, StateFile};

use crate::install::prune_upward;
use crate::GlobalOpts;

use super::setup_project;

/// Remove a plugin: delete its managed files, prune emptied directories,
/// withdraw its now-unreferenced registrations and drop its state and lock
/// entries
pub fn remove_plugin(plugin: &str, opts: &GlobalOpts) -> Result<(), String> {
    let (project_root, _config, adapter) = setup_project(opts)?;

    let mut state =
        StateFile::load(&project_root).map_err(|e| format!("Failed to load state: {}", e))?;

    let Some(entry) = state.plugin(plugin).cloned() else {
        logger::warn(&format!("Plugin '{}' is not installed", plugin));
        return Ok(());
    };

    // Permissions shared with another plugin stay granted
    let revocable = state.revocable_permissions(plugin);

    let mut removed_count = 0usize;
    for file in &entry.files {
        let full = project_root.join(file);
        if full.is_file() {
            fs::remove_file(&full).map_err(|e| format!("Failed to remove '{}': {}", file, e))?;
            removed_count += 1;
        }
        if let Some(parent) = full.parent() {
            prune_upward(&project_root, parent);
        }
    }
    for dir in &entry.directories {
        prune_upward(&project_root, &project_root.join(dir));
    }

    if !entry.mcp_servers.is_empty() {
        if let Some(path) = adapter.mcp_config_path(&project_root) {
            if let Err(e) = remove_mcp_entries(&path, &entry.mcp_servers) {
                logger::warn(&format!("Failed to update auxiliary config: {}", e));
            }
        }
    }

    if let Err(e) = adapter.revoke_permissions(&project_root, &revocable) {
        logger::warn(&format!("Failed to revoke permissions: {}", e));
    }

    state.remove_plugin(plugin);
    state
        .save(&project_root)
        .map_err(|e| format!("Failed to save state: {}", e))?;

    match Lockfile::load(&project_root) {
        Ok(mut lockfile) => {
            if lockfile.remove_entry(plugin).is_some() {
                if let Err(e) = lockfile.save(&project_root) {
                    logger::warn(&format!("Failed to update lockfile: {}", e));
                }
            }
        }
        Err(e) => {
            logger::warn(&format!("Failed to load lockfile: {}", e));
        }
    }

    println!(
        "{}",
        format!("Removed {} managed file(s)", removed_count).dimmed()
    );
    println!(" {} {}", "-".bold().red(), plugin.bold());

    Ok(())
}

/// Remove this plugin's server entries from the auxiliary config file
fn remove_mcp_entries(path: &std::path::Path, servers: &[String]) -> Result<(), String> {
    if !path.is_file() {
        return Ok(());
    }

    let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
    let mut config: Value = serde_json::from_str(&content).unwrap_or_else(|_| json!({}));

    if let Some(entries) = config.get_mut("mcpServers").and_then(Value::as_object_mut) {
        for server in servers {
            entries.remove(server);
        }
    }

    let mut updated = serde_json::to_string_pretty(&config).map_err(|e| e.to_string())?;
    updated.push('\n');
    fs::write(path, updated).map_err(|e| e.to_string())
}
