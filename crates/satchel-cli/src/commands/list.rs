use colored::Colorize;

use satchel_logger as logger;
use satchel_manifest::{Lockfile, StateFile};

use crate::GlobalOpts;

/// List installed plugins from the state file, with locked versions
pub fn list_plugins(opts: &GlobalOpts) -> Result<(), String> {
    let project_root = opts.project_root()?;

    let state =
        StateFile::load(&project_root).map_err(|e| format!("Failed to load state: {}", e))?;
    let lockfile = Lockfile::load(&project_root).unwrap_or_else(|e| {
        logger::warn(&format!("Failed to load lockfile: {}", e));
        Lockfile::default()
    });

    if state.is_empty() {
        println!("No plugins installed.");
        return Ok(());
    }

    println!("{}", "Installed plugins:".bold());
    for name in state.plugin_names() {
        let Some(entry) = state.plugin(&name) else {
            continue;
        };

        let version = entry
            .version
            .clone()
            .or_else(|| lockfile.locked_version(&name).map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());

        let mut details = vec![format!("{} file(s)", entry.files.len())];
        if !entry.mcp_servers.is_empty() {
            details.push(format!("{} mcp server(s)", entry.mcp_servers.len()));
        }
        if !entry.permissions.is_empty() {
            details.push(format!("{} permission(s)", entry.permissions.len()));
        }

        println!(
            " {} {} {} {}",
            "*".bold().green(),
            name.bold(),
            version.cyan(),
            format!("({})", details.join(", ")).dimmed()
        );

        if lockfile.is_locked(&name) && logger::get_verbosity() >= 1 {
            if let Some(locked) = lockfile.locked_entry(&name) {
                println!("     locked to {} from {}", locked.version, locked.source);
            }
        }
    }

    Ok(())
}
