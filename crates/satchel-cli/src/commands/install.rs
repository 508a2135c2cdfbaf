use colored::Colorize;

use satchel_config::PluginSpec;
use satchel_logger as logger;

use crate::install::{InstallOptions, Installer};
use crate::GlobalOpts;

use super::setup_project;

/// Options for the install command
#[derive(Debug, Default)]
pub struct InstallArgs {
    /// Plugins to install (`name` or `name@version`); empty means every
    /// plugin declared in satchel.toml
    pub plugins: Vec<String>,
    /// Direct source locator (single plugin only)
    pub source: Option<String>,
    /// Named registry or registry URL override
    pub registry: Option<String>,
    /// Skip lockfile reads and writes
    pub no_lock: bool,
    /// Overwrite conflicting unmanaged files
    pub force: bool,
}

/// Install plugins into the project
pub fn install_plugins(args: InstallArgs, opts: &GlobalOpts) -> Result<(), String> {
    let (project_root, config, adapter) = setup_project(opts)?;
    let total_start = std::time::Instant::now();

    let requests = build_requests(&args, &config)?;
    if requests.is_empty() {
        logger::warn("Nothing to install: no plugins requested or declared in satchel.toml");
        return Ok(());
    }

    logger::debug(&format!(
        "Installing {} plugin(s) into {}",
        requests.len(),
        project_root.display()
    ));

    let options = InstallOptions {
        use_lock: !args.no_lock,
        update_lock: !args.no_lock,
        force: args.force,
    };

    logger::spinner_start("Installing plugins...");
    let mut installer = Installer::new(project_root, &config, adapter, options);
    let outcome = installer.install(&requests);
    logger::spinner_clear();
    let summary = outcome.map_err(|e| format!("Install failed: {}", e))?;

    for result in &summary.results {
        if result.success {
            println!(" {} {}", "+".bold().green(), result.message);
        } else {
            println!(
                " {} {} {}",
                "x".bold().red(),
                result.plugin.bold(),
                result.message.dimmed()
            );
        }
        for warning in &result.warnings {
            logger::warn(warning);
        }
    }

    for name in &summary.skipped {
        println!(" {} {} {}", "-".bold().yellow(), name, "(skipped)".dimmed());
    }

    for warning in &summary.env_warnings {
        logger::warn(warning);
    }

    let elapsed_ms = total_start.elapsed().as_millis();
    println!(
        "{}",
        format!(
            "Installed {} plugin(s) in {}ms",
            summary.installed(),
            elapsed_ms
        )
        .bold()
        .dimmed()
    );

    if summary.is_success() {
        Ok(())
    } else {
        Err(format!("{} plugin(s) failed to install", summary.failed()))
    }
}

/// Turn command-line arguments into a `(name, spec)` batch
fn build_requests(
    args: &InstallArgs,
    config: &satchel_config::ProjectConfig,
) -> Result<Vec<(String, PluginSpec)>, String> {
    if args.plugins.is_empty() {
        if args.source.is_some() {
            return Err("--source requires a plugin name".to_string());
        }
        return Ok(config.plugins());
    }

    if args.source.is_some() && args.plugins.len() > 1 {
        return Err("--source can only be used with a single plugin".to_string());
    }

    let mut requests = Vec::new();
    for raw in &args.plugins {
        let (name, version) = split_version(raw)?;

        // An explicit CLI request starts from the declared spec, if any
        let mut spec = config.plugin_spec(&name).unwrap_or_default();
        if let Some(version) = version {
            spec.version = Some(version);
        }
        if let Some(source) = &args.source {
            spec.source = Some(source.clone());
        }
        if let Some(registry) = &args.registry {
            spec.registry = Some(registry.clone());
        }

        requests.push((name, spec));
    }
    Ok(requests)
}

/// Split `name@version` into its parts
fn split_version(raw: &str) -> Result<(String, Option<String>), String> {
    match raw.split_once('@') {
        Some((name, version)) => {
            if name.is_empty() || version.is_empty() {
                return Err(format!("Invalid plugin spec '{}'", raw));
            }
            Ok((name.to_string(), Some(version.to_string())))
        }
        None => Ok((raw.to_string(), None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_version() {
        assert_eq!(
            split_version("demo@1.2.0"),
            Ok(("demo".to_string(), Some("1.2.0".to_string())))
        );
        assert_eq!(split_version("demo"), Ok(("demo".to_string(), None)));
        assert!(split_version("@1.2.0").is_err());
        assert!(split_version("demo@").is_err());
    }

    #[test]
    fn test_build_requests_prefers_cli_version() {
        let mut config = satchel_config::ProjectConfig::default();
        config.set_plugin_spec("demo", PluginSpec::version("1.0.0"));

        let args = InstallArgs {
            plugins: vec!["demo@2.0.0".to_string()],
            ..Default::default()
        };
        let requests = build_requests(&args, &config).unwrap_or_default();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].1.version.as_deref(), Some("2.0.0"));
    }

    #[test]
    fn test_build_requests_source_needs_single_plugin() {
        let config = satchel_config::ProjectConfig::default();
        let args = InstallArgs {
            plugins: vec!["a".to_string(), "b".to_string()],
            source: Some("../plugins/a".to_string()),
            ..Default::default()
        };
        assert!(build_requests(&args, &config).is_err());
    }
}
