use std::path::PathBuf;

use satchel_config::ProjectConfig;
use satchel_logger as logger;

use crate::adapter::{self, PlatformAdapter};
use crate::GlobalOpts;

pub mod init;
pub mod install;
pub mod list;
pub mod remove;

pub use init::init_project;
pub use install::{install_plugins, InstallArgs};
pub use list::list_plugins;
pub use remove::remove_plugin;

/// Load the project configuration and its platform adapter
pub(super) fn setup_project(
    opts: &GlobalOpts,
) -> Result<(PathBuf, ProjectConfig, Box<dyn PlatformAdapter>), String> {
    let project_root = opts.project_root()?;

    let config = ProjectConfig::load(&project_root).map_err(|e| {
        logger::error(&format!("Failed to load project config: {}", e));
        format!("Failed to load project config: {}", e)
    })?;

    let adapter = adapter::adapter_for(&config.project.platform).ok_or_else(|| {
        let message = format!("Unsupported platform '{}'", config.project.platform);
        logger::error(&message);
        message
    })?;

    Ok((project_root, config, adapter))
}
