//! satchel-manifest - plugin descriptors and persistent install state
//!
//! This crate owns the three on-disk records satchel maintains:
//! - the plugin descriptor (`plugin.toml` / `plugin.yaml`) shipped inside a
//!   plugin package, parsed into typed component lists
//! - the state file (`.satchel/state.toml`), the system of record for every
//!   path and side-effect satchel created on a plugin's behalf
//! - the lockfile (`satchel.lock`), the exact versions last installed

pub mod descriptor;
pub mod errors;
pub mod lockfile;
pub mod state;

pub use descriptor::{
    AgentFileInjection, Component, ComponentKind, ContextItem, ContextSpec, McpServerDecl,
    PluginManifest,
};
pub use errors::{DescriptorError, StoreError};
pub use lockfile::{LockEntry, Lockfile};
pub use state::{PluginState, StateFile};
