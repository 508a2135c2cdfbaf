use std::path::PathBuf;
use thiserror::Error;

/// Errors from the persistent stores (state file, lockfile)
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse store file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize store file: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Errors from plugin descriptor loading
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No plugin descriptor (plugin.toml or plugin.yaml) in {0}")]
    NotFound(PathBuf),

    #[error("Failed to parse plugin descriptor: {0}")]
    ParseToml(#[from] toml::de::Error),

    #[error("Failed to parse plugin descriptor: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Invalid plugin descriptor: {0}")]
    Invalid(String),
}
