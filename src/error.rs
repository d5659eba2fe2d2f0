use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Command `{command}` failed with exit code {exit_code}: {stderr}")]
    RemoteCommand {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Release left half-applied: live slot is {}, but {source}", .live_slot.display())]
    StateInconsistency {
        live_slot: PathBuf,
        #[source]
        source: Box<DeployError>,
    },

    #[error("Live symlink points outside the two-slot scheme: {}", .target.display())]
    InvalidSlot { target: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DeployError {
    pub fn config(message: impl Into<String>) -> Self {
        DeployError::Configuration(message.into())
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;
