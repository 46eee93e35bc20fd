use std::path::PathBuf;

use protobuilder_common::EngineError;
use thiserror::Error;

/// Errors from the container lifecycle.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Source path {} does not exist or is not a directory", path.display())]
    SourceMissing { path: PathBuf },

    #[error("Failed to archive {}: {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No command provided")]
    EmptyCommand,

    #[error("Bootstrap command `{command}` failed in container {container}: {message}")]
    Bootstrap {
        container: String,
        command: String,
        message: String,
    },

    #[error("Error retrieving logs: {0}")]
    LogUnavailable(String),

    #[error("Invalid runtime config {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error(transparent)]
    Engine(#[from] EngineError),
}
