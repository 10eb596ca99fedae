//! CLI error types.

use chatmd_config::ConfigError;
use std::io;

#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("error reading '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("error writing '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid placeholder file '{path}': {source}")]
    Placeholders {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Io(#[from] io::Error),
}
