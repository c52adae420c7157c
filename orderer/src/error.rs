//! Error types for the orderer bootstrap.

use std::process::ExitStatus;
use thiserror::Error;

/// Errors that can occur while bootstrapping an orderer node.
#[derive(Debug, Error)]
pub enum Error {
    /// A required parameter is missing or malformed
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A certificate required by the peer identity store is absent or empty
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    /// An external tool exited unsuccessfully
    #[error("{tool} exited with {status}")]
    ToolInvocation { tool: String, status: ExitStatus },

    /// An external tool could not be started
    #[error("failed to spawn {tool}: {source}")]
    ToolSpawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The status store could not be reached or rejected the operation
    #[error("status store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl From<mongodb::error::Error> for Error {
    fn from(err: mongodb::error::Error) -> Self {
        Error::StoreUnavailable(err.to_string())
    }
}
