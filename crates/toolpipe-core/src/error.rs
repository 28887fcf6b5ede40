//! Error types for Toolpipe Core

use thiserror::Error;
use toolpipe_mcp::McpError;

/// Result type alias using Toolpipe Error
pub type Result<T> = std::result::Result<T, Error>;

/// Session- and query-level errors
///
/// Failures local to a single tool call are not errors; they are reported as
/// [`crate::orchestration::ExecutionOutcome`] values and fed back to the model.
#[derive(Error, Debug)]
pub enum Error {
    /// The tool host could not be reached, or the channel to it is gone
    #[error("Connection error: {0}")]
    Connection(String),

    /// The channel failed during a completion or tool round
    #[error("Transport error: {0}")]
    Transport(String),

    /// The completion API rejected the request or returned garbage
    #[error("Provider error: {0}")]
    Provider(String),

    /// The tool host declared a catalog that cannot be offered to the model
    #[error("Invalid tool catalog: {0}")]
    Catalog(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<McpError> for Error {
    fn from(err: McpError) -> Self {
        match err {
            McpError::Closed => Error::Connection(err.to_string()),
            other => Error::Transport(other.to_string()),
        }
    }
}
