//! Error types for batchflow-core.

use thiserror::Error;

/// Result type for batchflow-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in batchflow-core.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid configuration (descriptor fields, settings, documents).
    #[error("configuration error: {0}")]
    Config(String),

    /// A configuration document could not be parsed.
    #[error("invalid configuration document {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The batch-processor executable could not be started or waited on.
    #[error("launch error: {0}")]
    Launch(String),

    /// A pipeline stage failed; the flow stops here.
    #[error("flow aborted: {0}")]
    Flow(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
