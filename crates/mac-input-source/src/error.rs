use std::result::Result as StdResult;

use thiserror::Error;

/// Errors returned by the input source gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// No enabled input source carries this identifier.
    #[error("input source not found: {0}")]
    NotFound(String),
    /// The OS refused to select the source.
    #[error("failed to select {id} (status {status})")]
    Select {
        /// Source identifier.
        id: String,
        /// OSStatus returned by `TISSelectInputSource`.
        status: i32,
    },
}

/// Result alias for gateway operations.
pub type Result<T> = StdResult<T, Error>;
