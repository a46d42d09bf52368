use std::result::Result as StdResult;

use thiserror::Error;

/// Convenient result type for the engine crate.
pub type Result<T> = StdResult<T, Error>;

/// Unified error type for the inputswitch engine.
#[derive(Debug, Error)]
pub enum Error {
    /// A switch was requested with an empty or whitespace-only source id.
    #[error("input source id is empty")]
    InvalidArgument,

    /// No installed input source matches the requested id.
    #[error("input source not found: {0}")]
    SourceNotFound(String),

    /// The OS rejected the selection request.
    #[error("switch to {id} failed, status {status}")]
    SelectionFailed {
        /// Requested source id.
        id: String,
        /// OS status code.
        status: i32,
    },

    /// The engine command channel has been closed.
    #[error("engine command channel closed")]
    ChannelClosed,

    /// Errors originating from the activation watcher.
    #[error("activation watcher error: {0}")]
    Watcher(#[from] mac_focus_watcher::Error),
}

impl From<mac_input_source::Error> for Error {
    fn from(e: mac_input_source::Error) -> Self {
        match e {
            mac_input_source::Error::NotFound(id) => Self::SourceNotFound(id),
            mac_input_source::Error::Select { id, status } => Self::SelectionFailed { id, status },
        }
    }
}
