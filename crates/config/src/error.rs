//! Error types for policy loading and persistence.

use std::{
    path::{Path, PathBuf},
    result::Result as StdResult,
};

use thiserror::Error;

/// Convenient result type for the config crate.
pub type Result<T> = StdResult<T, Error>;

#[derive(Debug, Error, Clone)]
/// Errors produced while loading or persisting the policy file.
pub enum Error {
    #[error("{message}")]
    /// I/O or filesystem read error.
    Read {
        /// Optional path associated with the read error.
        path: Option<PathBuf>,
        /// Human-readable error message.
        message: String,
    },
    #[error("{message}")]
    /// The policy file exists but is not a valid policy document.
    Parse {
        /// Optional path associated with the parse error.
        path: Option<PathBuf>,
        /// 1-based line number reported by the JSON parser.
        line: usize,
        /// 1-based column number reported by the JSON parser.
        col: usize,
        /// Human-readable error message.
        message: String,
    },
    #[error("{message}")]
    /// Serializing or writing the policy file failed.
    Write {
        /// Optional path associated with the write error.
        path: Option<PathBuf>,
        /// Human-readable error message.
        message: String,
    },
}

impl Error {
    /// Render a human-friendly error message including the location when available.
    pub fn pretty(&self) -> String {
        match self {
            Self::Read { path, message } => match path {
                Some(p) => format!("Read error at {}: {}", p.display(), message),
                None => format!("Read error: {}", message),
            },
            Self::Parse {
                path,
                line,
                col,
                message,
            } => match path {
                Some(p) => format!(
                    "Policy parse error at {}:{}:{}\n{}",
                    p.display(),
                    line,
                    col,
                    message
                ),
                None => format!(
                    "Policy parse error at line {}, column {}\n{}",
                    line, col, message
                ),
            },
            Self::Write { path, message } => match path {
                Some(p) => format!("Write error at {}: {}", p.display(), message),
                None => format!("Write error: {}", message),
            },
        }
    }

    /// Access the optional path attached to this error.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Read { path, .. } | Self::Parse { path, .. } | Self::Write { path, .. } => {
                path.as_deref()
            }
        }
    }
}
