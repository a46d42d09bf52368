//! Read and write the policy file.

use std::{
    fs,
    io::{self, Write as _},
    path::Path,
};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::{Error, Policy, Result};

/// Load a [`Policy`] from a JSON file at `path`.
///
/// A missing file yields [`Policy::default`]; any other read failure or a
/// malformed document is reported with the path attached.
pub fn load_from_path(path: &Path) -> Result<Policy> {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("no policy file at {}; using defaults", path.display());
            return Ok(Policy::default());
        }
        Err(e) => {
            return Err(Error::Read {
                path: Some(path.to_path_buf()),
                message: e.to_string(),
            });
        }
    };
    parse(&text).map_err(|e| match e {
        Error::Parse {
            line, col, message, ..
        } => Error::Parse {
            path: Some(path.to_path_buf()),
            line,
            col,
            message,
        },
        other => other,
    })
}

/// Parse a policy document. Empty or whitespace-only input is the default policy.
pub(crate) fn parse(text: &str) -> Result<Policy> {
    if text.trim().is_empty() {
        return Ok(Policy::default());
    }
    serde_json::from_str(text).map_err(|e| Error::Parse {
        path: None,
        line: e.line(),
        col: e.column(),
        message: e.to_string(),
    })
}

/// Atomically write `policy` to `path`, creating parent directories as needed.
///
/// The document goes to a temporary file in the destination directory first
/// and is then renamed over `path`, so readers never observe a partial file.
pub fn save_to_path(path: &Path, policy: &Policy) -> Result<()> {
    let write_err = |message: String| Error::Write {
        path: Some(path.to_path_buf()),
        message,
    };
    let json = serde_json::to_string_pretty(policy).map_err(|e| write_err(e.to_string()))?;
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| write_err(e.to_string()))?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| write_err(e.to_string()))?;
    tmp.write_all(json.as_bytes())
        .and_then(|()| tmp.write_all(b"\n"))
        .and_then(|()| tmp.flush())
        .map_err(|e| write_err(e.to_string()))?;
    tmp.persist(path).map_err(|e| write_err(e.error.to_string()))?;
    debug!("policy written to {}", path.display());
    Ok(())
}
