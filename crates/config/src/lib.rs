//! Policy store for inputswitch.
//!
//! The [`Policy`] type carries everything the switching engine consults when
//! the foreground application changes: the enabled flag, the global lock, the
//! application filter and the ordered list of per-application mappings. The
//! [`PolicyStore`] owns the durable copy on disk and hands out snapshots.
#![warn(unsafe_op_in_unsafe_fn)]

use std::{
    env,
    path::{Path, PathBuf},
};

mod defaults;
mod error;
mod loader;
mod store;
mod types;

#[cfg(test)]
mod test_policy;
#[cfg(test)]
mod test_store;

pub use error::{Error, Result};
pub use loader::{load_from_path, save_to_path};
pub use store::PolicyStore;
pub use types::{FilterMode, GlobalLock, Indicator, IndicatorColor, Mapping, Policy};

/// Determine the preferred policy file path (`~/.inputswitch/policy.json`).
pub fn default_config_path() -> PathBuf {
    let mut p = PathBuf::from(env::var_os("HOME").unwrap_or_default());
    p.push(".inputswitch");
    p.push("policy.json");
    p
}

/// Resolve the effective policy path: `explicit` when given, else the default.
///
/// A missing policy file is not an error: the store
/// starts from [`Policy::default`] and creates the file on first mutation.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(|p| p.to_path_buf())
        .unwrap_or_else(default_config_path)
}
