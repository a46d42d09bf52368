//! Installed application discovery.
//!
//! Scans the standard application folders for `.app` bundles and reads their
//! bundle identifier and display name from `Contents/Info.plist`. Bundles are
//! never descended into, and hidden entries are skipped.

use std::{
    collections::HashSet,
    env, fs,
    path::{Path, PathBuf},
};

use plist::Value;
use tracing::{debug, trace};

/// An installed application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    /// Bundle identifier, e.g. `com.apple.Terminal`.
    pub bundle_id: String,
    /// Name shown to the user.
    pub display_name: String,
    /// Location of the `.app` bundle.
    pub path: PathBuf,
}

/// The folders [`discover`] scans, in priority order.
pub fn default_roots() -> Vec<PathBuf> {
    let mut roots = vec![
        PathBuf::from("/Applications"),
        PathBuf::from("/System/Applications"),
    ];
    if let Some(home) = env::var_os("HOME").map(PathBuf::from) {
        roots.push(home.join("Applications"));
    }
    roots
}

/// Installed applications under [`default_roots`].
pub fn discover() -> Vec<AppInfo> {
    discover_in(&default_roots())
}

/// Installed applications under `roots`.
///
/// A bundle id seen under an earlier root wins over later duplicates. The
/// result is sorted case-insensitively by display name.
pub fn discover_in(roots: &[PathBuf]) -> Vec<AppInfo> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for root in roots {
        let mut bundles = Vec::new();
        collect_bundles(root, &mut bundles);
        bundles.sort();
        for path in bundles {
            let Some(app) = read_bundle(&path) else {
                trace!("no bundle id: {}", path.display());
                continue;
            };
            if seen.insert(app.bundle_id.clone()) {
                out.push(app);
            }
        }
    }
    out.sort_by_cached_key(|a| a.display_name.to_lowercase());
    debug!("discovered {} applications", out.len());
    out
}

/// Display name for `app_id` from `apps`, falling back to the id itself.
pub fn display_name_for(apps: &[AppInfo], app_id: &str) -> String {
    apps.iter()
        .find(|a| a.bundle_id == app_id)
        .map(|a| a.display_name.clone())
        .unwrap_or_else(|| app_id.to_string())
}

/// Dot-prefixed file name.
fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

/// `.app` extension.
fn is_app_bundle(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "app")
}

/// Recursively gather `.app` directories below `dir`.
fn collect_bundles(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if is_hidden(&path) {
            continue;
        }
        let Ok(ft) = entry.file_type() else {
            continue;
        };
        if !ft.is_dir() {
            continue;
        }
        if is_app_bundle(&path) {
            out.push(path);
        } else {
            collect_bundles(&path, out);
        }
    }
}

/// Read the bundle id and display name of one `.app` bundle.
fn read_bundle(path: &Path) -> Option<AppInfo> {
    let value = Value::from_file(path.join("Contents").join("Info.plist")).ok()?;
    let dict = value.as_dictionary()?;
    let string = |key: &str| {
        dict.get(key)
            .and_then(|v| v.as_string())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let bundle_id = string("CFBundleIdentifier")?;
    let display_name = string("CFBundleDisplayName")
        .or_else(|| string("CFBundleName"))
        .or_else(|| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| bundle_id.clone());
    Some(AppInfo {
        bundle_id,
        display_name,
        path: path.to_path_buf(),
    })
}
