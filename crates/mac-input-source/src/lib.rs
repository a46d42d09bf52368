//! mac-input-source: list, select and identify keyboard input sources on macOS.
//!
//! A thin wrapper over the Carbon Text Input Sources API. Only sources that the
//! user has enabled are visible; "selectable" further restricts the list to
//! keyboard-category sources the OS reports as select-capable.
//!
//! All calls are synchronous and may be made from any thread.

mod error;
mod tis;

use std::path::PathBuf;

use tracing::{debug, warn};

pub use error::{Error, Result};

/// Descriptor for one installed input source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSource {
    /// Stable identifier, e.g. `com.apple.keylayout.ABC`.
    pub id: String,
    /// Localized display name.
    pub name: String,
    /// Location of the source's icon image, when the OS reports one.
    pub icon_url: Option<PathBuf>,
}

/// Sort sources by display name, ignoring case.
fn sort_by_name(sources: &mut [InputSource]) {
    sources.sort_by_cached_key(|s| s.name.to_lowercase());
}

/// Enabled, select-capable keyboard input sources sorted by display name.
pub fn selectable_keyboard_sources() -> Vec<InputSource> {
    let mut out: Vec<InputSource> = tis::list_all()
        .into_iter()
        .filter_map(|(src, selectable)| selectable.then_some(src))
        .collect();
    sort_by_name(&mut out);
    debug!("{} selectable keyboard sources", out.len());
    out
}

/// Look up an enabled source by identifier. Surrounding whitespace is ignored.
pub fn find(id: &str) -> Option<InputSource> {
    let id = id.trim();
    if id.is_empty() {
        return None;
    }
    tis::find(id)
}

/// Make the source with identifier `id` the active keyboard input source.
pub fn select(id: &str) -> Result<()> {
    let id = id.trim();
    match tis::select(id) {
        None => Err(Error::NotFound(id.to_string())),
        Some(0) => {
            debug!("selected input source {}", id);
            Ok(())
        }
        Some(status) => {
            warn!("TISSelectInputSource({}) returned {}", id, status);
            Err(Error::Select {
                id: id.to_string(),
                status,
            })
        }
    }
}

/// Identifier of the active keyboard input source.
pub fn current_source_id() -> Option<String> {
    tis::current_id()
}

/// Localized name for `id`, falling back to the identifier itself.
pub fn display_name(id: &str) -> String {
    find(id).map(|s| s.name).unwrap_or_else(|| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn src(id: &str, name: &str) -> InputSource {
        InputSource {
            id: id.to_string(),
            name: name.to_string(),
            icon_url: None,
        }
    }

    #[test]
    fn sorts_case_insensitively() {
        let mut v = vec![
            src("c", "pinyin"),
            src("a", "ABC"),
            src("b", "Hiragana"),
        ];
        sort_by_name(&mut v);
        let names: Vec<_> = v.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["ABC", "Hiragana", "pinyin"]);
    }

    #[test]
    fn find_rejects_blank_ids() {
        assert_eq!(find("   "), None);
        assert_eq!(find(""), None);
    }

    #[test]
    #[ignore = "requires a macOS session with input sources"]
    fn current_source_is_selectable() {
        let current = current_source_id().expect("current source");
        let all = selectable_keyboard_sources();
        assert!(all.iter().any(|s| s.id == current));
        assert!(find(&current).is_some());
    }

    #[test]
    #[ignore = "requires a macOS session with input sources"]
    fn selecting_unknown_source_is_not_found() {
        assert_eq!(
            select("com.example.missing"),
            Err(Error::NotFound("com.example.missing".into()))
        );
        assert_eq!(display_name("com.example.missing"), "com.example.missing");
    }
}
