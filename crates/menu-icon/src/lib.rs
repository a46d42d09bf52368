//! Menu bar status icon for inputswitch.
//!
//! The icon is an 18x18 RGBA composite of the active input source's glyph, a
//! status dot, a circular badge of the foreground application and a short
//! pulse dot after each switch. Rendered icons are cached as PNG files keyed
//! by everything that affects their pixels.

mod render;

use std::{
    env, fs, io,
    path::{Path, PathBuf},
    result::Result as StdResult,
    time::SystemTime,
};

use config::IndicatorColor;
use image::{ImageError, ImageFormat, RgbaImage};
use thiserror::Error;
use tracing::{debug, trace, warn};

pub use render::ICON_SIZE;

/// Rendered icons kept on disk before the oldest are removed.
pub const DEFAULT_CACHE_LIMIT: usize = 256;

/// Errors from icon loading and the on-disk cache.
#[derive(Debug, Error)]
pub enum Error {
    /// Image decode or encode failure.
    #[error("image error: {0}")]
    Image(#[from] ImageError),
    /// Cache directory or file I/O failure.
    #[error("icon cache I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result alias for icon operations.
pub type Result<T> = StdResult<T, Error>;

/// Everything that determines the rendered icon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconState {
    /// Active input source.
    pub source_id: String,
    /// Foreground application.
    pub app_id: String,
    /// Whether automatic switching is enabled.
    pub enabled: bool,
    /// Whether the post-switch pulse is showing.
    pub pulse: bool,
    /// Status dot color.
    pub status_dot: IndicatorColor,
    /// Pulse dot color.
    pub switch_dot: IndicatorColor,
}

impl IconState {
    /// Cache key: `v5|source|app|enabled|pulse|status|switch`, with `/` replaced by `_`.
    pub fn cache_key(&self) -> String {
        format!(
            "v5|{}|{}|{}|{}|{}|{}",
            self.source_id,
            self.app_id,
            u8::from(self.enabled),
            u8::from(self.pulse),
            self.status_dot.name(),
            self.switch_dot.name()
        )
        .replace('/', "_")
    }
}

/// Render without consulting any cache.
pub fn render(
    state: &IconState,
    input_icon: Option<&RgbaImage>,
    app_icon: Option<&RgbaImage>,
) -> RgbaImage {
    render::composite(state, input_icon, app_icon)
}

/// Decode an image file (PNG or TIFF) into RGBA.
pub fn load_icon(path: &Path) -> Result<RgbaImage> {
    Ok(image::open(path)?.to_rgba8())
}

/// Decode in-memory image data (PNG or TIFF) into RGBA.
pub fn decode_icon(bytes: &[u8]) -> Result<RgbaImage> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

/// PNG cache of rendered icons.
///
/// Every source × app × state combination gets its own file. After each new
/// file is written, the oldest files beyond the cache limit are deleted.
#[derive(Debug, Clone)]
pub struct IconCache {
    /// Directory holding `<key>.png` files.
    dir: PathBuf,
    /// Maximum number of cached files.
    limit: usize,
}

impl IconCache {
    /// Cache rooted at `dir`; the directory is created on first store.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_limit(dir, DEFAULT_CACHE_LIMIT)
    }

    /// Cache rooted at `dir` holding at most `limit` files (at least one).
    pub fn with_limit(dir: impl Into<PathBuf>, limit: usize) -> Self {
        Self {
            dir: dir.into(),
            limit: limit.max(1),
        }
    }

    /// `~/Library/Caches/inputswitch/menu-icons`.
    pub fn default_dir() -> PathBuf {
        let mut p = PathBuf::from(env::var_os("HOME").unwrap_or_default());
        p.push("Library/Caches/inputswitch/menu-icons");
        p
    }

    /// Cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File used for `state`.
    pub fn path_for(&self, state: &IconState) -> PathBuf {
        self.dir.join(format!("{}.png", state.cache_key()))
    }

    /// Icon for `state`, from the cache when present, otherwise rendered and stored.
    ///
    /// Cache failures are logged; a rendered icon is always returned.
    pub fn icon(
        &self,
        state: &IconState,
        input_icon: Option<&RgbaImage>,
        app_icon: Option<&RgbaImage>,
    ) -> RgbaImage {
        let path = self.path_for(state);
        if path.exists() {
            match load_icon(&path) {
                Ok(img) if img.dimensions() == (ICON_SIZE, ICON_SIZE) => return img,
                Ok(_) => debug!("cached icon has wrong size: {}", path.display()),
                Err(e) => debug!("unreadable cached icon {}: {}", path.display(), e),
            }
        }
        let img = render(state, input_icon, app_icon);
        if let Err(e) = self.store(&path, &img) {
            warn!("failed to cache icon {}: {}", path.display(), e);
        } else if let Err(e) = self.prune(&path) {
            debug!("icon cache cleanup failed: {}", e);
        }
        img
    }

    /// Delete the oldest PNGs until at most `limit` remain, never removing `keep`.
    fn prune(&self, keep: &Path) -> Result<()> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path == keep || path.extension().is_none_or(|e| e != "png") {
                continue;
            }
            let modified = fs::metadata(&path)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            files.push((modified, path));
        }
        // `keep` takes one slot
        let excess = (files.len() + 1).saturating_sub(self.limit);
        if excess == 0 {
            return Ok(());
        }
        files.sort();
        for (_, path) in files.into_iter().take(excess) {
            trace!("evicting cached icon {}", path.display());
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Write `img` to `path` as PNG.
    fn store(&self, path: &Path, img: &RgbaImage) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        img.save_with_format(path, ImageFormat::Png)?;
        Ok(())
    }
}
