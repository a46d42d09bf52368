//! Source and application images feeding the status icon.

use std::collections::HashMap;

use image::{
    RgbaImage,
    imageops::{self, FilterType},
};
use objc2_app_kit::NSWorkspace;
use objc2_foundation::NSString;
use tracing::trace;

// Application icons are reduced to this size before compositing
const APP_ICON_PX: u32 = 32;

/// Per-id memo of decoded images; `None` records a failed lookup.
#[derive(Default)]
pub struct IconImages {
    /// Input source id -> glyph.
    sources: HashMap<String, Option<RgbaImage>>,
    /// Bundle id -> application icon.
    apps: HashMap<String, Option<RgbaImage>>,
}

impl IconImages {
    /// Glyph for `source_id` and icon for `app_id`, loading each at most once.
    pub fn pair(
        &mut self,
        source_id: &str,
        app_id: &str,
    ) -> (Option<&RgbaImage>, Option<&RgbaImage>) {
        let source = self
            .sources
            .entry(source_id.to_string())
            .or_insert_with(|| load_source_icon(source_id))
            .as_ref();
        let app = self
            .apps
            .entry(app_id.to_string())
            .or_insert_with(|| load_app_icon(app_id))
            .as_ref();
        (source, app)
    }
}

/// Decode the source's icon image; formats `image` cannot read yield `None`.
fn load_source_icon(source_id: &str) -> Option<RgbaImage> {
    let path = mac_input_source::find(source_id)?.icon_url?;
    match menu_icon::load_icon(&path) {
        Ok(img) => Some(img),
        Err(e) => {
            trace!("source icon {} unreadable: {}", path.display(), e);
            None
        }
    }
}

/// Application icon via `NSWorkspace`, decoded from its TIFF representation.
fn load_app_icon(bundle_id: &str) -> Option<RgbaImage> {
    if bundle_id.is_empty() {
        return None;
    }
    let bytes = unsafe {
        let ws = NSWorkspace::sharedWorkspace();
        let url = ws.URLForApplicationWithBundleIdentifier(&NSString::from_str(bundle_id))?;
        let path = url.path()?;
        ws.iconForFile(&path).TIFFRepresentation()?.to_vec()
    };
    let img = menu_icon::decode_icon(&bytes).ok()?;
    Some(imageops::resize(&img, APP_ICON_PX, APP_ICON_PX, FilterType::Triangle))
}
