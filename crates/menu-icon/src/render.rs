//! Pixel-level drawing for the 18x18 status icon.
//!
//! Geometry is expressed in image coordinates (origin top-left, y down).

use config::IndicatorColor;
use image::{
    Rgba, RgbaImage,
    imageops::{self, FilterType},
};

use crate::IconState;

/// Width and height of the composite, in pixels.
pub const ICON_SIZE: u32 = 18;

// Samples per axis when estimating shape coverage
const SUPERSAMPLE: u32 = 4;

/// Grey used for the keyboard glyph while switching is disabled.
const DISABLED_GLYPH: [u8; 3] = [184, 184, 184];

/// Axis-aligned rectangle in pixel units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Rect {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub w: f32,
    /// Height.
    pub h: f32,
}

impl Rect {
    /// Build a rectangle.
    pub(crate) const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Centre point.
    fn center(self) -> (f32, f32) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    /// Integer pixel bounds `(x0, y0, x1, y1)`, clamped to the icon.
    fn pixel_bounds(self) -> (u32, u32, u32, u32) {
        let clamp = |v: f32| v.clamp(0.0, ICON_SIZE as f32) as u32;
        (
            clamp(self.x.floor()),
            clamp(self.y.floor()),
            clamp((self.x + self.w).ceil()),
            clamp((self.y + self.h).ceil()),
        )
    }
}

/// Keyboard glyph area.
pub(crate) const GLYPH: Rect = Rect::new(1.0, 4.2, 12.8, 12.8);
/// Status dot, top-left.
pub(crate) const STATUS_DOT: Rect = Rect::new(0.2, 0.8, 4.0, 4.0);
/// Application badge, bottom-right.
pub(crate) const BADGE: Rect = Rect::new(10.5, 10.5, 7.0, 7.0);
/// Pulse dot, bottom-left.
pub(crate) const PULSE_DOT: Rect = Rect::new(0.4, 13.4, 4.2, 4.2);

/// RGBA for an indicator preset.
pub(crate) fn rgba(color: IndicatorColor) -> Rgba<u8> {
    let (r, g, b) = color.rgb();
    Rgba([r, g, b, 255])
}

/// Source-over blend of `src` onto `dst`, with `src` alpha scaled by `coverage`.
fn blend(dst: &mut Rgba<u8>, src: Rgba<u8>, coverage: f32) {
    let sa = (f32::from(src[3]) / 255.0) * coverage.clamp(0.0, 1.0);
    if sa <= 0.0 {
        return;
    }
    let da = f32::from(dst[3]) / 255.0;
    let out_a = sa + da * (1.0 - sa);
    for c in 0..3 {
        let s = f32::from(src[c]);
        let d = f32::from(dst[c]);
        let v = (s * sa + d * da * (1.0 - sa)) / out_a;
        dst[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round() as u8;
}

/// Fraction of pixel `(px, py)` covered by the ellipse inscribed in `rect`.
fn ellipse_coverage(rect: Rect, px: u32, py: u32) -> f32 {
    let (cx, cy) = rect.center();
    let (rx, ry) = (rect.w / 2.0, rect.h / 2.0);
    let step = 1.0 / SUPERSAMPLE as f32;
    let mut hits = 0u32;
    for sy in 0..SUPERSAMPLE {
        for sx in 0..SUPERSAMPLE {
            let x = px as f32 + (sx as f32 + 0.5) * step;
            let y = py as f32 + (sy as f32 + 0.5) * step;
            let dx = (x - cx) / rx;
            let dy = (y - cy) / ry;
            if dx * dx + dy * dy <= 1.0 {
                hits += 1;
            }
        }
    }
    hits as f32 / (SUPERSAMPLE * SUPERSAMPLE) as f32
}

/// Fill the ellipse inscribed in `rect`.
pub(crate) fn fill_ellipse(img: &mut RgbaImage, rect: Rect, color: Rgba<u8>) {
    let (x0, y0, x1, y1) = rect.pixel_bounds();
    for y in y0..y1 {
        for x in x0..x1 {
            let cov = ellipse_coverage(rect, x, y);
            if cov > 0.0 {
                blend(img.get_pixel_mut(x, y), color, cov);
            }
        }
    }
}

/// Fill an axis-aligned rectangle with pixel-exact edges.
fn fill_rect(img: &mut RgbaImage, rect: Rect, color: Rgba<u8>) {
    let (x0, y0, x1, y1) = rect.pixel_bounds();
    for y in y0..y1 {
        for x in x0..x1 {
            blend(img.get_pixel_mut(x, y), color, 1.0);
        }
    }
}

/// Scale `src` to the integer size of `rect`.
fn fit(src: &RgbaImage, rect: Rect) -> (RgbaImage, u32, u32) {
    let (x0, y0, x1, y1) = rect.pixel_bounds();
    let (w, h) = ((x1 - x0).max(1), (y1 - y0).max(1));
    (imageops::resize(src, w, h, FilterType::Triangle), x0, y0)
}

/// Draw `src` into `rect` as a template: its alpha channel, painted in `tint`.
fn draw_template(img: &mut RgbaImage, src: &RgbaImage, rect: Rect, tint: [u8; 3]) {
    let (scaled, x0, y0) = fit(src, rect);
    for (x, y, p) in scaled.enumerate_pixels() {
        let color = Rgba([tint[0], tint[1], tint[2], p[3]]);
        blend(img.get_pixel_mut(x0 + x, y0 + y), color, 1.0);
    }
}

/// Draw `src` into `rect`, clipped to the inscribed circle.
fn draw_circular(img: &mut RgbaImage, src: &RgbaImage, rect: Rect) {
    let (scaled, x0, y0) = fit(src, rect);
    for (x, y, p) in scaled.enumerate_pixels() {
        let (px, py) = (x0 + x, y0 + y);
        let cov = ellipse_coverage(rect, px, py);
        if cov > 0.0 {
            blend(img.get_pixel_mut(px, py), *p, cov);
        }
    }
}

/// Built-in keyboard shape: a rounded body with three rows of keys.
fn fallback_keyboard() -> RgbaImage {
    let mut kb = RgbaImage::new(16, 16);
    let body = Rgba([0, 0, 0, 255]);
    let hole = Rgba([0, 0, 0, 0]);
    fill_rect(&mut kb, Rect::new(0.0, 3.0, 16.0, 10.0), body);
    // Corners
    for (x, y) in [(0, 3), (15, 3), (0, 12), (15, 12)] {
        kb.put_pixel(x, y, hole);
    }
    // Key caps punched out of the body
    for row in 0..2u32 {
        for col in 0..5u32 {
            kb.put_pixel(2 + col * 3, 5 + row * 2, hole);
        }
    }
    for x in 4..12 {
        kb.put_pixel(x, 10, hole);
    }
    kb
}

/// Render the full composite for `state`.
pub(crate) fn composite(
    state: &IconState,
    input_icon: Option<&RgbaImage>,
    app_icon: Option<&RgbaImage>,
) -> RgbaImage {
    let mut img = RgbaImage::new(ICON_SIZE, ICON_SIZE);

    let tint = if state.enabled {
        [255, 255, 255]
    } else {
        DISABLED_GLYPH
    };
    match input_icon {
        Some(icon) => draw_template(&mut img, icon, GLYPH, tint),
        None => draw_template(&mut img, &fallback_keyboard(), GLYPH, tint),
    }

    if state.enabled {
        fill_ellipse(&mut img, STATUS_DOT, rgba(state.status_dot));
    }

    match app_icon {
        Some(icon) => draw_circular(&mut img, icon, BADGE),
        None => fill_ellipse(&mut img, BADGE, Rgba([0, 0, 0, 255])),
    }

    if state.pulse {
        fill_ellipse(&mut img, PULSE_DOT, rgba(state.switch_dot));
    }
    img
}
