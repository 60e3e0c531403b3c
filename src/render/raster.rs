//! SVG rasterization and background trimming.

use super::style::Rgba;
use super::RenderError;
use resvg::tiny_skia::{self, IntRect, Pixmap, PixmapPaint, Transform};
use resvg::usvg::{self, fontdb};
use std::sync::Arc;

/// Rasterizes `svg` at `scale` device pixels per CSS px.
pub fn rasterize(svg: &str, scale: f32, fonts: Arc<fontdb::Database>) -> Result<Pixmap, RenderError> {
    let mut options = usvg::Options::default();
    options.fontdb = fonts;
    let tree = usvg::Tree::from_str(svg, &options).map_err(|e| RenderError::Svg(e.to_string()))?;

    let size = tree.size();
    let width = (size.width() * scale).ceil().max(1.0) as u32;
    let height = (size.height() * scale).ceil().max(1.0) as u32;
    let mut pixmap = Pixmap::new(width, height).ok_or(RenderError::Allocation { width, height })?;
    resvg::render(&tree, Transform::from_scale(scale, scale), &mut pixmap.as_mut());
    Ok(pixmap)
}

/// Pixel rectangle within a pixmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

fn pixel(pixmap: &Pixmap, x: u32, y: u32) -> [u8; 4] {
    let p = pixmap.pixels()[(y * pixmap.width() + x) as usize].demultiply();
    [p.red(), p.green(), p.blue(), p.alpha()]
}

/// Two colors match when every channel differs by at most `tolerance`.
fn similar(a: [u8; 4], b: [u8; 4], tolerance: u8) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| x.abs_diff(*y) <= tolerance)
}

/// Bounding box of the pixels that differ from `background` by more than
/// `tolerance` in some channel. `None` when there are none.
pub fn content_bounds(pixmap: &Pixmap, background: [u8; 4], tolerance: u8) -> Option<Bounds> {
    let (w, h) = (pixmap.width(), pixmap.height());
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (u32::MAX, u32::MAX, 0u32, 0u32);
    let mut found = false;
    for y in 0..h {
        for x in 0..w {
            if !similar(pixel(pixmap, x, y), background, tolerance) {
                found = true;
                min_x = min_x.min(x);
                max_x = max_x.max(x);
                min_y = min_y.min(y);
                max_y = max_y.max(y);
            }
        }
    }
    found.then(|| Bounds {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    })
}

/// The outermost ring of pixels all match `color`.
fn uniform_ring(pixmap: &Pixmap, color: [u8; 4], tolerance: u8) -> bool {
    let (w, h) = (pixmap.width(), pixmap.height());
    let horizontal = (0..w).all(|x| {
        similar(pixel(pixmap, x, 0), color, tolerance) && similar(pixel(pixmap, x, h - 1), color, tolerance)
    });
    horizontal
        && (0..h).all(|y| {
            similar(pixel(pixmap, 0, y), color, tolerance) && similar(pixel(pixmap, w - 1, y), color, tolerance)
        })
}

fn crop(pixmap: &Pixmap, b: Bounds) -> Result<Pixmap, RenderError> {
    let rect = IntRect::from_xywh(b.x as i32, b.y as i32, b.width, b.height).ok_or(RenderError::Allocation {
        width: b.width,
        height: b.height,
    })?;
    pixmap.clone_rect(rect).ok_or(RenderError::Allocation {
        width: b.width,
        height: b.height,
    })
}

/// Result of [`trim`].
#[derive(Debug)]
pub struct Trimmed {
    pub pixmap: Pixmap,
    /// False when the image held nothing but background.
    pub has_content: bool,
}

/// Crops uniform background off the image edges.
///
/// The first pass uses the top-left pixel as background. Later passes
/// re-sample the new top-left pixel so a nested uniform frame is removed
/// too. Example: a mid-gray (`#969696`) box on the `#f5f5f5` page whose
/// edges carry darker marks. The first pass crops to the box, the second
/// to what is inside it. This only happens while the whole outer ring is
/// that color and it is itself within tolerance of the original
/// background. Stops at `max_passes` or when a pass removes nothing.
pub fn trim(pixmap: Pixmap, tolerance: u8, max_passes: u32) -> Result<Trimmed, RenderError> {
    let page_background = pixel(&pixmap, 0, 0);
    let mut current = pixmap;

    for pass in 0..max_passes {
        let background = pixel(&current, 0, 0);
        if pass > 0 && !similar(background, page_background, tolerance) {
            break;
        }
        if !uniform_ring(&current, background, tolerance) {
            break;
        }
        let Some(bounds) = content_bounds(&current, background, tolerance) else {
            if pass == 0 {
                return Ok(Trimmed {
                    pixmap: current,
                    has_content: false,
                });
            }
            break;
        };
        if bounds.width == current.width() && bounds.height == current.height() {
            break;
        }
        current = crop(&current, bounds)?;
    }

    Ok(Trimmed {
        pixmap: current,
        has_content: true,
    })
}

/// Surrounds the image with a `border` px frame of `color`.
pub fn pad(pixmap: &Pixmap, border: u32, color: Rgba) -> Result<Pixmap, RenderError> {
    let width = pixmap.width() + 2 * border;
    let height = pixmap.height() + 2 * border;
    let mut out = Pixmap::new(width, height).ok_or(RenderError::Allocation { width, height })?;
    out.fill(tiny_skia::Color::from_rgba8(color.r, color.g, color.b, 255));
    out.draw_pixmap(
        border as i32,
        border as i32,
        pixmap.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        None,
    );
    Ok(out)
}

pub fn encode_png(pixmap: &Pixmap) -> Result<Vec<u8>, RenderError> {
    pixmap.encode_png().map_err(|e| RenderError::Encode(e.to_string()))
}
