//! HTML diff fragment to cropped PNG.
//!
//! The pipeline:
//!
//! 1. [`boxes`] parses the fragment (wrapped in a body carrying the page
//!    background) and builds a box tree with computed styles
//! 2. [`layout`] positions boxes on a single square page
//! 3. [`page`] cuts whatever falls past the page bottom and shrinks the page
//!    to its content
//! 4. [`paint`] writes the result as SVG, [`raster`] rasterizes it at the
//!    configured DPI, trims the uniform background and pads it back with a
//!    fixed border
//!
//! Rendering is CPU-bound and synchronous; async callers run it on the
//! blocking pool.

pub mod boxes;
pub mod fonts;
pub mod layout;
pub mod page;
pub mod paint;
pub mod raster;
pub mod style;

use fonts::FontBook;
use page::{PageGeometry, PX_PER_INCH};
use serde::Deserialize;
use std::sync::Arc;
use style::Rgba;
use thiserror::Error;

/// Largest raster side, in device pixels, a page may produce.
const MAX_RASTER_SIDE: f32 = 20_000.0;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Invalid render option `{key}`: {reason}")]
    InvalidOptions { key: &'static str, reason: String },

    #[error("Failed to build SVG tree: {0}")]
    Svg(String),

    #[error("Cannot allocate a {width}x{height} image")]
    Allocation { width: u32, height: u32 },

    #[error("PNG encoding failed: {0}")]
    Encode(String),

    /// The blocking task running the render panicked or was cancelled.
    #[error("Render task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Turns an HTML diff fragment into an image.
///
/// [`DiffRenderer`] is the implementation; the driver only needs this
/// seam.
pub trait Render: Send + Sync {
    fn render(&self, fragment: &str) -> Result<RenderResult, RenderError>;
}

/// `[render]` section of the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Page and border color, any CSS color.
    pub background: String,
    /// Raster resolution; 96 renders one device pixel per CSS px.
    pub dpi: f32,
    /// Side of the square page, in inches.
    pub page_size_in: f32,
    /// Page margin in CSS px.
    pub page_margin_px: f32,
    /// Background-colored frame added around the trimmed image, in device
    /// pixels.
    pub border_px: u32,
    /// Per-channel difference above which a pixel counts as content.
    pub trim_tolerance: u8,
    pub max_trim_passes: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            background: "#f5f5f5".to_string(),
            dpi: 300.0,
            page_size_in: 15.0,
            page_margin_px: 75.0,
            border_px: 20,
            trim_tolerance: 100,
            max_trim_passes: 8,
        }
    }
}

impl RenderOptions {
    /// Checks ranges; returns the offending key and the reason.
    pub fn validate(&self) -> Result<(), (&'static str, String)> {
        match Rgba::parse(&self.background) {
            Some(c) if !c.is_transparent() => {}
            _ => {
                return Err((
                    "background",
                    format!("'{}' is not an opaque CSS color", self.background),
                ))
            }
        }
        if !(self.dpi.is_finite() && self.dpi > 0.0) {
            return Err(("dpi", "must be a positive number".to_string()));
        }
        if !(self.page_size_in.is_finite() && self.page_size_in > 0.0) {
            return Err(("page_size_in", "must be a positive number".to_string()));
        }
        if self.page_size_in * self.dpi > MAX_RASTER_SIDE {
            return Err((
                "dpi",
                format!(
                    "page_size_in * dpi must not exceed {MAX_RASTER_SIDE} pixels (got {})",
                    self.page_size_in * self.dpi
                ),
            ));
        }
        let side = self.page_size_in * PX_PER_INCH;
        if !(self.page_margin_px.is_finite() && self.page_margin_px >= 0.0 && self.page_margin_px * 2.0 < side) {
            return Err((
                "page_margin_px",
                format!("must be between 0 and half the page side ({side}px)"),
            ));
        }
        if self.max_trim_passes == 0 {
            return Err(("max_trim_passes", "must be at least 1".to_string()));
        }
        Ok(())
    }

    fn background_color(&self) -> Result<Rgba, RenderError> {
        Rgba::parse(&self.background).ok_or_else(|| RenderError::InvalidOptions {
            key: "background",
            reason: format!("'{}' is not a CSS color", self.background),
        })
    }
}

/// A rendered diff.
#[derive(Debug, Clone)]
pub struct RenderResult {
    pub png: Vec<u8>,
    /// False when the content did not fit on the page and was cut.
    pub complete: bool,
    pub width: u32,
    pub height: u32,
}

/// Renders HTML diff fragments to PNG.
///
/// Holds the loaded fonts, so build one and reuse it.
#[derive(Debug)]
pub struct DiffRenderer {
    options: RenderOptions,
    background: Rgba,
    fonts: FontBook,
}

impl DiffRenderer {
    /// A renderer using the system fonts.
    pub fn new(options: RenderOptions) -> Result<Self, RenderError> {
        Self::with_fonts(options, FontBook::system())
    }

    pub fn with_fonts(options: RenderOptions, fonts: FontBook) -> Result<Self, RenderError> {
        options
            .validate()
            .map_err(|(key, reason)| RenderError::InvalidOptions { key, reason })?;
        let background = options.background_color()?;
        Ok(Self {
            options,
            background,
            fonts,
        })
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Renders `fragment` to a PNG.
    ///
    /// Content that does not fit on the page is cut at a line boundary and
    /// reported through [`RenderResult::complete`]. A fragment that paints
    /// nothing comes back as the untrimmed, unpadded page.
    pub fn render(&self, fragment: &str) -> Result<RenderResult, RenderError> {
        let geometry = PageGeometry::square(self.options.page_size_in, self.options.page_margin_px);
        let document = format!(
            "<html><body style=\"background: {}\">{}</body></html>",
            self.background.to_hex(),
            fragment
        );

        let root = boxes::build_document(&document);
        let mut laid_out = layout::layout_document(
            &root,
            geometry.margin,
            geometry.margin,
            geometry.content_width(),
            &self.fonts,
        );
        let fitted = page::fit_page(&mut laid_out, &geometry);
        if !fitted.complete {
            tracing::debug!("Diff taller than one page, output truncated");
        }

        let svg = paint::to_svg(&laid_out.paint, &fitted, self.background, &self.fonts);
        let scale = self.options.dpi / PX_PER_INCH;
        let pixmap = raster::rasterize(&svg, scale, self.fonts.database())?;

        let trimmed = raster::trim(
            pixmap,
            self.options.trim_tolerance,
            self.options.max_trim_passes,
        )?;
        let pixmap = if trimmed.has_content {
            raster::pad(&trimmed.pixmap, self.options.border_px, self.background)?
        } else {
            tracing::debug!("Rendered page is blank, skipping trim");
            trimmed.pixmap
        };

        let png = raster::encode_png(&pixmap)?;
        tracing::debug!(
            width = pixmap.width(),
            height = pixmap.height(),
            bytes = png.len(),
            complete = fitted.complete,
            "Rendered diff"
        );
        Ok(RenderResult {
            png,
            complete: fitted.complete,
            width: pixmap.width(),
            height: pixmap.height(),
        })
    }
}

impl Render for DiffRenderer {
    fn render(&self, fragment: &str) -> Result<RenderResult, RenderError> {
        DiffRenderer::render(self, fragment)
    }
}

/// Runs `renderer` on the blocking pool and waits for it.
///
/// A panic inside the renderer comes back as [`RenderError::Task`].
pub async fn render_blocking(
    renderer: Arc<dyn Render>,
    fragment: String,
) -> Result<RenderResult, RenderError> {
    tokio::task::spawn_blocking(move || renderer.render(&fragment)).await?
}
