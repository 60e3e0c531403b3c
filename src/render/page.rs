use super::layout::{ExtentKind, Layout, PaintItem};

/// CSS px per inch.
pub const PX_PER_INCH: f32 = 96.0;

const EPSILON: f32 = 0.01;

/// The single page a diff is laid out on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
}

impl PageGeometry {
    /// A square page `size_in` inches wide.
    pub fn square(size_in: f32, margin: f32) -> Self {
        let side = size_in * PX_PER_INCH;
        Self {
            width: side,
            height: side,
            margin,
        }
    }

    pub fn content_width(&self) -> f32 {
        (self.width - 2.0 * self.margin).max(0.0)
    }

    /// Lowest y content may occupy on this page.
    pub fn content_limit(&self) -> f32 {
        self.height - self.margin
    }
}

/// Page size after shrinking to the content.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FittedPage {
    pub width: f32,
    pub height: f32,
    /// False when content ran past the bottom of the page and was cut.
    pub complete: bool,
}

/// Drops everything that would fall onto a second page, then shrinks the
/// page to the remaining content plus the page margin on the right and
/// bottom.
///
/// Widths only come from content that sizes to what it holds (lines,
/// text, tables); full-width blocks would otherwise pin the page at its
/// maximum width. Without any content the page keeps its full size.
pub fn fit_page(layout: &mut Layout, page: &PageGeometry) -> FittedPage {
    let limit = page.content_limit();
    let complete = layout
        .content_bottom()
        .map_or(true, |bottom| bottom <= limit + EPSILON);

    if !complete {
        clip_to(layout, limit);
    }

    let right = layout
        .extents
        .iter()
        .filter(|e| e.kind != ExtentKind::Block)
        .map(|e| e.rect.right())
        .fold(None, max_opt);
    let bottom = layout.content_bottom();

    let width = right.map_or(page.width, |r| (r + page.margin).min(page.width).ceil());
    let height = bottom.map_or(page.height, |b| (b + page.margin).min(page.height).ceil());

    FittedPage {
        width: width.max(1.0),
        height: height.max(1.0),
        complete,
    }
}

fn max_opt(acc: Option<f32>, v: f32) -> Option<f32> {
    Some(acc.map_or(v, |a| a.max(v)))
}

/// Removes lines that cross `limit` and cuts boxes at it.
fn clip_to(layout: &mut Layout, limit: f32) {
    layout.paint.retain_mut(|item| match item {
        PaintItem::Text { line_bottom, .. } => *line_bottom <= limit + EPSILON,
        PaintItem::Fill {
            line_bottom: Some(bottom),
            ..
        } => *bottom <= limit + EPSILON,
        PaintItem::Fill { rect, .. } => {
            if rect.bottom() > limit {
                rect.height = limit - rect.y;
            }
            rect.height > 0.0
        }
    });

    layout.extents.retain_mut(|extent| match extent.kind {
        ExtentKind::Line | ExtentKind::Text => extent.rect.bottom() <= limit + EPSILON,
        ExtentKind::Block | ExtentKind::Table => {
            if extent.rect.bottom() > limit {
                extent.rect.height = limit - extent.rect.y;
            }
            extent.rect.height > 0.0
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::boxes::build_document;
    use crate::render::fonts::ApproxMetrics;
    use crate::render::layout::layout_document;

    fn laid_out(fragment: &str, page: &PageGeometry) -> Layout {
        let root = build_document(&format!("<html><body>{fragment}</body></html>"));
        layout_document(
            &root,
            page.margin,
            page.margin,
            page.content_width(),
            &ApproxMetrics,
        )
    }

    #[test]
    fn test_square_page() {
        let page = PageGeometry::square(15.0, 75.0);
        assert_eq!(page.width, 1440.0);
        assert_eq!(page.content_width(), 1290.0);
        assert_eq!(page.content_limit(), 1365.0);
    }

    #[test]
    fn test_short_content_shrinks_page() {
        let page = PageGeometry::square(15.0, 75.0);
        let mut layout = laid_out("<p>hello</p>", &page);
        let fitted = fit_page(&mut layout, &page);
        assert!(fitted.complete);
        assert!(fitted.width < 300.0, "width {}", fitted.width);
        assert!(fitted.height < 300.0, "height {}", fitted.height);
        // left margin + body margin + text + right margin
        assert!(fitted.width > 75.0 + 8.0 + 75.0);
    }

    #[test]
    fn test_overflow_is_cut_and_flagged() {
        let page = PageGeometry::square(15.0, 75.0);
        let fragment = "<p>line</p>".repeat(200);
        let mut layout = laid_out(&fragment, &page);
        let fitted = fit_page(&mut layout, &page);
        assert!(!fitted.complete);
        assert_eq!(fitted.height, page.height);
        assert!(layout.paint.iter().all(|p| match p {
            PaintItem::Text { line_bottom, .. } => *line_bottom <= page.content_limit() + EPSILON,
            _ => true,
        }));
        assert!(layout
            .extents
            .iter()
            .all(|e| e.rect.bottom() <= page.content_limit() + EPSILON));
    }

    #[test]
    fn test_empty_layout_keeps_full_page() {
        let page = PageGeometry::square(2.0, 10.0);
        let mut layout = Layout::default();
        let fitted = fit_page(&mut layout, &page);
        assert!(fitted.complete);
        assert_eq!((fitted.width, fitted.height), (192.0, 192.0));
    }
}
