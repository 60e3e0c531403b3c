//! Paint list to SVG.
//!
//! The SVG is in CSS px; the rasterizer scales it to the target DPI.

use super::fonts::{FontSpec, TextMeasure};
use super::layout::{PaintItem, Rect};
use super::page::FittedPage;
use super::style::Rgba;
use crate::util::strip_control_chars;
use quick_xml::escape::escape;

/// Serializes the page to an SVG document.
pub fn to_svg(items: &[PaintItem], page: &FittedPage, background: Rgba, fonts: &dyn TextMeasure) -> String {
    let mut svg = String::with_capacity(256 + items.len() * 96);
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">",
        w = page.width,
        h = page.height,
    ));
    push_rect(
        &mut svg,
        Rect {
            x: 0.0,
            y: 0.0,
            width: page.width,
            height: page.height,
        },
        background,
    );

    for item in items {
        match item {
            PaintItem::Fill { rect, color, .. } => push_rect(&mut svg, *rect, *color),
            PaintItem::Text {
                x,
                baseline,
                text,
                font,
                color,
                ..
            } => match fonts.family(font) {
                Some(family) => push_text(&mut svg, *x, *baseline, text, family, font, *color),
                None => push_bars(&mut svg, *x, *baseline, text, font, *color, fonts),
            },
        }
    }

    svg.push_str("</svg>");
    svg
}

fn fill_attrs(color: Rgba) -> String {
    if color.a == 255 {
        format!("fill=\"{}\"", color.to_hex())
    } else {
        format!(
            "fill=\"{}\" fill-opacity=\"{:.3}\"",
            color.to_hex(),
            color.opacity()
        )
    }
}

fn push_rect(svg: &mut String, rect: Rect, color: Rgba) {
    if rect.width <= 0.0 || rect.height <= 0.0 || color.is_transparent() {
        return;
    }
    svg.push_str(&format!(
        "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" {} shape-rendering=\"crispEdges\"/>",
        rect.x,
        rect.y,
        rect.width,
        rect.height,
        fill_attrs(color),
    ));
}

fn push_text(svg: &mut String, x: f32, baseline: f32, text: &str, family: &str, font: &FontSpec, color: Rgba) {
    let clean = strip_control_chars(text);
    if clean.trim().is_empty() {
        return;
    }
    let weight = if font.bold { " font-weight=\"bold\"" } else { "" };
    let style = if font.italic { " font-style=\"italic\"" } else { "" };
    svg.push_str(&format!(
        "<text x=\"{:.2}\" y=\"{:.2}\" font-family=\"{}\" font-size=\"{:.2}\"{}{} {} xml:space=\"preserve\">{}</text>",
        x,
        baseline,
        escape(family),
        font.size,
        weight,
        style,
        fill_attrs(color),
        escape(&*clean),
    ));
}

/// Stands in for glyphs when no font is available: one solid bar per word,
/// positioned with the same metrics layout used.
fn push_bars(
    svg: &mut String,
    x: f32,
    baseline: f32,
    text: &str,
    font: &FontSpec,
    color: Rgba,
    fonts: &dyn TextMeasure,
) {
    let space = fonts.advance(" ", font);
    let top = baseline - font.size * 0.6;
    let mut offset = 0.0;
    for word in text.split(' ') {
        let width = fonts.advance(word, font);
        push_rect(
            svg,
            Rect {
                x: x + offset,
                y: top,
                width,
                height: font.size * 0.6,
            },
            color,
        );
        offset += width + space;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::fonts::ApproxMetrics;

    struct NamedFont;

    impl TextMeasure for NamedFont {
        fn advance(&self, text: &str, font: &FontSpec) -> f32 {
            ApproxMetrics.advance(text, font)
        }

        fn ascent(&self, font: &FontSpec) -> f32 {
            ApproxMetrics.ascent(font)
        }

        fn family(&self, _font: &FontSpec) -> Option<&str> {
            Some("Test Sans")
        }
    }

    const FONT: FontSpec = FontSpec {
        size: 16.0,
        bold: true,
        italic: false,
        mono: false,
    };

    fn page() -> FittedPage {
        FittedPage {
            width: 100.0,
            height: 50.0,
            complete: true,
        }
    }

    fn text_item(text: &str) -> PaintItem {
        PaintItem::Text {
            x: 1.0,
            baseline: 20.0,
            line_bottom: 25.0,
            text: text.to_string(),
            font: FONT,
            color: Rgba::BLACK,
        }
    }

    #[test]
    fn test_svg_header_and_background() {
        let svg = to_svg(&[], &page(), Rgba::opaque(0xf5, 0xf5, 0xf5), &ApproxMetrics);
        assert!(svg.starts_with("<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"100\" height=\"50\""));
        assert!(svg.contains("fill=\"#f5f5f5\""));
        assert!(svg.ends_with("</svg>"));
    }

    #[test]
    fn test_text_is_escaped() {
        let svg = to_svg(
            &[text_item("a < b & \"c\"\u{1}")],
            &page(),
            Rgba::opaque(255, 255, 255),
            &NamedFont,
        );
        assert!(svg.contains("a &lt; b &amp; &quot;c&quot;</text>"));
        assert!(svg.contains("font-family=\"Test Sans\""));
        assert!(svg.contains("font-weight=\"bold\""));
    }

    #[test]
    fn test_bars_without_fonts() {
        let svg = to_svg(
            &[text_item("two words")],
            &page(),
            Rgba::opaque(255, 255, 255),
            &ApproxMetrics,
        );
        assert!(!svg.contains("<text"));
        // background + one bar per word
        assert_eq!(svg.matches("<rect").count(), 3);
    }

    #[test]
    fn test_transparent_fill_skipped() {
        let items = [PaintItem::Fill {
            rect: Rect {
                x: 0.0,
                y: 0.0,
                width: 10.0,
                height: 10.0,
            },
            color: Rgba {
                r: 0,
                g: 0,
                b: 0,
                a: 0,
            },
            line_bottom: None,
        }];
        let svg = to_svg(&items, &page(), Rgba::opaque(255, 255, 255), &ApproxMetrics);
        assert_eq!(svg.matches("<rect").count(), 1);
    }
}
