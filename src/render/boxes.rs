//! HTML to box tree.
//!
//! Walks the parsed document once, computing each element's style and
//! sorting content into block boxes, inline runs and tables. Inline
//! elements that contain blocks are split around them, so every block
//! container ends up holding either blocks or a single inline run.

use super::fonts::FontSpec;
use super::style::{BorderSide, Display, Edges, Rgba, Size, Style, WhiteSpace};
use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{ElementRef, Html};

/// Elements whose content is never rendered.
const HIDDEN_TAGS: &[&str] = &[
    "head", "script", "style", "title", "meta", "link", "template", "noscript", "iframe",
    "object", "svg", "math",
];

/// Element nesting beyond which content is flattened into a single text
/// run. Keeps the box tree, and the recursion over it, shallow.
pub const MAX_NESTING: usize = 64;

/// Text properties carried by every inline run.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub font: FontSpec,
    pub color: Rgba,
    /// Background of the nearest inline ancestor, painted behind the text.
    pub highlight: Option<Rgba>,
    pub underline: bool,
    pub line_through: bool,
    pub white_space: WhiteSpace,
    pub line_height: f32,
}

impl TextStyle {
    pub fn from_style(style: &Style, highlight: Option<Rgba>) -> Self {
        Self {
            font: FontSpec {
                size: style.font_size,
                bold: style.bold,
                italic: style.italic,
                mono: style.mono,
            },
            color: style.color,
            highlight,
            underline: style.underline,
            line_through: style.line_through,
            white_space: style.white_space,
            line_height: style.used_line_height(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InlineItem {
    Text { text: String, style: TextStyle },
    /// `<br>`
    Break,
}

#[derive(Debug, Clone)]
pub struct LayoutBox {
    pub style: Style,
    pub kind: BoxKind,
    /// List marker painted left of the first line.
    pub marker: Option<String>,
}

#[derive(Debug, Clone)]
pub enum BoxKind {
    Block(Vec<LayoutBox>),
    Inline(Vec<InlineItem>),
    Table(TableBox),
}

#[derive(Debug, Clone, Default)]
pub struct TableBox {
    pub caption: Option<Box<LayoutBox>>,
    /// Widths from `<col>` elements, one entry per column.
    pub columns: Vec<Size>,
    pub rows: Vec<RowBox>,
}

impl TableBox {
    pub fn column_count(&self) -> usize {
        self.rows
            .iter()
            .map(|row| row.cells.iter().map(|c| c.colspan).sum::<usize>())
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
pub struct RowBox {
    pub style: Style,
    pub cells: Vec<CellBox>,
}

#[derive(Debug, Clone)]
pub struct CellBox {
    pub style: Style,
    pub colspan: usize,
    pub children: Vec<LayoutBox>,
}

/// Per-table presentational attributes that restyle the table's cells.
#[derive(Debug, Clone, Copy, Default)]
struct CellHints {
    padding: Option<f32>,
    border: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Unordered,
    Ordered,
}

/// Parses `html` and builds the box tree rooted at the `<html>` element.
pub fn build_document(html: &str) -> LayoutBox {
    let document = Html::parse_document(html);
    let root = document.root_element();
    let mut style = Style::inherit(&Style::default());
    style.apply_tag_defaults("html");
    if let Some(css) = root.value().attr("style") {
        style.apply_declarations(css, style.font_size);
    }
    style.display = Display::Block;
    let children = build_children(root, &style, None, 1);
    LayoutBox {
        style,
        kind: BoxKind::Block(children),
        marker: None,
    }
}

fn compute_style(element: ElementRef<'_>, parent: &Style, hints: CellHints) -> Style {
    let tag = element.value().name().to_ascii_lowercase();
    let mut style = Style::inherit(parent);
    if HIDDEN_TAGS.contains(&tag.as_str()) {
        style.display = Display::None;
        return style;
    }
    style.apply_tag_defaults(&tag);

    if tag == "td" || tag == "th" {
        if let Some(padding) = hints.padding {
            style.padding = Edges::uniform(padding);
        }
        if let Some(width) = hints.border {
            let side = BorderSide {
                width: Some(width),
                visible: true,
                color: Some(Rgba::GRAY),
            };
            style.border.top = side;
            style.border.right = side;
            style.border.bottom = side;
            style.border.left = side;
        }
    }

    for (name, value) in element.value().attrs() {
        style.apply_attribute(&name.to_ascii_lowercase(), value);
    }

    if tag == "font" {
        if let Some(color) = element.value().attr("color").and_then(Rgba::parse) {
            style.color = color;
        }
        if let Some(face) = element.value().attr("face") {
            style.apply_declarations(&format!("font-family: {face}"), parent.font_size);
        }
    }

    if let Some(css) = element.value().attr("style") {
        style.apply_declarations(css, parent.font_size);
    }
    style
}

/// Collects block children and inline runs of one block container.
struct Flow {
    anonymous: Style,
    blocks: Vec<LayoutBox>,
    inline: Vec<InlineItem>,
    list: Option<ListKind>,
    counter: usize,
}

impl Flow {
    fn new(container: &Style, list: Option<ListKind>) -> Self {
        let mut anonymous = Style::inherit(container);
        anonymous.display = Display::Block;
        Self {
            anonymous,
            blocks: Vec::new(),
            inline: Vec::new(),
            list,
            counter: 0,
        }
    }

    fn flush(&mut self) {
        let items = std::mem::take(&mut self.inline);
        if has_visible_content(&items) {
            self.blocks.push(LayoutBox {
                style: self.anonymous.clone(),
                kind: BoxKind::Inline(items),
                marker: None,
            });
        }
    }

    fn push_block(&mut self, mut block: LayoutBox) {
        self.flush();
        if block.style.display == Display::ListItem {
            self.counter += 1;
            block.marker = Some(match self.list {
                Some(ListKind::Ordered) => format!("{}.", self.counter),
                _ => "\u{2022}".to_string(),
            });
        }
        self.blocks.push(block);
    }

    fn finish(mut self) -> Vec<LayoutBox> {
        self.flush();
        self.blocks
    }
}

fn has_visible_content(items: &[InlineItem]) -> bool {
    items.iter().any(|item| match item {
        InlineItem::Break => true,
        InlineItem::Text { text, style } => {
            !text.trim().is_empty() || (!style.white_space.collapses_spaces() && !text.is_empty())
        }
    })
}

/// `depth` is the nesting level of `element`'s children.
fn build_children(
    element: ElementRef<'_>,
    style: &Style,
    list: Option<ListKind>,
    depth: usize,
) -> Vec<LayoutBox> {
    let mut flow = Flow::new(style, list);
    for child in element.children() {
        visit(child, style, None, &mut flow, depth);
    }
    flow.finish()
}

fn visit(
    node: NodeRef<'_, Node>,
    parent: &Style,
    highlight: Option<Rgba>,
    flow: &mut Flow,
    depth: usize,
) {
    match node.value() {
        Node::Text(text) => flow.inline.push(InlineItem::Text {
            text: text.to_string(),
            style: TextStyle::from_style(parent, highlight),
        }),
        Node::Element(_) => {
            let Some(element) = ElementRef::wrap(node) else {
                return;
            };
            let style = compute_style(element, parent, CellHints::default());
            match style.display {
                Display::None => {}
                _ if depth >= MAX_NESTING => flatten(element, &style, highlight, flow),
                Display::Inline => visit_inline(element, style, highlight, flow, depth),
                _ => flow.push_block(build_block(element, style, depth)),
            }
        }
        _ => {}
    }
}

/// Appends all text below `element` as one run in its style.
fn flatten(element: ElementRef<'_>, style: &Style, highlight: Option<Rgba>, flow: &mut Flow) {
    let text: String = element.text().collect();
    if !text.is_empty() {
        flow.inline.push(InlineItem::Text {
            text,
            style: TextStyle::from_style(style, style.background.or(highlight)),
        });
    }
}

fn visit_inline(
    element: ElementRef<'_>,
    style: Style,
    highlight: Option<Rgba>,
    flow: &mut Flow,
    depth: usize,
) {
    match element.value().name() {
        "br" => flow.inline.push(InlineItem::Break),
        "img" => {
            if let Some(alt) = element.value().attr("alt").filter(|a| !a.trim().is_empty()) {
                flow.inline.push(InlineItem::Text {
                    text: alt.to_string(),
                    style: TextStyle::from_style(&style, highlight),
                });
            }
        }
        _ => {
            let highlight = style.background.or(highlight);
            for child in element.children() {
                visit(child, &style, highlight, flow, depth + 1);
            }
        }
    }
}

fn build_block(element: ElementRef<'_>, style: Style, depth: usize) -> LayoutBox {
    let tag = element.value().name();
    let kind = if tag == "table" {
        BoxKind::Table(build_table(element, &style, depth))
    } else {
        let list = match tag {
            "ol" => Some(ListKind::Ordered),
            "ul" | "menu" | "dir" => Some(ListKind::Unordered),
            _ => None,
        };
        BoxKind::Block(build_children(element, &style, list, depth + 1))
    };
    LayoutBox {
        style,
        kind,
        marker: None,
    }
}

fn parse_pixels(value: &str) -> Option<f32> {
    value
        .trim()
        .trim_end_matches("px")
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

fn child_elements<'a>(element: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    element.children().filter_map(ElementRef::wrap)
}

fn build_table(element: ElementRef<'_>, style: &Style, depth: usize) -> TableBox {
    let attr = |name: &str| element.value().attr(name);
    let border = attr("border").and_then(parse_pixels).filter(|b| *b > 0.0);
    let hints = CellHints {
        padding: attr("cellpadding").and_then(parse_pixels),
        border: border.map(|_| 1.0),
    };

    let mut table = TableBox::default();
    for child in child_elements(element) {
        let child_style = compute_style(child, style, hints);
        if child_style.display == Display::None {
            continue;
        }
        match child.value().name() {
            "caption" => {
                let mut caption_style = child_style;
                caption_style.display = Display::Block;
                let children = build_children(child, &caption_style, None, depth + 2);
                table.caption = Some(Box::new(LayoutBox {
                    style: caption_style,
                    kind: BoxKind::Block(children),
                    marker: None,
                }));
            }
            "colgroup" => {
                let mut any = false;
                for col in child_elements(child).filter(|c| c.value().name() == "col") {
                    any = true;
                    let col_style = compute_style(col, &child_style, hints);
                    push_columns(&mut table.columns, col, col_style.width);
                }
                if !any {
                    push_columns(&mut table.columns, child, child_style.width);
                }
            }
            "col" => push_columns(&mut table.columns, child, child_style.width),
            "thead" | "tbody" | "tfoot" => {
                for tr in child_elements(child).filter(|c| c.value().name() == "tr") {
                    let row_style = compute_style(tr, &child_style, hints);
                    if row_style.display != Display::None {
                        table.rows.push(build_row(tr, row_style, hints, depth + 2));
                    }
                }
            }
            "tr" => table.rows.push(build_row(child, child_style, hints, depth + 1)),
            _ => {}
        }
    }
    table
}

fn push_columns(columns: &mut Vec<Size>, element: ElementRef<'_>, width: Size) {
    let span = element
        .value()
        .attr("span")
        .and_then(|s| s.trim().parse::<usize>().ok())
        .unwrap_or(1)
        .clamp(1, 1000);
    columns.extend(std::iter::repeat(width).take(span));
}

/// `depth` is the nesting level of `tr`.
fn build_row(tr: ElementRef<'_>, style: Style, hints: CellHints, depth: usize) -> RowBox {
    let mut cells = Vec::new();
    for td in child_elements(tr) {
        let tag = td.value().name();
        if tag != "td" && tag != "th" {
            continue;
        }
        let cell_style = compute_style(td, &style, hints);
        if cell_style.display == Display::None {
            continue;
        }
        let colspan = td
            .value()
            .attr("colspan")
            .and_then(|s| s.trim().parse::<usize>().ok())
            .unwrap_or(1)
            .clamp(1, 1000);
        let children = build_children(td, &cell_style, None, depth + 2);
        cells.push(CellBox {
            style: cell_style,
            colspan,
            children,
        });
    }
    RowBox { style, cells }
}
