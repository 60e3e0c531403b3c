//! Computed styles for the subset of CSS found in wiki diff fragments.
//!
//! Styles come from three places, applied in order: inheritance from the
//! parent, per-tag user-agent defaults, then presentational attributes and
//! the element's inline `style` attribute. There is no selector matching;
//! wiki feeds inline every declaration a diff needs.

use std::str::FromStr;

/// Font size of the root element, in CSS px.
pub const DEFAULT_FONT_SIZE: f32 = 16.0;

/// "normal" line height as a multiple of the font size.
pub const NORMAL_LINE_HEIGHT: f32 = 1.2;

/// Width used for `medium` borders and for borders with a style but no width.
const MEDIUM_BORDER: f32 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::opaque(0, 0, 0);
    pub const GRAY: Rgba = Rgba::opaque(0x80, 0x80, 0x80);
    pub const LINK: Rgba = Rgba::opaque(0x06, 0x45, 0xad);

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parses any CSS color `svgtypes` understands (hex, `rgb()`, `hsl()`,
    /// named colors). `transparent` parses to a fully transparent color.
    pub fn parse(value: &str) -> Option<Self> {
        let color = svgtypes::Color::from_str(value.trim()).ok()?;
        Some(Self {
            r: color.red,
            g: color.green,
            b: color.blue,
            a: color.alpha,
        })
    }

    pub fn is_transparent(&self) -> bool {
        self.a == 0
    }

    /// `#rrggbb`, alpha dropped.
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn opacity(&self) -> f32 {
        f32::from(self.a) / 255.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    Block,
    Inline,
    ListItem,
    Table,
    TableRowGroup,
    TableRow,
    TableCell,
    TableCaption,
    TableColumn,
    None,
}

impl Display {
    pub fn is_block_level(&self) -> bool {
        !matches!(self, Display::Inline | Display::None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhiteSpace {
    Normal,
    NoWrap,
    Pre,
    PreWrap,
    PreLine,
}

impl WhiteSpace {
    /// Runs of spaces and tabs collapse to one space.
    pub fn collapses_spaces(&self) -> bool {
        matches!(self, WhiteSpace::Normal | WhiteSpace::NoWrap | WhiteSpace::PreLine)
    }

    /// Newlines in the source force a line break.
    pub fn preserves_newlines(&self) -> bool {
        matches!(self, WhiteSpace::Pre | WhiteSpace::PreWrap | WhiteSpace::PreLine)
    }

    /// Lines may break at soft wrap opportunities.
    pub fn wraps(&self) -> bool {
        matches!(self, WhiteSpace::Normal | WhiteSpace::PreWrap | WhiteSpace::PreLine)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalAlign {
    Top,
    Middle,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Size {
    Auto,
    Px(f32),
    Percent(f32),
}

impl Size {
    /// Resolves against the containing width; `None` for `auto`.
    pub fn resolve(&self, containing: f32) -> Option<f32> {
        match *self {
            Size::Auto => None,
            Size::Px(px) => Some(px),
            Size::Percent(pct) => Some(containing * pct / 100.0),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Edges {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Edges {
    pub fn uniform(v: f32) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }

    pub fn horizontal(&self) -> f32 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f32 {
        self.top + self.bottom
    }
}

/// One side of a border. A side only paints when its style is visible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BorderSide {
    pub width: Option<f32>,
    pub visible: bool,
    /// `None` means `currentColor`.
    pub color: Option<Rgba>,
}

impl Default for BorderSide {
    fn default() -> Self {
        Self {
            width: None,
            visible: false,
            color: None,
        }
    }
}

impl BorderSide {
    pub fn used_width(&self) -> f32 {
        if self.visible {
            self.width.unwrap_or(MEDIUM_BORDER)
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Borders {
    pub top: BorderSide,
    pub right: BorderSide,
    pub bottom: BorderSide,
    pub left: BorderSide,
}

impl Borders {
    pub fn widths(&self) -> Edges {
        Edges {
            top: self.top.used_width(),
            right: self.right.used_width(),
            bottom: self.bottom.used_width(),
            left: self.left.used_width(),
        }
    }

    fn sides_mut(&mut self) -> [&mut BorderSide; 4] {
        [&mut self.top, &mut self.right, &mut self.bottom, &mut self.left]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    // Inherited
    pub color: Rgba,
    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
    pub mono: bool,
    pub white_space: WhiteSpace,
    pub text_align: TextAlign,
    /// Absolute line height in px; `None` is "normal".
    pub line_height: Option<f32>,
    pub underline: bool,
    pub line_through: bool,
    pub border_spacing: f32,

    // Not inherited
    pub display: Display,
    pub background: Option<Rgba>,
    pub margin: Edges,
    pub padding: Edges,
    pub border: Borders,
    pub width: Size,
    pub height: Size,
    pub vertical_align: VerticalAlign,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            color: Rgba::BLACK,
            font_size: DEFAULT_FONT_SIZE,
            bold: false,
            italic: false,
            mono: false,
            white_space: WhiteSpace::Normal,
            text_align: TextAlign::Left,
            line_height: None,
            underline: false,
            line_through: false,
            border_spacing: 0.0,
            display: Display::Inline,
            background: None,
            margin: Edges::default(),
            padding: Edges::default(),
            border: Borders::default(),
            width: Size::Auto,
            height: Size::Auto,
            vertical_align: VerticalAlign::Top,
        }
    }
}

impl Style {
    /// A child style: inherited properties copied, the rest reset.
    pub fn inherit(parent: &Style) -> Self {
        Self {
            color: parent.color,
            font_size: parent.font_size,
            bold: parent.bold,
            italic: parent.italic,
            mono: parent.mono,
            white_space: parent.white_space,
            text_align: parent.text_align,
            line_height: parent.line_height,
            underline: parent.underline,
            line_through: parent.line_through,
            border_spacing: parent.border_spacing,
            ..Style::default()
        }
    }

    /// Used line height in px.
    pub fn used_line_height(&self) -> f32 {
        self.line_height
            .unwrap_or(self.font_size * NORMAL_LINE_HEIGHT)
    }

    /// Border color of a side, resolving `currentColor`.
    pub fn border_color(&self, side: &BorderSide) -> Rgba {
        side.color.unwrap_or(self.color)
    }

    /// Applies user-agent defaults for `tag`. `self` must already hold the
    /// inherited values.
    pub fn apply_tag_defaults(&mut self, tag: &str) {
        let em = self.font_size;
        match tag {
            "html" | "div" | "address" | "article" | "section" | "header" | "footer" | "nav"
            | "main" | "aside" | "figure" | "figcaption" | "details" | "summary" | "form"
            | "fieldset" | "dd" | "dt" | "dl" => {
                self.display = Display::Block;
                if tag == "dl" {
                    self.margin.top = em;
                    self.margin.bottom = em;
                }
                if tag == "dd" {
                    self.margin.left = 40.0;
                }
            }
            "body" => {
                self.display = Display::Block;
                self.margin = Edges::uniform(8.0);
            }
            "p" => {
                self.display = Display::Block;
                self.margin.top = em;
                self.margin.bottom = em;
            }
            "blockquote" => {
                self.display = Display::Block;
                self.margin = Edges {
                    top: em,
                    right: 40.0,
                    bottom: em,
                    left: 40.0,
                };
            }
            "center" => {
                self.display = Display::Block;
                self.text_align = TextAlign::Center;
            }
            "pre" | "listing" | "xmp" => {
                self.display = Display::Block;
                self.mono = true;
                self.white_space = WhiteSpace::Pre;
                self.margin.top = em;
                self.margin.bottom = em;
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let (scale, margin) = match tag {
                    "h1" => (2.0, 0.67),
                    "h2" => (1.5, 0.83),
                    "h3" => (1.17, 1.0),
                    "h4" => (1.0, 1.33),
                    "h5" => (0.83, 1.67),
                    _ => (0.67, 2.33),
                };
                self.display = Display::Block;
                self.bold = true;
                self.font_size = em * scale;
                self.margin.top = self.font_size * margin;
                self.margin.bottom = self.font_size * margin;
            }
            "ul" | "ol" | "menu" | "dir" => {
                self.display = Display::Block;
                self.margin.top = em;
                self.margin.bottom = em;
                self.padding.left = 40.0;
            }
            "li" => self.display = Display::ListItem,
            "hr" => {
                self.display = Display::Block;
                self.margin.top = 0.5 * em;
                self.margin.bottom = 0.5 * em;
                let side = BorderSide {
                    width: Some(1.0),
                    visible: true,
                    color: Some(Rgba::GRAY),
                };
                self.border.top = side;
                self.border.bottom = side;
            }
            "table" => {
                self.display = Display::Table;
                self.border_spacing = 2.0;
                // Tables reset text alignment (quirks mode UA rule)
                self.text_align = TextAlign::Left;
            }
            "caption" => {
                self.display = Display::TableCaption;
                self.text_align = TextAlign::Center;
            }
            "thead" | "tbody" | "tfoot" => self.display = Display::TableRowGroup,
            "tr" => self.display = Display::TableRow,
            "td" | "th" => {
                self.display = Display::TableCell;
                self.padding = Edges::uniform(1.0);
                self.vertical_align = VerticalAlign::Middle;
                if tag == "th" {
                    self.bold = true;
                    self.text_align = TextAlign::Center;
                }
            }
            "col" | "colgroup" => self.display = Display::TableColumn,
            "b" | "strong" => self.bold = true,
            "i" | "em" | "cite" | "var" | "dfn" => self.italic = true,
            "code" | "tt" | "kbd" | "samp" => self.mono = true,
            "u" | "ins" => self.underline = true,
            "s" | "strike" | "del" => self.line_through = true,
            "a" => {
                self.color = Rgba::LINK;
                self.underline = true;
            }
            "small" => self.font_size = em / 1.2,
            "big" => self.font_size = em * 1.2,
            "sub" | "sup" => self.font_size = em * 0.83,
            "mark" => self.background = Rgba::parse("yellow"),
            _ => {}
        }
    }

    /// Applies HTML presentational attributes (`bgcolor`, `align`, `width`,
    /// `height`).
    pub fn apply_attribute(&mut self, name: &str, value: &str) {
        match name {
            "bgcolor" => self.background = Rgba::parse(value).filter(|c| !c.is_transparent()),
            "align" => {
                if let Some(align) = parse_text_align(value) {
                    if self.display != Display::Table {
                        self.text_align = align;
                    }
                }
            }
            "valign" => {
                if let Some(valign) = parse_vertical_align(value) {
                    self.vertical_align = valign;
                }
            }
            "width" => {
                if let Some(size) = parse_html_size(value) {
                    self.width = size;
                }
            }
            "height" => {
                if let Some(size) = parse_html_size(value) {
                    self.height = size;
                }
            }
            _ => {}
        }
    }

    /// Applies every declaration of an inline `style` attribute.
    pub fn apply_declarations(&mut self, css: &str, parent_font_size: f32) {
        for (property, value) in parse_declarations(css) {
            self.apply_declaration(&property, &value, parent_font_size);
        }
    }

    fn apply_declaration(&mut self, property: &str, value: &str, parent_font_size: f32) {
        let lower = value.to_ascii_lowercase();
        let value = lower.as_str();
        match property {
            "color" => {
                if let Some(color) = Rgba::parse(value) {
                    self.color = color;
                }
            }
            "background" | "background-color" => {
                self.background = split_values(value)
                    .into_iter()
                    .find_map(|token| Rgba::parse(&token))
                    .filter(|c| !c.is_transparent());
            }
            "font-size" => {
                if let Some(size) = parse_font_size(value, parent_font_size) {
                    self.font_size = size;
                }
            }
            "font-weight" => {
                self.bold = match value {
                    "bold" | "bolder" => true,
                    "normal" | "lighter" => false,
                    other => other.parse::<u32>().map(|w| w >= 600).unwrap_or(self.bold),
                }
            }
            "font-style" => self.italic = value == "italic" || value == "oblique",
            "font-family" => self.mono = is_monospace_family(value),
            "font" => self.apply_font_shorthand(value, parent_font_size),
            "text-decoration" | "text-decoration-line" => {
                if value.contains("none") {
                    self.underline = false;
                    self.line_through = false;
                }
                if value.contains("underline") {
                    self.underline = true;
                }
                if value.contains("line-through") {
                    self.line_through = true;
                }
            }
            "text-align" => {
                if let Some(align) = parse_text_align(value) {
                    self.text_align = align;
                }
            }
            "vertical-align" => {
                if let Some(valign) = parse_vertical_align(value) {
                    self.vertical_align = valign;
                }
            }
            "white-space" => {
                self.white_space = match value {
                    "nowrap" => WhiteSpace::NoWrap,
                    "pre" => WhiteSpace::Pre,
                    "pre-wrap" | "break-spaces" => WhiteSpace::PreWrap,
                    "pre-line" => WhiteSpace::PreLine,
                    _ => WhiteSpace::Normal,
                }
            }
            "line-height" => {
                self.line_height = if value == "normal" {
                    None
                } else if let Ok(factor) = value.parse::<f32>() {
                    Some(factor * self.font_size)
                } else {
                    parse_length(value, self.font_size, self.font_size)
                };
            }
            "display" => {
                let display = match value {
                    "none" => Some(Display::None),
                    "block" | "flex" | "grid" | "flow-root" => Some(Display::Block),
                    "inline" | "inline-block" | "inline-flex" | "contents" => {
                        Some(Display::Inline)
                    }
                    "list-item" => Some(Display::ListItem),
                    "table" | "inline-table" => Some(Display::Table),
                    "table-row" => Some(Display::TableRow),
                    "table-cell" => Some(Display::TableCell),
                    "table-row-group" | "table-header-group" | "table-footer-group" => {
                        Some(Display::TableRowGroup)
                    }
                    _ => None,
                };
                if let Some(display) = display {
                    self.display = display;
                }
            }
            "width" => {
                if let Some(size) = parse_size(value, self.font_size) {
                    self.width = size;
                }
            }
            "height" => {
                if let Some(size) = parse_size(value, self.font_size) {
                    self.height = size;
                }
            }
            "margin" => {
                if let Some(edges) = parse_edges(value, self.font_size) {
                    self.margin = edges;
                }
            }
            "padding" => {
                if let Some(edges) = parse_edges(value, self.font_size) {
                    self.padding = edges;
                }
            }
            "margin-top" | "margin-right" | "margin-bottom" | "margin-left" => {
                if let Some(px) = parse_length(value, self.font_size, 0.0) {
                    set_edge(&mut self.margin, &property["margin-".len()..], px);
                }
            }
            "padding-top" | "padding-right" | "padding-bottom" | "padding-left" => {
                if let Some(px) = parse_length(value, self.font_size, 0.0) {
                    set_edge(&mut self.padding, &property["padding-".len()..], px.max(0.0));
                }
            }
            "border" => {
                let side = parse_border_side(value, self.font_size);
                for s in self.border.sides_mut() {
                    *s = side;
                }
            }
            "border-top" => self.border.top = parse_border_side(value, self.font_size),
            "border-right" => self.border.right = parse_border_side(value, self.font_size),
            "border-bottom" => self.border.bottom = parse_border_side(value, self.font_size),
            "border-left" => self.border.left = parse_border_side(value, self.font_size),
            "border-width" => {
                let font_size = self.font_size;
                let values: Vec<Option<f32>> = split_values(value)
                    .iter()
                    .map(|v| parse_border_width(v, font_size))
                    .collect();
                if let Some(widths) = expand_four(&values) {
                    for (side, width) in self.border.sides_mut().into_iter().zip(widths) {
                        side.width = width;
                    }
                }
            }
            "border-style" => {
                let values: Vec<bool> = split_values(value)
                    .iter()
                    .map(|v| is_visible_border_style(v))
                    .collect();
                if let Some(styles) = expand_four(&values) {
                    for (side, visible) in self.border.sides_mut().into_iter().zip(styles) {
                        side.visible = visible;
                    }
                }
            }
            "border-color" => {
                let values: Vec<Option<Rgba>> =
                    split_values(value).iter().map(|v| Rgba::parse(v)).collect();
                if let Some(colors) = expand_four(&values) {
                    for (side, color) in self.border.sides_mut().into_iter().zip(colors) {
                        side.color = color;
                    }
                }
            }
            "border-spacing" => {
                if let Some(first) = split_values(value).first() {
                    if let Some(px) = parse_length(first, self.font_size, 0.0) {
                        self.border_spacing = px.max(0.0);
                    }
                }
            }
            _ => {}
        }
    }

    fn apply_font_shorthand(&mut self, value: &str, parent_font_size: f32) {
        let tokens = split_values(value);
        let mut family = Vec::new();
        for token in &tokens {
            let size_part = token.split('/').next().unwrap_or(token);
            match token.as_str() {
                "bold" | "bolder" => self.bold = true,
                "italic" | "oblique" => self.italic = true,
                "normal" => {}
                _ => {
                    if let Some(size) = parse_font_size(size_part, parent_font_size) {
                        self.font_size = size;
                    } else {
                        family.push(token.as_str());
                    }
                }
            }
        }
        if !family.is_empty() {
            self.mono = is_monospace_family(&family.join(" "));
        }
    }
}

/// Splits `a: b; c: d` into lowercase property names and trimmed values.
/// `!important` is dropped.
pub fn parse_declarations(css: &str) -> Vec<(String, String)> {
    css.split(';')
        .filter_map(|decl| {
            let (property, value) = decl.split_once(':')?;
            let property = property.trim().to_ascii_lowercase();
            let value = value.trim();
            let value = value
                .strip_suffix("!important")
                .map(str::trim_end)
                .unwrap_or(value);
            if property.is_empty() || value.is_empty() {
                None
            } else {
                Some((property, value.to_string()))
            }
        })
        .collect()
}

/// Splits a value list on whitespace, keeping functional notation like
/// `rgb(1, 2, 3)` together.
fn split_values(value: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for c in value.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            c if c.is_whitespace() && depth == 0 => {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// CSS 1-to-4 value expansion (top, right, bottom, left).
fn expand_four<T: Copy>(values: &[T]) -> Option<[T; 4]> {
    match values {
        [a] => Some([*a, *a, *a, *a]),
        [a, b] => Some([*a, *b, *a, *b]),
        [a, b, c] => Some([*a, *b, *c, *b]),
        [a, b, c, d, ..] => Some([*a, *b, *c, *d]),
        [] => None,
    }
}

fn set_edge(edges: &mut Edges, side: &str, px: f32) {
    match side {
        "top" => edges.top = px,
        "right" => edges.right = px,
        "bottom" => edges.bottom = px,
        "left" => edges.left = px,
        _ => {}
    }
}

fn parse_edges(value: &str, font_size: f32) -> Option<Edges> {
    let values: Vec<f32> = split_values(value)
        .iter()
        .map(|v| parse_length(v, font_size, 0.0).unwrap_or(0.0))
        .collect();
    let [top, right, bottom, left] = expand_four(&values)?;
    Some(Edges {
        top,
        right,
        bottom,
        left,
    })
}

fn parse_border_side(value: &str, font_size: f32) -> BorderSide {
    let mut side = BorderSide::default();
    for token in split_values(value) {
        if let Some(width) = parse_border_width(&token, font_size) {
            side.width = Some(width);
        } else if is_border_style_keyword(&token) {
            side.visible = is_visible_border_style(&token);
        } else if let Some(color) = Rgba::parse(&token) {
            side.color = Some(color);
        }
    }
    side
}

fn parse_border_width(value: &str, font_size: f32) -> Option<f32> {
    match value {
        "thin" => Some(1.0),
        "medium" => Some(MEDIUM_BORDER),
        "thick" => Some(5.0),
        _ => parse_length(value, font_size, 0.0).map(|w| w.max(0.0)),
    }
}

fn is_border_style_keyword(value: &str) -> bool {
    matches!(
        value,
        "none"
            | "hidden"
            | "solid"
            | "dashed"
            | "dotted"
            | "double"
            | "groove"
            | "ridge"
            | "inset"
            | "outset"
    )
}

fn is_visible_border_style(value: &str) -> bool {
    is_border_style_keyword(value) && value != "none" && value != "hidden"
}

fn is_monospace_family(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    ["monospace", "mono", "courier", "consolas", "menlo", "monaco"]
        .iter()
        .any(|needle| lower.contains(needle))
}

fn parse_text_align(value: &str) -> Option<TextAlign> {
    match value.trim().to_ascii_lowercase().as_str() {
        "left" | "start" | "justify" => Some(TextAlign::Left),
        "center" | "middle" => Some(TextAlign::Center),
        "right" | "end" => Some(TextAlign::Right),
        _ => None,
    }
}

fn parse_vertical_align(value: &str) -> Option<VerticalAlign> {
    match value.trim().to_ascii_lowercase().as_str() {
        "top" | "text-top" | "baseline" => Some(VerticalAlign::Top),
        "middle" => Some(VerticalAlign::Middle),
        "bottom" | "text-bottom" => Some(VerticalAlign::Bottom),
        _ => None,
    }
}

/// HTML `width="50%"` / `width="120"` attribute values.
fn parse_html_size(value: &str) -> Option<Size> {
    let value = value.trim();
    if let Some(pct) = value.strip_suffix('%') {
        return pct.trim().parse::<f32>().ok().map(Size::Percent);
    }
    value
        .trim_end_matches("px")
        .parse::<f32>()
        .ok()
        .filter(|v| *v >= 0.0)
        .map(Size::Px)
}

fn parse_size(value: &str, font_size: f32) -> Option<Size> {
    if value == "auto" {
        return Some(Size::Auto);
    }
    let length = svgtypes::Length::from_str(value).ok()?;
    if length.unit == svgtypes::LengthUnit::Percent {
        return Some(Size::Percent(length.number as f32));
    }
    parse_length(value, font_size, 0.0).map(|px| Size::Px(px.max(0.0)))
}

/// Resolves a CSS length to px. Percentages resolve against `percent_base`.
pub fn parse_length(value: &str, font_size: f32, percent_base: f32) -> Option<f32> {
    let value = value.trim();
    if value == "0" {
        return Some(0.0);
    }
    if let Some(rem) = value.strip_suffix("rem") {
        return rem.trim().parse::<f32>().ok().map(|v| v * DEFAULT_FONT_SIZE);
    }
    let length = svgtypes::Length::from_str(value).ok()?;
    let n = length.number as f32;
    use svgtypes::LengthUnit;
    let px = match length.unit {
        LengthUnit::None | LengthUnit::Px => n,
        LengthUnit::Em => n * font_size,
        LengthUnit::Ex => n * font_size / 2.0,
        LengthUnit::In => n * 96.0,
        LengthUnit::Cm => n * 96.0 / 2.54,
        LengthUnit::Mm => n * 96.0 / 25.4,
        LengthUnit::Pt => n * 96.0 / 72.0,
        LengthUnit::Pc => n * 16.0,
        LengthUnit::Percent => n * percent_base / 100.0,
    };
    Some(px)
}

fn parse_font_size(value: &str, parent: f32) -> Option<f32> {
    let keyword = match value {
        "xx-small" => Some(9.0),
        "x-small" => Some(10.0),
        "small" => Some(13.0),
        "medium" => Some(DEFAULT_FONT_SIZE),
        "large" => Some(18.0),
        "x-large" => Some(24.0),
        "xx-large" => Some(32.0),
        "smaller" => Some(parent / 1.2),
        "larger" => Some(parent * 1.2),
        _ => None,
    };
    if keyword.is_some() {
        return keyword;
    }
    // em and % are relative to the parent's font size for font-size itself
    parse_length(value, parent, parent).filter(|px| *px > 0.0)
}
