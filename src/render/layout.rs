//! Box tree to positioned paint items.
//!
//! A single top-down pass: block boxes stack vertically with adjacent
//! sibling margins collapsed, inline runs are broken into lines greedily,
//! and tables use the automatic table layout algorithm (min/max content
//! widths distributed over the available width). Backgrounds are spliced
//! into the paint list once a box's height is known so they stay beneath
//! the box's content.

use super::boxes::{BoxKind, CellBox, InlineItem, LayoutBox, TableBox, TextStyle};
use super::fonts::{FontSpec, TextMeasure};
use super::style::{Rgba, Size, Style, TextAlign, VerticalAlign};

/// Gap between a list marker and the item's content.
const MARKER_GAP: f32 = 6.0;

/// Width of a tab stop in spaces.
const TAB_SPACES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaintItem {
    Fill {
        rect: Rect,
        color: Rgba,
        /// Bottom of the line box this fill decorates, if any. Such fills
        /// move to the next page together with their line.
        line_bottom: Option<f32>,
    },
    Text {
        x: f32,
        baseline: f32,
        line_bottom: f32,
        text: String,
        font: FontSpec,
        color: Rgba,
    },
}

impl PaintItem {
    fn translate(&mut self, dy: f32) {
        match self {
            PaintItem::Fill {
                rect, line_bottom, ..
            } => {
                rect.y += dy;
                if let Some(bottom) = line_bottom {
                    *bottom += dy;
                }
            }
            PaintItem::Text {
                baseline,
                line_bottom,
                ..
            } => {
                *baseline += dy;
                *line_bottom += dy;
            }
        }
    }
}

/// What produced an [`Extent`]. Page shrinking only takes widths from
/// content that sizes to what it holds, never from full-width blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtentKind {
    Block,
    Table,
    Line,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub kind: ExtentKind,
    pub rect: Rect,
}

#[derive(Debug, Default)]
pub struct Layout {
    pub paint: Vec<PaintItem>,
    pub extents: Vec<Extent>,
}

impl Layout {
    /// Lowest edge of any laid-out box.
    pub fn content_bottom(&self) -> Option<f32> {
        self.extents
            .iter()
            .map(|e| e.rect.bottom())
            .fold(None, |acc, b| Some(acc.map_or(b, |a: f32| a.max(b))))
    }
}

/// Lays out `root` with its margin edge at (`x`, `y`) in a containing
/// block `width` px wide.
pub fn layout_document(root: &LayoutBox, x: f32, y: f32, width: f32, measure: &dyn TextMeasure) -> Layout {
    let mut engine = Engine {
        measure,
        out: Layout::default(),
    };
    engine.block(root, x, y, width);
    engine.out
}

struct Engine<'m> {
    measure: &'m dyn TextMeasure,
    out: Layout,
}

// ============================================================================
// Inline content tokens
// ============================================================================

#[derive(Debug)]
enum Piece<'a> {
    Word { text: String, style: &'a TextStyle },
    Space { count: usize, style: &'a TextStyle, preserved: bool },
    Break,
}

/// Applies white-space processing and splits inline items into words,
/// spaces and forced breaks.
fn tokenize(items: &[InlineItem]) -> Vec<Piece<'_>> {
    let mut out = Vec::new();
    // Collapsible spaces at the start of a line are removed
    let mut after_space = true;

    for item in items {
        let (text, style) = match item {
            InlineItem::Break => {
                trim_collapsible_tail(&mut out);
                out.push(Piece::Break);
                after_space = true;
                continue;
            }
            InlineItem::Text { text, style } => (text, style),
        };
        let ws = style.white_space;
        let mut word = String::new();

        for c in text.chars() {
            match c {
                '\n' if ws.preserves_newlines() => {
                    flush_word(&mut out, &mut word, style, &mut after_space);
                    if ws.collapses_spaces() {
                        trim_collapsible_tail(&mut out);
                    }
                    out.push(Piece::Break);
                    after_space = true;
                }
                '\r' => {}
                ' ' | '\t' | '\n' | '\u{0c}' => {
                    flush_word(&mut out, &mut word, style, &mut after_space);
                    if ws.collapses_spaces() {
                        if !after_space {
                            out.push(Piece::Space {
                                count: 1,
                                style,
                                preserved: false,
                            });
                            after_space = true;
                        }
                    } else {
                        let n = if c == '\t' { TAB_SPACES } else { 1 };
                        match out.last_mut() {
                            Some(Piece::Space {
                                count,
                                style: prev,
                                preserved: true,
                            }) if std::ptr::eq(*prev, style) => *count += n,
                            _ => out.push(Piece::Space {
                                count: n,
                                style,
                                preserved: true,
                            }),
                        }
                        after_space = false;
                    }
                }
                c if c.is_control() => {}
                c => word.push(c),
            }
        }
        flush_word(&mut out, &mut word, style, &mut after_space);
    }
    trim_collapsible_tail(&mut out);
    out
}

fn flush_word<'a>(out: &mut Vec<Piece<'a>>, word: &mut String, style: &'a TextStyle, after_space: &mut bool) {
    if !word.is_empty() {
        out.push(Piece::Word {
            text: std::mem::take(word),
            style,
        });
        *after_space = false;
    }
}

fn trim_collapsible_tail(out: &mut Vec<Piece<'_>>) {
    while matches!(
        out.last(),
        Some(Piece::Space {
            preserved: false,
            ..
        })
    ) {
        out.pop();
    }
}

// ============================================================================
// Line building
// ============================================================================

#[derive(Debug)]
struct Frag<'a> {
    text: String,
    style: &'a TextStyle,
    width: f32,
    /// Trailing-space candidate: removed at the end of a line.
    collapsible: bool,
    is_space: bool,
}

#[derive(Debug, Default)]
struct Line<'a> {
    frags: Vec<Frag<'a>>,
}

impl<'a> Line<'a> {
    fn width(&self) -> f32 {
        self.frags.iter().map(|f| f.width).sum()
    }

    /// Width without trailing spaces, which may hang past the edge.
    fn content_width(&self) -> f32 {
        let end = self
            .frags
            .iter()
            .rposition(|f| !f.is_space)
            .map_or(0, |i| i + 1);
        self.frags[..end].iter().map(|f| f.width).sum()
    }

    fn has_content(&self) -> bool {
        self.frags.iter().any(|f| !f.is_space)
    }

    /// A soft wrap opportunity exists at the end of this line.
    fn ends_in_wrappable_space(&self) -> bool {
        matches!(self.frags.last(), Some(f) if f.is_space && f.style.white_space.wraps())
    }

    fn trim_end(&mut self) {
        while matches!(self.frags.last(), Some(f) if f.collapsible) {
            self.frags.pop();
        }
    }

    fn push(&mut self, frag: Frag<'a>) {
        if let Some(last) = self.frags.last_mut() {
            if std::ptr::eq(last.style, frag.style) && last.is_space == frag.is_space {
                last.text.push_str(&frag.text);
                last.width += frag.width;
                last.collapsible &= frag.collapsible;
                return;
            }
        }
        self.frags.push(frag);
    }
}

impl Engine<'_> {
    fn word_width(&self, text: &str, style: &TextStyle) -> f32 {
        self.measure.advance(text, &style.font)
    }

    fn space_width(&self, count: usize, style: &TextStyle) -> f32 {
        self.measure.advance(" ", &style.font) * count as f32
    }

    fn break_lines<'a>(&self, pieces: &[Piece<'a>], avail: f32) -> Vec<Line<'a>> {
        let mut lines = Vec::new();
        let mut line = Line::default();
        let mut i = 0;

        while i < pieces.len() {
            match &pieces[i] {
                Piece::Break => {
                    line.trim_end();
                    lines.push(std::mem::take(&mut line));
                    i += 1;
                }
                Piece::Space {
                    count,
                    style,
                    preserved,
                } => {
                    if *preserved || line.has_content() {
                        line.push(Frag {
                            text: " ".repeat(*count),
                            style: *style,
                            width: self.space_width(*count, style),
                            collapsible: !*preserved,
                            is_space: true,
                        });
                    }
                    i += 1;
                }
                Piece::Word { .. } => {
                    // Consecutive words with no space between them form one
                    // unbreakable run ("foo<b>bar</b>")
                    let start = i;
                    while matches!(pieces.get(i), Some(Piece::Word { .. })) {
                        i += 1;
                    }
                    let run = &pieces[start..i];
                    let run_width: f32 = run
                        .iter()
                        .map(|p| match p {
                            Piece::Word { text, style } => self.word_width(text, style),
                            _ => 0.0,
                        })
                        .sum();

                    if line.has_content()
                        && line.ends_in_wrappable_space()
                        && line.width() + run_width > avail
                    {
                        line.trim_end();
                        lines.push(std::mem::take(&mut line));
                    }

                    let can_split = run.iter().all(|p| match p {
                        Piece::Word { style, .. } => style.white_space.wraps(),
                        _ => true,
                    });
                    if can_split && line.width() + run_width > avail {
                        self.place_split(run, avail, &mut line, &mut lines);
                    } else {
                        for piece in run {
                            if let Piece::Word { text, style } = piece {
                                line.push(Frag {
                                    text: text.clone(),
                                    style: *style,
                                    width: self.word_width(text, style),
                                    collapsible: false,
                                    is_space: false,
                                });
                            }
                        }
                    }
                }
            }
        }

        line.trim_end();
        if !line.frags.is_empty() {
            lines.push(line);
        }
        lines
    }

    /// Places an over-long run character by character, breaking anywhere.
    fn place_split<'a>(&self, run: &[Piece<'a>], avail: f32, line: &mut Line<'a>, lines: &mut Vec<Line<'a>>) {
        for piece in run {
            let Piece::Word { text, style } = piece else {
                continue;
            };
            let mut buf = [0u8; 4];
            for c in text.chars() {
                let s: &str = c.encode_utf8(&mut buf);
                let w = self.word_width(s, style);
                if line.has_content() && line.width() + w > avail {
                    line.trim_end();
                    lines.push(std::mem::take(line));
                }
                line.push(Frag {
                    text: s.to_string(),
                    style: *style,
                    width: w,
                    collapsible: false,
                    is_space: false,
                });
            }
        }
    }

    /// Lays out an inline run; returns its height.
    fn inline(&mut self, items: &[InlineItem], container: &Style, x: f32, y: f32, width: f32) -> f32 {
        let pieces = tokenize(items);
        let lines = self.break_lines(&pieces, width);
        let strut = TextStyle::from_style(container, None);

        let mut cursor = y;
        for line in &lines {
            let (above, below) = line
                .frags
                .iter()
                .map(|f| f.style)
                .chain(std::iter::once(&strut))
                .map(|s| self.vertical_metrics(s))
                .fold((0.0f32, 0.0f32), |(a, b), (fa, fb)| (a.max(fa), b.max(fb)));
            let height = above + below;
            let baseline = cursor + above;
            let line_bottom = cursor + height;

            let content_width = line.content_width();
            let free = (width - content_width).max(0.0);
            let mut fx = match container.text_align {
                TextAlign::Left => x,
                TextAlign::Center => x + free / 2.0,
                TextAlign::Right => x + free,
            };
            let line_x = fx;

            for run in runs(&line.frags) {
                self.paint_run(&run, fx, cursor, height, baseline, line_bottom);
                fx += run.width;
            }
            if content_width > 0.0 {
                self.out.extents.push(Extent {
                    kind: ExtentKind::Line,
                    rect: Rect {
                        x: line_x,
                        y: cursor,
                        width: content_width,
                        height,
                    },
                });
            }
            cursor = line_bottom;
        }
        cursor - y
    }

    /// (above baseline, below baseline) for a line containing `style`.
    fn vertical_metrics(&self, style: &TextStyle) -> (f32, f32) {
        let half_leading = (style.line_height - style.font.size) / 2.0;
        let above = half_leading + self.measure.ascent(&style.font);
        (above, (style.line_height - above).max(0.0))
    }

    fn paint_run(&mut self, frag: &Frag<'_>, x: f32, top: f32, height: f32, baseline: f32, line_bottom: f32) {
        let style = frag.style;
        let size = style.font.size;
        if let Some(color) = style.highlight {
            self.out.paint.push(PaintItem::Fill {
                rect: Rect {
                    x,
                    y: top,
                    width: frag.width,
                    height,
                },
                color,
                line_bottom: Some(line_bottom),
            });
        }
        if frag.is_space && !style.underline && !style.line_through {
            return;
        }
        if !frag.is_space {
            self.out.paint.push(PaintItem::Text {
                x,
                baseline,
                line_bottom,
                text: frag.text.clone(),
                font: style.font,
                color: style.color,
            });
            self.out.extents.push(Extent {
                kind: ExtentKind::Text,
                rect: Rect {
                    x,
                    y: top,
                    width: frag.width,
                    height,
                },
            });
        }
        let thickness = (size / 15.0).max(1.0);
        let mut decorate = |offset: f32| {
            self.out.paint.push(PaintItem::Fill {
                rect: Rect {
                    x,
                    y: baseline + offset,
                    width: frag.width,
                    height: thickness,
                },
                color: style.color,
                line_bottom: Some(line_bottom),
            });
        };
        if style.underline {
            decorate(size * 0.12);
        }
        if style.line_through {
            decorate(-size * 0.3);
        }
    }
}

/// Merges adjacent fragments of the same style into paintable runs.
fn runs<'a>(frags: &[Frag<'a>]) -> Vec<Frag<'a>> {
    let mut out: Vec<Frag<'a>> = Vec::new();
    for frag in frags {
        match out.last_mut() {
            Some(last) if std::ptr::eq(last.style, frag.style) => {
                last.text.push_str(&frag.text);
                last.width += frag.width;
                last.is_space &= frag.is_space;
            }
            _ => out.push(Frag {
                text: frag.text.clone(),
                style: frag.style,
                width: frag.width,
                collapsible: frag.collapsible,
                is_space: frag.is_space,
            }),
        }
    }
    out
}

// ============================================================================
// Intrinsic widths
// ============================================================================

impl Engine<'_> {
    /// (min-content, max-content) widths of a sequence of block boxes,
    /// margins included.
    fn intrinsic(&self, boxes: &[LayoutBox]) -> (f32, f32) {
        boxes.iter().fold((0.0f32, 0.0f32), |(min, max), b| {
            let (bmin, bmax) = self.box_intrinsic(b);
            (min.max(bmin), max.max(bmax))
        })
    }

    fn box_intrinsic(&self, b: &LayoutBox) -> (f32, f32) {
        let s = &b.style;
        if let BoxKind::Table(t) = &b.kind {
            let (min, max) = self.table_intrinsic(s, t);
            return (min + s.margin.horizontal(), max + s.margin.horizontal());
        }
        let chrome = s.margin.horizontal() + s.border.widths().horizontal() + s.padding.horizontal();
        let (min, max) = match &b.kind {
            BoxKind::Block(children) => self.intrinsic(children),
            BoxKind::Inline(items) => self.inline_intrinsic(items),
            BoxKind::Table(_) => (0.0, 0.0),
        };
        match s.width {
            Size::Px(w) => (w.max(min) + chrome, w.max(min) + chrome),
            _ => (min + chrome, max + chrome),
        }
    }

    fn inline_intrinsic(&self, items: &[InlineItem]) -> (f32, f32) {
        let pieces = tokenize(items);
        let (mut min, mut max) = (0.0f32, 0.0f32);
        let (mut run, mut line) = (0.0f32, 0.0f32);
        for piece in &pieces {
            match piece {
                Piece::Word { text, style } => {
                    let w = self.word_width(text, style);
                    run += w;
                    line += w;
                }
                Piece::Space { count, style, .. } => {
                    let w = self.space_width(*count, style);
                    line += w;
                    if style.white_space.wraps() {
                        min = min.max(run);
                        run = 0.0;
                    } else {
                        run += w;
                    }
                }
                Piece::Break => {
                    min = min.max(run);
                    max = max.max(line);
                    run = 0.0;
                    line = 0.0;
                }
            }
        }
        (min.max(run), max.max(line))
    }

    fn cell_intrinsic(&self, cell: &CellBox) -> (f32, f32) {
        let s = &cell.style;
        let chrome = s.border.widths().horizontal() + s.padding.horizontal();
        let (min, max) = self.intrinsic(&cell.children);
        match s.width {
            Size::Px(w) => {
                let w = (w + chrome).max(min + chrome);
                (w, w)
            }
            _ => (min + chrome, max + chrome),
        }
    }

    /// Column (min, max, percent) widths of a table.
    fn columns(&self, t: &TableBox, ncols: usize, spacing: f32) -> (Vec<f32>, Vec<f32>, Vec<Option<f32>>) {
        let mut min = vec![0.0f32; ncols];
        let mut max = vec![0.0f32; ncols];
        let mut pct: Vec<Option<f32>> = vec![None; ncols];

        for (i, width) in t.columns.iter().enumerate().take(ncols) {
            match *width {
                Size::Px(w) => max[i] = max[i].max(w),
                Size::Percent(p) => pct[i] = Some(p),
                Size::Auto => {}
            }
        }

        let mut spanning = Vec::new();
        for row in &t.rows {
            let mut col = 0;
            for cell in &row.cells {
                if col >= ncols {
                    break;
                }
                let span = cell.colspan.min(ncols - col);
                let (cmin, cmax) = self.cell_intrinsic(cell);
                if span == 1 {
                    min[col] = min[col].max(cmin);
                    max[col] = max[col].max(cmax);
                    if let Size::Percent(p) = cell.style.width {
                        pct[col] = Some(pct[col].map_or(p, |q| q.max(p)));
                    }
                } else {
                    spanning.push((col, span, cmin, cmax));
                }
                col += span;
            }
        }

        for (col, span, cmin, cmax) in spanning {
            let gaps = (span - 1) as f32 * spacing;
            let cur_min: f32 = min[col..col + span].iter().sum::<f32>() + gaps;
            if cmin > cur_min {
                let add = (cmin - cur_min) / span as f32;
                min[col..col + span].iter_mut().for_each(|w| *w += add);
            }
            let cur_max: f32 = max[col..col + span].iter().sum::<f32>() + gaps;
            if cmax > cur_max {
                let add = (cmax - cur_max) / span as f32;
                max[col..col + span].iter_mut().for_each(|w| *w += add);
            }
        }

        for i in 0..ncols {
            max[i] = max[i].max(min[i]);
        }
        (min, max, pct)
    }

    fn table_intrinsic(&self, s: &Style, t: &TableBox) -> (f32, f32) {
        let ncols = t.column_count();
        let spacing = s.border_spacing;
        let (min, max, _) = self.columns(t, ncols, spacing);
        let chrome = s.border.widths().horizontal() + s.padding.horizontal() + total_spacing(ncols, spacing);
        let min_sum = min.iter().sum::<f32>() + chrome;
        let max_sum = max.iter().sum::<f32>() + chrome;
        match s.width {
            Size::Px(w) => (w.max(min_sum), w.max(min_sum)),
            _ => (min_sum, max_sum),
        }
    }
}

fn total_spacing(ncols: usize, spacing: f32) -> f32 {
    if ncols == 0 {
        0.0
    } else {
        (ncols + 1) as f32 * spacing
    }
}

/// Distributes `avail` over columns given their min/max widths.
fn distribute(min: &[f32], max: &[f32], avail: f32, fill: bool) -> Vec<f32> {
    let min_sum: f32 = min.iter().sum();
    let max_sum: f32 = max.iter().sum();
    if min_sum >= avail {
        return min.to_vec();
    }
    if max_sum <= avail {
        if !fill || max.is_empty() {
            return max.to_vec();
        }
        let extra = avail - max_sum;
        if max_sum > 0.0 {
            return max.iter().map(|w| w + extra * w / max_sum).collect();
        }
        let each = extra / max.len() as f32;
        return max.iter().map(|w| w + each).collect();
    }
    let span = max_sum - min_sum;
    min.iter()
        .zip(max)
        .map(|(lo, hi)| lo + (avail - min_sum) * (hi - lo) / span)
        .collect()
}

// ============================================================================
// Block and table layout
// ============================================================================

/// Background and border fills for a box.
fn decorations(style: &Style, rect: Rect) -> Vec<PaintItem> {
    let mut out = Vec::new();
    let fill = |rect: Rect, color: Rgba| PaintItem::Fill {
        rect,
        color,
        line_bottom: None,
    };
    if let Some(bg) = style.background {
        out.push(fill(rect, bg));
    }
    let b = style.border.widths();
    let sides = [
        (b.top, &style.border.top, Rect { height: b.top, ..rect }),
        (
            b.bottom,
            &style.border.bottom,
            Rect {
                y: rect.bottom() - b.bottom,
                height: b.bottom,
                ..rect
            },
        ),
        (b.left, &style.border.left, Rect { width: b.left, ..rect }),
        (
            b.right,
            &style.border.right,
            Rect {
                x: rect.right() - b.right,
                width: b.right,
                ..rect
            },
        ),
    ];
    for (width, side, side_rect) in sides {
        if width > 0.0 {
            out.push(fill(side_rect, style.border_color(side)));
        }
    }
    out
}

struct PlacedCell<'b> {
    style: &'b Style,
    paint_start: usize,
    paint_end: usize,
    extents_start: usize,
    extents_end: usize,
    x: f32,
    width: f32,
    height: f32,
}

impl Engine<'_> {
    /// Lays out a block-level box with its top margin edge at `y`; returns
    /// the height of its margin box.
    fn block(&mut self, b: &LayoutBox, x: f32, y: f32, avail: f32) -> f32 {
        if let BoxKind::Table(t) = &b.kind {
            return self.table(&b.style, t, x, y, avail);
        }
        let s = &b.style;
        let border = s.border.widths();
        let chrome = border.horizontal() + s.padding.horizontal();
        let content_width = s
            .width
            .resolve(avail)
            .unwrap_or(avail - s.margin.horizontal() - chrome)
            .max(0.0);

        let bx = x + s.margin.left;
        let by = y + s.margin.top;
        let cx = bx + border.left + s.padding.left;
        let cy = by + border.top + s.padding.top;

        let slot = self.out.paint.len();
        let mut content_height = match &b.kind {
            BoxKind::Block(children) => self.block_children(children, cx, cy, content_width),
            BoxKind::Inline(items) => self.inline(items, s, cx, cy, content_width),
            BoxKind::Table(_) => 0.0,
        };
        if let Size::Px(h) = s.height {
            content_height = content_height.max(h);
        }

        let rect = Rect {
            x: bx,
            y: by,
            width: content_width + chrome,
            height: content_height + border.vertical() + s.padding.vertical(),
        };
        let fills = decorations(s, rect);
        self.out.paint.splice(slot..slot, fills);

        if let Some(marker) = &b.marker {
            self.marker(marker, s, cx, cy);
        }

        self.out.extents.push(Extent {
            kind: ExtentKind::Block,
            rect,
        });
        s.margin.top + rect.height + s.margin.bottom
    }

    fn marker(&mut self, marker: &str, s: &Style, cx: f32, cy: f32) {
        let style = TextStyle::from_style(s, None);
        let width = self.word_width(marker, &style);
        let (above, _) = self.vertical_metrics(&style);
        let x = cx - width - MARKER_GAP;
        self.out.paint.push(PaintItem::Text {
            x,
            baseline: cy + above,
            line_bottom: cy + style.line_height,
            text: marker.to_string(),
            font: style.font,
            color: style.color,
        });
        self.out.extents.push(Extent {
            kind: ExtentKind::Text,
            rect: Rect {
                x,
                y: cy,
                width,
                height: style.line_height,
            },
        });
    }

    /// Stacks block children; returns their total height.
    fn block_children(&mut self, children: &[LayoutBox], x: f32, y: f32, width: f32) -> f32 {
        let mut cursor = y;
        let mut prev_margin = 0.0f32;
        for child in children {
            // Adjacent vertical margins collapse to the larger one
            let collapse = prev_margin.min(child.style.margin.top).max(0.0);
            cursor -= collapse;
            cursor += self.block(child, x, cursor, width);
            prev_margin = child.style.margin.bottom;
        }
        cursor - y
    }

    fn translate(&mut self, paint: std::ops::Range<usize>, extents: std::ops::Range<usize>, dy: f32) {
        for item in &mut self.out.paint[paint] {
            item.translate(dy);
        }
        for extent in &mut self.out.extents[extents] {
            extent.rect.y += dy;
        }
    }

    fn table(&mut self, s: &Style, t: &TableBox, x: f32, y: f32, avail: f32) -> f32 {
        let border = s.border.widths();
        let spacing = s.border_spacing;
        let ncols = t.column_count();
        let chrome = border.horizontal() + s.padding.horizontal() + total_spacing(ncols, spacing);
        let avail_box = (avail - s.margin.horizontal()).max(0.0);

        let (min, max, pct) = self.columns(t, ncols, spacing);
        let explicit = s.width.resolve(avail_box);
        let cols_avail = (explicit.unwrap_or(avail_box) - chrome).max(0.0);

        // Percentage columns take their share first, the rest is distributed
        let mut widths = vec![0.0f32; ncols];
        let mut fixed = 0.0f32;
        for i in 0..ncols {
            if let Some(p) = pct[i] {
                widths[i] = (cols_avail * p / 100.0).max(min[i]);
                fixed += widths[i];
            }
        }
        let free: Vec<usize> = (0..ncols).filter(|i| pct[*i].is_none()).collect();
        let free_min: Vec<f32> = free.iter().map(|i| min[*i]).collect();
        let free_max: Vec<f32> = free.iter().map(|i| max[*i]).collect();
        let shared = distribute(
            &free_min,
            &free_max,
            (cols_avail - fixed).max(0.0),
            explicit.is_some(),
        );
        for (i, w) in free.iter().zip(shared) {
            widths[*i] = w;
        }

        let table_width = widths.iter().sum::<f32>() + chrome;
        let bx = x + s.margin.left;
        let by = y + s.margin.top;
        let slot = self.out.paint.len();

        let mut table_top = by;
        if let Some(caption) = &t.caption {
            table_top += self.block(caption, bx, table_top, table_width);
        }

        let inner_spacing = if ncols > 0 { spacing } else { 0.0 };
        let start_x = bx + border.left + s.padding.left + inner_spacing;
        let mut col_x = Vec::with_capacity(ncols);
        let mut cx = start_x;
        for w in &widths {
            col_x.push(cx);
            cx += w + spacing;
        }

        let mut ry = table_top + border.top + s.padding.top + inner_spacing;
        for row in &t.rows {
            let row_slot = self.out.paint.len();
            let mut placed = Vec::with_capacity(row.cells.len());
            let mut col = 0;
            for cell in &row.cells {
                if col >= ncols {
                    break;
                }
                let span = cell.colspan.min(ncols - col).max(1);
                let width = widths[col..col + span].iter().sum::<f32>() + (span - 1) as f32 * spacing;
                placed.push(self.cell(cell, col_x[col], ry, width));
                col += span;
            }

            let row_height = placed.iter().map(|c| c.height).fold(0.0f32, f32::max);
            for cell in placed.iter().rev() {
                let offset = match cell.style.vertical_align {
                    VerticalAlign::Top => 0.0,
                    VerticalAlign::Middle => (row_height - cell.height) / 2.0,
                    VerticalAlign::Bottom => row_height - cell.height,
                };
                if offset > 0.0 {
                    self.translate(
                        cell.paint_start..cell.paint_end,
                        cell.extents_start..cell.extents_end,
                        offset,
                    );
                }
                let rect = Rect {
                    x: cell.x,
                    y: ry,
                    width: cell.width,
                    height: row_height,
                };
                let fills = decorations(cell.style, rect);
                self.out.paint.splice(cell.paint_start..cell.paint_start, fills);
                self.out.extents.push(Extent {
                    kind: ExtentKind::Block,
                    rect,
                });
            }
            if let (Some(bg), Some(first), Some(last)) = (row.style.background, placed.first(), placed.last()) {
                let rect = Rect {
                    x: first.x,
                    y: ry,
                    width: last.x + last.width - first.x,
                    height: row_height,
                };
                self.out.paint.insert(
                    row_slot,
                    PaintItem::Fill {
                        rect,
                        color: bg,
                        line_bottom: None,
                    },
                );
            }
            ry += row_height + spacing;
        }

        let table_height = ry - table_top + s.padding.bottom + border.bottom;
        let rect = Rect {
            x: bx,
            y: table_top,
            width: table_width,
            height: table_height,
        };
        let fills = decorations(s, rect);
        self.out.paint.splice(slot..slot, fills);
        self.out.extents.push(Extent {
            kind: ExtentKind::Table,
            rect,
        });

        s.margin.top + (table_top - by) + table_height + s.margin.bottom
    }

    fn cell<'b>(&mut self, cell: &'b CellBox, x: f32, y: f32, width: f32) -> PlacedCell<'b> {
        let s = &cell.style;
        let border = s.border.widths();
        let paint_start = self.out.paint.len();
        let extents_start = self.out.extents.len();
        let inner = (width - border.horizontal() - s.padding.horizontal()).max(0.0);
        let content = self.block_children(
            &cell.children,
            x + border.left + s.padding.left,
            y + border.top + s.padding.top,
            inner,
        );
        let mut height = content + border.vertical() + s.padding.vertical();
        if let Size::Px(h) = s.height {
            height = height.max(h);
        }
        PlacedCell {
            style: s,
            paint_start,
            paint_end: self.out.paint.len(),
            extents_start,
            extents_end: self.out.extents.len(),
            x,
            width,
            height,
        }
    }
}
