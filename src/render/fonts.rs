use resvg::usvg::fontdb;
use std::sync::Arc;

/// Font selection for one run of text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontSpec {
    pub size: f32,
    pub bold: bool,
    pub italic: bool,
    pub mono: bool,
}

/// Text metrics used by layout and painting.
pub trait TextMeasure: Send + Sync {
    /// Advance width of `text` in px.
    fn advance(&self, text: &str, font: &FontSpec) -> f32;

    /// Distance from the top of the em box to the baseline, in px.
    fn ascent(&self, font: &FontSpec) -> f32;

    /// Family name the rasterizer should use, or `None` when no face is
    /// available and text has to be painted as solid bars.
    fn family(&self, font: &FontSpec) -> Option<&str>;
}

/// Per-character width estimates for when no font file is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproxMetrics;

impl ApproxMetrics {
    fn char_em(c: char, mono: bool) -> f32 {
        if mono {
            return if is_wide(c) { 1.2 } else { 0.6 };
        }
        match c {
            ' ' | 'i' | 'j' | 'l' | '.' | ',' | '\'' | '!' | '|' | ':' | ';' | '`' => 0.28,
            'f' | 't' | 'r' | '(' | ')' | '[' | ']' | '{' | '}' | '"' | '-' | '/' => 0.36,
            'm' | 'w' | 'M' | 'W' | '@' | '%' => 0.83,
            c if c.is_ascii_uppercase() => 0.67,
            c if is_wide(c) => 1.0,
            _ => 0.55,
        }
    }
}

impl TextMeasure for ApproxMetrics {
    fn advance(&self, text: &str, font: &FontSpec) -> f32 {
        let em: f32 = text.chars().map(|c| Self::char_em(c, font.mono)).sum();
        let bold = if font.bold { 1.05 } else { 1.0 };
        em * font.size * bold
    }

    fn ascent(&self, font: &FontSpec) -> f32 {
        font.size * 0.8
    }

    fn family(&self, _font: &FontSpec) -> Option<&str> {
        None
    }
}

fn is_wide(c: char) -> bool {
    matches!(c as u32,
        0x1100..=0x115F
        | 0x2E80..=0xA4CF
        | 0xAC00..=0xD7A3
        | 0xF900..=0xFAFF
        | 0xFE30..=0xFE4F
        | 0xFF00..=0xFF60
        | 0xFFE0..=0xFFE6
        | 0x1F300..=0x1FAFF)
}

struct LoadedFace {
    family: String,
    data: Vec<u8>,
    index: u32,
    units_per_em: f32,
    ascender: f32,
}

impl LoadedFace {
    fn load(db: &fontdb::Database, id: fontdb::ID) -> Option<Self> {
        let family = db.face(id)?.families.first()?.0.clone();
        db.with_face_data(id, |data, index| {
            let face = ttf_parser::Face::parse(data, index).ok()?;
            Some(LoadedFace {
                family,
                data: data.to_vec(),
                index,
                units_per_em: f32::from(face.units_per_em()),
                ascender: f32::from(face.ascender()),
            })
        })
        .flatten()
    }

    fn advance(&self, text: &str, size: f32, fallback: &FontSpec) -> f32 {
        let Ok(face) = ttf_parser::Face::parse(&self.data, self.index) else {
            return ApproxMetrics.advance(text, fallback);
        };
        let scale = size / self.units_per_em;
        text.chars()
            .map(|c| {
                face.glyph_index(c)
                    .and_then(|glyph| face.glyph_hor_advance(glyph))
                    .map(|units| f32::from(units) * scale)
                    .unwrap_or_else(|| ApproxMetrics::char_em(c, fallback.mono) * size)
            })
            .sum()
    }
}

const SANS_FAMILIES: &[&str] = &[
    "DejaVu Sans",
    "Liberation Sans",
    "Noto Sans",
    "Arial",
    "Helvetica",
];

const MONO_FAMILIES: &[&str] = &[
    "DejaVu Sans Mono",
    "Liberation Mono",
    "Noto Sans Mono",
    "Courier New",
];

/// Fonts for layout and rasterization.
///
/// Holds the `fontdb` database handed to the rasterizer plus the face
/// data used for measuring, one slot per (mono, bold, italic) variant, so
/// layout and painting agree on advances. Missing faces fall back to
/// [`ApproxMetrics`] and bar-painted text.
pub struct FontBook {
    db: Arc<fontdb::Database>,
    faces: Vec<Option<LoadedFace>>,
}

impl std::fmt::Debug for FontBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontBook")
            .field("faces_in_db", &self.db.len())
            .field(
                "loaded",
                &self.faces.iter().filter(|f| f.is_some()).count(),
            )
            .finish()
    }
}

impl FontBook {
    /// Loads the system fonts.
    pub fn system() -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        let book = Self::from_database(db);
        if !book.has_faces() {
            tracing::warn!("No usable system fonts found, text will be rendered as bars");
        }
        book
    }

    /// No fonts at all: approximate metrics, bar-painted text. Output is
    /// identical on every machine.
    pub fn empty() -> Self {
        Self::from_database(fontdb::Database::new())
    }

    pub fn from_database(db: fontdb::Database) -> Self {
        let mut faces = Vec::with_capacity(8);
        for slot in 0..8u8 {
            let mono = slot & 4 != 0;
            let bold = slot & 2 != 0;
            let italic = slot & 1 != 0;
            faces.push(Self::select(&db, mono, bold, italic));
        }
        // Mono slots fall back to the proportional face rather than bars
        for slot in 4..8 {
            if faces[slot].is_none() {
                if let Some(face) = Self::select(&db, false, slot & 2 != 0, slot & 1 != 0) {
                    faces[slot] = Some(face);
                }
            }
        }
        Self {
            db: Arc::new(db),
            faces,
        }
    }

    fn select(db: &fontdb::Database, mono: bool, bold: bool, italic: bool) -> Option<LoadedFace> {
        let names = if mono { MONO_FAMILIES } else { SANS_FAMILIES };
        let mut families: Vec<fontdb::Family<'_>> =
            names.iter().map(|n| fontdb::Family::Name(*n)).collect();
        families.push(if mono {
            fontdb::Family::Monospace
        } else {
            fontdb::Family::SansSerif
        });

        let query = fontdb::Query {
            families: &families,
            weight: if bold {
                fontdb::Weight::BOLD
            } else {
                fontdb::Weight::NORMAL
            },
            stretch: fontdb::Stretch::Normal,
            style: if italic {
                fontdb::Style::Italic
            } else {
                fontdb::Style::Normal
            },
        };

        let id = db
            .query(&query)
            .or_else(|| (!mono).then(|| db.faces().next().map(|f| f.id)).flatten())?;
        LoadedFace::load(db, id)
    }

    pub fn has_faces(&self) -> bool {
        self.faces.iter().any(Option::is_some)
    }

    /// Database handed to `usvg` when rasterizing.
    pub fn database(&self) -> Arc<fontdb::Database> {
        Arc::clone(&self.db)
    }

    fn face(&self, font: &FontSpec) -> Option<&LoadedFace> {
        let slot = usize::from(font.mono) * 4 + usize::from(font.bold) * 2 + usize::from(font.italic);
        self.faces.get(slot).and_then(Option::as_ref)
    }
}

impl TextMeasure for FontBook {
    fn advance(&self, text: &str, font: &FontSpec) -> f32 {
        match self.face(font) {
            Some(face) => face.advance(text, font.size, font),
            None => ApproxMetrics.advance(text, font),
        }
    }

    fn ascent(&self, font: &FontSpec) -> f32 {
        match self.face(font) {
            Some(face) => face.ascender / face.units_per_em * font.size,
            None => ApproxMetrics.ascent(font),
        }
    }

    fn family(&self, font: &FontSpec) -> Option<&str> {
        self.face(font).map(|f| f.family.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(size: f32, mono: bool) -> FontSpec {
        FontSpec {
            size,
            bold: false,
            italic: false,
            mono,
        }
    }

    #[test]
    fn test_approx_mono_is_fixed_width() {
        let m = ApproxMetrics;
        let font = spec(10.0, true);
        assert_eq!(m.advance("iiii", &font), m.advance("MMMM", &font));
        assert!((m.advance("abcd", &font) - 24.0).abs() < 1e-4);
    }

    #[test]
    fn test_approx_scales_with_size() {
        let m = ApproxMetrics;
        let small = m.advance("Hello world", &spec(10.0, false));
        let large = m.advance("Hello world", &spec(20.0, false));
        assert!((large - 2.0 * small).abs() < 1e-3);
        assert_eq!(m.advance("", &spec(10.0, false)), 0.0);
    }

    #[test]
    fn test_empty_book_uses_approximation() {
        let book = FontBook::empty();
        assert!(!book.has_faces());
        let font = spec(16.0, false);
        assert_eq!(book.family(&font), None);
        assert_eq!(book.advance("abc", &font), ApproxMetrics.advance("abc", &font));
        assert_eq!(book.ascent(&font), ApproxMetrics.ascent(&font));
    }
}
