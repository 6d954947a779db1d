use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};
use ttf_parser::{Face, GlyphId, name_id};
use usvg::fontdb;

const ESTIMATED_ASCENT: f32 = 0.8;
const ESTIMATED_DESCENT: f32 = 0.2;
const FALLBACK_FAMILIES: &[&str] = &["sans-serif", "DejaVu Sans", "Arial", "Noto Sans"];

/// Ink box of a run of text, in pixels, relative to the pen origin on the
/// baseline. `top` is negative above the baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextBounds {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl TextBounds {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

pub trait TextMeasure {
    fn measure(&self, text: &str, font_size: f32) -> TextBounds;
}

#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    face_index: u32,
    units_per_em: u16,
    space_advance: u16,
    ascender: i16,
    descender: i16,
    family: Option<String>,
}

impl FontMetrics {
    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }
}

impl TextMeasure for FontMetrics {
    fn measure(&self, text: &str, font_size: f32) -> TextBounds {
        let Ok(face) = Face::parse(&self.data, self.face_index) else {
            return estimate_bounds(text, font_size);
        };
        let scale = font_size / self.units_per_em.max(1) as f32;
        let mut pen = 0i32;
        let mut ink: Option<(i32, i32, i32, i32)> = None;
        for ch in text.chars() {
            // Unmapped characters are drawn as .notdef.
            let glyph = face.glyph_index(ch).unwrap_or(GlyphId(0));
            if let Some(rect) = face.glyph_bounding_box(glyph) {
                let x_min = pen + rect.x_min as i32;
                let x_max = pen + rect.x_max as i32;
                let (y_min, y_max) = (rect.y_min as i32, rect.y_max as i32);
                ink = Some(match ink {
                    Some((l, b, r, t)) => (l.min(x_min), b.min(y_min), r.max(x_max), t.max(y_max)),
                    None => (x_min, y_min, x_max, y_max),
                });
            }
            pen += face
                .glyph_hor_advance(glyph)
                .unwrap_or(self.space_advance) as i32;
        }
        match ink {
            // Font units grow upward; the returned box grows downward.
            Some((left, bottom, right, top)) => TextBounds {
                left: left as f32 * scale,
                top: -(top as f32) * scale,
                right: right as f32 * scale,
                bottom: -(bottom as f32) * scale,
            },
            None => TextBounds {
                left: 0.0,
                top: -(self.ascender as f32) * scale,
                right: pen as f32 * scale,
                bottom: -(self.descender as f32) * scale,
            },
        }
    }
}

/// Typeface used for replacement text: parsed metrics plus the font database
/// handed to the SVG rasteriser.
#[derive(Clone)]
pub struct FontResource {
    metrics: Option<FontMetrics>,
    family: String,
    fontdb: Arc<fontdb::Database>,
}

impl FontResource {
    /// Loads `font_path`, falling back to a system sans-serif face and then to
    /// estimated metrics. Never fails; fallbacks are logged.
    pub fn load(font_path: Option<&Path>, font_family: Option<&str>) -> Self {
        if let Some(path) = font_path {
            match Self::from_file(path) {
                Ok(font) => return font,
                Err(err) => warn!("{:#}; using the default typeface", err),
            }
        }
        Self::system_default(font_family)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("failed to read font: {}", path.display()))?;
        let metrics = load_font_metrics_from_data(&data)
            .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))?;
        let mut db = fontdb::Database::new();
        db.load_font_data(data);
        let family = metrics
            .family()
            .map(|name| name.to_string())
            .unwrap_or_else(|| "sans-serif".to_string());
        debug!("loaded font {} ({})", path.display(), family);
        Ok(Self {
            metrics: Some(metrics),
            family,
            fontdb: Arc::new(db),
        })
    }

    /// System face matching `font_family` or one of the common sans-serif
    /// families.
    pub fn system_default(font_family: Option<&str>) -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        let candidates = font_family.into_iter().chain(FALLBACK_FAMILIES.iter().copied());
        for candidate in candidates {
            if let Ok((metrics, family)) = load_font_metrics_from_family(&db, candidate) {
                debug!("using system font {}", family);
                return Self {
                    metrics: Some(metrics),
                    family,
                    fontdb: Arc::new(db),
                };
            }
        }
        warn!("no usable system font found; text sizes are estimated");
        Self {
            metrics: None,
            family: "sans-serif".to_string(),
            fontdb: Arc::new(db),
        }
    }

    /// Estimated metrics with an empty font database. Text is laid out but the
    /// rasteriser has no glyphs to draw.
    pub fn estimated() -> Self {
        Self {
            metrics: None,
            family: "sans-serif".to_string(),
            fontdb: Arc::new(fontdb::Database::new()),
        }
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn is_estimated(&self) -> bool {
        self.metrics.is_none()
    }

    pub(crate) fn fontdb(&self) -> Arc<fontdb::Database> {
        self.fontdb.clone()
    }
}

impl TextMeasure for FontResource {
    fn measure(&self, text: &str, font_size: f32) -> TextBounds {
        match &self.metrics {
            Some(metrics) => metrics.measure(text, font_size),
            None => estimate_bounds(text, font_size),
        }
    }
}

pub(crate) fn estimate_bounds(text: &str, font_size: f32) -> TextBounds {
    TextBounds {
        left: 0.0,
        top: -ESTIMATED_ASCENT * font_size,
        right: estimate_text_width_units(text) * font_size,
        bottom: ESTIMATED_DESCENT * font_size,
    }
}

fn estimate_char_units_for_width(ch: char) -> f32 {
    if ch.is_whitespace() {
        0.25
    } else if ch.is_ascii_alphanumeric() {
        0.55
    } else if ch.is_ascii() {
        0.35
    } else if matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF | 0xAC00..=0xD7AF
    ) {
        1.0
    } else {
        0.9
    }
}

fn estimate_text_width_units(text: &str) -> f32 {
    text.chars().map(estimate_char_units_for_width).sum()
}

fn load_font_metrics_from_data(data: &[u8]) -> Result<FontMetrics> {
    let shared = Arc::new(data.to_vec());
    let count = ttf_parser::fonts_in_collection(data).unwrap_or(1);
    (0..count)
        .find_map(|index| metrics_for_face(&shared, index))
        .ok_or_else(|| anyhow!("failed to parse font data"))
}

fn metrics_for_face(data: &Arc<Vec<u8>>, face_index: u32) -> Option<FontMetrics> {
    let face = Face::parse(data, face_index).ok()?;
    let units_per_em = face.units_per_em().max(1);
    let space_advance = face
        .glyph_index(' ')
        .and_then(|id| face.glyph_hor_advance(id))
        .unwrap_or(units_per_em / 2);
    Some(FontMetrics {
        data: data.clone(),
        face_index,
        units_per_em,
        space_advance,
        ascender: face.ascender(),
        descender: face.descender(),
        family: extract_family_name(&face),
    })
}

fn load_font_metrics_from_family(
    db: &fontdb::Database,
    family: &str,
) -> Result<(FontMetrics, String)> {
    let families = if family.eq_ignore_ascii_case("sans-serif") {
        vec![fontdb::Family::SansSerif]
    } else {
        vec![fontdb::Family::Name(family)]
    };
    let query = fontdb::Query {
        families: &families,
        ..Default::default()
    };
    let id = db
        .query(&query)
        .ok_or_else(|| anyhow!("font not found: {}", family))?;
    let (data, face_index) = db
        .with_face_data(id, |data, index| (data.to_vec(), index))
        .ok_or_else(|| anyhow!("failed to load font data: {}", family))?;
    let metrics = metrics_for_face(&Arc::new(data), face_index)
        .ok_or_else(|| anyhow!("failed to parse font data: {}", family))?;
    let resolved_family = metrics
        .family()
        .map(|name| name.to_string())
        .unwrap_or_else(|| family.to_string());
    Ok((metrics, resolved_family))
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}
