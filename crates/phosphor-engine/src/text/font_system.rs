use std::fmt;
use std::path::{Path, PathBuf};

/// Error returned by [`FontSystem::register`] and [`FontSystem::load_font`].
#[derive(Debug, Clone, PartialEq)]
pub enum FontLoadError {
    /// Bytes were read but could not be parsed as a font.
    Parse(String),
    /// None of the candidate sources for `family` could be loaded.
    NoSource { family: String, tried: usize },
}

impl fmt::Display for FontLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(msg) => write!(f, "font load error: {msg}"),
            Self::NoSource { family, tried } => {
                write!(f, "font load error: no usable source for '{family}' ({tried} tried)")
            }
        }
    }
}

impl std::error::Error for FontLoadError {}

/// Opaque handle to a font loaded into a [`FontSystem`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct FontId(pub(crate) usize);

/// Coverage bitmap of one rasterized glyph (or grapheme cluster).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlyphBitmap {
    pub width: usize,
    pub height: usize,
    /// Row-major coverage, `width * height` bytes.
    pub coverage: Vec<u8>,
    /// Left edge relative to the pen position.
    pub xmin: f32,
    /// Bottom edge relative to the baseline, positive up.
    pub ymin: f32,
    pub advance: f32,
}

/// Metrics of the full block glyph `█`, which defines the cell size.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BoxMetrics {
    pub width: f32,
    pub height: f32,
    /// Bottom of the box relative to the baseline, positive up.
    pub ymin: f32,
}

/// Side-effect-free measurement and rasterization at a given pixel size.
pub trait GlyphSource {
    fn box_metrics(&self, px: f32) -> BoxMetrics;

    /// `[advance width, ascent + descent]` of the box glyph.
    fn measure_box(&self, px: f32) -> [f32; 2] {
        let m = self.box_metrics(px);
        [m.width, m.height]
    }

    /// `None` when the font has no glyph for part of the cluster.
    fn rasterize(&self, glyph: &str, px: f32) -> Option<GlyphBitmap>;
}

pub const BOX_GLYPH: char = '█';

/// Owns the fonts loaded for this process, keyed by family name.
///
/// Fonts are immutable after loading.
pub struct FontSystem {
    fonts: Vec<(String, fontdue::Font)>,
}

impl FontSystem {
    pub fn new() -> Self {
        Self { fonts: Vec::new() }
    }

    /// Parses and stores a TrueType or OpenType font from raw bytes under
    /// `family`.
    pub fn load_font(&mut self, family: &str, bytes: &[u8]) -> Result<FontId, FontLoadError> {
        let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
            .map_err(|e| FontLoadError::Parse(e.to_string()))?;
        let id = FontId(self.fonts.len());
        self.fonts.push((family.to_owned(), font));
        Ok(id)
    }

    /// Makes `family` available, loading the first candidate source that can
    /// be read and parsed. A family that is already registered is returned
    /// as-is.
    pub fn register<P: AsRef<Path>>(
        &mut self,
        family: &str,
        sources: &[P],
    ) -> Result<FontId, FontLoadError> {
        if let Some(id) = self.family(family) {
            return Ok(id);
        }
        for path in sources {
            let path = path.as_ref();
            let bytes = match std::fs::read(path) {
                Ok(b) => b,
                Err(e) => {
                    log::debug!("font source {} unreadable: {e}", path.display());
                    continue;
                }
            };
            match self.load_font(family, &bytes) {
                Ok(id) => {
                    log::info!("loaded font '{family}' from {}", path.display());
                    return Ok(id);
                }
                Err(e) => log::warn!("font source {}: {e}", path.display()),
            }
        }
        Err(FontLoadError::NoSource { family: family.to_owned(), tried: sources.len() })
    }

    pub fn family(&self, name: &str) -> Option<FontId> {
        self.fonts.iter().position(|(f, _)| f == name).map(FontId)
    }

    pub fn face(&self, id: FontId) -> Option<FontFace<'_>> {
        self.fonts.get(id.0).map(|(_, font)| FontFace { font })
    }
}

impl Default for FontSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Candidate paths for `stem` with each of `extensions`, in order.
pub fn candidate_sources(dir: &Path, stem: &str, extensions: &[&str]) -> Vec<PathBuf> {
    extensions
        .iter()
        .map(|ext| dir.join(format!("{stem}.{ext}")))
        .collect()
}

/// A loaded font as a [`GlyphSource`].
#[derive(Clone, Copy)]
pub struct FontFace<'a> {
    font: &'a fontdue::Font,
}

impl GlyphSource for FontFace<'_> {
    fn box_metrics(&self, px: f32) -> BoxMetrics {
        if self.font.lookup_glyph_index(BOX_GLYPH) != 0 {
            let m = self.font.metrics(BOX_GLYPH, px);
            return BoxMetrics { width: m.advance_width, height: m.bounds.height, ymin: m.bounds.ymin };
        }
        // No box glyph: fall back to the line box and the widest common advance.
        let width = self.font.metrics('M', px).advance_width;
        match self.font.horizontal_line_metrics(px) {
            Some(lm) => BoxMetrics { width, height: lm.ascent - lm.descent, ymin: lm.descent },
            None => BoxMetrics { width, height: px, ymin: 0.0 },
        }
    }

    fn rasterize(&self, glyph: &str, px: f32) -> Option<GlyphBitmap> {
        // Each char is placed at the running pen position; the union of the
        // per-char bitmaps forms the cluster bitmap.
        let mut parts = Vec::new();
        let mut pen = 0.0f32;
        for ch in glyph.chars() {
            if self.font.lookup_glyph_index(ch) == 0 && !ch.is_whitespace() {
                return None;
            }
            let (m, bitmap) = self.font.rasterize(ch, px);
            parts.push((pen + m.xmin as f32, m.ymin as f32, m.width, m.height, bitmap));
            pen += m.advance_width;
        }

        let drawn = parts.iter().filter(|p| p.2 > 0 && p.3 > 0);
        let left = drawn.clone().map(|p| p.0).fold(f32::INFINITY, f32::min);
        if !left.is_finite() {
            return Some(GlyphBitmap { advance: pen, ..GlyphBitmap::default() });
        }
        let right = drawn.clone().map(|p| p.0 + p.2 as f32).fold(f32::NEG_INFINITY, f32::max);
        let bottom = drawn.clone().map(|p| p.1).fold(f32::INFINITY, f32::min);
        let top = drawn.map(|p| p.1 + p.3 as f32).fold(f32::NEG_INFINITY, f32::max);

        let width = (right - left).ceil() as usize;
        let height = (top - bottom).ceil() as usize;
        let mut coverage = vec![0u8; width * height];
        for (x0, ymin, w, h, bitmap) in &parts {
            let ox = (x0 - left).round() as usize;
            let oy = (top - (ymin + *h as f32)).round() as usize;
            for row in 0..*h {
                for col in 0..*w {
                    let (x, y) = (ox + col, oy + row);
                    if x < width && y < height {
                        let dst = &mut coverage[y * width + x];
                        *dst = (*dst).max(bitmap[row * w + col]);
                    }
                }
            }
        }

        Some(GlyphBitmap { width, height, coverage, xmin: left, ymin: bottom, advance: pen })
    }
}
