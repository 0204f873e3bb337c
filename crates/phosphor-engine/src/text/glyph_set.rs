//! Glyph-set specifications and their expansion into an ordered glyph table.

use std::collections::HashMap;

use unicode_segmentation::UnicodeSegmentation;

/// One entry of a glyph set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlyphSpec {
    /// Literal text, split into grapheme clusters.
    Text(String),
    /// Inclusive code-point range, expanded low to high. Surrogates and other
    /// invalid scalar values are skipped.
    Range(u32, u32),
}

impl From<&str> for GlyphSpec {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<(u32, u32)> for GlyphSpec {
    fn from((lo, hi): (u32, u32)) -> Self {
        Self::Range(lo, hi)
    }
}

/// Ordered list of glyph specs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlyphSet(pub Vec<GlyphSpec>);

impl GlyphSet {
    pub fn new(specs: impl IntoIterator<Item = GlyphSpec>) -> Self {
        Self(specs.into_iter().collect())
    }

    /// Flattens the set, keeping order and duplicates.
    pub fn expand(&self) -> Vec<String> {
        let mut out = Vec::new();
        for spec in &self.0 {
            match spec {
                GlyphSpec::Text(text) => out.extend(text.graphemes(true).map(str::to_owned)),
                GlyphSpec::Range(lo, hi) => {
                    out.extend((*lo..=*hi).filter_map(char::from_u32).map(String::from))
                }
            }
        }
        out
    }
}

/// Printable ASCII, box drawing and block elements, and the CP437 extras
/// used by roguelike tilesets.
impl Default for GlyphSet {
    fn default() -> Self {
        Self::new([
            GlyphSpec::Range(32, 126),
            GlyphSpec::Range(0x2500, 0x259F),
            "☺☻♥♦♣♠•◘○◙♂♀♪♫☼►◄↕‼¶§▬↨↑↓→←∟↔▲▼⌂ÇüéâäàåçêëèïîìÄÅÉæÆôöòû".into(),
            "ùÿÖÜ¢£¥₧ƒáíóúñÑªº¿⌐¬½¼¡«»αßΓπΣσµτΦΘΩδ∞φε∩≡±≥≤⌠⌡÷≈°∙·√ⁿ²■".into(),
            "—…〉".into(),
        ])
    }
}

/// Index of a glyph in its table, which is also its atlas cell.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct GlyphId(pub(crate) u32);

impl GlyphId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Expanded glyphs plus a lookup from glyph text to its first cell.
#[derive(Debug, Clone, Default)]
pub struct GlyphTable {
    glyphs: Vec<String>,
    lookup: HashMap<String, GlyphId>,
}

impl GlyphTable {
    pub fn new(glyphs: Vec<String>) -> Self {
        let mut lookup = HashMap::with_capacity(glyphs.len());
        for (i, g) in glyphs.iter().enumerate() {
            lookup.entry(g.clone()).or_insert(GlyphId(i as u32));
        }
        Self { glyphs, lookup }
    }

    pub fn from_set(set: &GlyphSet) -> Self {
        Self::new(set.expand())
    }

    #[inline]
    pub fn id(&self, glyph: &str) -> Option<GlyphId> {
        self.lookup.get(glyph).copied()
    }

    #[inline]
    pub fn glyph(&self, id: GlyphId) -> Option<&str> {
        self.glyphs.get(id.index()).map(String::as_str)
    }

    /// Number of cells, duplicates included.
    #[inline]
    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.glyphs.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_and_text_keep_order() {
        let set = GlyphSet::new([GlyphSpec::Range(65, 67), "XY".into()]);
        assert_eq!(set.expand(), ["A", "B", "C", "X", "Y"]);
    }

    #[test]
    fn text_splits_on_grapheme_clusters() {
        let set = GlyphSet::new(["e\u{301}a".into(), "👍🏽".into()]);
        assert_eq!(set.expand(), ["e\u{301}", "a", "👍🏽"]);
    }

    #[test]
    fn surrogates_are_skipped() {
        let set = GlyphSet::new([GlyphSpec::Range(0xD7FF, 0xE000)]);
        assert_eq!(set.expand(), ["\u{D7FF}", "\u{E000}"]);
    }

    #[test]
    fn duplicates_keep_first_id_but_occupy_cells() {
        let table = GlyphTable::new(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.id("a"), Some(GlyphId(0)));
        assert_eq!(table.id("b"), Some(GlyphId(1)));
        assert_eq!(table.id("c"), None);
        assert_eq!(table.glyph(GlyphId(2)), Some("a"));
    }

    #[test]
    fn default_set_covers_ascii_and_box_drawing() {
        let table = GlyphTable::from_set(&GlyphSet::default());
        assert!(table.id(" ").is_some());
        assert!(table.id("~").is_some());
        assert!(table.id("█").is_some());
        assert!(table.id("☺").is_some());
        assert!(table.id("〉").is_some());
        assert_eq!(table.iter().take(2).collect::<Vec<_>>(), [" ", "!"]);
    }
}
