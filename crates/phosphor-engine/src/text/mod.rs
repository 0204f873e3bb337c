//! Text-grid rendering: font loading, glyph atlas, size resolution and the
//! editable grid.

mod atlas;
mod font_system;
mod glyph_set;
mod grid;
mod renderer;
mod size;

pub use atlas::{AtlasImage, AtlasLayout, FontAtlas};
pub use font_system::{
    BOX_GLYPH, BoxMetrics, FontFace, FontId, FontLoadError, FontSystem, GlyphBitmap, GlyphSource,
    candidate_sources,
};
pub use glyph_set::{GlyphId, GlyphSet, GlyphSpec, GlyphTable};
pub use grid::{CharTile, TextGrid};
pub use renderer::{TextRenderer, TextRendererConfig};
pub use size::{SizeError, SizeSpec, TextRendererSize};
