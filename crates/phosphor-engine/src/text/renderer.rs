//! Text-grid renderer: owns the grid, the atlas and the per-instance GPU
//! buffers, and emits one pass descriptor per frame.

use std::path::{Path, PathBuf};

use crate::coords::{GridPos, PixelDims, Rgb};
use crate::render::{
    Backend, BufferId, CLIP_QUAD, Composition, ConfigError, PassDescriptor, ProgramDesc, ProgramId,
    UniformKind, UniformValue, VertexAttrib,
};

use super::atlas::{AtlasLayout, FontAtlas};
use super::font_system::{FontLoadError, FontSystem, GlyphSource, candidate_sources};
use super::glyph_set::GlyphSet;
use super::grid::{CharTile, TextGrid};
use super::size::{SizeSpec, TextRendererSize};

const TEXT_SHADER: &str = include_str!("shaders/text.wgsl");

/// Everything needed to bring a text renderer up.
#[derive(Debug, Clone)]
pub struct TextRendererConfig {
    pub family: String,
    /// Candidate font files, tried in order.
    pub sources: Vec<PathBuf>,
    pub size: SizeSpec,
    pub glyphs: GlyphSet,
    pub atlas: AtlasLayout,
    /// Offset of the grid from the top-left corner, in pixels.
    pub screen_padding: f32,
}

impl Default for TextRendererConfig {
    fn default() -> Self {
        Self {
            family: "DejaVuSansMono".to_owned(),
            sources: candidate_sources(Path::new("public"), "DejaVuSansMono", &["woff", "ttf", "eot"]),
            size: SizeSpec::FontSizeAndResolution {
                font_size: 28.0,
                resolution: PixelDims::new(640, 480),
            },
            glyphs: GlyphSet::default(),
            atlas: AtlasLayout::default(),
            screen_padding: 10.0,
        }
    }
}

/// Ready-to-render text grid. Only obtainable through
/// [`TextRenderer::initialize`] or [`TextRenderer::with_source`], so every
/// instance has its font, atlas and buffers in place.
#[derive(Debug)]
pub struct TextRenderer {
    grid: TextGrid,
    atlas: FontAtlas,
    size: TextRendererSize,
    program: ProgramId,
    screen_padding: f32,

    quad: BufferId,
    screen_pos: BufferId,
    atlas_pos: BufferId,
    colors: BufferId,

    screen_pos_data: Vec<f32>,
    atlas_pos_data: Vec<f32>,
    color_data: Vec<f32>,
}

impl TextRenderer {
    /// Registers the font family, resolves the size, builds the atlas and
    /// compiles the text program.
    pub fn initialize<B: Backend + ?Sized>(
        backend: &mut B,
        fonts: &mut FontSystem,
        config: TextRendererConfig,
    ) -> Result<Self, ConfigError> {
        let id = fonts.register(&config.family, &config.sources)?;
        let face = fonts.face(id).ok_or_else(|| FontLoadError::NoSource {
            family: config.family.clone(),
            tried: config.sources.len(),
        })?;
        Self::with_source(backend, &face, &config)
    }

    pub fn with_source<B, S>(
        backend: &mut B,
        source: &S,
        config: &TextRendererConfig,
    ) -> Result<Self, ConfigError>
    where
        B: Backend + ?Sized,
        S: GlyphSource + ?Sized,
    {
        let size = config.size.resolve(source)?;
        let atlas = FontAtlas::build(backend, source, size.font_size, &config.glyphs, config.atlas)?;

        let program = backend.create_program(&ProgramDesc {
            label: "phosphor text",
            source: TEXT_SHADER,
            uniforms: &[
                ("uGlyphSize", UniformKind::Vec2),
                ("uAtlasSize", UniformKind::Vec2),
                ("uResolution", UniformKind::Vec2),
                ("uAtlas", UniformKind::Texture),
            ],
            attributes: &[
                ("aQuadVertPos", 0),
                ("iCharScreenPos", 1),
                ("iCharAtlasPos", 2),
                ("iCharColor", 3),
            ],
        })?;

        let capacity = size.grid.capacity();
        let screen_pos_data = vec![0.0; capacity * 2];
        let atlas_pos_data = vec![0.0; capacity * 2];
        let color_data = vec![0.0; capacity * 3];

        let quad = backend.create_buffer("phosphor text quad", &CLIP_QUAD);
        let screen_pos = backend.create_buffer("phosphor text screen pos", &screen_pos_data);
        let atlas_pos = backend.create_buffer("phosphor text atlas pos", &atlas_pos_data);
        let colors = backend.create_buffer("phosphor text color", &color_data);

        log::info!(
            "text renderer ready: {}x{} grid at {:.1}px",
            size.grid.columns,
            size.grid.rows,
            size.font_size
        );

        Ok(Self {
            grid: TextGrid::new(size.grid, atlas.table().clone()),
            atlas,
            size,
            program,
            screen_padding: config.screen_padding,
            quad,
            screen_pos,
            atlas_pos,
            colors,
            screen_pos_data,
            atlas_pos_data,
            color_data,
        })
    }

    // ── grid editing ───────────────────────────────────────────────────────

    pub fn set_char(&mut self, pos: GridPos, glyph: &str, color: Rgb) -> bool {
        self.grid.set_char(pos, glyph, color)
    }

    pub fn del_char(&mut self, pos: GridPos) -> bool {
        self.grid.del_char(pos)
    }

    pub fn get_char(&self, pos: GridPos) -> Option<CharTile<'_>> {
        self.grid.get_char(pos)
    }

    pub fn print(&mut self, text: &str, color: Rgb) {
        self.grid.print(text, color);
    }

    pub fn grid(&self) -> &TextGrid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut TextGrid {
        &mut self.grid
    }

    pub fn size(&self) -> &TextRendererSize {
        &self.size
    }

    pub fn atlas(&self) -> &FontAtlas {
        &self.atlas
    }

    // ── frame ──────────────────────────────────────────────────────────────

    /// Rebuilds the instance buffers if the grid changed and returns this
    /// frame's text pass.
    pub fn render_pass<B: Backend + ?Sized>(&mut self, backend: &mut B) -> PassDescriptor {
        if self.grid.is_stale() {
            self.refresh_buffers(backend);
        }

        PassDescriptor::new(self.program)
            .uniform("uGlyphSize", UniformValue::Vec2(self.atlas.char_dims()))
            .uniform("uAtlasSize", UniformValue::Vec2(self.atlas.dims().to_f32()))
            .uniform("uResolution", UniformValue::Vec2(self.size.resolution.to_f32()))
            .uniform("uAtlas", UniformValue::texture(self.atlas.texture()))
            .attribute("aQuadVertPos", VertexAttrib::per_vertex(self.quad, 2))
            .attribute("iCharScreenPos", VertexAttrib::per_instance(self.screen_pos, 2))
            .attribute("iCharAtlasPos", VertexAttrib::per_instance(self.atlas_pos, 2))
            .attribute("iCharColor", VertexAttrib::per_instance(self.colors, 3))
            .instances(self.grid.len() as u32)
            .composition(Composition::SERIES)
    }

    fn refresh_buffers<B: Backend + ?Sized>(&mut self, backend: &mut B) {
        let [cw, ch] = self.size.char_dims;
        let pad = self.screen_padding;

        for (i, (pos, glyph, color)) in self.grid.slots().enumerate() {
            self.screen_pos_data[i * 2..i * 2 + 2].copy_from_slice(&[
                pad + (pos.col as f32 + 0.5) * cw,
                pad + (pos.row as f32 + 0.5) * ch,
            ]);
            self.atlas_pos_data[i * 2..i * 2 + 2].copy_from_slice(&self.atlas.center(glyph));
            self.color_data[i * 3..i * 3 + 3].copy_from_slice(&color.to_array());
        }

        backend.write_buffer(self.screen_pos, &self.screen_pos_data);
        backend.write_buffer(self.atlas_pos, &self.atlas_pos_data);
        backend.write_buffer(self.colors, &self.color_data);
        self.grid.mark_fresh();
    }
}
