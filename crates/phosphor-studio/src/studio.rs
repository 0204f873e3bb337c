use std::path::PathBuf;

use anyhow::{Context, Result};
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowId;

use phosphor_engine::coords::{PixelDims, Rgb};
use phosphor_engine::core::{App, AppControl, FrameCtx, StartCtx};
use phosphor_engine::render::{
    Backend, BufferId, CLIP_QUAD, DrawError, PassDescriptor, PassPipeline, PipelineConfig,
    ProgramDesc, ProgramId, SeedTexture, UniformKind, UniformValue, VertexAttrib,
};
use phosphor_engine::text::{FontSystem, SizeSpec, TextRenderer, TextRendererConfig};

const CRT_SHADER: &str = include_str!("shaders/crt.wgsl");
const WARP_SHADER: &str = include_str!("shaders/warp.wgsl");

const POEM: &str = "Once upon a midnight dreary, while I pondered, weak and weary\n \
Over many a quaint and curious volume of forgotten lore,\n \
While I nodded, nearly napping, suddenly there came a tapping,\n \
As of some one gently rapping, rapping at my chamber door.\n \
\"Tis some visitor,\" I muttered, \"tapping at my chamber door —\n \
Only this, and nothing more.\"\n\n\
Ah, distinctly I remember it was in the bleak December,\n \
And each separate dying ember wrought its ghost upon the floor.\n \
Eagerly I wished the morrow; — vainly I had sought to borrow\n \
From my books surcease of sorrow — sorrow for the lost Lenore —\n \
For the rare and radiant maiden whom the angels name Lenore —\n \
Nameless here for evermore.\n\n\
And the silken sad uncertain rustling of each purple curtain\n \
Thrilled me — filled me with fantastic terrors never felt before;\n \
So that now, to still the beating of my heart, I stood repeating,\n \
\"Tis some visitor entreating entrance at my chamber door —\n \
Some late visitor entreating entrance at my chamber door; —\n \
This it is, and nothing more.\"\n\n\
Presently my soul grew stronger; hesitating then no longer,\n \
\"Sir,\" said I, \"or Madam, truly your forgiveness I implore;\n \
But the fact is I was napping, and so gently you came rapping,\n \
And so faintly you came tapping, tapping at my chamber door,\n \
That I scarce was sure I heard you\"— here I opened wide the door; —\n \
Darkness there, and nothing more.\n\n\
Deep into that darkness peering, long I stood there wondering, fearing,\n \
Doubting, dreaming dreams no mortals ever dared to dream before;\n \
But the silence was unbroken, and the stillness gave no token,\n \
And the only word there spoken was the whispered word, \"Lenore?\"\n \
This I whispered, and an echo murmured back the word, \"Lenore!\" —\n \
Merely this, and nothing more.\n";

/// Host settings for the demo.
#[derive(Debug, Clone)]
pub struct StudioConfig {
    pub font_family: String,
    pub font_sources: Vec<PathBuf>,
    pub font_size: f32,
    /// Scale of the intermediate buffers relative to the window.
    pub tex_scale: f32,
    pub text_color: Rgb,
}

/// The text → CRT → warp chain, ready to render.
pub struct Studio {
    pipeline: PassPipeline,
    text: TextRenderer,
    crt: ProgramId,
    warp: ProgramId,
    quad: BufferId,
    tex_dims: PixelDims,
}

impl Studio {
    /// Loads the font, builds the text renderer and effect programs, prints
    /// the poem and compiles the whole pass chain.
    pub fn initialize<B: Backend + ?Sized>(
        backend: &mut B,
        fonts: &mut FontSystem,
        config: &StudioConfig,
        screen_dims: PixelDims,
    ) -> Result<Self> {
        let tex_dims = screen_dims.scaled(config.tex_scale);

        let mut text = TextRenderer::initialize(
            backend,
            fonts,
            TextRendererConfig {
                family: config.font_family.clone(),
                sources: config.font_sources.clone(),
                size: SizeSpec::FontSizeAndResolution {
                    font_size: config.font_size,
                    resolution: tex_dims,
                },
                ..TextRendererConfig::default()
            },
        )
        .context("failed to initialize text renderer")?;
        text.print(POEM, config.text_color);

        let crt = backend
            .create_program(&ProgramDesc {
                label: "phosphor crt",
                source: CRT_SHADER,
                uniforms: &[
                    ("uPrevRender", UniformKind::Texture),
                    ("uResolution", UniformKind::Vec2),
                    ("uTime", UniformKind::Float),
                ],
                attributes: &[("aQuadVertPos", 0)],
            })
            .context("failed to build CRT program")?;

        let warp = backend
            .create_program(&ProgramDesc {
                label: "phosphor warp",
                source: WARP_SHADER,
                uniforms: &[("uPrevRender", UniformKind::Texture)],
                attributes: &[("aQuadVertPos", 0)],
            })
            .context("failed to build warp program")?;

        let quad = backend.create_buffer("phosphor fullscreen quad", &CLIP_QUAD);

        let pipeline = PassPipeline::new(
            backend,
            PipelineConfig {
                seed: SeedTexture::gradient(tex_dims),
                screen_dims,
                draw_to_screen: true,
            },
        )
        .context("failed to allocate pass buffers")?;

        let mut studio = Self {
            pipeline,
            text,
            crt,
            warp,
            quad,
            tex_dims,
        };

        let passes = studio.passes(backend, 0.0);
        studio
            .pipeline
            .prepare(backend, &passes)
            .context("pass chain failed to compile")?;

        Ok(studio)
    }

    fn passes<B: Backend + ?Sized>(&mut self, backend: &mut B, time: f32) -> Vec<PassDescriptor> {
        let quad = VertexAttrib::per_vertex(self.quad, 2);
        vec![
            self.text.render_pass(backend),
            PassDescriptor::new(self.crt)
                .uniform("uResolution", UniformValue::Vec2(self.tex_dims.to_f32()))
                .uniform("uTime", UniformValue::Float(time))
                .attribute("aQuadVertPos", quad),
            PassDescriptor::new(self.warp).attribute("aQuadVertPos", quad),
        ]
    }

    /// Draws one frame at `time` seconds.
    pub fn render<B: Backend + ?Sized>(
        &mut self,
        backend: &mut B,
        screen_dims: PixelDims,
        time: f32,
    ) -> Result<(), DrawError> {
        self.pipeline.set_screen_dims(screen_dims);
        let passes = self.passes(backend, time);
        self.pipeline.run_passes(backend, &passes)
    }
}

/// Runtime adapter: owns the font registry and brings the [`Studio`] up
/// once the window's GPU context exists.
pub struct StudioApp {
    config: StudioConfig,
    fonts: FontSystem,
    studio: Option<Studio>,
}

impl StudioApp {
    pub fn new(config: StudioConfig) -> Self {
        Self {
            config,
            fonts: FontSystem::new(),
            studio: None,
        }
    }
}

impl App for StudioApp {
    fn on_start(&mut self, ctx: &mut StartCtx<'_, '_>) -> Result<()> {
        let screen_dims = ctx.gpu.dims();
        let studio = Studio::initialize(&mut *ctx.backend, &mut self.fonts, &self.config, screen_dims)?;
        log::info!(
            "studio ready: {}x{} buffers, screen {}x{}",
            studio.tex_dims.width,
            studio.tex_dims.height,
            screen_dims.width,
            screen_dims.height
        );
        self.studio = Some(studio);
        Ok(())
    }

    fn on_window_event(&mut self, _window_id: WindowId, event: &WindowEvent) -> AppControl {
        match event {
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape) =>
            {
                AppControl::Exit
            }
            _ => AppControl::Continue,
        }
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        let Some(studio) = self.studio.as_mut() else {
            return AppControl::Continue;
        };
        let time = ctx.time.elapsed;
        ctx.render(|backend, screen_dims| studio.render(backend, screen_dims, time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poem_has_five_stanzas_without_trailing_spaces() {
        assert_eq!(POEM.split("\n\n").count(), 5);
        assert!(POEM.lines().all(|l| !l.ends_with(' ')));
    }

    #[test]
    fn shaders_declare_entry_points() {
        for src in [CRT_SHADER, WARP_SHADER] {
            assert!(src.contains("fn vs_main"));
            assert!(src.contains("fn fs_main"));
            assert!(src.contains("@group(1) @binding(0) var prev_render"));
        }
        assert!(CRT_SHADER.contains("@group(0) @binding(0) var<uniform> params"));
    }
}
