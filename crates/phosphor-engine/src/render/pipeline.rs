//! Pass composition engine.
//!
//! Two off-screen framebuffers alternate between the "input" and "output"
//! roles. A series pass swaps them, reads the former output and replaces the
//! new output; a parallel pass blends onto the current output in place. Only
//! the last series pass of a sequence may land on the screen.

use crate::coords::PixelDims;

use super::backend::{
    Backend, DrawCall, DrawTarget, FramebufferId, TextureFilter, TextureId, TextureInit,
};
use super::compiled::PassCache;
use super::error::{ConfigError, DrawError};
use super::pass::{Composition, PREV_RENDER_UNIFORM, PassDescriptor, UniformValue};

/// Seed pixel generator: `(x, y, dims) -> RGBA8`.
pub type SeedFill = fn(u32, u32, PixelDims) -> [u8; 4];

/// Initial content of the pipeline's output buffer.
#[derive(Debug, Copy, Clone)]
pub struct SeedTexture {
    pub dims: PixelDims,
    /// `None` leaves the seed blank.
    pub fill: Option<SeedFill>,
}

impl SeedTexture {
    pub fn blank(dims: PixelDims) -> Self {
        Self { dims, fill: None }
    }

    /// Diagnostic gradient: red grows left to right, green top to bottom,
    /// blue fades out left to right.
    pub fn gradient(dims: PixelDims) -> Self {
        Self { dims, fill: Some(gradient_pixel) }
    }

    fn pixels(&self) -> Option<Vec<u8>> {
        let fill = self.fill?;
        let mut out = Vec::with_capacity(self.dims.area() * 4);
        for y in 0..self.dims.height {
            for x in 0..self.dims.width {
                out.extend_from_slice(&fill(x, y, self.dims));
            }
        }
        Some(out)
    }
}

fn gradient_pixel(x: u32, y: u32, dims: PixelDims) -> [u8; 4] {
    let xf = x as f32 / dims.width as f32;
    let yf = y as f32 / dims.height as f32;
    [
        (xf * 255.0).floor() as u8,
        (yf * 255.0).floor() as u8,
        (255.0 * (1.0 - xf)).floor() as u8,
        255,
    ]
}

#[derive(Debug, Copy, Clone)]
pub struct PipelineConfig {
    pub seed: SeedTexture,
    /// Viewport used by the pass that draws to the screen.
    pub screen_dims: PixelDims,
    /// When false the final pass stays off-screen too.
    pub draw_to_screen: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let dims = PixelDims::new(640, 480);
        Self { seed: SeedTexture::gradient(dims), screen_dims: dims, draw_to_screen: true }
    }
}

const PASS_BUFFER_LABEL: &str = "phosphor pass buffer";

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct FrameBuffer {
    texture: TextureId,
    dims: PixelDims,
    framebuffer: FramebufferId,
}

impl FrameBuffer {
    fn create<B: Backend + ?Sized>(
        backend: &mut B,
        dims: PixelDims,
        pixels: Option<&[u8]>,
    ) -> Result<Self, ConfigError> {
        backend.check_texture_dims(PASS_BUFFER_LABEL, dims)?;
        let texture = backend.create_texture(&TextureInit {
            label: PASS_BUFFER_LABEL,
            dims,
            pixels,
            filter: TextureFilter::Linear,
        });
        let framebuffer = backend.create_framebuffer(texture);
        Ok(Self { texture, dims, framebuffer })
    }
}

#[derive(Debug)]
pub struct PassPipeline {
    input: FrameBuffer,
    output: FrameBuffer,
    cache: PassCache,
    screen_dims: PixelDims,
    draw_to_screen: bool,
}

impl PassPipeline {
    /// Creates the buffer pair with the seed as the current output. A leading
    /// series pass swaps it into the input role and reads it; a leading
    /// parallel pass blends onto it directly.
    ///
    /// Fails when the seed dims exceed the backend's texture limit.
    pub fn new<B: Backend + ?Sized>(
        backend: &mut B,
        config: PipelineConfig,
    ) -> Result<Self, ConfigError> {
        let dims = config.seed.dims;
        let seed = config.seed.pixels();
        let output = FrameBuffer::create(backend, dims, seed.as_deref())?;
        let input = FrameBuffer::create(backend, dims, None)?;

        Ok(Self {
            input,
            output,
            cache: PassCache::new(),
            screen_dims: config.screen_dims,
            draw_to_screen: config.draw_to_screen,
        })
    }

    /// Rejects sequences that could never present their result: an empty
    /// sequence, or one whose last pass is parallel and follows a series pass.
    pub fn validate(passes: &[PassDescriptor]) -> Result<(), ConfigError> {
        let last = passes.len().checked_sub(1).ok_or(ConfigError::EmptySequence)?;
        let has_series = passes.iter().any(|p| p.composition.is_series());
        if has_series && !passes[last].composition.is_series() {
            return Err(ConfigError::TrailingParallel { index: last });
        }
        Ok(())
    }

    /// Validates `passes`, checks requested output sizes and compiles every
    /// pass up front so setup errors surface before the first frame.
    pub fn prepare<B: Backend + ?Sized>(
        &mut self,
        backend: &mut B,
        passes: &[PassDescriptor],
    ) -> Result<(), ConfigError> {
        Self::validate(passes)?;
        for desc in passes {
            if let Composition::Series { output_dims: Some(dims) } = desc.composition {
                backend.check_texture_dims(PASS_BUFFER_LABEL, dims)?;
            }
            self.cache.get_or_compile(backend, desc)?;
        }
        Ok(())
    }

    pub fn set_screen_dims(&mut self, dims: PixelDims) {
        self.screen_dims = dims;
    }

    #[inline]
    pub fn screen_dims(&self) -> PixelDims {
        self.screen_dims
    }

    /// Texture holding the most recent output.
    #[inline]
    pub fn output_texture(&self) -> TextureId {
        self.output.texture
    }

    #[inline]
    pub fn input_texture(&self) -> TextureId {
        self.input.texture
    }

    #[inline]
    pub fn output_dims(&self) -> PixelDims {
        self.output.dims
    }

    fn swap(&mut self) {
        std::mem::swap(&mut self.input, &mut self.output);
    }

    /// Replaces the output buffer with a blank one of `dims`. The input
    /// buffer is untouched.
    fn resize_output<B: Backend + ?Sized>(
        &mut self,
        backend: &mut B,
        dims: PixelDims,
    ) -> Result<(), ConfigError> {
        let replacement = FrameBuffer::create(backend, dims, None)?;
        log::debug!(
            "replacing output buffer {}x{} -> {}x{}",
            self.output.dims.width,
            self.output.dims.height,
            dims.width,
            dims.height
        );
        let old = std::mem::replace(&mut self.output, replacement);
        backend.release_framebuffer(old.framebuffer, old.texture);
        Ok(())
    }

    /// Runs one frame's pass sequence and finishes the frame on the backend.
    pub fn run_passes<B: Backend + ?Sized>(
        &mut self,
        backend: &mut B,
        passes: &[PassDescriptor],
    ) -> Result<(), DrawError> {
        let final_index = passes
            .iter()
            .rposition(|p| p.composition.is_series())
            .unwrap_or(0);

        for (i, desc) in passes.iter().enumerate() {
            if let Composition::Series { output_dims } = desc.composition {
                self.swap();
                if let Some(dims) = output_dims
                    && dims != self.output.dims
                {
                    self.resize_output(backend, dims)?;
                }
            }

            let prev = desc
                .composition
                .binds_input()
                .then_some((PREV_RENDER_UNIFORM, UniformValue::texture(self.input.texture)));

            let to_screen = i == final_index && self.draw_to_screen;
            let (target, viewport) = if to_screen {
                (DrawTarget::Screen, self.screen_dims)
            } else {
                (DrawTarget::Framebuffer(self.output.framebuffer), self.output.dims)
            };

            let pass = self.cache.get_or_compile(backend, desc)?;
            let uniforms = pass.bind_uniforms(&*backend, desc.uniforms.iter().copied().chain(prev));
            let attributes = pass.bind_attributes(desc);
            let pipeline = pass.pipeline;

            backend.draw(&DrawCall {
                pipeline,
                uniforms: &uniforms,
                attributes: &attributes,
                target,
                viewport,
                clear: desc.composition.is_series() || to_screen,
                instances: desc.instances,
            })?;
        }

        backend.finish_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backend::{ProgramDesc, ProgramId, UniformKind};
    use crate::render::mock::RecordingBackend;

    fn effect(backend: &mut RecordingBackend, label: &'static str) -> ProgramId {
        backend
            .create_program(&ProgramDesc {
                label,
                source: "",
                uniforms: &[("uTime", UniformKind::Float), (PREV_RENDER_UNIFORM, UniformKind::Texture)],
                attributes: &[("aQuadVertPos", 0)],
            })
            .unwrap()
    }

    fn offscreen(dims: PixelDims) -> PipelineConfig {
        PipelineConfig { seed: SeedTexture::gradient(dims), screen_dims: dims, draw_to_screen: false }
    }

    fn fb_of(target: DrawTarget) -> FramebufferId {
        match target {
            DrawTarget::Framebuffer(fb) => fb,
            DrawTarget::Screen => panic!("expected an off-screen target"),
        }
    }

    #[test]
    fn seed_is_gradient_on_output() {
        let mut backend = RecordingBackend::default();
        let dims = PixelDims::new(4, 2);
        let pipeline = PassPipeline::new(&mut backend, offscreen(dims)).unwrap();

        let seed = backend.texture(pipeline.output_texture()).unwrap();
        let pixels = seed.pixels.as_ref().unwrap();
        assert_eq!(pixels.len(), 4 * 2 * 4);
        assert_eq!(&pixels[0..4], &[0, 0, 255, 255]);
        // x = 2, y = 1
        let i = (4 + 2) * 4;
        assert_eq!(&pixels[i..i + 4], &[127, 127, 127, 255]);
        assert!(backend.texture(pipeline.input_texture()).unwrap().pixels.is_none());
    }

    #[test]
    fn leading_parallel_pass_blends_onto_seed() {
        let mut backend = RecordingBackend::default();
        let a = effect(&mut backend, "a");
        let mut pipeline = PassPipeline::new(&mut backend, offscreen(PixelDims::new(2, 2))).unwrap();
        let seed = pipeline.output_texture();

        let passes = [PassDescriptor::new(a).composition(Composition::Parallel { ignore_input: true })];
        pipeline.run_passes(&mut backend, &passes).unwrap();

        let draw = &backend.draws[0];
        assert_eq!(backend.framebuffer_texture(fb_of(draw.target)), Some(seed));
        assert!(!draw.clear);
        assert_eq!(pipeline.output_texture(), seed);
    }

    #[test]
    fn series_then_parallel() {
        let mut backend = RecordingBackend::default();
        let a = effect(&mut backend, "a");
        let b = effect(&mut backend, "b");
        let dims = PixelDims::new(8, 8);
        let mut pipeline = PassPipeline::new(&mut backend, offscreen(dims)).unwrap();
        let seed = pipeline.output_texture();
        let blank = pipeline.input_texture();

        let passes = [
            PassDescriptor::new(a),
            PassDescriptor::new(b).composition(Composition::Parallel { ignore_input: false }),
        ];
        pipeline.run_passes(&mut backend, &passes).unwrap();

        let [first, second] = &backend.draws[..] else {
            panic!("expected two draws");
        };

        // Swapped before pass 1: the seed became the input.
        assert_eq!(first.texture_at(0), Some(seed));
        assert_eq!(backend.framebuffer_texture(fb_of(first.target)), Some(blank));
        assert!(first.clear);

        // No swap before pass 2: it blends onto pass 1's output and shares
        // pass 1's input.
        assert_eq!(second.target, first.target);
        assert_eq!(second.texture_at(0), Some(seed));
        assert!(!second.clear);
        assert_eq!(pipeline.output_texture(), blank);
        assert_eq!(backend.frames, 1);
    }

    #[test]
    fn ignore_input_skips_prev_render() {
        let mut backend = RecordingBackend::default();
        let a = effect(&mut backend, "a");
        let mut pipeline =
            PassPipeline::new(&mut backend, offscreen(PixelDims::new(4, 4))).unwrap();

        let passes = [
            PassDescriptor::new(a),
            PassDescriptor::new(a).composition(Composition::Parallel { ignore_input: true }),
        ];
        pipeline.run_passes(&mut backend, &passes).unwrap();
        assert!(backend.draws[0].texture_at(0).is_some());
        assert_eq!(backend.draws[1].texture_at(0), None);
    }

    #[test]
    fn only_last_series_pass_reaches_screen() {
        let mut backend = RecordingBackend::default();
        let a = effect(&mut backend, "a");
        let dims = PixelDims::new(4, 4);
        let screen = PixelDims::new(100, 50);
        let config = PipelineConfig { screen_dims: screen, draw_to_screen: true, ..offscreen(dims) };
        let mut pipeline = PassPipeline::new(&mut backend, config).unwrap();

        let passes = [PassDescriptor::new(a), PassDescriptor::new(a), PassDescriptor::new(a)];
        pipeline.run_passes(&mut backend, &passes).unwrap();

        let targets: Vec<_> = backend.draws.iter().map(|d| d.target).collect();
        assert!(matches!(targets[0], DrawTarget::Framebuffer(_)));
        assert!(matches!(targets[1], DrawTarget::Framebuffer(_)));
        assert_eq!(targets[2], DrawTarget::Screen);
        assert_eq!(backend.draws[2].viewport, screen);
        assert_eq!(backend.draws[0].viewport, dims);
    }

    #[test]
    fn chained_series_passes_read_previous_output() {
        let mut backend = RecordingBackend::default();
        let a = effect(&mut backend, "a");
        let mut pipeline =
            PassPipeline::new(&mut backend, offscreen(PixelDims::new(4, 4))).unwrap();

        let passes = [PassDescriptor::new(a), PassDescriptor::new(a)];
        pipeline.run_passes(&mut backend, &passes).unwrap();

        let written = backend.framebuffer_texture(fb_of(backend.draws[0].target));
        assert_eq!(backend.draws[1].texture_at(0), written);
    }

    #[test]
    fn state_persists_across_runs() {
        let mut backend = RecordingBackend::default();
        let a = effect(&mut backend, "a");
        let mut pipeline =
            PassPipeline::new(&mut backend, offscreen(PixelDims::new(4, 4))).unwrap();
        let before = pipeline.output_texture();

        pipeline.run_passes(&mut backend, &[PassDescriptor::new(a)]).unwrap();
        assert_ne!(pipeline.output_texture(), before);
        pipeline.run_passes(&mut backend, &[PassDescriptor::new(a)]).unwrap();
        assert_eq!(pipeline.output_texture(), before);
        assert_eq!(backend.frames, 2);
    }

    #[test]
    fn output_dims_replace_output_only() {
        let mut backend = RecordingBackend::default();
        let a = effect(&mut backend, "a");
        let mut pipeline =
            PassPipeline::new(&mut backend, offscreen(PixelDims::new(8, 8))).unwrap();

        let small = PixelDims::new(2, 3);
        let passes = [PassDescriptor::new(a)
            .composition(Composition::Series { output_dims: Some(small) })];
        pipeline.run_passes(&mut backend, &passes).unwrap();

        assert_eq!(pipeline.output_dims(), small);
        assert_eq!(backend.draws[0].viewport, small);
        assert_eq!(backend.texture(pipeline.input_texture()).unwrap().dims, PixelDims::new(8, 8));
        assert_eq!(backend.live_framebuffers(), 2);

        // Same dims again: nothing is recreated.
        let created = backend.framebuffers.len();
        pipeline.run_passes(&mut backend, &passes).unwrap();
        pipeline.run_passes(&mut backend, &passes).unwrap();
        assert_eq!(backend.framebuffers.len(), created + 1);
    }

    #[test]
    fn undeclared_uniforms_are_skipped() {
        let mut backend = RecordingBackend::default();
        let a = effect(&mut backend, "a");
        let mut pipeline =
            PassPipeline::new(&mut backend, offscreen(PixelDims::new(4, 4))).unwrap();

        let passes = [PassDescriptor::new(a)
            .uniform("uTime", UniformValue::Float(1.5))
            .uniform("uNotThere", UniformValue::Vec2([1.0, 2.0]))
            .instances(3)];
        pipeline.run_passes(&mut backend, &passes).unwrap();

        let draw = &backend.draws[0];
        assert_eq!(draw.uniforms.len(), 2);
        assert_eq!(draw.instances, 3);
    }

    #[test]
    fn validate_rejects_trailing_parallel() {
        let mut backend = RecordingBackend::default();
        let a = effect(&mut backend, "a");
        let parallel = Composition::Parallel { ignore_input: false };

        assert_eq!(PassPipeline::validate(&[]), Err(ConfigError::EmptySequence));
        assert_eq!(
            PassPipeline::validate(&[
                PassDescriptor::new(a),
                PassDescriptor::new(a).composition(parallel),
            ]),
            Err(ConfigError::TrailingParallel { index: 1 })
        );
        assert!(PassPipeline::validate(&[
            PassDescriptor::new(a).composition(parallel),
            PassDescriptor::new(a),
        ])
        .is_ok());
        assert!(PassPipeline::validate(&[PassDescriptor::new(a).composition(parallel)]).is_ok());
    }

    #[test]
    fn prepare_surfaces_config_errors() {
        let mut backend = RecordingBackend::default();
        let a = effect(&mut backend, "a");
        let quad = backend.create_buffer("quad", &[0.0; 12]);
        let mut pipeline =
            PassPipeline::new(&mut backend, offscreen(PixelDims::new(4, 4))).unwrap();

        let bad = [PassDescriptor::new(a).attribute(
            "aQuadVertPos",
            crate::render::pass::VertexAttrib::per_vertex(quad, 7),
        )];
        assert!(matches!(
            pipeline.prepare(&mut backend, &bad),
            Err(ConfigError::AttributeSize { .. })
        ));
        assert!(backend.draws.is_empty());
    }

    #[test]
    fn failed_effect_link_is_fatal_at_prepare() {
        let mut backend = RecordingBackend::default();
        let text = effect(&mut backend, "text");
        let crt = effect(&mut backend, "crt");
        let mut pipeline =
            PassPipeline::new(&mut backend, offscreen(PixelDims::new(4, 4))).unwrap();
        backend.fail_label = Some("crt");

        let passes = [PassDescriptor::new(text), PassDescriptor::new(crt)];
        let err = pipeline.prepare(&mut backend, &passes).unwrap_err();
        assert!(matches!(err, ConfigError::Shader { ref label, .. } if label == "crt"));

        let err = pipeline.run_passes(&mut backend, &passes).unwrap_err();
        assert!(matches!(err, DrawError::Config(ConfigError::Shader { .. })));
        assert_eq!(backend.frames, 0);
    }

    #[test]
    fn seed_above_texture_limit_is_rejected() {
        let mut backend = RecordingBackend { texture_limit: Some(64), ..Default::default() };
        let err = PassPipeline::new(&mut backend, offscreen(PixelDims::new(128, 32))).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::TextureTooLarge { dims, limit: 64, .. } if dims == PixelDims::new(128, 32)
        ));
        assert!(backend.textures.is_empty());
    }

    #[test]
    fn oversized_output_dims_fail_without_touching_buffers() {
        let mut backend = RecordingBackend { texture_limit: Some(64), ..Default::default() };
        let a = effect(&mut backend, "a");
        let mut pipeline =
            PassPipeline::new(&mut backend, offscreen(PixelDims::new(8, 8))).unwrap();

        let passes = [PassDescriptor::new(a)
            .composition(Composition::Series { output_dims: Some(PixelDims::new(65, 8)) })];
        assert!(matches!(
            pipeline.prepare(&mut backend, &passes),
            Err(ConfigError::TextureTooLarge { limit: 64, .. })
        ));

        let err = pipeline.run_passes(&mut backend, &passes).unwrap_err();
        assert!(matches!(err, DrawError::Config(ConfigError::TextureTooLarge { .. })));
        assert_eq!(pipeline.output_dims(), PixelDims::new(8, 8));
        assert_eq!(backend.live_framebuffers(), 2);
        assert!(backend.draws.is_empty());
    }
}
