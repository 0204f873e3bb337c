//! Backend contract consumed by the pass engine and the text renderer.
//!
//! GPU objects are owned by the backend and referenced through small `Copy`
//! handles. Components only ever hand each other texture handles for
//! sampling; nothing else is shared.

use crate::coords::PixelDims;

use super::error::{ConfigError, DrawError};
use super::pass::UniformValue;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u32);

        impl $name {
            #[inline]
            pub(crate) fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

handle!(
    /// Compiled shader program.
    ProgramId
);
handle!(
    /// Float vertex buffer.
    BufferId
);
handle!(
    /// Sampled 2D RGBA texture.
    TextureId
);
handle!(
    /// Render target wrapping a texture.
    FramebufferId
);
handle!(
    /// Program linked against one vertex layout.
    PipelineId
);

/// Kind of a declared uniform.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum UniformKind {
    Float,
    Vec2,
    Texture,
}

/// Program declaration: shader source plus the names it binds.
///
/// Scalar and vec2 uniforms are packed, in declaration order, into a single
/// uniform block; texture uniforms take consecutive sampler slots.
#[derive(Debug, Copy, Clone)]
pub struct ProgramDesc<'a> {
    pub label: &'a str,
    pub source: &'a str,
    pub uniforms: &'a [(&'a str, UniformKind)],
    /// Vertex inputs and their shader locations.
    pub attributes: &'a [(&'a str, u32)],
}

/// Resolved location of a uniform inside a program.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum UniformSlot {
    Float { offset: u32 },
    Vec2 { offset: u32 },
    Texture { slot: u32 },
}

/// Resolved layout of one vertex stream.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct VertexLayout {
    pub location: u32,
    pub item_size: u32,
    pub instanced: bool,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TextureFilter {
    Nearest,
    Linear,
}

/// Texture creation parameters. `pixels`, when present, is tightly packed
/// RGBA8 in row-major order and must cover `dims` exactly.
#[derive(Debug, Copy, Clone)]
pub struct TextureInit<'a> {
    pub label: &'a str,
    pub dims: PixelDims,
    pub pixels: Option<&'a [u8]>,
    pub filter: TextureFilter,
}

/// Where a draw lands.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DrawTarget {
    Screen,
    Framebuffer(FramebufferId),
}

/// One fully-resolved draw: a linked pipeline, values for resolved slots and
/// a destination.
#[derive(Debug, Clone, Copy)]
pub struct DrawCall<'a> {
    pub pipeline: PipelineId,
    pub uniforms: &'a [(UniformSlot, UniformValue)],
    /// Buffer bound to each shader location.
    pub attributes: &'a [(u32, BufferId)],
    pub target: DrawTarget,
    pub viewport: PixelDims,
    /// Clear the target to opaque black before drawing.
    pub clear: bool,
    pub instances: u32,
}

/// Number of vertices in the full-screen quad every pass draws.
pub const QUAD_VERTEX_COUNT: u32 = 6;

/// Clip-space full-screen quad, two triangles, `[x, y]` per vertex.
pub const CLIP_QUAD: [f32; 12] = [
    -1.0, -1.0, 1.0, -1.0, -1.0, 1.0, //
    -1.0, 1.0, 1.0, -1.0, 1.0, 1.0,
];

pub trait Backend {
    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramId, ConfigError>;

    /// Resolves a uniform name; `None` when the program does not declare it.
    fn uniform_slot(&self, program: ProgramId, name: &str) -> Option<UniformSlot>;

    /// Resolves an attribute name to its shader location.
    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<u32>;

    /// Links `program` against a vertex layout.
    fn compile_pass(
        &mut self,
        program: ProgramId,
        layout: &[VertexLayout],
    ) -> Result<PipelineId, ConfigError>;

    fn create_buffer(&mut self, label: &str, data: &[f32]) -> BufferId;

    /// Replaces the contents of `buffer`, growing it if needed. The handle
    /// stays valid.
    fn write_buffer(&mut self, buffer: BufferId, data: &[f32]);

    /// Largest width or height [`Backend::create_texture`] can allocate.
    fn max_texture_dimension(&self) -> u32;

    /// Rejects sizes the backend cannot allocate. Callers check before
    /// [`Backend::create_texture`] so the failure surfaces as a `ConfigError`.
    fn check_texture_dims(&self, label: &str, dims: PixelDims) -> Result<(), ConfigError> {
        let limit = self.max_texture_dimension();
        if dims.width > limit || dims.height > limit {
            return Err(ConfigError::TextureTooLarge { label: label.to_owned(), dims, limit });
        }
        Ok(())
    }

    fn create_texture(&mut self, init: &TextureInit<'_>) -> TextureId;

    fn create_framebuffer(&mut self, texture: TextureId) -> FramebufferId;

    /// Destroys a framebuffer and the texture it renders into.
    fn release_framebuffer(&mut self, framebuffer: FramebufferId, texture: TextureId);

    fn draw(&mut self, call: &DrawCall<'_>) -> Result<(), DrawError>;

    /// Submits everything recorded since the last call.
    fn finish_frame(&mut self) -> Result<(), DrawError>;
}
