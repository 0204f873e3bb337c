//! Per-frame pass descriptors.
//!
//! A descriptor carries only current values (program handle, uniform values,
//! vertex streams). Resolved binding slots live in [`super::CompiledPass`].

use crate::coords::PixelDims;

use super::backend::{BufferId, ProgramId, TextureId};

/// Reserved uniform name under which the previous pass's output is bound.
pub const PREV_RENDER_UNIFORM: &str = "uPrevRender";

/// Typed uniform value.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    /// Sampled texture. The binding it lands in is the uniform's position
    /// among the program's texture declarations in `ProgramDesc`; `unit` is
    /// carried for callers and never selects the binding.
    Texture { texture: TextureId, unit: u32 },
}

impl UniformValue {
    #[inline]
    pub fn texture(texture: TextureId) -> Self {
        Self::Texture { texture, unit: 0 }
    }
}

/// One vertex stream: a float buffer read `item_size` floats at a time.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VertexAttrib {
    pub buffer: BufferId,
    pub item_size: u32,
    /// Advance once per instance instead of once per vertex.
    pub instanced: bool,
}

impl VertexAttrib {
    #[inline]
    pub const fn per_vertex(buffer: BufferId, item_size: u32) -> Self {
        Self { buffer, item_size, instanced: false }
    }

    #[inline]
    pub const fn per_instance(buffer: BufferId, item_size: u32) -> Self {
        Self { buffer, item_size, instanced: true }
    }
}

/// How a pass composes with the output of the passes before it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Composition {
    /// Swap buffers; the previous output becomes this pass's input and the
    /// output is cleared before drawing. `output_dims` defaults to the
    /// current output buffer's size.
    Series { output_dims: Option<PixelDims> },
    /// Blend onto the current output without swapping or clearing, sharing
    /// the input of the pass before.
    Parallel { ignore_input: bool },
}

impl Composition {
    pub const SERIES: Self = Self::Series { output_dims: None };

    #[inline]
    pub fn is_series(self) -> bool {
        matches!(self, Self::Series { .. })
    }

    /// Whether the previous output is bound under [`PREV_RENDER_UNIFORM`].
    #[inline]
    pub fn binds_input(self) -> bool {
        match self {
            Self::Series { .. } => true,
            Self::Parallel { ignore_input } => !ignore_input,
        }
    }
}

impl Default for Composition {
    fn default() -> Self {
        Self::SERIES
    }
}

/// Everything needed to draw one pass of a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PassDescriptor {
    pub program: ProgramId,
    pub uniforms: Vec<(&'static str, UniformValue)>,
    pub attributes: Vec<(&'static str, VertexAttrib)>,
    pub instances: u32,
    pub composition: Composition,
}

impl PassDescriptor {
    /// A single-instance series pass with no inputs.
    pub fn new(program: ProgramId) -> Self {
        Self {
            program,
            uniforms: Vec::new(),
            attributes: Vec::new(),
            instances: 1,
            composition: Composition::SERIES,
        }
    }

    pub fn uniform(mut self, name: &'static str, value: UniformValue) -> Self {
        self.uniforms.push((name, value));
        self
    }

    pub fn attribute(mut self, name: &'static str, attrib: VertexAttrib) -> Self {
        self.attributes.push((name, attrib));
        self
    }

    pub fn instances(mut self, instances: u32) -> Self {
        self.instances = instances;
        self
    }

    pub fn composition(mut self, composition: Composition) -> Self {
        self.composition = composition;
        self
    }
}
