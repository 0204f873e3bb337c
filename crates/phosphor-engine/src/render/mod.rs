//! Multi-pass rendering: backend contract, pass descriptors and the
//! ping-pong composition engine.

pub mod backend;
pub mod compiled;
pub mod error;
pub mod pass;
pub mod pipeline;
pub mod program;
pub mod wgpu_backend;

#[cfg(test)]
pub(crate) mod mock;

pub use backend::{
    Backend, BufferId, CLIP_QUAD, DrawCall, DrawTarget, FramebufferId, PipelineId, ProgramDesc,
    ProgramId, TextureFilter, TextureId, TextureInit, UniformKind, UniformSlot, VertexLayout,
};
pub use compiled::{CompiledPass, PassCache};
pub use error::{ConfigError, DrawError};
pub use pass::{Composition, PREV_RENDER_UNIFORM, PassDescriptor, UniformValue, VertexAttrib};
pub use pipeline::{PassPipeline, PipelineConfig, SeedFill, SeedTexture};
pub use wgpu_backend::WgpuBackend;
