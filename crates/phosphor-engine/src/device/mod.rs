//! GPU device layer.
//!
//! Owns the wgpu instance, adapter, device, queue and the window surface.
//! Rendering itself goes through [`crate::render::WgpuBackend`], which is
//! created from a ready [`Gpu`].

mod context;
mod error;
mod frame;
mod init;
mod surface;

pub use context::Gpu;
pub use error::SurfaceErrorAction;
pub use frame::GpuFrame;
pub use init::GpuInit;
