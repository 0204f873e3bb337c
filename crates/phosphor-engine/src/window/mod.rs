//! Window and runtime loop.
//!
//! Owns the `winit` event loop and window and wires them to the GPU layer
//! and the render backend.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig, RuntimeCtx};
