//! Phosphor engine crate.
//!
//! Multi-pass CRT-style rendering over a pair of ping-pong framebuffers, a
//! font-atlas text-grid renderer that runs as one of those passes, and the
//! winit/wgpu runtime that hosts them.

pub mod core;
pub mod device;
pub mod time;
pub mod window;

pub mod coords;
pub mod logging;
pub mod render;
pub mod text;
