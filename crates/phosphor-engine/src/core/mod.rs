//! Contracts between the runtime loop and the application.
//!
//! The runtime owns the window, the GPU context and the render backend; the
//! application sees them only through [`StartCtx`] and [`FrameCtx`].

mod app;
mod ctx;

pub use app::{App, AppControl};
pub use ctx::{FrameCtx, StartCtx, WindowCtx};
