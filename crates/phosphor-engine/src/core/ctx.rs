use winit::window::{Window, WindowId};

use crate::coords::PixelDims;
use crate::device::{Gpu, SurfaceErrorAction};
use crate::render::{DrawError, WgpuBackend};
use crate::time::FrameTime;
use crate::window::RuntimeCtx;

use super::app::AppControl;

/// Per-window handle and metadata.
pub struct WindowCtx<'a> {
    pub id: WindowId,
    pub window: &'a Window,
}

impl WindowCtx<'_> {
    /// Drawable size in physical pixels.
    pub fn physical_dims(&self) -> PixelDims {
        let size = self.window.inner_size();
        PixelDims::new(size.width, size.height)
    }

    pub fn set_title(&self, title: &str) {
        self.window.set_title(title);
    }
}

/// Context passed to [`super::App::on_start`].
pub struct StartCtx<'a, 'w> {
    pub window: WindowCtx<'a>,
    pub gpu: &'a Gpu<'w>,
    pub backend: &'a mut WgpuBackend,
}

/// Per-frame context passed to [`super::App::on_frame`].
///
/// Lifetimes:
/// - `'a` is the duration of the callback invocation
/// - `'w` is the window-borrow lifetime carried by `Gpu<'w>`
pub struct FrameCtx<'a, 'w> {
    pub window: WindowCtx<'a>,
    pub gpu: &'a mut Gpu<'w>,
    pub backend: &'a mut WgpuBackend,
    pub time: FrameTime,
    pub runtime: &'a mut RuntimeCtx,
}

impl FrameCtx<'_, '_> {
    /// Acquires the surface, binds it as the backend's screen target, runs
    /// `draw` and presents.
    ///
    /// Surface acquisition errors go through [`Gpu::handle_surface_error`];
    /// only a fatal one, or an error returned by `draw`, stops the app.
    pub fn render<F>(&mut self, draw: F) -> AppControl
    where
        F: FnOnce(&mut WgpuBackend, PixelDims) -> Result<(), DrawError>,
    {
        let frame = match self.gpu.begin_frame() {
            Ok(frame) => frame,
            Err(err) => {
                return match self.gpu.handle_surface_error(err) {
                    SurfaceErrorAction::Fatal => AppControl::Exit,
                    _ => AppControl::Continue,
                };
            }
        };

        self.backend.begin_frame(frame.view.clone(), frame.dims);

        match draw(&mut *self.backend, frame.dims) {
            Ok(()) => {
                self.window.window.pre_present_notify();
                self.gpu.present(frame);
                AppControl::Continue
            }
            Err(DrawError::Surface(err)) => {
                self.backend.discard_frame();
                match self.gpu.handle_surface_error(err) {
                    SurfaceErrorAction::Fatal => AppControl::Exit,
                    _ => AppControl::Continue,
                }
            }
            Err(err) => {
                self.backend.discard_frame();
                log::error!("frame {} failed: {err}", self.time.frame_index);
                AppControl::Exit
            }
        }
    }
}
