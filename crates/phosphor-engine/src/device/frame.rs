use crate::coords::PixelDims;

/// A surface texture acquired for one display refresh.
///
/// Holding it blocks acquisition of the next one, so hand it back through
/// [`super::Gpu::present`] once the backend has submitted its work.
pub struct GpuFrame {
    pub surface_texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
    pub dims: PixelDims,
}
