//! `Backend` implementation on wgpu.
//!
//! Every attribute gets its own vertex buffer slot. Shaders use the entry
//! points `vs_main` / `fs_main` and the binding scheme described in
//! [`super::program`]. Off-screen buffers are `Rgba8Unorm`; pipelines are
//! built twice, once for that format and once for the surface format.
//!
//! Uniform buffers are pooled per program and rewritten with
//! `Queue::write_buffer`; each draw in a frame takes its own buffer from the
//! pool since all writes land before the frame's single submit. Texture bind
//! groups are cached by program and bound texture ids.

use std::collections::HashMap;

use crate::coords::PixelDims;

use super::backend::{
    Backend, BufferId, DrawCall, DrawTarget, FramebufferId, PipelineId, ProgramDesc, ProgramId,
    QUAD_VERTEX_COUNT, TextureFilter, TextureId, TextureInit, UniformSlot, VertexLayout,
};
use super::error::{ConfigError, DrawError};
use super::pass::UniformValue;
use super::program::ProgramLayout;

const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

// ── resources ─────────────────────────────────────────────────────────────

struct Program {
    layout: ProgramLayout,
    module: wgpu::ShaderModule,
    /// Empty for programs without scalar uniforms.
    uniform_bgl: wgpu::BindGroupLayout,
    texture_bgl: Option<wgpu::BindGroupLayout>,
    pipeline_layout: wgpu::PipelineLayout,
    uniforms: UniformGroups,
}

enum UniformGroups {
    /// Texture-only program: one shared bind group with no entries.
    Empty(wgpu::BindGroup),
    Blocks(FramePool<UniformBlock>),
}

struct UniformBlock {
    buffer: wgpu::Buffer,
    group: wgpu::BindGroup,
}

/// Grow-only pool handing out one item per request until `reset`.
struct FramePool<T> {
    items: Vec<T>,
    used: usize,
}

impl<T> FramePool<T> {
    fn new() -> Self {
        Self { items: Vec::new(), used: 0 }
    }

    fn acquire(&mut self, make: impl FnOnce() -> T) -> &T {
        if self.used == self.items.len() {
            self.items.push(make());
        }
        self.used += 1;
        &self.items[self.used - 1]
    }

    fn reset(&mut self) {
        self.used = 0;
    }
}

struct LinkedPass {
    program: ProgramId,
    offscreen: wgpu::RenderPipeline,
    screen: wgpu::RenderPipeline,
    /// Shader locations in vertex-buffer slot order.
    locations: Vec<u32>,
}

struct Buffer {
    buffer: wgpu::Buffer,
    label: String,
}

struct Texture {
    // Kept alive for the view.
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    dims: PixelDims,
}

struct ScreenTarget {
    view: wgpu::TextureView,
    dims: PixelDims,
}

// ── backend ───────────────────────────────────────────────────────────────

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    screen_format: wgpu::TextureFormat,

    programs: Vec<Program>,
    pipelines: Vec<LinkedPass>,
    buffers: Vec<Buffer>,
    textures: Vec<Option<Texture>>,
    framebuffers: Vec<Option<TextureId>>,

    texture_groups: HashMap<(ProgramId, Vec<TextureId>), wgpu::BindGroup>,

    screen: Option<ScreenTarget>,
    encoder: Option<wgpu::CommandEncoder>,
}

impl WgpuBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, screen_format: wgpu::TextureFormat) -> Self {
        Self {
            device,
            queue,
            screen_format,
            programs: Vec::new(),
            pipelines: Vec::new(),
            buffers: Vec::new(),
            textures: Vec::new(),
            framebuffers: Vec::new(),
            texture_groups: HashMap::new(),
            screen: None,
            encoder: None,
        }
    }

    #[inline]
    pub fn screen_format(&self) -> wgpu::TextureFormat {
        self.screen_format
    }

    /// Binds the surface view that `DrawTarget::Screen` renders into until
    /// the next `finish_frame`.
    pub fn begin_frame(&mut self, view: wgpu::TextureView, dims: PixelDims) {
        self.screen = Some(ScreenTarget { view, dims });
    }

    /// Drops recorded but unsubmitted work and unbinds the screen.
    pub fn discard_frame(&mut self) {
        if self.encoder.take().is_some() {
            log::debug!("discarded unsubmitted frame commands");
        }
        self.end_frame();
    }

    fn end_frame(&mut self) {
        for program in &mut self.programs {
            if let UniformGroups::Blocks(pool) = &mut program.uniforms {
                pool.reset();
            }
        }
        self.screen = None;
    }

    fn scoped<T>(&self, label: &str, f: impl FnOnce(&wgpu::Device) -> T) -> Result<T, ConfigError> {
        let scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&self.device);
        match pollster::block_on(scope.pop()) {
            None => Ok(value),
            Some(err) => Err(ConfigError::Shader { label: label.to_owned(), message: err.to_string() }),
        }
    }

    fn build_pipeline(
        device: &wgpu::Device,
        program: &Program,
        buffers: &[wgpu::VertexBufferLayout<'_>],
        format: wgpu::TextureFormat,
    ) -> wgpu::RenderPipeline {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&program.layout.label),
            layout: Some(&program.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &program.module,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers,
            },
            fragment: Some(wgpu::FragmentState {
                module: &program.module,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        })
    }

    fn allocate_buffer(&self, label: &str, bytes: u64) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: bytes.max(16),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }
}

fn lookup_texture(textures: &[Option<Texture>], id: TextureId) -> Result<&Texture, DrawError> {
    textures
        .get(id.index())
        .and_then(Option::as_ref)
        .ok_or(DrawError::UnknownHandle("texture"))
}

fn build_texture_group(
    device: &wgpu::Device,
    textures: &[Option<Texture>],
    layout: &wgpu::BindGroupLayout,
    ids: &[TextureId],
) -> Result<wgpu::BindGroup, DrawError> {
    let bound = ids
        .iter()
        .map(|&id| lookup_texture(textures, id))
        .collect::<Result<Vec<_>, _>>()?;
    let entries: Vec<_> = bound
        .iter()
        .enumerate()
        .flat_map(|(k, t)| {
            [
                wgpu::BindGroupEntry {
                    binding: 2 * k as u32,
                    resource: wgpu::BindingResource::TextureView(&t.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2 * k as u32 + 1,
                    resource: wgpu::BindingResource::Sampler(&t.sampler),
                },
            ]
        })
        .collect();
    Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("phosphor texture bind group"),
        layout,
        entries: &entries,
    }))
}

fn vertex_format(item_size: u32) -> wgpu::VertexFormat {
    match item_size {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        _ => wgpu::VertexFormat::Float32x4,
    }
}

impl Backend for WgpuBackend {
    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramId, ConfigError> {
        let layout = ProgramLayout::new(desc)?;

        let module = self.scoped(desc.label, |device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(desc.label),
                source: wgpu::ShaderSource::Wgsl(desc.source.into()),
            })
        })?;

        let block_entry = wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let has_scalars = layout.has_scalars();
        let uniform_bgl = self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("phosphor uniform bgl"),
            entries: if has_scalars { std::slice::from_ref(&block_entry) } else { &[] },
        });
        let uniforms = if has_scalars {
            UniformGroups::Blocks(FramePool::new())
        } else {
            UniformGroups::Empty(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("phosphor empty uniform group"),
                layout: &uniform_bgl,
                entries: &[],
            }))
        };

        let texture_bgl = (layout.texture_count() > 0).then(|| {
            let entries: Vec<_> = (0..layout.texture_count())
                .flat_map(|k| {
                    [
                        wgpu::BindGroupLayoutEntry {
                            binding: 2 * k,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Texture {
                                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                                view_dimension: wgpu::TextureViewDimension::D2,
                                multisampled: false,
                            },
                            count: None,
                        },
                        wgpu::BindGroupLayoutEntry {
                            binding: 2 * k + 1,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                            count: None,
                        },
                    ]
                })
                .collect();
            self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("phosphor texture bgl"),
                entries: &entries,
            })
        });

        let mut groups = vec![&uniform_bgl];
        groups.extend(texture_bgl.as_ref());
        let pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(desc.label),
            bind_group_layouts: &groups,
            immediate_size: 0,
        });

        log::debug!(
            "program '{}': {} uniform bytes, {} textures",
            desc.label,
            layout.block_size(),
            layout.texture_count()
        );

        self.programs.push(Program {
            layout,
            module,
            uniform_bgl,
            texture_bgl,
            pipeline_layout,
            uniforms,
        });
        Ok(ProgramId(self.programs.len() as u32 - 1))
    }

    fn uniform_slot(&self, program: ProgramId, name: &str) -> Option<UniformSlot> {
        self.programs.get(program.index())?.layout.uniform_slot(name)
    }

    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<u32> {
        self.programs.get(program.index())?.layout.attribute_location(name)
    }

    fn compile_pass(
        &mut self,
        program: ProgramId,
        layout: &[VertexLayout],
    ) -> Result<PipelineId, ConfigError> {
        let prog = self
            .programs
            .get(program.index())
            .ok_or(ConfigError::UnknownHandle("program"))?;

        let attributes: Vec<[wgpu::VertexAttribute; 1]> = layout
            .iter()
            .map(|l| {
                [wgpu::VertexAttribute {
                    format: vertex_format(l.item_size),
                    offset: 0,
                    shader_location: l.location,
                }]
            })
            .collect();
        let buffers: Vec<wgpu::VertexBufferLayout<'_>> = layout
            .iter()
            .zip(&attributes)
            .map(|(l, attrs)| wgpu::VertexBufferLayout {
                array_stride: l.item_size as u64 * 4,
                step_mode: if l.instanced {
                    wgpu::VertexStepMode::Instance
                } else {
                    wgpu::VertexStepMode::Vertex
                },
                attributes: attrs,
            })
            .collect();

        let screen_format = self.screen_format;
        let (offscreen, screen) = self.scoped(&prog.layout.label, |device| {
            (
                Self::build_pipeline(device, prog, &buffers, OFFSCREEN_FORMAT),
                Self::build_pipeline(device, prog, &buffers, screen_format),
            )
        })?;

        self.pipelines.push(LinkedPass {
            program,
            offscreen,
            screen,
            locations: layout.iter().map(|l| l.location).collect(),
        });
        Ok(PipelineId(self.pipelines.len() as u32 - 1))
    }

    fn create_buffer(&mut self, label: &str, data: &[f32]) -> BufferId {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let buffer = self.allocate_buffer(label, bytes.len() as u64);
        if !bytes.is_empty() {
            self.queue.write_buffer(&buffer, 0, bytes);
        }
        self.buffers.push(Buffer { buffer, label: label.to_owned() });
        BufferId(self.buffers.len() as u32 - 1)
    }

    fn write_buffer(&mut self, id: BufferId, data: &[f32]) {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        if bytes.is_empty() {
            return;
        }
        let Some(existing) = self.buffers.get(id.index()) else {
            log::warn!("write to unknown buffer {id:?} ignored");
            return;
        };
        if existing.buffer.size() < bytes.len() as u64 {
            let grown = self.allocate_buffer(&existing.label, bytes.len() as u64);
            self.buffers[id.index()].buffer = grown;
        }
        self.queue.write_buffer(&self.buffers[id.index()].buffer, 0, bytes);
    }

    fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    fn create_texture(&mut self, init: &TextureInit<'_>) -> TextureId {
        let limit = self.max_texture_dimension();
        if init.dims.width > limit || init.dims.height > limit {
            log::error!(
                "texture '{}' is {}x{}, clamped to the device limit of {limit}",
                init.label,
                init.dims.width,
                init.dims.height
            );
        }
        let dims = PixelDims::new(init.dims.width.clamp(1, limit), init.dims.height.clamp(1, limit));
        let size = wgpu::Extent3d { width: dims.width, height: dims.height, depth_or_array_layers: 1 };

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(init.label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OFFSCREEN_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        if let Some(pixels) = init.pixels {
            if pixels.len() == dims.area() * 4 {
                self.queue.write_texture(
                    wgpu::TexelCopyTextureInfo {
                        texture: &texture,
                        mip_level: 0,
                        origin: wgpu::Origin3d::ZERO,
                        aspect: wgpu::TextureAspect::All,
                    },
                    pixels,
                    wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(dims.width * 4),
                        rows_per_image: Some(dims.height),
                    },
                    size,
                );
            } else {
                log::warn!(
                    "texture '{}': {} bytes do not cover {}x{}; left blank",
                    init.label,
                    pixels.len(),
                    dims.width,
                    dims.height
                );
            }
        }

        let filter = match init.filter {
            TextureFilter::Nearest => wgpu::FilterMode::Nearest,
            TextureFilter::Linear => wgpu::FilterMode::Linear,
        };
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(init.label),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.textures.push(Some(Texture { _texture: texture, view, sampler, dims }));
        TextureId(self.textures.len() as u32 - 1)
    }

    fn create_framebuffer(&mut self, texture: TextureId) -> FramebufferId {
        self.framebuffers.push(Some(texture));
        FramebufferId(self.framebuffers.len() as u32 - 1)
    }

    fn release_framebuffer(&mut self, framebuffer: FramebufferId, texture: TextureId) {
        if let Some(slot) = self.framebuffers.get_mut(framebuffer.index()) {
            *slot = None;
        }
        if let Some(slot) = self.textures.get_mut(texture.index()) {
            *slot = None;
        }
        self.texture_groups.retain(|(_, ids), _| !ids.contains(&texture));
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> Result<(), DrawError> {
        let linked = self
            .pipelines
            .get(call.pipeline.index())
            .ok_or(DrawError::UnknownHandle("pipeline"))?;
        let program_id = linked.program;
        let program = &mut self.programs[program_id.index()];
        let layout = &program.layout;

        // ── uniforms ───────────────────────────────────────────────────────
        let mut block = vec![0u8; layout.block_size() as usize];
        let mut bound: Vec<Option<TextureId>> = vec![None; layout.texture_count() as usize];
        for &(slot, value) in call.uniforms {
            match (slot, value) {
                (UniformSlot::Float { offset }, UniformValue::Float(v)) => {
                    let o = offset as usize;
                    block[o..o + 4].copy_from_slice(bytemuck::bytes_of(&v));
                }
                (UniformSlot::Vec2 { offset }, UniformValue::Vec2(v)) => {
                    let o = offset as usize;
                    block[o..o + 8].copy_from_slice(bytemuck::bytes_of(&v));
                }
                (UniformSlot::Texture { slot }, UniformValue::Texture { texture, .. }) => {
                    if let Some(b) = bound.get_mut(slot as usize) {
                        *b = Some(texture);
                    }
                }
                _ => {}
            }
        }

        let uniform_group = match &mut program.uniforms {
            UniformGroups::Empty(group) => group.clone(),
            UniformGroups::Blocks(pool) => {
                let device = &self.device;
                let bgl = &program.uniform_bgl;
                let entry = pool.acquire(|| {
                    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                        label: Some("phosphor uniform block"),
                        size: block.len() as u64,
                        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                        mapped_at_creation: false,
                    });
                    let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some("phosphor uniform bind group"),
                        layout: bgl,
                        entries: &[wgpu::BindGroupEntry {
                            binding: 0,
                            resource: buffer.as_entire_binding(),
                        }],
                    });
                    UniformBlock { buffer, group }
                });
                self.queue.write_buffer(&entry.buffer, 0, &block);
                entry.group.clone()
            }
        };

        let texture_group = match &program.texture_bgl {
            None => None,
            Some(bgl) => {
                let mut ids = Vec::with_capacity(bound.len());
                for (slot, id) in bound.iter().enumerate() {
                    ids.push(id.ok_or_else(|| DrawError::UnboundTexture {
                        program: program.layout.label.clone(),
                        slot: slot as u32,
                    })?);
                }
                let key = (program_id, ids);
                match self.texture_groups.get(&key) {
                    Some(group) => Some(group.clone()),
                    None => {
                        let group = build_texture_group(&self.device, &self.textures, bgl, &key.1)?;
                        self.texture_groups.insert(key, group.clone());
                        Some(group)
                    }
                }
            }
        };
        let linked = &self.pipelines[call.pipeline.index()];
        let layout = &self.programs[program_id.index()].layout;

        // ── vertex streams ─────────────────────────────────────────────────
        let mut vertex_buffers = Vec::with_capacity(linked.locations.len());
        for &location in &linked.locations {
            let id = call
                .attributes
                .iter()
                .find(|(l, _)| *l == location)
                .map(|(_, b)| *b)
                .ok_or_else(|| DrawError::UnboundAttribute {
                    program: layout.label.clone(),
                    location,
                })?;
            let buffer = self
                .buffers
                .get(id.index())
                .ok_or(DrawError::UnknownHandle("buffer"))?;
            vertex_buffers.push(&buffer.buffer);
        }

        // ── target ─────────────────────────────────────────────────────────
        let (view, target_dims, pipeline) = match call.target {
            DrawTarget::Screen => {
                let screen = self.screen.as_ref().ok_or(DrawError::NoScreenTarget)?;
                (&screen.view, screen.dims, &linked.screen)
            }
            DrawTarget::Framebuffer(fb) => {
                let id = self
                    .framebuffers
                    .get(fb.index())
                    .copied()
                    .flatten()
                    .ok_or(DrawError::UnknownHandle("framebuffer"))?;
                let tex = lookup_texture(&self.textures, id)?;
                (&tex.view, tex.dims, &linked.offscreen)
            }
        };
        let vw = call.viewport.width.min(target_dims.width).max(1);
        let vh = call.viewport.height.min(target_dims.height).max(1);

        let mut encoder = self.encoder.take().unwrap_or_else(|| {
            self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("phosphor frame encoder"),
            })
        });

        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(&layout.label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: if call.clear {
                            wgpu::LoadOp::Clear(wgpu::Color::BLACK)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            if call.instances > 0 {
                rpass.set_pipeline(pipeline);
                rpass.set_viewport(0.0, 0.0, vw as f32, vh as f32, 0.0, 1.0);
                rpass.set_bind_group(0, &uniform_group, &[]);
                if let Some(group) = &texture_group {
                    rpass.set_bind_group(1, group, &[]);
                }
                for (slot, buffer) in vertex_buffers.iter().enumerate() {
                    rpass.set_vertex_buffer(slot as u32, buffer.slice(..));
                }
                rpass.draw(0..QUAD_VERTEX_COUNT, 0..call.instances);
            }
        }

        self.encoder = Some(encoder);
        Ok(())
    }

    fn finish_frame(&mut self) -> Result<(), DrawError> {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(Some(encoder.finish()));
        }
        self.end_frame();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_pool_reuses_items_after_reset() {
        let mut pool = FramePool::new();
        let mut made = 0;
        let mut make = || {
            made += 1;
            made
        };

        assert_eq!(*pool.acquire(&mut make), 1);
        assert_eq!(*pool.acquire(&mut make), 2);
        pool.reset();
        assert_eq!(*pool.acquire(&mut make), 1);
        assert_eq!(*pool.acquire(&mut make), 2);
        assert_eq!(*pool.acquire(&mut make), 3);
        assert_eq!(pool.items.len(), 3);
    }
}
