//! Recording backend for unit tests. Stores every upload and draw in memory.

use crate::coords::PixelDims;

use super::backend::{
    Backend, BufferId, DrawCall, DrawTarget, FramebufferId, PipelineId, ProgramDesc, ProgramId,
    TextureFilter, TextureId, TextureInit, UniformSlot, VertexLayout,
};
use super::error::{ConfigError, DrawError};
use super::pass::UniformValue;
use super::program::ProgramLayout;

pub fn blank_texture(width: u32, height: u32) -> TextureInit<'static> {
    TextureInit {
        label: "blank",
        dims: PixelDims::new(width, height),
        pixels: None,
        filter: TextureFilter::Nearest,
    }
}

#[derive(Debug, Clone)]
pub struct TextureRecord {
    pub dims: PixelDims,
    pub pixels: Option<Vec<u8>>,
    pub filter: TextureFilter,
}

#[derive(Debug, Clone)]
pub struct DrawRecord {
    pub program: ProgramId,
    pub uniforms: Vec<(UniformSlot, UniformValue)>,
    pub attributes: Vec<(u32, BufferId)>,
    pub target: DrawTarget,
    pub viewport: PixelDims,
    pub clear: bool,
    pub instances: u32,
}

impl DrawRecord {
    /// Texture bound at sampler slot `slot`, if any.
    pub fn texture_at(&self, slot: u32) -> Option<TextureId> {
        self.uniforms.iter().rev().find_map(|(s, v)| match (s, v) {
            (UniformSlot::Texture { slot: s }, UniformValue::Texture { texture, .. }) if *s == slot => {
                Some(*texture)
            }
            _ => None,
        })
    }
}

#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub programs: Vec<ProgramLayout>,
    pub pipelines: Vec<(ProgramId, Vec<VertexLayout>)>,
    pub buffers: Vec<Vec<f32>>,
    pub buffer_writes: usize,
    pub textures: Vec<Option<TextureRecord>>,
    pub framebuffers: Vec<Option<TextureId>>,
    pub draws: Vec<DrawRecord>,
    pub frames: usize,
    /// Rejects programs whose label matches, at creation or when linked, to
    /// simulate a compile failure.
    pub fail_label: Option<&'static str>,
    /// Texture size limit; `None` means the wgpu default of 8192.
    pub texture_limit: Option<u32>,
}

impl RecordingBackend {
    pub fn compiled_pipelines(&self) -> usize {
        self.pipelines.len()
    }

    pub fn texture(&self, id: TextureId) -> Option<&TextureRecord> {
        self.textures.get(id.index()).and_then(Option::as_ref)
    }

    pub fn framebuffer_texture(&self, id: FramebufferId) -> Option<TextureId> {
        self.framebuffers.get(id.index()).copied().flatten()
    }

    pub fn live_framebuffers(&self) -> usize {
        self.framebuffers.iter().filter(|f| f.is_some()).count()
    }
}

impl Backend for RecordingBackend {
    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramId, ConfigError> {
        if self.fail_label == Some(desc.label) {
            return Err(ConfigError::Shader {
                label: desc.label.to_owned(),
                message: "rejected by test".to_owned(),
            });
        }
        self.programs.push(ProgramLayout::new(desc)?);
        Ok(ProgramId(self.programs.len() as u32 - 1))
    }

    fn uniform_slot(&self, program: ProgramId, name: &str) -> Option<UniformSlot> {
        self.programs.get(program.index())?.uniform_slot(name)
    }

    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<u32> {
        self.programs.get(program.index())?.attribute_location(name)
    }

    fn compile_pass(
        &mut self,
        program: ProgramId,
        layout: &[VertexLayout],
    ) -> Result<PipelineId, ConfigError> {
        let Some(prog) = self.programs.get(program.index()) else {
            return Err(ConfigError::UnknownHandle("program"));
        };
        if self.fail_label == Some(prog.label.as_str()) {
            return Err(ConfigError::Shader {
                label: prog.label.clone(),
                message: "link rejected by test".to_owned(),
            });
        }
        self.pipelines.push((program, layout.to_vec()));
        Ok(PipelineId(self.pipelines.len() as u32 - 1))
    }

    fn create_buffer(&mut self, _label: &str, data: &[f32]) -> BufferId {
        self.buffers.push(data.to_vec());
        BufferId(self.buffers.len() as u32 - 1)
    }

    fn write_buffer(&mut self, buffer: BufferId, data: &[f32]) {
        if let Some(b) = self.buffers.get_mut(buffer.index()) {
            b.clear();
            b.extend_from_slice(data);
            self.buffer_writes += 1;
        }
    }

    fn max_texture_dimension(&self) -> u32 {
        self.texture_limit.unwrap_or(8192)
    }

    fn create_texture(&mut self, init: &TextureInit<'_>) -> TextureId {
        self.textures.push(Some(TextureRecord {
            dims: init.dims,
            pixels: init.pixels.map(<[u8]>::to_vec),
            filter: init.filter,
        }));
        TextureId(self.textures.len() as u32 - 1)
    }

    fn create_framebuffer(&mut self, texture: TextureId) -> FramebufferId {
        self.framebuffers.push(Some(texture));
        FramebufferId(self.framebuffers.len() as u32 - 1)
    }

    fn release_framebuffer(&mut self, framebuffer: FramebufferId, texture: TextureId) {
        if let Some(fb) = self.framebuffers.get_mut(framebuffer.index()) {
            *fb = None;
        }
        if let Some(tex) = self.textures.get_mut(texture.index()) {
            *tex = None;
        }
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> Result<(), DrawError> {
        let program = self
            .pipelines
            .get(call.pipeline.index())
            .map(|(p, _)| *p)
            .ok_or(DrawError::UnknownHandle("pipeline"))?;
        if let DrawTarget::Framebuffer(fb) = call.target {
            self.framebuffer_texture(fb)
                .ok_or(DrawError::UnknownHandle("framebuffer"))?;
        }
        self.draws.push(DrawRecord {
            program,
            uniforms: call.uniforms.to_vec(),
            attributes: call.attributes.to_vec(),
            target: call.target,
            viewport: call.viewport,
            clear: call.clear,
            instances: call.instances,
        });
        Ok(())
    }

    fn finish_frame(&mut self) -> Result<(), DrawError> {
        self.frames += 1;
        Ok(())
    }
}
