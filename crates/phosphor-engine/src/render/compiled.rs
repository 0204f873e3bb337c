//! Compiled passes: resolved binding locations, built once per program and
//! attribute layout and reused every frame.

use std::collections::HashMap;

use super::backend::{Backend, BufferId, PipelineId, ProgramId, UniformSlot, VertexLayout};
use super::error::ConfigError;
use super::pass::{PassDescriptor, UniformValue};

/// Resolved locations for one program/attribute-set pair.
#[derive(Debug, Clone)]
pub struct CompiledPass {
    pub program: ProgramId,
    pub pipeline: PipelineId,
    /// Attribute name to shader location; names the program lacks are absent.
    locations: Vec<(&'static str, u32)>,
    /// Uniform name to resolved slot; `None` caches a miss.
    uniforms: HashMap<&'static str, Option<UniformSlot>>,
}

impl CompiledPass {
    pub fn compile<B: Backend + ?Sized>(
        backend: &mut B,
        desc: &PassDescriptor,
    ) -> Result<Self, ConfigError> {
        let mut locations = Vec::with_capacity(desc.attributes.len());
        let mut layout = Vec::with_capacity(desc.attributes.len());

        for &(name, attrib) in &desc.attributes {
            if !(1..=4).contains(&attrib.item_size) {
                return Err(ConfigError::AttributeSize {
                    name: name.to_owned(),
                    item_size: attrib.item_size,
                });
            }
            let Some(location) = backend.attribute_location(desc.program, name) else {
                log::trace!("attribute '{name}' not declared by program; skipped");
                continue;
            };
            locations.push((name, location));
            layout.push(VertexLayout {
                location,
                item_size: attrib.item_size,
                instanced: attrib.instanced,
            });
        }

        let pipeline = backend.compile_pass(desc.program, &layout)?;

        let mut pass = Self { program: desc.program, pipeline, locations, uniforms: HashMap::new() };
        for &(name, _) in &desc.uniforms {
            pass.resolve_uniform(&*backend, name);
        }
        Ok(pass)
    }

    fn resolve_uniform<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
        name: &'static str,
    ) -> Option<UniformSlot> {
        let program = self.program;
        *self
            .uniforms
            .entry(name)
            .or_insert_with(|| backend.uniform_slot(program, name))
    }

    /// Pairs each supplied uniform value with its slot, dropping names the
    /// program does not declare or whose value kind does not fit the slot.
    pub fn bind_uniforms<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
        values: impl IntoIterator<Item = (&'static str, UniformValue)>,
    ) -> Vec<(UniformSlot, UniformValue)> {
        let mut out = Vec::new();
        for (name, value) in values {
            let Some(slot) = self.resolve_uniform(backend, name) else {
                continue;
            };
            let fits = matches!(
                (slot, value),
                (UniformSlot::Float { .. }, UniformValue::Float(_))
                    | (UniformSlot::Vec2 { .. }, UniformValue::Vec2(_))
                    | (UniformSlot::Texture { .. }, UniformValue::Texture { .. })
            );
            if fits {
                out.push((slot, value));
            } else {
                log::warn!("uniform '{name}' value does not match its declared kind; skipped");
            }
        }
        out
    }

    /// Pairs each resolved location with the buffer the descriptor supplies.
    pub fn bind_attributes(&self, desc: &PassDescriptor) -> Vec<(u32, BufferId)> {
        self.locations
            .iter()
            .filter_map(|&(name, location)| {
                desc.attributes
                    .iter()
                    .find(|(n, _)| *n == name)
                    .map(|(_, a)| (location, a.buffer))
            })
            .collect()
    }
}

/// Cache key: program plus a hash of the attribute names, item sizes and
/// instancing flags, in order.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
struct PassKey {
    program: ProgramId,
    layout: u64,
}

impl PassKey {
    fn of(desc: &PassDescriptor) -> Self {
        let mut h = FNV_OFFSET;
        for (name, attrib) in &desc.attributes {
            h = fnv1a_64(h, name.as_bytes());
            h = fnv1a_64(h, &[0xff]);
            h = fnv1a_64(h, &attrib.item_size.to_le_bytes());
            h = fnv1a_64(h, &[attrib.instanced as u8]);
        }
        Self { program: desc.program, layout: h }
    }
}

const FNV_OFFSET: u64 = 14695981039346656037;

#[inline]
fn fnv1a_64(seed: u64, data: &[u8]) -> u64 {
    data.iter()
        .fold(seed, |h, &b| (h ^ b as u64).wrapping_mul(1099511628211))
}

/// Compiled passes keyed by program and attribute layout.
#[derive(Debug, Default)]
pub struct PassCache {
    passes: HashMap<PassKey, CompiledPass>,
}

impl PassCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the compiled pass for `desc`, compiling it on first use.
    pub fn get_or_compile<B: Backend + ?Sized>(
        &mut self,
        backend: &mut B,
        desc: &PassDescriptor,
    ) -> Result<&mut CompiledPass, ConfigError> {
        use std::collections::hash_map::Entry;

        match self.passes.entry(PassKey::of(desc)) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(e) => {
                let pass = CompiledPass::compile(backend, desc)?;
                log::debug!("compiled pass for program {:?}", desc.program);
                Ok(e.insert(pass))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }
}
