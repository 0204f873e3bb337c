//! Uniform packing shared by every backend.
//!
//! Float and vec2 uniforms live in one std140-compatible block at
//! `@group(0) @binding(0)`, in declaration order; group 0 has no bindings
//! when a program declares only textures. Texture uniform `k` is bound at
//! `@group(1) @binding(2k)` with its sampler at `@binding(2k + 1)`.

use super::backend::{ProgramDesc, UniformKind, UniformSlot};
use super::error::ConfigError;

/// Smallest uniform block a backend will allocate, in bytes.
pub const MIN_BLOCK_SIZE: u32 = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct ProgramLayout {
    pub label: String,
    uniforms: Vec<(String, UniformSlot)>,
    attributes: Vec<(String, u32)>,
    block_size: u32,
    texture_count: u32,
}

impl ProgramLayout {
    pub fn new(desc: &ProgramDesc<'_>) -> Result<Self, ConfigError> {
        let mut uniforms: Vec<(String, UniformSlot)> = Vec::with_capacity(desc.uniforms.len());
        let mut offset = 0u32;
        let mut texture_count = 0u32;

        for &(name, kind) in desc.uniforms {
            if uniforms.iter().any(|(n, _)| n == name) {
                return Err(duplicate(desc.label, name));
            }
            let slot = match kind {
                UniformKind::Float => {
                    let slot = UniformSlot::Float { offset };
                    offset += 4;
                    slot
                }
                UniformKind::Vec2 => {
                    offset = align_to(offset, 8);
                    let slot = UniformSlot::Vec2 { offset };
                    offset += 8;
                    slot
                }
                UniformKind::Texture => {
                    let slot = UniformSlot::Texture { slot: texture_count };
                    texture_count += 1;
                    slot
                }
            };
            uniforms.push((name.to_owned(), slot));
        }

        let mut attributes: Vec<(String, u32)> = Vec::with_capacity(desc.attributes.len());
        for &(name, location) in desc.attributes {
            if attributes.iter().any(|(n, l)| n == name || *l == location) {
                return Err(duplicate(desc.label, name));
            }
            attributes.push((name.to_owned(), location));
        }

        Ok(Self {
            label: desc.label.to_owned(),
            uniforms,
            attributes,
            block_size: align_to(offset, 16).max(MIN_BLOCK_SIZE),
            texture_count,
        })
    }

    pub fn uniform_slot(&self, name: &str) -> Option<UniformSlot> {
        self.uniforms.iter().find(|(n, _)| n == name).map(|(_, s)| *s)
    }

    pub fn attribute_location(&self, name: &str) -> Option<u32> {
        self.attributes.iter().find(|(n, _)| n == name).map(|(_, l)| *l)
    }

    /// Size of the packed scalar block in bytes; a multiple of 16.
    #[inline]
    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    #[inline]
    pub fn texture_count(&self) -> u32 {
        self.texture_count
    }

    /// Whether the program has any scalar or vec2 uniforms.
    pub fn has_scalars(&self) -> bool {
        self.uniforms
            .iter()
            .any(|(_, s)| !matches!(s, UniformSlot::Texture { .. }))
    }
}

fn duplicate(label: &str, name: &str) -> ConfigError {
    ConfigError::DuplicateName { label: label.to_owned(), name: name.to_owned() }
}

#[inline]
fn align_to(value: u32, align: u32) -> u32 {
    value.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc<'a>(
        uniforms: &'a [(&'a str, UniformKind)],
        attributes: &'a [(&'a str, u32)],
    ) -> ProgramDesc<'a> {
        ProgramDesc { label: "test", source: "", uniforms, attributes }
    }

    #[test]
    fn vec2_is_aligned_to_eight_bytes() {
        let layout = ProgramLayout::new(&desc(
            &[
                ("uTime", UniformKind::Float),
                ("uResolution", UniformKind::Vec2),
                ("uScale", UniformKind::Float),
            ],
            &[],
        ))
        .unwrap();

        assert_eq!(layout.uniform_slot("uTime"), Some(UniformSlot::Float { offset: 0 }));
        assert_eq!(layout.uniform_slot("uResolution"), Some(UniformSlot::Vec2 { offset: 8 }));
        assert_eq!(layout.uniform_slot("uScale"), Some(UniformSlot::Float { offset: 16 }));
        assert_eq!(layout.block_size(), 32);
    }

    #[test]
    fn textures_take_slots_in_order() {
        let layout = ProgramLayout::new(&desc(
            &[
                ("uAtlas", UniformKind::Texture),
                ("uGlyphSize", UniformKind::Vec2),
                ("uPrevRender", UniformKind::Texture),
            ],
            &[],
        ))
        .unwrap();

        assert_eq!(layout.uniform_slot("uAtlas"), Some(UniformSlot::Texture { slot: 0 }));
        assert_eq!(layout.uniform_slot("uPrevRender"), Some(UniformSlot::Texture { slot: 1 }));
        assert_eq!(layout.texture_count(), 2);
        assert!(layout.has_scalars());
    }

    #[test]
    fn empty_block_has_minimum_size() {
        let layout = ProgramLayout::new(&desc(&[("uPrevRender", UniformKind::Texture)], &[])).unwrap();
        assert_eq!(layout.block_size(), MIN_BLOCK_SIZE);
        assert!(!layout.has_scalars());
    }

    #[test]
    fn unknown_names_resolve_to_none() {
        let layout = ProgramLayout::new(&desc(&[], &[("aQuadVertPos", 0)])).unwrap();
        assert_eq!(layout.uniform_slot("uMissing"), None);
        assert_eq!(layout.attribute_location("aQuadVertPos"), Some(0));
        assert_eq!(layout.attribute_location("aMissing"), None);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = ProgramLayout::new(&desc(
            &[("uTime", UniformKind::Float), ("uTime", UniformKind::Vec2)],
            &[],
        ))
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::DuplicateName { label: "test".into(), name: "uTime".into() }
        );

        assert!(ProgramLayout::new(&desc(&[], &[("a", 0), ("b", 0)])).is_err());
    }
}
