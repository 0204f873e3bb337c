//! Font atlas: every glyph of a set pre-rendered on a fixed grid.

use std::rc::Rc;

use crate::coords::PixelDims;
use crate::render::{Backend, ConfigError, TextureFilter, TextureId, TextureInit};

use super::font_system::GlyphSource;
use super::glyph_set::{GlyphId, GlyphSet, GlyphTable};

const ATLAS_LABEL: &str = "phosphor font atlas";

/// Cell grid of the atlas.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AtlasLayout {
    pub columns: u32,
    /// Gap added to each cell on both axes, in pixels.
    pub padding: f32,
}

impl Default for AtlasLayout {
    fn default() -> Self {
        Self { columns: 16, padding: 8.0 }
    }
}

/// CPU-side atlas: RGBA8 pixels, white glyphs on opaque black.
#[derive(Debug, Clone, PartialEq)]
pub struct AtlasImage {
    pub dims: PixelDims,
    pub pixels: Vec<u8>,
    /// Cell center of each table entry, in atlas pixels.
    pub centers: Vec<[f32; 2]>,
    pub char_dims: [f32; 2],
}

impl AtlasImage {
    pub fn render<S: GlyphSource + ?Sized>(
        source: &S,
        font_size: f32,
        table: &GlyphTable,
        layout: AtlasLayout,
    ) -> Result<Self, ConfigError> {
        if table.is_empty() {
            return Err(ConfigError::EmptyGlyphSet);
        }
        let columns = layout.columns.max(1);
        let rows = (table.len() as u32).div_ceil(columns);

        let metrics = source.box_metrics(font_size);
        let char_dims = [metrics.width, metrics.height];
        let cell = [char_dims[0] + layout.padding, char_dims[1] + layout.padding];
        let dims = PixelDims::new(
            (columns as f32 * cell[0]).ceil() as u32,
            (rows as f32 * cell[1]).ceil() as u32,
        );

        let mut pixels = vec![0u8; dims.area() * 4];
        for px in pixels.chunks_exact_mut(4) {
            px[3] = 255;
        }

        let mut centers = Vec::with_capacity(table.len());
        for (i, glyph) in table.iter().enumerate() {
            let i = i as u32;
            let center = [
                ((i % columns) as f32 + 0.5) * cell[0],
                ((i / columns) as f32 + 0.5) * cell[1],
            ];
            centers.push(center);

            let Some(bitmap) = source.rasterize(glyph, font_size) else {
                log::warn!("glyph {glyph:?} has no outline in this font; cell left blank");
                continue;
            };

            // Box glyph centered on the cell fixes the baseline.
            let baseline = center[1] + metrics.height / 2.0 + metrics.ymin;
            let x0 = (center[0] - bitmap.advance / 2.0 + bitmap.xmin).round() as i64;
            let y0 = (baseline - (bitmap.ymin + bitmap.height as f32)).round() as i64;

            for row in 0..bitmap.height {
                let y = y0 + row as i64;
                if y < 0 || y >= dims.height as i64 {
                    continue;
                }
                for col in 0..bitmap.width {
                    let x = x0 + col as i64;
                    if x < 0 || x >= dims.width as i64 {
                        continue;
                    }
                    let v = bitmap.coverage[row * bitmap.width + col];
                    let at = (y as usize * dims.width as usize + x as usize) * 4;
                    for c in &mut pixels[at..at + 3] {
                        *c = (*c).max(v);
                    }
                }
            }
        }

        Ok(Self { dims, pixels, centers, char_dims })
    }
}

/// Uploaded atlas plus the glyph lookup. Immutable once built.
#[derive(Debug, Clone)]
pub struct FontAtlas {
    texture: TextureId,
    table: Rc<GlyphTable>,
    centers: Vec<[f32; 2]>,
    char_dims: [f32; 2],
    dims: PixelDims,
}

impl FontAtlas {
    pub fn build<B, S>(
        backend: &mut B,
        source: &S,
        font_size: f32,
        glyphs: &GlyphSet,
        layout: AtlasLayout,
    ) -> Result<Self, ConfigError>
    where
        B: Backend + ?Sized,
        S: GlyphSource + ?Sized,
    {
        let table = GlyphTable::from_set(glyphs);
        let image = AtlasImage::render(source, font_size, &table, layout)?;
        log::debug!(
            "font atlas: {} glyphs, {}x{} px",
            table.len(),
            image.dims.width,
            image.dims.height
        );
        Self::upload(backend, Rc::new(table), image)
    }

    /// Uploads a rendered atlas. Fails when the image exceeds the backend's
    /// texture limit, e.g. for a very large font size.
    pub fn upload<B: Backend + ?Sized>(
        backend: &mut B,
        table: Rc<GlyphTable>,
        image: AtlasImage,
    ) -> Result<Self, ConfigError> {
        backend.check_texture_dims(ATLAS_LABEL, image.dims)?;
        let texture = backend.create_texture(&TextureInit {
            label: ATLAS_LABEL,
            dims: image.dims,
            pixels: Some(&image.pixels),
            filter: TextureFilter::Nearest,
        });
        Ok(Self {
            texture,
            table,
            centers: image.centers,
            char_dims: image.char_dims,
            dims: image.dims,
        })
    }

    #[inline]
    pub fn texture(&self) -> TextureId {
        self.texture
    }

    #[inline]
    pub fn table(&self) -> &Rc<GlyphTable> {
        &self.table
    }

    /// Cell center of `id`, or the origin for an id from another table.
    #[inline]
    pub fn center(&self, id: GlyphId) -> [f32; 2] {
        self.centers.get(id.index()).copied().unwrap_or([0.0, 0.0])
    }

    pub fn center_of(&self, glyph: &str) -> Option<[f32; 2]> {
        self.table.id(glyph).map(|id| self.center(id))
    }

    #[inline]
    pub fn char_dims(&self) -> [f32; 2] {
        self.char_dims
    }

    #[inline]
    pub fn dims(&self) -> PixelDims {
        self.dims
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::mock::RecordingBackend;
    use crate::text::glyph_set::GlyphSpec;
    use crate::text::size::tests::LinearGlyphs;

    fn set() -> GlyphSet {
        GlyphSet::new([GlyphSpec::Range(65, 67), "XY".into()])
    }

    #[test]
    fn five_glyphs_get_distinct_cells() {
        let mut backend = RecordingBackend::default();
        let atlas =
            FontAtlas::build(&mut backend, &LinearGlyphs, 10.0, &set(), AtlasLayout::default()).unwrap();

        assert_eq!(atlas.table().len(), 5);
        let centers: Vec<_> = ["A", "B", "C", "X", "Y"]
            .iter()
            .map(|g| atlas.center_of(g).unwrap())
            .collect();

        let cell = [5.0 + 8.0, 12.5 + 8.0];
        for (i, a) in centers.iter().enumerate() {
            for b in &centers[i + 1..] {
                let apart = (a[0] - b[0]).abs() >= cell[0] || (a[1] - b[1]).abs() >= cell[1];
                assert!(apart, "{a:?} overlaps {b:?}");
            }
        }
        assert_eq!(centers[0], [6.5, 10.25]);
        assert_eq!(atlas.center_of("Z"), None);
    }

    #[test]
    fn dims_round_up_and_upload_is_nearest() {
        let mut backend = RecordingBackend::default();
        let atlas =
            FontAtlas::build(&mut backend, &LinearGlyphs, 10.0, &set(), AtlasLayout::default()).unwrap();

        // 16 * 13 by 1 * 20.5
        assert_eq!(atlas.dims(), PixelDims::new(208, 21));
        let tex = backend.texture(atlas.texture()).unwrap();
        assert_eq!(tex.filter, TextureFilter::Nearest);
        assert_eq!(tex.pixels.as_ref().unwrap().len(), 208 * 21 * 4);
    }

    #[test]
    fn glyphs_are_white_on_black() {
        let table = GlyphTable::from_set(&set());
        let image = AtlasImage::render(&LinearGlyphs, 10.0, &table, AtlasLayout::default()).unwrap();

        let at = |x: u32, y: u32| {
            let i = ((y * image.dims.width + x) * 4) as usize;
            &image.pixels[i..i + 4]
        };
        let [cx, cy] = image.centers[0];
        assert_eq!(at(cx as u32, cy as u32), &[255, 255, 255, 255]);
        assert_eq!(at(0, 0), &[0, 0, 0, 255]);
        assert_eq!(at(image.dims.width - 1, 0), &[0, 0, 0, 255]);
    }

    #[test]
    fn render_is_deterministic() {
        let table = GlyphTable::from_set(&GlyphSet::default());
        let a = AtlasImage::render(&LinearGlyphs, 12.0, &table, AtlasLayout::default()).unwrap();
        let b = AtlasImage::render(&LinearGlyphs, 12.0, &table, AtlasLayout::default()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.centers.len(), table.len());
    }

    #[test]
    fn unrenderable_glyph_keeps_its_cell() {
        let table = GlyphTable::new(vec!["A".into(), "\u{fffe}".into()]);
        let image = AtlasImage::render(&LinearGlyphs, 10.0, &table, AtlasLayout::default()).unwrap();
        assert_eq!(image.centers.len(), 2);
    }

    #[test]
    fn atlas_above_texture_limit_is_a_config_error() {
        let mut backend = RecordingBackend { texture_limit: Some(200), ..Default::default() };
        let err = FontAtlas::build(&mut backend, &LinearGlyphs, 10.0, &set(), AtlasLayout::default())
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::TextureTooLarge {
                label: ATLAS_LABEL.to_owned(),
                dims: PixelDims::new(208, 21),
                limit: 200,
            }
        );
        assert!(backend.textures.is_empty());
    }

    #[test]
    fn empty_set_is_a_config_error() {
        let table = GlyphTable::new(Vec::new());
        let err = AtlasImage::render(&LinearGlyphs, 10.0, &table, AtlasLayout::default()).unwrap_err();
        assert_eq!(err, ConfigError::EmptyGlyphSet);
    }
}
