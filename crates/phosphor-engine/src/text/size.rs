//! Derives the third of {font size, grid dims, pixel resolution} from the
//! other two.

use std::fmt;

use crate::coords::{GridDims, PixelDims};

use super::font_system::GlyphSource;

/// Search domain and precision for fitting a font size to a cell.
const MIN_FONT_SIZE: f32 = 1.0;
const MAX_FONT_SIZE: f32 = 1000.0;
const SEARCH_PRECISION: f32 = 0.5;

/// Which two of the three size quantities are given.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SizeSpec {
    FontSizeAndGrid { font_size: f32, grid: GridDims },
    FontSizeAndResolution { font_size: f32, resolution: PixelDims },
    /// Fits the largest font size into `resolution / grid`. Unless
    /// `preserve_grid` is set, the grid is then recomputed from the measured
    /// glyph size so quantization does not leave cells under-filled.
    ResolutionAndGrid { resolution: PixelDims, grid: GridDims, preserve_grid: bool },
}

/// Fully resolved text size.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TextRendererSize {
    pub font_size: f32,
    /// Pixel size of one glyph cell.
    pub char_dims: [f32; 2],
    pub resolution: PixelDims,
    pub grid: GridDims,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SizeError {
    /// A grid axis was zero.
    EmptyGrid,
    /// A resolution axis was zero.
    EmptyResolution,
    /// Font size was not a positive finite number.
    BadFontSize(f32),
    /// The font measured a zero or non-finite box glyph at this size.
    DegenerateGlyph { font_size: f32 },
    /// Even the smallest font size does not fit the cell.
    NoFit { cell: [f32; 2] },
}

impl fmt::Display for SizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyGrid => write!(f, "grid has a zero dimension"),
            Self::EmptyResolution => write!(f, "resolution has a zero dimension"),
            Self::BadFontSize(s) => write!(f, "invalid font size {s}"),
            Self::DegenerateGlyph { font_size } => {
                write!(f, "box glyph measures empty at font size {font_size}")
            }
            Self::NoFit { cell } => {
                write!(f, "no font size fits a {:.2}x{:.2} cell", cell[0], cell[1])
            }
        }
    }
}

impl std::error::Error for SizeError {}

impl SizeSpec {
    pub fn resolve<S: GlyphSource + ?Sized>(&self, source: &S) -> Result<TextRendererSize, SizeError> {
        let size = match *self {
            Self::FontSizeAndGrid { font_size, grid } => from_font_and_grid(source, font_size, grid),
            Self::FontSizeAndResolution { font_size, resolution } => {
                from_font_and_resolution(source, font_size, resolution)
            }
            Self::ResolutionAndGrid { resolution, grid, preserve_grid } => {
                from_resolution_and_grid(source, resolution, grid, preserve_grid)
            }
        }?;
        log::debug!(
            "text size: {:.1}px font, {}x{} grid, {}x{} px, cell {:.2}x{:.2}",
            size.font_size,
            size.grid.columns,
            size.grid.rows,
            size.resolution.width,
            size.resolution.height,
            size.char_dims[0],
            size.char_dims[1]
        );
        Ok(size)
    }
}

fn measure<S: GlyphSource + ?Sized>(source: &S, font_size: f32) -> Result<[f32; 2], SizeError> {
    if !(font_size.is_finite() && font_size > 0.0) {
        return Err(SizeError::BadFontSize(font_size));
    }
    let dims = source.measure_box(font_size);
    if dims.iter().all(|d| d.is_finite() && *d > 0.0) {
        Ok(dims)
    } else {
        Err(SizeError::DegenerateGlyph { font_size })
    }
}

fn grid_for(resolution: PixelDims, char_dims: [f32; 2]) -> GridDims {
    GridDims::new(
        (resolution.width as f32 / char_dims[0]).floor() as u32,
        (resolution.height as f32 / char_dims[1]).floor() as u32,
    )
}

fn from_font_and_grid<S: GlyphSource + ?Sized>(
    source: &S,
    font_size: f32,
    grid: GridDims,
) -> Result<TextRendererSize, SizeError> {
    if grid.capacity() == 0 {
        return Err(SizeError::EmptyGrid);
    }
    let char_dims = measure(source, font_size)?;
    let resolution = PixelDims::new(
        (char_dims[0] * grid.columns as f32).ceil() as u32,
        (char_dims[1] * grid.rows as f32).ceil() as u32,
    );
    Ok(TextRendererSize { font_size, char_dims, resolution, grid })
}

fn from_font_and_resolution<S: GlyphSource + ?Sized>(
    source: &S,
    font_size: f32,
    resolution: PixelDims,
) -> Result<TextRendererSize, SizeError> {
    if resolution.is_empty() {
        return Err(SizeError::EmptyResolution);
    }
    let char_dims = measure(source, font_size)?;
    let grid = grid_for(resolution, char_dims);
    if grid.capacity() == 0 {
        return Err(SizeError::EmptyGrid);
    }
    Ok(TextRendererSize { font_size, char_dims, resolution, grid })
}

fn from_resolution_and_grid<S: GlyphSource + ?Sized>(
    source: &S,
    resolution: PixelDims,
    grid: GridDims,
    preserve_grid: bool,
) -> Result<TextRendererSize, SizeError> {
    if grid.capacity() == 0 {
        return Err(SizeError::EmptyGrid);
    }
    if resolution.is_empty() {
        return Err(SizeError::EmptyResolution);
    }
    let cell = [
        resolution.width as f32 / grid.columns as f32,
        resolution.height as f32 / grid.rows as f32,
    ];
    let fits = |size: f32| {
        let [w, h] = source.measure_box(size);
        w <= cell[0] && h <= cell[1]
    };

    if !fits(MIN_FONT_SIZE) {
        return Err(SizeError::NoFit { cell });
    }
    let (mut lo, mut hi) = (MIN_FONT_SIZE, MAX_FONT_SIZE);
    if fits(hi) {
        lo = hi;
    }
    while hi - lo >= SEARCH_PRECISION {
        let mid = (lo + hi) / 2.0;
        if fits(mid) {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    let font_size = lo;
    let char_dims = measure(source, font_size)?;
    let grid = if preserve_grid { grid } else { grid_for(resolution, char_dims) };
    Ok(TextRendererSize { font_size, char_dims, resolution, grid })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::text::font_system::{BoxMetrics, GlyphBitmap};

    /// Monospace stand-in: box glyph is `0.5 * px` wide and `1.25 * px` tall.
    pub(crate) struct LinearGlyphs;

    impl GlyphSource for LinearGlyphs {
        fn box_metrics(&self, px: f32) -> BoxMetrics {
            BoxMetrics { width: 0.5 * px, height: 1.25 * px, ymin: -0.25 * px }
        }

        fn rasterize(&self, glyph: &str, px: f32) -> Option<GlyphBitmap> {
            if glyph == "\u{fffe}" {
                return None;
            }
            let (w, h) = ((0.4 * px) as usize, px as usize);
            Some(GlyphBitmap {
                width: w,
                height: h,
                coverage: vec![255; w * h],
                xmin: 0.05 * px,
                ymin: 0.0,
                advance: 0.5 * px,
            })
        }
    }

    #[test]
    fn font_and_grid_round_trips_grid() {
        for &(px, cols, rows) in &[(28.0, 80, 24), (13.0, 3, 7), (9.5, 132, 43), (1.0, 1, 1)] {
            let grid = GridDims::new(cols, rows);
            let size = SizeSpec::FontSizeAndGrid { font_size: px, grid }
                .resolve(&LinearGlyphs)
                .unwrap();
            let back = grid_for(size.resolution, size.char_dims);
            assert!(back.columns.abs_diff(cols) <= 1, "{px}: {back:?}");
            assert!(back.rows.abs_diff(rows) <= 1, "{px}: {back:?}");
            assert_eq!(size.grid, grid);
        }
    }

    #[test]
    fn font_and_resolution_floors_grid() {
        let size = SizeSpec::FontSizeAndResolution {
            font_size: 10.0,
            resolution: PixelDims::new(100, 100),
        }
        .resolve(&LinearGlyphs)
        .unwrap();
        // cell is 5 x 12.5
        assert_eq!(size.grid, GridDims::new(20, 8));
        assert_eq!(size.char_dims, [5.0, 12.5]);
    }

    #[test]
    fn resolution_and_grid_finds_largest_fitting_size() {
        let resolution = PixelDims::new(480, 480);
        let grid = GridDims::new(40, 20);
        // cell 12 x 24: width allows 24px, height allows 19.2px.
        let size = SizeSpec::ResolutionAndGrid { resolution, grid, preserve_grid: true }
            .resolve(&LinearGlyphs)
            .unwrap();
        assert!(size.font_size <= 19.2 && size.font_size > 18.7, "{}", size.font_size);
        assert_eq!(size.grid, grid);
        assert!(size.char_dims[0] <= 12.0 && size.char_dims[1] <= 24.0);
    }

    #[test]
    fn resolution_and_grid_recomputes_grid_by_default() {
        let resolution = PixelDims::new(480, 480);
        let grid = GridDims::new(40, 20);
        let size = SizeSpec::ResolutionAndGrid { resolution, grid, preserve_grid: false }
            .resolve(&LinearGlyphs)
            .unwrap();
        assert_eq!(size.grid, grid_for(resolution, size.char_dims));
        assert!(size.grid.columns >= 40 && size.grid.rows >= 20);
    }

    #[test]
    fn degenerate_inputs_are_rejected() {
        let zero_grid = SizeSpec::FontSizeAndGrid { font_size: 12.0, grid: GridDims::new(0, 5) };
        assert_eq!(zero_grid.resolve(&LinearGlyphs), Err(SizeError::EmptyGrid));

        let bad_font = SizeSpec::FontSizeAndGrid { font_size: 0.0, grid: GridDims::new(5, 5) };
        assert_eq!(bad_font.resolve(&LinearGlyphs), Err(SizeError::BadFontSize(0.0)));

        let tiny = SizeSpec::ResolutionAndGrid {
            resolution: PixelDims::new(10, 10),
            grid: GridDims::new(100, 100),
            preserve_grid: false,
        };
        assert!(matches!(tiny.resolve(&LinearGlyphs), Err(SizeError::NoFit { .. })));

        let empty = SizeSpec::FontSizeAndResolution {
            font_size: 12.0,
            resolution: PixelDims::new(0, 10),
        };
        assert_eq!(empty.resolve(&LinearGlyphs), Err(SizeError::EmptyResolution));
    }
}
