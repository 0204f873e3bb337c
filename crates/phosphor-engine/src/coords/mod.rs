//! Coordinate and value types shared by the pass engine and the text grid.
//!
//! Canonical spaces:
//! - pixel dimensions are physical texels of a render target
//! - grid positions are integer (column, row) cells, origin top-left

mod color;
mod dims;
mod grid;

pub use color::Rgb;
pub use dims::PixelDims;
pub use grid::{GridDims, GridPos};
