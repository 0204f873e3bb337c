/// Integer cell coordinate on a text grid.
///
/// Signed so that out-of-range input (e.g. `-1`) is representable and can be
/// rejected by bounds checks instead of wrapping.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct GridPos {
    pub col: i32,
    pub row: i32,
}

impl GridPos {
    #[inline]
    pub const fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }
}

/// Grid size in cells.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct GridDims {
    pub columns: u32,
    pub rows: u32,
}

impl GridDims {
    #[inline]
    pub const fn new(columns: u32, rows: u32) -> Self {
        Self { columns, rows }
    }

    /// Maximum number of tiles the grid can hold.
    #[inline]
    pub fn capacity(self) -> usize {
        self.columns as usize * self.rows as usize
    }

    #[inline]
    pub fn contains(self, pos: GridPos) -> bool {
        pos.col >= 0
            && pos.row >= 0
            && (pos.col as u32) < self.columns
            && (pos.row as u32) < self.rows
    }

    /// Row-major slot index for `pos`, or `None` when out of bounds.
    #[inline]
    pub fn index_of(self, pos: GridPos) -> Option<usize> {
        self.contains(pos)
            .then(|| pos.row as usize * self.columns as usize + pos.col as usize)
    }

    /// Inverse of [`GridDims::index_of`].
    #[inline]
    pub fn pos_of(self, index: usize) -> GridPos {
        let cols = self.columns.max(1) as usize;
        GridPos::new((index % cols) as i32, (index / cols) as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_half_open() {
        let g = GridDims::new(80, 24);
        assert!(g.contains(GridPos::new(0, 0)));
        assert!(g.contains(GridPos::new(79, 23)));
        assert!(!g.contains(GridPos::new(80, 0)));
        assert!(!g.contains(GridPos::new(0, 24)));
        assert!(!g.contains(GridPos::new(-1, 3)));
    }

    #[test]
    fn index_round_trips_through_pos() {
        let g = GridDims::new(7, 5);
        let p = GridPos::new(3, 4);
        let i = g.index_of(p).unwrap();
        assert_eq!(i, 4 * 7 + 3);
        assert_eq!(g.pos_of(i), p);
    }

    #[test]
    fn index_of_out_of_bounds_is_none() {
        assert_eq!(GridDims::new(3, 3).index_of(GridPos::new(3, 0)), None);
    }
}
