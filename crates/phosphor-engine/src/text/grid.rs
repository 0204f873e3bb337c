//! Editable glyph grid, CPU side.
//!
//! Tiles live in an arena of `columns * rows` slots indexed
//! `row * columns + col`; an empty slot is `None`.

use std::rc::Rc;

use unicode_segmentation::UnicodeSegmentation;

use crate::coords::{GridDims, GridPos, Rgb};

use super::glyph_set::{GlyphId, GlyphTable};

#[derive(Debug, Copy, Clone, PartialEq)]
struct Slot {
    glyph: GlyphId,
    color: Rgb,
}

/// A glyph (one grapheme cluster) and its color.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CharTile<'a> {
    pub glyph: &'a str,
    pub color: Rgb,
}

#[derive(Debug, Clone)]
pub struct TextGrid {
    dims: GridDims,
    slots: Vec<Option<Slot>>,
    occupied: usize,
    cursor: GridPos,
    stale: bool,
    table: Rc<GlyphTable>,
}

impl TextGrid {
    pub fn new(dims: GridDims, table: Rc<GlyphTable>) -> Self {
        Self {
            dims,
            slots: vec![None; dims.capacity()],
            occupied: 0,
            cursor: GridPos::default(),
            stale: true,
            table,
        }
    }

    #[inline]
    pub fn dims(&self) -> GridDims {
        self.dims
    }

    /// Writes `glyph` at `pos`. Fails without changing anything when `pos` is
    /// out of bounds, `glyph` is not in the atlas, or a color channel is
    /// outside `[0, 1]`.
    pub fn set_char(&mut self, pos: GridPos, glyph: &str, color: Rgb) -> bool {
        let Some(index) = self.dims.index_of(pos) else {
            return false;
        };
        let Some(glyph) = self.table.id(glyph) else {
            return false;
        };
        if !color.is_normalized() {
            return false;
        }
        let slot = &mut self.slots[index];
        if slot.is_none() {
            self.occupied += 1;
        }
        *slot = Some(Slot { glyph, color });
        self.stale = true;
        true
    }

    /// Removes the tile at `pos`, if any. Fails only when `pos` is out of
    /// bounds.
    pub fn del_char(&mut self, pos: GridPos) -> bool {
        let Some(index) = self.dims.index_of(pos) else {
            return false;
        };
        if self.slots[index].take().is_some() {
            self.occupied -= 1;
        }
        self.stale = true;
        true
    }

    pub fn get_char(&self, pos: GridPos) -> Option<CharTile<'_>> {
        let slot = self.slots[self.dims.index_of(pos)?]?;
        Some(CharTile { glyph: self.table.glyph(slot.glyph)?, color: slot.color })
    }

    /// Writes `text` at the cursor, one grapheme cluster per cell.
    ///
    /// A newline, or running past the last column, moves the cursor to the
    /// start of the next row. Printing stops once the cursor reaches the last
    /// row, which is kept free. Glyphs missing from the atlas still advance
    /// the cursor.
    pub fn print(&mut self, text: &str, color: Rgb) {
        let last_row = self.dims.rows as i32 - 1;
        for g in text.graphemes(true) {
            if self.cursor.row >= last_row {
                return;
            }
            if g == "\n" || g == "\r\n" {
                self.wrap();
                continue;
            }
            if self.cursor.col >= self.dims.columns as i32 {
                self.wrap();
                if self.cursor.row >= last_row {
                    return;
                }
            }
            self.set_char(self.cursor, g, color);
            self.cursor.col += 1;
        }
    }

    fn wrap(&mut self) {
        self.cursor.col = 0;
        self.cursor.row += 1;
    }

    /// Removes every tile and homes the cursor.
    pub fn clear(&mut self) {
        self.slots.fill(None);
        self.occupied = 0;
        self.cursor = GridPos::default();
        self.stale = true;
    }

    #[inline]
    pub fn cursor(&self) -> GridPos {
        self.cursor
    }

    /// Moves the cursor; fails when `pos` is out of bounds.
    pub fn set_cursor(&mut self, pos: GridPos) -> bool {
        if !self.dims.contains(pos) {
            return false;
        }
        self.cursor = pos;
        true
    }

    /// Number of occupied tiles.
    #[inline]
    pub fn len(&self) -> usize {
        self.occupied
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    /// Occupied tiles in arena order.
    pub fn tiles(&self) -> impl Iterator<Item = (GridPos, CharTile<'_>)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            let slot = (*slot)?;
            let glyph = self.table.glyph(slot.glyph)?;
            Some((self.dims.pos_of(i), CharTile { glyph, color: slot.color }))
        })
    }

    /// Occupied slots as `(pos, glyph id, color)`, in arena order.
    pub(crate) fn slots(&self) -> impl Iterator<Item = (GridPos, GlyphId, Rgb)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.map(|s| (self.dims.pos_of(i), s.glyph, s.color)))
    }

    #[inline]
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    #[inline]
    pub(crate) fn mark_fresh(&mut self) {
        self.stale = false;
    }
}
