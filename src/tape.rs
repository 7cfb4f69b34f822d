//! Fixed-size byte tape with a single cursor.

use crate::error::{BitLangError, TapeError};

/// Number of cells used when no size is configured.
pub const DEFAULT_MEMORY_SIZE: usize = 1000;

/// Zero-initialised memory tape.
///
/// The cursor always satisfies `0 <= cursor < len`. Moves that would leave
/// that range fail and leave the tape untouched; nothing is clamped or
/// wrapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tape {
    cells: Vec<u8>,
    cursor: usize,
}

impl Tape {
    pub fn new(size: usize) -> Result<Self, BitLangError> {
        if size == 0 {
            return Err(BitLangError::InvalidMemorySize);
        }
        Ok(Self {
            cells: vec![0; size],
            cursor: 0,
        })
    }

    pub fn read(&self) -> u8 {
        self.cells[self.cursor]
    }

    /// Store `value mod 256` at the cursor.
    pub fn write(&mut self, value: i32) {
        self.cells[self.cursor] = value.rem_euclid(256) as u8;
    }

    pub fn increment(&mut self) -> u8 {
        let cell = &mut self.cells[self.cursor];
        *cell = cell.wrapping_add(1);
        *cell
    }

    pub fn decrement(&mut self) -> u8 {
        let cell = &mut self.cells[self.cursor];
        *cell = cell.wrapping_sub(1);
        *cell
    }

    pub fn move_right(&mut self) -> Result<usize, TapeError> {
        let last = self.cells.len() - 1;
        if self.cursor >= last {
            return Err(TapeError::PastEnd { last });
        }
        self.cursor += 1;
        Ok(self.cursor)
    }

    pub fn move_left(&mut self) -> Result<usize, TapeError> {
        if self.cursor == 0 {
            return Err(TapeError::BelowStart);
        }
        self.cursor -= 1;
        Ok(self.cursor)
    }

    /// Zero every cell and put the cursor back on cell 0.
    pub fn reset(&mut self) {
        self.cells.fill(0);
        self.cursor = 0;
    }

    pub fn get(&self, index: usize) -> Option<u8> {
        self.cells.get(index).copied()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    /// Page-aligned slice of `width` cells containing the cursor, with the
    /// index of its first cell.
    pub fn window(&self, width: usize) -> (usize, &[u8]) {
        let width = width.max(1);
        let base = self.cursor - self.cursor % width;
        let end = (base + width).min(self.cells.len());
        (base, &self.cells[base..end])
    }
}

impl Default for Tape {
    fn default() -> Self {
        Self {
            cells: vec![0; DEFAULT_MEMORY_SIZE],
            cursor: 0,
        }
    }
}
