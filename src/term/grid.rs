//! Off-screen cell grid with differential flush
//!
//! Two frames are kept: the cells being composed and the cells the terminal
//! currently shows. Flushing walks both, batching runs of changed cells per
//! row and emitting only the cursor moves and SGR changes those runs need.
//! The first frame after creation, a resize, or an invalidate is always full.

use std::io::Write;

use crossterm::cursor::{MoveTo, Show};
use crossterm::queue;
use crossterm::style::{
    Attribute, Color, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor,
};

/// One styled glyph cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub reverse: bool,
}

impl Cell {
    pub fn empty() -> Self {
        Self {
            ch: ' ',
            fg: None,
            bg: None,
            reverse: false,
        }
    }

    /// Second column of a full-width glyph; never printed on its own
    pub fn continuation() -> Self {
        Self {
            ch: '\0',
            fg: None,
            bg: None,
            reverse: false,
        }
    }

    pub fn is_continuation(&self) -> bool {
        self.ch == '\0'
    }
}

/// Statistics about one flushed frame
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameStats {
    pub total_cells: usize,
    pub changed_cells: usize,
    pub full_redraw: bool,
}

/// Double-buffered screen grid
pub struct Grid {
    current: Vec<Vec<Cell>>,
    previous: Vec<Vec<Cell>>,
    rows: usize,
    cols: usize,
    force_full: bool,
}

impl Grid {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            current: vec![vec![Cell::empty(); cols]; rows],
            previous: vec![vec![Cell::empty(); cols]; rows],
            rows,
            cols,
            force_full: true,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn set_cell(&mut self, row: usize, col: usize, cell: Cell) {
        if row < self.rows && col < self.cols {
            self.current[row][col] = cell;
        }
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.current.get(row).and_then(|r| r.get(col))
    }

    /// Fill one row with empty cells before composing into it
    pub fn clear_row(&mut self, row: usize) {
        if let Some(r) = self.current.get_mut(row) {
            r.fill(Cell::empty());
        }
    }

    pub fn clear(&mut self) {
        for row in &mut self.current {
            row.fill(Cell::empty());
        }
    }

    /// Resize both frames; forces a full redraw on the next flush
    pub fn resize(&mut self, rows: usize, cols: usize) {
        self.current = vec![vec![Cell::empty(); cols]; rows];
        self.previous = vec![vec![Cell::empty(); cols]; rows];
        self.rows = rows;
        self.cols = cols;
        self.force_full = true;
    }

    /// Force a full redraw on the next flush
    pub fn invalidate(&mut self) {
        self.force_full = true;
    }

    /// Count of cells that differ from the shown frame
    pub fn pending_changes(&self) -> usize {
        if self.force_full {
            return self.rows * self.cols;
        }
        let mut n = 0;
        for (cur, prev) in self.current.iter().zip(&self.previous) {
            n += cur.iter().zip(prev).filter(|(a, b)| a != b).count();
        }
        n
    }

    /// Emit the minimal byte stream transforming the shown frame into the
    /// composed one, then park the cursor at `cursor` and show it.
    pub fn flush(
        &mut self,
        out: &mut impl Write,
        cursor: Option<(usize, usize)>,
    ) -> std::io::Result<FrameStats> {
        let mut stats = FrameStats {
            total_cells: self.rows * self.cols,
            changed_cells: 0,
            full_redraw: self.force_full,
        };

        let mut fg: Option<Color> = None;
        let mut bg: Option<Color> = None;
        let mut reverse = false;
        queue!(out, crossterm::cursor::Hide, ResetColor)?;

        for row in 0..self.rows {
            let mut col = 0;
            while col < self.cols {
                let changed =
                    self.force_full || self.current[row][col] != self.previous[row][col];
                if !changed {
                    col += 1;
                    continue;
                }
                // Start of a changed run; wide glyphs are emitted from their
                // first column, so back up over a continuation cell
                let start = if self.current[row][col].is_continuation() && col > 0 {
                    col - 1
                } else {
                    col
                };
                queue!(out, MoveTo(start as u16, row as u16))?;
                let mut c = start;
                while c < self.cols
                    && (self.force_full || self.current[row][c] != self.previous[row][c])
                {
                    let cell = &self.current[row][c];
                    stats.changed_cells += 1;
                    if cell.is_continuation() {
                        c += 1;
                        continue;
                    }
                    if cell.fg != fg {
                        match cell.fg {
                            Some(color) => queue!(out, SetForegroundColor(color))?,
                            None => {
                                queue!(out, ResetColor)?;
                                bg = None;
                                if reverse {
                                    queue!(out, SetAttribute(Attribute::Reverse))?;
                                }
                            }
                        }
                        fg = cell.fg;
                    }
                    if cell.bg != bg {
                        match cell.bg {
                            Some(color) => queue!(out, SetBackgroundColor(color))?,
                            None => {
                                queue!(out, ResetColor)?;
                                fg = None;
                                if cell.fg.is_some() {
                                    queue!(out, SetForegroundColor(cell.fg.unwrap()))?;
                                    fg = cell.fg;
                                }
                                if reverse {
                                    queue!(out, SetAttribute(Attribute::Reverse))?;
                                }
                            }
                        }
                        bg = cell.bg;
                    }
                    if cell.reverse != reverse {
                        let attr = if cell.reverse {
                            Attribute::Reverse
                        } else {
                            Attribute::NoReverse
                        };
                        queue!(out, SetAttribute(attr))?;
                        reverse = cell.reverse;
                    }
                    let mut scratch = [0u8; 4];
                    out.write_all(cell.ch.encode_utf8(&mut scratch).as_bytes())?;
                    c += 1;
                }
                col = c;
            }
        }

        queue!(out, ResetColor, SetAttribute(Attribute::NoReverse))?;
        if let Some((row, col)) = cursor {
            queue!(out, MoveTo(col as u16, row as u16), Show)?;
        }
        out.flush()?;

        // The composed frame is now what the terminal shows
        for (prev, cur) in self.previous.iter_mut().zip(&self.current) {
            prev.clone_from_slice(cur);
        }
        self.force_full = false;
        Ok(stats)
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
