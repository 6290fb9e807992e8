//! Viewport state and line rendering
//!
//! A view belongs to one window and tracks which slice of its buffer is on
//! screen. Rendering composes styled cells into the shared grid; the grid's
//! differential flush keeps the actual terminal writes minimal, and the
//! per-view dirty set keeps cell composition itself off clean lines.
//!
//! ## view/ Invariants
//!
//! - After any edit to a buffer, every view showing it is dirty for the
//!   affected lines or fully dirty.
//! - The cursor cell always lies inside the window rect after
//!   `ensure_visible`.
//! - The `(cursor, line)` cache is only trusted for the revision it was
//!   computed against.

use std::collections::BTreeSet;
use std::ops::Range;

use crossterm::style::Color;
use memchr::memmem;

use crate::buffer::Buffer;
use crate::grapheme::{self, Clusters};
use crate::term::grid::{Cell, Grid};

/// Tab stop width used by rendering and column math
pub const TAB_WIDTH: usize = 8;

const COMMENT_FG: Color = Color::DarkGrey;
const CONTROL_FG: Color = Color::Cyan;
const GUTTER_FG: Color = Color::DarkGrey;
const SELECTION_BG: Color = Color::DarkBlue;
const MATCH_BG: Color = Color::DarkYellow;

/// Which lines need cell composition this frame
#[derive(Debug, Clone)]
enum Dirty {
    Full,
    Lines(BTreeSet<usize>),
}

/// Styling inputs for one frame of a window
pub struct RenderCtx<'a> {
    /// Selection byte range (mark..cursor, normalised)
    pub selection: Option<Range<usize>>,
    /// Search match byte range to highlight
    pub highlight: Option<Range<usize>>,
    /// Line-comment token of the buffer's language
    pub comment_token: Option<&'a str>,
    /// Status-line text, already composed by the editor
    pub status: &'a str,
    /// Whether this window is the current one (status line emphasis)
    pub focused: bool,
}

/// Rectangle of a window on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: usize,
    pub y: usize,
    pub w: usize,
    pub h: usize,
}

/// Per-window viewport
#[derive(Debug)]
pub struct View {
    pub top_line: usize,
    pub top_col: usize,
    /// Display column of the cursor from the line start
    pub cursor_x: usize,
    /// Row of the cursor below `top_line`
    pub cursor_y: usize,
    dirty: Dirty,
    /// (buffer revision, cursor byte pos) -> line, avoiding a line lookup
    /// on every motion that stays put
    line_cache: Option<(u64, usize, usize)>,
}

impl View {
    pub fn new() -> Self {
        Self {
            top_line: 0,
            top_col: 0,
            cursor_x: 0,
            cursor_y: 0,
            dirty: Dirty::Full,
            line_cache: None,
        }
    }

    /// Mark one line as needing composition
    pub fn mark_line(&mut self, line: usize) {
        if let Dirty::Lines(set) = &mut self.dirty {
            set.insert(line);
        }
    }

    pub fn mark_full_redraw(&mut self) {
        self.dirty = Dirty::Full;
    }

    pub fn is_dirty(&self) -> bool {
        match &self.dirty {
            Dirty::Full => true,
            Dirty::Lines(set) => !set.is_empty(),
        }
    }

    fn line_is_dirty(&self, line: usize) -> bool {
        match &self.dirty {
            Dirty::Full => true,
            Dirty::Lines(set) => set.contains(&line),
        }
    }

    /// Line containing the cursor, cached per buffer revision
    pub fn cursor_line(&mut self, buf: &Buffer, cursor: usize) -> usize {
        if let Some((rev, pos, line)) = self.line_cache {
            if rev == buf.revision() && pos == cursor {
                return line;
            }
        }
        let line = buf.find_line_by_pos(cursor);
        self.line_cache = Some((buf.revision(), cursor, line));
        line
    }

    /// Gutter width for a buffer: line-number digits plus one space
    pub fn gutter_width(buf: &Buffer) -> usize {
        let mut digits = 1;
        let mut n = buf.line_count();
        while n >= 10 {
            digits += 1;
            n /= 10;
        }
        digits + 1
    }

    /// Scroll so the cursor is inside the text area of `rect`, updating the
    /// display cursor. Returns (row, col) of the cursor on screen.
    pub fn ensure_visible(
        &mut self,
        buf: &Buffer,
        cursor: usize,
        rect: Rect,
    ) -> (usize, usize) {
        let text_h = rect.h.saturating_sub(1).max(1);
        let gutter = Self::gutter_width(buf);
        let usable = rect.w.saturating_sub(gutter).max(1);

        let line = self.cursor_line(buf, cursor);
        if line < self.top_line {
            self.top_line = line;
            self.mark_full_redraw();
        }
        if line >= self.top_line + text_h {
            self.top_line = line + 1 - text_h;
            self.mark_full_redraw();
        }
        self.cursor_y = line - self.top_line;

        let range = buf.line_range(line);
        let bytes = buf.slice_to_vec(range.start..cursor.min(range.end).max(range.start));
        self.cursor_x = grapheme::width_up_to(&bytes, bytes.len(), TAB_WIDTH);

        if self.cursor_x < self.top_col {
            self.top_col = self.cursor_x;
            self.mark_full_redraw();
        }
        if self.cursor_x >= self.top_col + usable {
            self.top_col = self.cursor_x + 1 - usable;
            self.mark_full_redraw();
        }

        (rect.y + self.cursor_y, rect.x + gutter + self.cursor_x - self.top_col)
    }

    /// Scroll by whole lines (wheel); cursor is not moved here
    pub fn scroll(&mut self, lines: isize, max_top: usize) {
        let new_top = if lines < 0 {
            self.top_line.saturating_sub(lines.unsigned_abs())
        } else {
            (self.top_line + lines as usize).min(max_top)
        };
        if new_top != self.top_line {
            self.top_line = new_top;
            self.mark_full_redraw();
        }
    }

    /// Compose this window's cells into the grid and clear the dirty set
    pub fn render(&mut self, buf: &Buffer, rect: Rect, grid: &mut Grid, ctx: &RenderCtx<'_>) {
        let text_h = rect.h.saturating_sub(1).max(1);
        let gutter = Self::gutter_width(buf);
        let usable = rect.w.saturating_sub(gutter);

        for row in 0..text_h {
            let line = self.top_line + row;
            if line >= buf.line_count() {
                if self.line_is_dirty(line) || matches!(self.dirty, Dirty::Full) {
                    self.blank_row(rect, row, gutter, grid);
                }
                continue;
            }
            if !self.line_is_dirty(line) {
                continue;
            }
            self.render_line(buf, line, rect, row, gutter, usable, grid, ctx);
        }

        self.render_status(rect, grid, ctx);
        self.dirty = Dirty::Lines(BTreeSet::new());
    }

    fn blank_row(&self, rect: Rect, row: usize, _gutter: usize, grid: &mut Grid) {
        for col in 0..rect.w {
            grid.set_cell(rect.y + row, rect.x + col, Cell::empty());
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn render_line(
        &self,
        buf: &Buffer,
        line: usize,
        rect: Rect,
        row: usize,
        gutter: usize,
        usable: usize,
        grid: &mut Grid,
        ctx: &RenderCtx<'_>,
    ) {
        let y = rect.y + row;
        // Gutter: right-aligned 1-based line number
        let number = format!("{:>width$} ", line + 1, width = gutter - 1);
        for (i, ch) in number.chars().enumerate().take(gutter) {
            grid.set_cell(
                y,
                rect.x + i,
                Cell {
                    ch,
                    fg: Some(GUTTER_FG),
                    bg: None,
                    reverse: false,
                },
            );
        }

        let range = buf.line_range(line);
        let bytes = buf.slice_to_vec(range.clone());
        let comment_from = ctx
            .comment_token
            .and_then(|tok| memmem::find(&bytes, tok.as_bytes()));

        // Clear the text area first so stale cells never survive
        for col in 0..usable {
            grid.set_cell(y, rect.x + gutter + col, Cell::empty());
        }

        let right_edge = self.top_col + usable;
        let mut col = 0;
        for cluster in Clusters::new(&bytes) {
            if col >= right_edge {
                break;
            }
            let width = if cluster.base == '\t' {
                TAB_WIDTH - (col % TAB_WIDTH)
            } else {
                cluster.width
            };
            if width == 0 {
                // Combining-only cluster folded into the previous cell
                continue;
            }
            let abs = range.start + cluster.offset;
            let in_selection = ctx
                .selection
                .as_ref()
                .is_some_and(|sel| sel.contains(&abs));
            let in_match = ctx.highlight.as_ref().is_some_and(|m| m.contains(&abs));
            let in_comment = comment_from.is_some_and(|from| cluster.offset >= from);

            let bg = if in_match {
                Some(MATCH_BG)
            } else if in_selection {
                Some(SELECTION_BG)
            } else {
                None
            };

            let cells: Vec<Cell> = if cluster.base == '\t' {
                std::iter::repeat(Cell {
                    ch: ' ',
                    fg: None,
                    bg,
                    reverse: false,
                })
                .take(width)
                .collect()
            } else if grapheme::is_control(cluster.base) {
                let caret = grapheme::control_caret(cluster.bytes[0]);
                caret
                    .iter()
                    .map(|&ch| Cell {
                        ch,
                        fg: Some(CONTROL_FG),
                        bg,
                        reverse: false,
                    })
                    .collect()
            } else {
                let fg = if in_comment { Some(COMMENT_FG) } else { None };
                let mut v = vec![Cell {
                    ch: cluster.base,
                    fg,
                    bg,
                    reverse: false,
                }];
                if width == 2 {
                    v.push(Cell::continuation());
                }
                v
            };

            for (i, cell) in cells.into_iter().enumerate() {
                let display = col + i;
                if display < self.top_col || display >= right_edge {
                    continue;
                }
                let screen_col = rect.x + gutter + display - self.top_col;
                // The left half of a wide glyph scrolled off: show a blank
                let cell = if cell.is_continuation() && display == self.top_col {
                    Cell::empty()
                } else {
                    cell
                };
                grid.set_cell(y, screen_col, cell);
            }
            col += width;
        }
    }

    fn render_status(&self, rect: Rect, grid: &mut Grid, ctx: &RenderCtx<'_>) {
        let y = rect.y + rect.h.saturating_sub(1);
        let mut chars = ctx.status.chars();
        for col in 0..rect.w {
            let ch = chars.next().unwrap_or(' ');
            grid.set_cell(
                y,
                rect.x + col,
                Cell {
                    ch,
                    fg: None,
                    bg: if ctx.focused {
                        None
                    } else {
                        Some(Color::DarkGrey)
                    },
                    reverse: ctx.focused,
                },
            );
        }
    }
}

impl Default for View {
    fn default() -> Self {
        Self::new()
    }
}
