//! Rectangle kill, copy, yank
//!
//! A rectangle is spanned by the mark and cursor corners in (line, display
//! column) space. Kill collapses the spanned columns on every line; yank
//! re-inserts the stored block at the cursor column, padding short lines
//! with spaces, which matches the usual Emacs semantics.

use crate::editor::Editor;
use crate::error::{Result, ZeError};

use super::motion;

/// Corners of the rectangle: (first line, last line, left col, right col)
fn corners(ed: &Editor) -> Result<(usize, usize, usize, usize)> {
    let bs = ed.current_ref();
    let mark = bs.ctx.mark.ok_or(ZeError::NoMark)?;
    let cursor = bs.ctx.cursor;
    if mark == cursor {
        return Err(ZeError::NoActiveRegion);
    }
    let l1 = bs.buffer.find_line_by_pos(mark);
    let l2 = bs.buffer.find_line_by_pos(cursor);
    let c1 = motion::display_col(&bs.buffer, mark);
    let c2 = motion::display_col(&bs.buffer, cursor);
    Ok((l1.min(l2), l1.max(l2), c1.min(c2), c1.max(c2)))
}

/// Per-line byte ranges covered by the column span, top to bottom
fn spans(ed: &Editor, first: usize, last: usize, left: usize, right: usize) -> Vec<std::ops::Range<usize>> {
    let bs = ed.current_ref();
    let mut out = Vec::with_capacity(last - first + 1);
    for line in first..=last {
        let range = bs.buffer.line_range(line);
        let bytes = bs.buffer.slice_to_vec(range.clone());
        let (b1, _) = motion::byte_for_col(&bytes, left);
        let (b2, _) = motion::byte_for_col(&bytes, right);
        out.push(range.start + b1..range.start + b2);
    }
    out
}

pub fn kill(ed: &mut Editor) -> Result<()> {
    let (first, last, left, right) = corners(ed)?;
    let spans = spans(ed, first, last, left, right);
    let block: Vec<Vec<u8>> = spans
        .iter()
        .map(|r| ed.current_ref().buffer.slice_to_vec(r.clone()))
        .collect();

    ed.current().ctx.begin_group();
    // Bottom-up so earlier byte offsets stay valid
    for span in spans.iter().rev() {
        ed.delete_range(span.clone())?;
    }
    ed.current().ctx.end_group();
    ed.rect_ring.kill(block);

    let bs = ed.current();
    bs.ctx.mark = None;
    bs.ctx.cursor = spans.first().map(|s| s.start).unwrap_or(0);
    let id = ed.current_buffer_id();
    ed.mark_all_views(id);
    Ok(())
}

pub fn copy(ed: &mut Editor) -> Result<()> {
    let (first, last, left, right) = corners(ed)?;
    let spans = spans(ed, first, last, left, right);
    let block: Vec<Vec<u8>> = spans
        .iter()
        .map(|r| ed.current_ref().buffer.slice_to_vec(r.clone()))
        .collect();
    ed.rect_ring.kill(block);
    let bs = ed.current();
    bs.ctx.mark = None;
    let id = ed.current_buffer_id();
    ed.mark_all_views(id);
    ed.set_status("Rectangle copied");
    Ok(())
}

pub fn yank(ed: &mut Editor) -> Result<()> {
    let block: Vec<Vec<u8>> = ed
        .rect_ring
        .get()
        .ok_or(ZeError::KillRingEmpty)?
        .to_vec();
    let bs = ed.current_ref();
    let anchor = bs.ctx.cursor;
    let anchor_line = bs.buffer.find_line_by_pos(anchor);
    let col = motion::display_col(&bs.buffer, anchor);

    ed.current().ctx.begin_group();
    for (i, row) in block.iter().enumerate() {
        let target = anchor_line + i;
        // Grow the buffer when the block reaches past the last line
        while target >= ed.current_ref().buffer.line_count() {
            let end = ed.current_ref().buffer.len();
            let bs = ed.current();
            bs.ctx.cursor = end;
            ed.insert_at_cursor(b"\n")?;
        }
        let range = ed.current_ref().buffer.line_range(target);
        let bytes = ed.current_ref().buffer.slice_to_vec(range.clone());
        let (b, reached) = motion::byte_for_col(&bytes, col);
        let mut text = Vec::with_capacity(row.len() + col.saturating_sub(reached));
        // Short line: pad with spaces up to the target column
        text.extend(std::iter::repeat(b' ').take(col.saturating_sub(reached)));
        text.extend_from_slice(row);
        let bs = ed.current();
        bs.ctx.cursor = range.start + b;
        ed.insert_at_cursor(&text)?;
    }
    ed.current().ctx.end_group();

    let bs = ed.current();
    bs.ctx.cursor = anchor;
    let id = ed.current_buffer_id();
    ed.mark_all_views(id);
    Ok(())
}
