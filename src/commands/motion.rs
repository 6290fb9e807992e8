//! Cursor motion primitives
//!
//! All functions return a new byte position that lies on both a UTF-8 and a
//! grapheme-cluster boundary, or the boundary error for the buffer edge.

use crate::buffer::Buffer;
use crate::error::{Result, ZeError};
use crate::grapheme::{self, CharClass};
use crate::view::TAB_WIDTH;

/// Display column of `pos` within its line
pub fn display_col(buf: &Buffer, pos: usize) -> usize {
    let line = buf.find_line_by_pos(pos);
    let range = buf.line_range(line);
    let upto = pos.clamp(range.start, range.end);
    let bytes = buf.slice_to_vec(range.start..upto);
    grapheme::width_up_to(&bytes, bytes.len(), TAB_WIDTH)
}

/// Byte position on `line` closest to display column `col` (cluster-aligned)
pub fn pos_at_col(buf: &Buffer, line: usize, col: usize) -> usize {
    let range = buf.line_range(line);
    let bytes = buf.slice_to_vec(range.clone());
    range.start + byte_for_col(&bytes, col).0
}

/// Byte offset within a line slice where display column `col` is reached,
/// plus the column actually reached (short lines stop early)
pub fn byte_for_col(bytes: &[u8], col: usize) -> (usize, usize) {
    let mut at = 0;
    for cluster in grapheme::Clusters::new(bytes) {
        if at >= col {
            return (cluster.offset, at);
        }
        let width = if cluster.base == '\t' {
            TAB_WIDTH - (at % TAB_WIDTH)
        } else {
            cluster.width
        };
        if at + width > col {
            // Inside a wide glyph or tab: snap to its start
            return (cluster.offset, at);
        }
        at += width;
    }
    (bytes.len(), at)
}

/// Total display width of a line slice
pub fn line_width(bytes: &[u8]) -> usize {
    grapheme::width_up_to(bytes, bytes.len(), TAB_WIDTH)
}

pub fn forward_char(buf: &Buffer, pos: usize) -> Result<usize> {
    if pos >= buf.len() {
        return Err(ZeError::EndOfBuffer);
    }
    if buf.byte_at(pos) == b'\n' {
        return Ok(pos + 1);
    }
    let line = buf.find_line_by_pos(pos);
    let range = buf.line_range(line);
    let bytes = buf.slice_to_vec(range.clone());
    Ok(range.start + grapheme::next_boundary(&bytes, pos - range.start))
}

pub fn backward_char(buf: &Buffer, pos: usize) -> Result<usize> {
    if pos == 0 {
        return Err(ZeError::BeginningOfBuffer);
    }
    if buf.byte_at(pos - 1) == b'\n' {
        return Ok(pos - 1);
    }
    let line = buf.find_line_by_pos(pos);
    let range = buf.line_range(line);
    let bytes = buf.slice_to_vec(range.clone());
    Ok(range.start + grapheme::prev_boundary(&bytes, pos - range.start))
}

pub fn next_line(buf: &Buffer, pos: usize) -> Result<usize> {
    let line = buf.find_line_by_pos(pos);
    if line + 1 >= buf.line_count() {
        return Err(ZeError::EndOfBuffer);
    }
    let col = display_col(buf, pos);
    Ok(pos_at_col(buf, line + 1, col))
}

pub fn prev_line(buf: &Buffer, pos: usize) -> Result<usize> {
    let line = buf.find_line_by_pos(pos);
    if line == 0 {
        return Err(ZeError::BeginningOfBuffer);
    }
    let col = display_col(buf, pos);
    Ok(pos_at_col(buf, line - 1, col))
}

pub fn line_start(buf: &Buffer, pos: usize) -> usize {
    let line = buf.find_line_by_pos(pos);
    buf.get_line_start(line)
}

pub fn line_end(buf: &Buffer, pos: usize) -> usize {
    let line = buf.find_line_by_pos(pos);
    buf.line_range(line).end
}

fn char_before(buf: &Buffer, pos: usize) -> Option<(char, usize)> {
    if pos == 0 {
        return None;
    }
    let start = buf.find_utf8_char_start(pos - 1);
    Some((buf.decode_codepoint_at(start).0, start))
}

fn char_at(buf: &Buffer, pos: usize) -> Option<(char, usize)> {
    if pos >= buf.len() {
        return None;
    }
    let (c, len) = buf.decode_codepoint_at(pos);
    Some((c, len))
}

/// Move to the start of the next word
pub fn forward_word(buf: &Buffer, pos: usize) -> Result<usize> {
    if pos >= buf.len() {
        return Err(ZeError::EndOfBuffer);
    }
    let mut at = pos;
    // Leave the word under the cursor
    while let Some((c, len)) = char_at(buf, at) {
        if grapheme::classify(c) != CharClass::Word {
            break;
        }
        at += len;
    }
    // Skip separators to the next word start
    while let Some((c, len)) = char_at(buf, at) {
        if grapheme::classify(c) == CharClass::Word {
            break;
        }
        at += len;
    }
    Ok(at)
}

/// Move to the start of the previous word
pub fn backward_word(buf: &Buffer, pos: usize) -> Result<usize> {
    if pos == 0 {
        return Err(ZeError::BeginningOfBuffer);
    }
    let mut at = pos;
    while let Some((c, start)) = char_before(buf, at) {
        if grapheme::classify(c) == CharClass::Word {
            break;
        }
        at = start;
    }
    while let Some((c, start)) = char_before(buf, at) {
        if grapheme::classify(c) != CharClass::Word {
            break;
        }
        at = start;
    }
    Ok(at)
}

fn line_is_blank(buf: &Buffer, line: usize) -> bool {
    let range = buf.line_range(line);
    buf.slice_to_vec(range)
        .iter()
        .all(|b| b.is_ascii_whitespace())
}

/// Next blank line after the current paragraph, or buffer end
pub fn forward_paragraph(buf: &Buffer, pos: usize) -> Result<usize> {
    if pos >= buf.len() {
        return Err(ZeError::EndOfBuffer);
    }
    let mut line = buf.find_line_by_pos(pos);
    // Step off a separator first
    while line + 1 < buf.line_count() && line_is_blank(buf, line) {
        line += 1;
    }
    while line + 1 < buf.line_count() {
        line += 1;
        if line_is_blank(buf, line) {
            return Ok(buf.get_line_start(line));
        }
    }
    Ok(buf.len())
}

/// Previous blank line before the current paragraph, or buffer start
pub fn backward_paragraph(buf: &Buffer, pos: usize) -> Result<usize> {
    if pos == 0 {
        return Err(ZeError::BeginningOfBuffer);
    }
    let mut line = buf.find_line_by_pos(pos);
    while line > 0 && line_is_blank(buf, line) {
        line -= 1;
    }
    while line > 0 {
        line -= 1;
        if line_is_blank(buf, line) {
            return Ok(buf.get_line_start(line));
        }
    }
    Ok(0)
}

/// Move `n` lines down, clamping at the last line
pub fn lines_down(buf: &Buffer, pos: usize, n: usize) -> usize {
    let line = buf.find_line_by_pos(pos);
    let target = (line + n).min(buf.line_count() - 1);
    let col = display_col(buf, pos);
    pos_at_col(buf, target, col)
}

/// Move `n` lines up, clamping at the first line
pub fn lines_up(buf: &Buffer, pos: usize, n: usize) -> usize {
    let line = buf.find_line_by_pos(pos);
    let target = line.saturating_sub(n);
    let col = display_col(buf, pos);
    pos_at_col(buf, target, col)
}
