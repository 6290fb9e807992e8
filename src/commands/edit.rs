//! Editing operations over the current buffer

use crate::editor::Editor;
use crate::error::{Result, ZeError};
use crate::language::IndentStyle;

use super::motion;

/// Active region (mark..cursor normalised); errors when absent or empty
fn region(ed: &Editor) -> Result<std::ops::Range<usize>> {
    let bs = ed.current_ref();
    let mark = bs.ctx.mark.ok_or(ZeError::NoMark)?;
    let cursor = bs.ctx.cursor;
    if mark == cursor {
        return Err(ZeError::NoActiveRegion);
    }
    Ok(mark.min(cursor)..mark.max(cursor))
}

pub fn self_insert(ed: &mut Editor, c: char) -> Result<()> {
    let mut bytes = [0u8; 4];
    let s = c.encode_utf8(&mut bytes).to_owned();
    ed.insert_at_cursor(s.as_bytes())
}

pub fn newline(ed: &mut Editor) -> Result<()> {
    ed.insert_at_cursor(b"\n")
}

/// `C-d`: delete the cluster under the cursor; a no-op at end of buffer
pub fn delete_char(ed: &mut Editor) -> Result<()> {
    let bs = ed.current_ref();
    let pos = bs.ctx.cursor;
    if pos >= bs.buffer.len() {
        return Ok(());
    }
    let end = motion::forward_char(&bs.buffer, pos)?;
    ed.delete_range(pos..end)?;
    Ok(())
}

pub fn delete_backward(ed: &mut Editor) -> Result<()> {
    let bs = ed.current_ref();
    let pos = bs.ctx.cursor;
    if pos == 0 {
        return Err(ZeError::BeginningOfBuffer);
    }
    let start = motion::backward_char(&bs.buffer, pos)?;
    ed.delete_range(start..pos)?;
    Ok(())
}

/// Kill-whole-line flavoured `C-k`: at column 0 the whole line goes
/// including its newline, at line end just the newline, anywhere else the
/// rest of the line
pub fn kill_line(ed: &mut Editor) -> Result<()> {
    let bs = ed.current_ref();
    let pos = bs.ctx.cursor;
    let line = bs.buffer.find_line_by_pos(pos);
    let content = bs.buffer.line_range(line);
    let with_nl = bs.buffer.line_range_with_newline(line);
    let range = if pos == content.start {
        with_nl
    } else if pos >= content.end {
        if with_nl.end == content.end {
            return Err(ZeError::EndOfBuffer);
        }
        content.end..with_nl.end
    } else {
        pos..content.end
    };
    let killed = ed.delete_range(range)?;
    ed.kill_ring.kill(&killed);
    Ok(())
}

pub fn kill_region(ed: &mut Editor) -> Result<()> {
    let range = region(ed)?;
    let killed = ed.delete_range(range)?;
    ed.kill_ring.kill(&killed);
    let bs = ed.current();
    bs.ctx.mark = None;
    Ok(())
}

pub fn copy_region(ed: &mut Editor) -> Result<()> {
    let range = region(ed)?;
    let bytes = ed.current_ref().buffer.slice_to_vec(range);
    ed.kill_ring.kill(&bytes);
    let id = ed.current_buffer_id();
    let bs = ed.current();
    bs.ctx.mark = None;
    ed.mark_all_views(id);
    ed.set_status("Copied");
    Ok(())
}

pub fn yank(ed: &mut Editor) -> Result<()> {
    let bytes = ed
        .kill_ring
        .get()
        .ok_or(ZeError::KillRingEmpty)?
        .to_vec();
    let bs = ed.current();
    bs.ctx.begin_group();
    let result = ed.insert_at_cursor(&bytes);
    ed.current().ctx.end_group();
    result
}

pub fn kill_word_forward(ed: &mut Editor) -> Result<()> {
    let bs = ed.current_ref();
    let pos = bs.ctx.cursor;
    let end = motion::forward_word(&bs.buffer, pos)?;
    let killed = ed.delete_range(pos..end)?;
    ed.kill_ring.kill(&killed);
    Ok(())
}

pub fn kill_word_backward(ed: &mut Editor) -> Result<()> {
    let bs = ed.current_ref();
    let pos = bs.ctx.cursor;
    let start = motion::backward_word(&bs.buffer, pos)?;
    let killed = ed.delete_range(start..pos)?;
    ed.kill_ring.kill(&killed);
    Ok(())
}

pub fn undo(ed: &mut Editor) -> Result<()> {
    let id = ed.current_buffer_id();
    let bs = ed.buffers.get_mut(id).expect("window buffer exists");
    let Some(cursor) = split_undo(bs) else {
        ed.set_status("Nothing to undo");
        return Ok(());
    };
    bs.ctx.cursor = cursor.min(bs.buffer.len());
    ed.mark_all_views(id);
    Ok(())
}

fn split_undo(bs: &mut crate::buffers::BufferState) -> Option<usize> {
    let crate::buffers::BufferState { buffer, ctx, .. } = bs;
    ctx.undo(buffer)
}

pub fn redo(ed: &mut Editor) -> Result<()> {
    let id = ed.current_buffer_id();
    let bs = ed.buffers.get_mut(id).expect("window buffer exists");
    let crate::buffers::BufferState { buffer, ctx, .. } = bs;
    let Some(cursor) = ctx.redo(buffer) else {
        ed.set_status("Nothing to redo");
        return Ok(());
    };
    bs.ctx.cursor = cursor.min(bs.buffer.len());
    ed.mark_all_views(id);
    Ok(())
}

/// Join this line with the next, collapsing the junction to one space
pub fn join_line(ed: &mut Editor) -> Result<()> {
    let bs = ed.current_ref();
    let pos = bs.ctx.cursor;
    let line = bs.buffer.find_line_by_pos(pos);
    if line + 1 >= bs.buffer.line_count() {
        return Err(ZeError::EndOfBuffer);
    }
    let content_end = bs.buffer.line_range(line).end;
    let next = bs.buffer.line_range(line + 1);
    let next_bytes = bs.buffer.slice_to_vec(next.clone());
    let indent = next_bytes
        .iter()
        .take_while(|b| **b == b' ' || **b == b'\t')
        .count();
    // Newline plus the next line's indentation become one space
    ed.replace_range(content_end..next.start + indent, b" ")?;
    let bs = ed.current();
    bs.ctx.cursor = content_end;
    Ok(())
}

/// Comment or uncomment every line the region (or cursor) touches
pub fn toggle_comment(ed: &mut Editor) -> Result<()> {
    let bs = ed.current_ref();
    let Some(token) = bs.language.line_comment else {
        ed.set_status("No line comment syntax");
        return Ok(());
    };
    let token = token.to_owned();
    let cursor = bs.ctx.cursor;
    let (first, last) = match bs.ctx.mark {
        Some(mark) if mark != cursor => {
            let lo = bs.buffer.find_line_by_pos(mark.min(cursor));
            let hi = bs.buffer.find_line_by_pos(mark.max(cursor));
            (lo, hi)
        }
        _ => {
            let line = bs.buffer.find_line_by_pos(cursor);
            (line, line)
        }
    };

    // Commented when every non-blank line in range starts with the token
    let mut any_content = false;
    let mut all_commented = true;
    for line in first..=last {
        let bytes = ed.current_ref().buffer.line_to_vec(line);
        let trimmed: Vec<u8> = bytes
            .iter()
            .copied()
            .skip_while(|b| *b == b' ' || *b == b'\t')
            .collect();
        if trimmed.is_empty() {
            continue;
        }
        any_content = true;
        if !trimmed.starts_with(token.as_bytes()) {
            all_commented = false;
        }
    }
    if !any_content {
        return Ok(());
    }

    ed.current().ctx.begin_group();
    for line in (first..=last).rev() {
        let range = ed.current_ref().buffer.line_range(line);
        let bytes = ed.current_ref().buffer.line_to_vec(line);
        let indent = bytes
            .iter()
            .take_while(|b| **b == b' ' || **b == b'\t')
            .count();
        if indent == bytes.len() {
            continue;
        }
        if all_commented {
            let mut cut = token.len();
            if bytes.get(indent + cut) == Some(&b' ') {
                cut += 1;
            }
            ed.delete_range(range.start + indent..range.start + indent + cut)?;
        } else {
            let mut insert = token.clone().into_bytes();
            insert.push(b' ');
            let at = range.start + indent;
            let id = ed.current_buffer_id();
            let bs = ed.buffers.get_mut(id).expect("window buffer exists");
            bs.buffer.insert(at, &insert);
            bs.ctx.record_insert(at, &insert, bs.ctx.cursor);
            if bs.ctx.cursor >= at {
                bs.ctx.cursor += insert.len();
            }
            ed.mark_edit(id, line, false);
        }
    }
    {
        let bs = ed.current();
        bs.ctx.cursor = bs.ctx.cursor.min(bs.buffer.len());
        bs.ctx.end_group();
    }
    Ok(())
}

/// Swap the cursor line with a neighbour, keeping the cursor column
pub fn move_line(ed: &mut Editor, up: bool) -> Result<()> {
    let bs = ed.current_ref();
    let pos = bs.ctx.cursor;
    let line = bs.buffer.find_line_by_pos(pos);
    if up && line == 0 {
        return Err(ZeError::BeginningOfBuffer);
    }
    if !up && line + 1 >= bs.buffer.line_count() {
        return Err(ZeError::EndOfBuffer);
    }
    let (a, b) = if up { (line - 1, line) } else { (line, line + 1) };
    let col = pos - bs.buffer.get_line_start(line);

    let a_bytes = bs.buffer.line_to_vec(a);
    let b_bytes = bs.buffer.line_to_vec(b);
    let start = bs.buffer.get_line_start(a);
    let end = bs.buffer.line_range_with_newline(b).end;
    let trailing_newline = bs.buffer.line_range(b).end < end;

    let mut new = Vec::with_capacity(end - start);
    new.extend_from_slice(&b_bytes);
    new.push(b'\n');
    new.extend_from_slice(&a_bytes);
    if trailing_newline {
        new.push(b'\n');
    }
    ed.replace_range(start..end, &new)?;

    let bs = ed.current();
    let new_cursor = if up {
        start + col.min(b_bytes.len())
    } else {
        start + b_bytes.len() + 1 + col.min(a_bytes.len())
    };
    bs.ctx.cursor = new_cursor.min(bs.buffer.len());
    Ok(())
}

pub fn duplicate_line(ed: &mut Editor) -> Result<()> {
    let bs = ed.current_ref();
    let pos = bs.ctx.cursor;
    let line = bs.buffer.find_line_by_pos(pos);
    let content = bs.buffer.line_to_vec(line);
    let with_nl = bs.buffer.line_range_with_newline(line);
    let has_newline = with_nl.end > bs.buffer.line_range(line).end;

    let (at, text) = if has_newline {
        let mut t = content;
        t.push(b'\n');
        (with_nl.end, t)
    } else {
        // Last line without newline: duplicate below it
        let mut t = vec![b'\n'];
        t.extend_from_slice(&content);
        (with_nl.end, t)
    };
    let id = ed.current_buffer_id();
    let bs = ed.buffers.get_mut(id).expect("window buffer exists");
    let cursor_before = bs.ctx.cursor;
    bs.buffer.insert(at, &text);
    bs.ctx.record_insert(at, &text, cursor_before);
    bs.ctx.break_coalescing();
    ed.mark_all_views(id);
    Ok(())
}

fn indent_unit(ed: &Editor) -> Vec<u8> {
    let lang = ed.current_ref().language;
    match lang.indent_style {
        IndentStyle::Tabs => b"\t".to_vec(),
        IndentStyle::Spaces => vec![b' '; lang.indent_width],
    }
}

/// Tab: indent the region when a mark is active, insert indentation
/// otherwise
pub fn tab(ed: &mut Editor) -> Result<()> {
    let bs = ed.current_ref();
    if bs.ctx.mark.is_some_and(|m| m != bs.ctx.cursor) {
        return indent_region(ed, true);
    }
    let unit = indent_unit(ed);
    ed.insert_at_cursor(&unit)
}

pub fn indent_region(ed: &mut Editor, indent: bool) -> Result<()> {
    let bs = ed.current_ref();
    let cursor = bs.ctx.cursor;
    let (first, last) = match bs.ctx.mark {
        Some(mark) if mark != cursor => {
            let lo = bs.buffer.find_line_by_pos(mark.min(cursor));
            let hi = bs.buffer.find_line_by_pos(mark.max(cursor));
            (lo, hi)
        }
        _ => {
            let line = bs.buffer.find_line_by_pos(cursor);
            (line, line)
        }
    };
    let unit = indent_unit(ed);
    let width = ed.current_ref().language.indent_width;

    ed.current().ctx.begin_group();
    for line in (first..=last).rev() {
        let range = ed.current_ref().buffer.line_range(line);
        let bytes = ed.current_ref().buffer.line_to_vec(line);
        if indent {
            if bytes.is_empty() {
                continue;
            }
            let id = ed.current_buffer_id();
            let bs = ed.buffers.get_mut(id).expect("window buffer exists");
            bs.buffer.insert(range.start, &unit);
            bs.ctx.record_insert(range.start, &unit, bs.ctx.cursor);
            if bs.ctx.cursor >= range.start {
                bs.ctx.cursor += unit.len();
            }
            ed.mark_edit(id, line, false);
        } else {
            // Strip one tab or up to indent_width leading spaces
            let cut = if bytes.first() == Some(&b'\t') {
                1
            } else {
                bytes.iter().take_while(|b| **b == b' ').count().min(width)
            };
            if cut > 0 {
                ed.delete_range(range.start..range.start + cut)?;
            }
        }
    }
    ed.current().ctx.end_group();
    Ok(())
}
