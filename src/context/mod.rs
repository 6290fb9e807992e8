//! Per-buffer editing state: cursor, mark, undo/redo
//!
//! Every buffer mutation is recorded here after it has been applied, so a
//! failed operation never leaves a bogus undo entry. Consecutive small edits
//! of the same kind coalesce into one entry; compound operations bracket
//! themselves in group markers so one undo reverses them wholly.

use std::time::{Duration, Instant};

use crate::buffer::Buffer;
use crate::constants::limits::{UNDO_COALESCE_TIMEOUT_MS, UNDO_DEPTH};

/// One reversible step on the undo stack, carrying the pre-op cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOp {
    Insert {
        pos: usize,
        text: Vec<u8>,
        cursor: usize,
    },
    Delete {
        pos: usize,
        text: Vec<u8>,
        cursor: usize,
    },
    Replace {
        pos: usize,
        old: Vec<u8>,
        new: Vec<u8>,
        cursor: usize,
    },
    GroupBegin {
        cursor: usize,
    },
    GroupEnd {
        cursor: usize,
    },
}

/// Kind of the last recorded edit, for the coalescing test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Insert,
    Delete,
    Other,
}

/// Cut/copy slot. Single owned vector whose allocation is reused across
/// kills; yank copies out so undo never aliases it.
#[derive(Debug, Default)]
pub struct KillRing {
    data: Vec<u8>,
    filled: bool,
}

impl KillRing {
    pub fn kill(&mut self, bytes: &[u8]) {
        self.data.clear();
        self.data.extend_from_slice(bytes);
        self.filled = true;
    }

    pub fn get(&self) -> Option<&[u8]> {
        self.filled.then_some(self.data.as_slice())
    }
}

/// Rectangle slot, disjoint from the kill ring: yank never pastes a rectangle
#[derive(Debug, Default)]
pub struct RectRing {
    lines: Vec<Vec<u8>>,
    filled: bool,
}

impl RectRing {
    pub fn kill(&mut self, lines: Vec<Vec<u8>>) {
        self.lines = lines;
        self.filled = true;
    }

    pub fn get(&self) -> Option<&[Vec<u8>]> {
        self.filled.then_some(self.lines.as_slice())
    }
}

/// Editing context bound to one buffer
#[derive(Debug)]
pub struct EditContext {
    pub cursor: usize,
    pub mark: Option<usize>,
    undo_stack: Vec<EditOp>,
    redo_stack: Vec<EditOp>,
    savepoint: Option<usize>,
    group_depth: u32,
    last_op_kind: OpKind,
    last_op_time: Instant,
}

impl EditContext {
    pub fn new() -> Self {
        Self {
            cursor: 0,
            mark: None,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            savepoint: Some(0),
            group_depth: 0,
            last_op_kind: OpKind::Other,
            last_op_time: Instant::now(),
        }
    }

    pub fn modified(&self) -> bool {
        match self.savepoint {
            Some(sp) => self.undo_stack.len() != sp,
            None => !self.undo_stack.is_empty(),
        }
    }

    /// Record the current stack depth as the saved state
    pub fn mark_saved(&mut self) {
        self.savepoint = Some(self.undo_stack.len());
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Stop the next edit from coalescing with the previous one
    pub fn break_coalescing(&mut self) {
        self.last_op_kind = OpKind::Other;
    }

    /// Bracket a compound operation; a single undo reverses the whole group
    pub fn begin_group(&mut self) {
        self.redo_stack.clear();
        self.undo_stack.push(EditOp::GroupBegin {
            cursor: self.cursor,
        });
        self.group_depth += 1;
    }

    pub fn end_group(&mut self) {
        if self.group_depth == 0 {
            return;
        }
        self.group_depth -= 1;
        // Drop the bracket entirely when nothing happened inside it
        if matches!(self.undo_stack.last(), Some(EditOp::GroupBegin { .. })) {
            self.undo_stack.pop();
        } else {
            self.undo_stack.push(EditOp::GroupEnd {
                cursor: self.cursor,
            });
        }
        self.last_op_kind = OpKind::Other;
        self.trim();
    }

    pub fn record_insert(&mut self, pos: usize, text: &[u8], cursor_before: usize) {
        self.record_insert_at(pos, text, cursor_before, Instant::now());
    }

    fn coalesce_window(&self, now: Instant) -> bool {
        now.duration_since(self.last_op_time) <= Duration::from_millis(UNDO_COALESCE_TIMEOUT_MS)
    }

    fn record_insert_at(&mut self, pos: usize, text: &[u8], cursor_before: usize, now: Instant) {
        self.redo_stack.clear();
        let coalesced = self.group_depth == 0
            && self.last_op_kind == OpKind::Insert
            && self.coalesce_window(now)
            && matches!(self.undo_stack.last(), Some(EditOp::Insert { pos: p, text: t, .. })
                if p + t.len() == pos);
        if coalesced {
            if let Some(EditOp::Insert { text: t, .. }) = self.undo_stack.last_mut() {
                t.extend_from_slice(text);
            }
        } else {
            self.undo_stack.push(EditOp::Insert {
                pos,
                text: text.to_vec(),
                cursor: cursor_before,
            });
            self.trim();
        }
        self.last_op_kind = OpKind::Insert;
        self.last_op_time = now;
    }

    pub fn record_delete(&mut self, pos: usize, text: Vec<u8>, cursor_before: usize) {
        self.record_delete_at(pos, text, cursor_before, Instant::now());
    }

    fn record_delete_at(&mut self, pos: usize, text: Vec<u8>, cursor_before: usize, now: Instant) {
        self.redo_stack.clear();
        let mut coalesced = false;
        if self.group_depth == 0 && self.last_op_kind == OpKind::Delete && self.coalesce_window(now)
        {
            if let Some(EditOp::Delete { pos: p, text: t, .. }) = self.undo_stack.last_mut() {
                if pos + text.len() == *p {
                    // Backspace run: new bytes precede the recorded ones
                    let mut joined = text.clone();
                    joined.extend_from_slice(t);
                    *t = joined;
                    *p = pos;
                    coalesced = true;
                } else if pos == *p {
                    // Forward-delete run
                    t.extend_from_slice(&text);
                    coalesced = true;
                }
            }
        }
        if !coalesced {
            self.undo_stack.push(EditOp::Delete {
                pos,
                text,
                cursor: cursor_before,
            });
            self.trim();
        }
        self.last_op_kind = OpKind::Delete;
        self.last_op_time = now;
    }

    pub fn record_replace(&mut self, pos: usize, old: Vec<u8>, new: Vec<u8>, cursor_before: usize) {
        self.redo_stack.clear();
        self.undo_stack.push(EditOp::Replace {
            pos,
            old,
            new,
            cursor: cursor_before,
        });
        self.last_op_kind = OpKind::Other;
        self.last_op_time = Instant::now();
        self.trim();
    }

    /// Undo one entry or one whole group. Applies inverses to the buffer and
    /// returns the cursor position saved before the edit.
    pub fn undo(&mut self, buf: &mut Buffer) -> Option<usize> {
        self.last_op_kind = OpKind::Other;
        let op = self.undo_stack.pop()?;
        match op {
            EditOp::GroupEnd { .. } => {
                self.redo_stack.push(op);
                let mut depth = 1u32;
                let mut cursor = 0;
                while let Some(op) = self.undo_stack.pop() {
                    match &op {
                        EditOp::GroupEnd { .. } => depth += 1,
                        EditOp::GroupBegin { cursor: c } => {
                            depth -= 1;
                            if depth == 0 {
                                cursor = *c;
                                self.redo_stack.push(op);
                                break;
                            }
                        }
                        _ => Self::apply_inverse(&op, buf),
                    }
                    self.redo_stack.push(op);
                }
                Some(cursor)
            }
            EditOp::GroupBegin { cursor } => {
                // Unterminated group (recording was aborted); treat as a bare marker
                self.redo_stack.push(op);
                Some(cursor)
            }
            _ => {
                Self::apply_inverse(&op, buf);
                let cursor = Self::op_cursor(&op);
                self.redo_stack.push(op);
                Some(cursor)
            }
        }
    }

    /// Redo one entry or one whole group; returns the cursor after the edit
    pub fn redo(&mut self, buf: &mut Buffer) -> Option<usize> {
        self.last_op_kind = OpKind::Other;
        let op = self.redo_stack.pop()?;
        match op {
            EditOp::GroupBegin { .. } => {
                self.undo_stack.push(op);
                let mut depth = 1u32;
                let mut cursor = 0;
                while let Some(op) = self.redo_stack.pop() {
                    match &op {
                        EditOp::GroupBegin { .. } => depth += 1,
                        EditOp::GroupEnd { cursor: c } => {
                            depth -= 1;
                            if depth == 0 {
                                cursor = *c;
                                self.undo_stack.push(op);
                                break;
                            }
                        }
                        _ => cursor = Self::apply_forward(&op, buf),
                    }
                    self.undo_stack.push(op);
                }
                Some(cursor)
            }
            EditOp::GroupEnd { cursor } => {
                self.undo_stack.push(op);
                Some(cursor)
            }
            _ => {
                let cursor = Self::apply_forward(&op, buf);
                self.undo_stack.push(op);
                Some(cursor)
            }
        }
    }

    fn op_cursor(op: &EditOp) -> usize {
        match op {
            EditOp::Insert { cursor, .. }
            | EditOp::Delete { cursor, .. }
            | EditOp::Replace { cursor, .. }
            | EditOp::GroupBegin { cursor }
            | EditOp::GroupEnd { cursor } => *cursor,
        }
    }

    fn apply_inverse(op: &EditOp, buf: &mut Buffer) {
        match op {
            EditOp::Insert { pos, text, .. } => buf.delete(*pos, text.len()),
            EditOp::Delete { pos, text, .. } => buf.insert(*pos, text),
            EditOp::Replace { pos, old, new, .. } => {
                buf.delete(*pos, new.len());
                buf.insert(*pos, old);
            }
            EditOp::GroupBegin { .. } | EditOp::GroupEnd { .. } => {}
        }
    }

    /// Re-apply an op; returns the natural cursor position after it
    fn apply_forward(op: &EditOp, buf: &mut Buffer) -> usize {
        match op {
            EditOp::Insert { pos, text, .. } => {
                buf.insert(*pos, text);
                pos + text.len()
            }
            EditOp::Delete { pos, text, .. } => {
                buf.delete(*pos, text.len());
                *pos
            }
            EditOp::Replace { pos, old, new, .. } => {
                buf.delete(*pos, old.len());
                buf.insert(*pos, new);
                pos + new.len()
            }
            EditOp::GroupBegin { cursor } | EditOp::GroupEnd { cursor } => *cursor,
        }
    }

    /// Enforce the depth cap, dropping the oldest entry (or oldest whole
    /// group) and shifting the savepoint with it
    fn trim(&mut self) {
        while self.undo_stack.len() > UNDO_DEPTH {
            let removed = if matches!(self.undo_stack.first(), Some(EditOp::GroupBegin { .. })) {
                let mut depth = 0u32;
                let mut end = 0;
                for (i, op) in self.undo_stack.iter().enumerate() {
                    match op {
                        EditOp::GroupBegin { .. } => depth += 1,
                        EditOp::GroupEnd { .. } => {
                            depth -= 1;
                            if depth == 0 {
                                end = i + 1;
                                break;
                            }
                        }
                        _ => {}
                    }
                }
                if end == 0 {
                    // Group still open; drop just the marker
                    end = 1;
                }
                self.undo_stack.drain(..end);
                end
            } else {
                self.undo_stack.remove(0);
                1
            };
            self.savepoint = match self.savepoint {
                Some(sp) if sp >= removed => Some(sp - removed),
                _ => None,
            };
        }
    }

    #[cfg(test)]
    pub(crate) fn record_insert_with_time(
        &mut self,
        pos: usize,
        text: &[u8],
        cursor: usize,
        now: Instant,
    ) {
        self.record_insert_at(pos, text, cursor, now);
    }

    #[cfg(test)]
    pub(crate) fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }
}

impl Default for EditContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
