//! Editor top-level: state, modal dispatch, event loop
//!
//! Single-threaded and cooperative: one poll over stdin, any running
//! subprocess pipes, and the SIGWINCH self-pipe drives everything. Key
//! dispatch goes through the keymap unless a modal state (minibuffer
//! prompt, incremental search, query-replace, confirm) redirects it.

use std::io::{self, Write};
use std::ops::Range;
use std::os::fd::{BorrowedFd, RawFd};
use std::path::PathBuf;

use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

use crate::buffer::file::{self as buffile, FileInfo};
use crate::buffers::{BufferManager, BufferState};
use crate::commands::{self, Command};
use crate::constants::paths;
use crate::constants::ui::SHELL_OUTPUT_NAME;
use crate::context::{KillRing, RectRing};
use crate::error::{Result, ZeError};
use crate::grapheme;
use crate::histfile::History;
use crate::input;
use crate::key::Key;
use crate::keymap::{KeyMap, Lookup, Prefix};
use crate::minibuffer::Minibuffer;
use crate::search::{IncrementalSearch, QueryReplace, SearchService};
use crate::shell::parse::{self, ParsedCommand, Sink, Source};
use crate::shell::{self, CompletionKind, ShellJob};
use crate::term::grid::{Cell, Grid};
use crate::term::reader::KeyReader;
use crate::term::{Size, Terminal, WinchPipe};
use crate::window::WindowManager;

/// What the key dispatcher is currently feeding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Main,
    Prompt(PromptKind),
    ISearch,
    ReplaceAsk,
    Confirm(ConfirmKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptKind {
    FindFile,
    SaveAs,
    Shell,
    GotoLine,
    Language,
    ReplaceFrom,
    ReplaceWith { pattern: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmKind {
    KillBuffer(usize),
    Quit,
    Overwrite { path: PathBuf },
}

/// A subprocess in flight plus where its output goes
pub struct RunningShell {
    pub job: ShellJob,
    pub sink: Sink,
    pub buffer_id: usize,
    pub source_range: Range<usize>,
}

pub struct Editor {
    pub buffers: BufferManager,
    pub windows: WindowManager,
    pub kill_ring: KillRing,
    pub rect_ring: RectRing,
    pub search: SearchService,
    pub keymap: KeyMap,
    pub minibuffer: Minibuffer,
    pub shell_history: History,
    pub search_history: History,
    pub mode: Mode,
    pub prefix: Prefix,
    pub status_msg: Option<String>,
    pub grid: Grid,
    pub screen: Size,
    pub should_quit: bool,
    pub isearch: Option<IncrementalSearch>,
    pub qreplace: Option<QueryReplace>,
    pub shell: Option<RunningShell>,
    // Macro state
    pub macro_keys: Vec<Key>,
    pub recording: bool,
    pub replaying: bool,
    pending_keys: Vec<Key>,
    /// Inside a bracketed paste: raw insertion under one undo group
    pub pasting: bool,
}

impl Editor {
    /// Build an editor for the given screen size, with an optional file
    pub fn new(screen: Size, file: Option<&std::path::Path>, readonly: bool) -> Result<Self> {
        let mut buffers = BufferManager::new();
        let initial = match file {
            Some(path) => buffers.open_file(path, readonly)?,
            None => buffers.scratch_id(),
        };
        let win_h = (screen.rows as usize).saturating_sub(1).max(1);
        Ok(Self {
            buffers,
            windows: WindowManager::new(screen.cols as usize, win_h, initial),
            kill_ring: KillRing::default(),
            rect_ring: RectRing::default(),
            search: SearchService::new(),
            keymap: KeyMap::default(),
            minibuffer: Minibuffer::new(),
            shell_history: History::new(paths::SHELL_HISTORY),
            search_history: History::new(paths::SEARCH_HISTORY),
            mode: Mode::Main,
            prefix: Prefix::None,
            status_msg: None,
            grid: Grid::new(screen.rows as usize, screen.cols as usize),
            screen,
            should_quit: false,
            isearch: None,
            qreplace: None,
            shell: None,
            macro_keys: Vec::new(),
            recording: false,
            replaying: false,
            pending_keys: Vec::new(),
            pasting: false,
        })
    }

    // =========================================================================
    // Buffer access helpers
    // =========================================================================

    pub fn current_buffer_id(&self) -> usize {
        self.windows.current().buffer_id
    }

    pub fn current(&mut self) -> &mut BufferState {
        let id = self.current_buffer_id();
        self.buffers.get_mut(id).expect("window buffer exists")
    }

    pub fn current_ref(&self) -> &BufferState {
        let id = self.current_buffer_id();
        self.buffers.get(id).expect("window buffer exists")
    }

    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_msg = Some(msg.into());
    }

    /// Flag views after an edit: the affected line, or everything when the
    /// edit changed line structure
    pub fn mark_edit(&mut self, buffer_id: usize, line: usize, structural: bool) {
        for w in self.windows.iter_mut() {
            if w.buffer_id == buffer_id {
                if structural {
                    w.view.mark_full_redraw();
                } else {
                    w.view.mark_line(line);
                }
            }
        }
    }

    /// Insert at the cursor, recording undo and dirtying views
    pub fn insert_at_cursor(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let id = self.current_buffer_id();
        let bs = self.buffers.get_mut(id).expect("window buffer exists");
        if bs.readonly() {
            return Err(ZeError::ReadOnly);
        }
        let pos = bs.ctx.cursor;
        bs.buffer.insert(pos, bytes);
        bs.ctx.record_insert(pos, bytes, pos);
        bs.ctx.cursor = pos + bytes.len();
        let line = bs.buffer.find_line_by_pos(pos);
        let structural = bytes.contains(&b'\n');
        self.mark_edit(id, line, structural);
        Ok(())
    }

    /// Delete a byte range, recording undo and dirtying views.
    /// Returns the removed bytes (already copied, safe for the kill ring).
    pub fn delete_range(&mut self, range: Range<usize>) -> Result<Vec<u8>> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let id = self.current_buffer_id();
        let bs = self.buffers.get_mut(id).expect("window buffer exists");
        if bs.readonly() {
            return Err(ZeError::ReadOnly);
        }
        let removed = bs.buffer.slice_to_vec(range.clone());
        let line = bs.buffer.find_line_by_pos(range.start);
        bs.buffer.delete(range.start, range.len());
        bs.ctx.record_delete(range.start, removed.clone(), bs.ctx.cursor);
        bs.ctx.cursor = range.start;
        if let Some(mark) = bs.ctx.mark {
            if mark > range.start {
                bs.ctx.mark = Some(mark.saturating_sub(range.len()).max(range.start));
            }
        }
        let structural = removed.contains(&b'\n');
        self.mark_edit(id, line, structural);
        Ok(removed)
    }

    /// Replace a byte range as one undo entry; returns the new end position
    pub fn replace_range(&mut self, range: Range<usize>, new: &[u8]) -> Result<usize> {
        let id = self.current_buffer_id();
        let bs = self.buffers.get_mut(id).expect("window buffer exists");
        if bs.readonly() {
            return Err(ZeError::ReadOnly);
        }
        let old = bs.buffer.slice_to_vec(range.clone());
        let cursor_before = bs.ctx.cursor;
        bs.buffer.delete(range.start, range.len());
        bs.buffer.insert(range.start, new);
        bs.ctx
            .record_replace(range.start, old.clone(), new.to_vec(), cursor_before);
        bs.ctx.cursor = range.start + new.len();
        let structural = old.contains(&b'\n') || new.contains(&b'\n');
        let line = bs.buffer.find_line_by_pos(range.start);
        self.mark_edit(id, line, structural);
        Ok(range.start + new.len())
    }

    // =========================================================================
    // Key dispatch
    // =========================================================================

    pub fn dispatch_key(&mut self, key: Key) -> io::Result<()> {
        if self.recording && !self.replaying && key.is_recordable() {
            self.pending_keys.push(key);
        }
        let result = if self.pasting {
            self.dispatch_paste(key)
        } else {
            match self.mode.clone() {
                Mode::Main => self.dispatch_main(key),
                Mode::Prompt(kind) => self.dispatch_prompt(kind, key),
                Mode::ISearch => self.dispatch_isearch(key),
                Mode::ReplaceAsk => self.dispatch_replace_ask(key),
                Mode::Confirm(kind) => self.dispatch_confirm(kind, key),
            }
        };
        if !matches!(self.mode, Mode::Main) || self.pasting {
            // Modal keys are never macro-control keys
            self.flush_pending_keys(false);
        }
        if let Err(err) = result {
            tracing::debug!(%err, "command error");
            self.set_status(err.to_string());
        }
        Ok(())
    }

    fn flush_pending_keys(&mut self, discard: bool) {
        if discard {
            self.pending_keys.clear();
        } else {
            self.macro_keys.append(&mut self.pending_keys);
        }
    }

    fn dispatch_main(&mut self, key: Key) -> Result<()> {
        if key == Key::PasteStart {
            self.pasting = true;
            let bs = self.current();
            bs.ctx.begin_group();
            self.flush_pending_keys(false);
            return Ok(());
        }
        match self.keymap.lookup(self.prefix, key) {
            Lookup::Pending(p) => {
                self.prefix = p;
                Ok(())
            }
            Lookup::Command(cmd) => {
                self.prefix = Prefix::None;
                let is_macro_key = matches!(
                    cmd,
                    Command::MacroStart | Command::MacroEnd | Command::MacroPlay
                );
                self.flush_pending_keys(is_macro_key);
                if self.replaying && cmd == Command::MacroPlay {
                    // A macro must not replay itself
                    return Ok(());
                }
                self.status_msg = None;
                commands::execute(self, cmd)
            }
            Lookup::Unbound => {
                self.prefix = Prefix::None;
                self.flush_pending_keys(false);
                self.set_status("Key is not bound");
                Ok(())
            }
        }
    }

    fn dispatch_paste(&mut self, key: Key) -> Result<()> {
        match key {
            Key::PasteEnd => {
                self.pasting = false;
                self.current().ctx.end_group();
                Ok(())
            }
            Key::Char(c) => {
                let mut bytes = [0u8; 4];
                let s = c.encode_utf8(&mut bytes).to_owned();
                self.insert_at_cursor(s.as_bytes())
            }
            Key::Enter => self.insert_at_cursor(b"\n"),
            Key::Tab => self.insert_at_cursor(b"\t"),
            // Everything else inside a paste is dropped
            _ => Ok(()),
        }
    }

    // =========================================================================
    // Prompts
    // =========================================================================

    pub fn open_prompt(&mut self, kind: PromptKind, prompt: &str, initial: &str) {
        self.minibuffer.open(prompt, initial);
        self.mode = Mode::Prompt(kind);
        self.status_msg = None;
    }

    fn dispatch_prompt(&mut self, kind: PromptKind, key: Key) -> Result<()> {
        match key {
            Key::Char(c) => self.minibuffer.insert_char(c),
            Key::Backspace => {
                self.minibuffer.backspace();
            }
            Key::Delete | Key::Ctrl('d') => {
                self.minibuffer.delete();
            }
            Key::ArrowLeft | Key::Ctrl('b') => self.minibuffer.left(),
            Key::ArrowRight | Key::Ctrl('f') => self.minibuffer.right(),
            Key::Home | Key::Ctrl('a') => self.minibuffer.home(),
            Key::End | Key::Ctrl('e') => self.minibuffer.end(),
            Key::Tab => {
                if kind == PromptKind::Shell {
                    self.complete_shell_prompt();
                }
            }
            Key::ArrowUp | Key::Alt('p') => {
                if kind == PromptKind::Shell {
                    if let Some(e) = self.shell_history.prev() {
                        let e = e.to_owned();
                        self.minibuffer.set_text(&e);
                    }
                }
            }
            Key::ArrowDown | Key::Alt('n') => {
                if kind == PromptKind::Shell {
                    let text = self.shell_history.next().map(str::to_owned);
                    self.minibuffer.set_text(text.as_deref().unwrap_or(""));
                }
            }
            Key::Enter => {
                let text = self.minibuffer.take();
                self.mode = Mode::Main;
                return self.finish_prompt(kind, text);
            }
            Key::Ctrl('g') | Key::Escape => {
                self.minibuffer.clear();
                self.mode = Mode::Main;
                self.set_status("Quit");
            }
            _ => {}
        }
        Ok(())
    }

    fn finish_prompt(&mut self, kind: PromptKind, text: String) -> Result<()> {
        match kind {
            PromptKind::FindFile => {
                if text.is_empty() {
                    return Ok(());
                }
                let id = self.buffers.open_file(std::path::Path::new(&text), false)?;
                self.show_buffer(id);
                Ok(())
            }
            PromptKind::SaveAs => {
                if text.is_empty() {
                    return Ok(());
                }
                let path = PathBuf::from(text);
                let same_file = self
                    .current_ref()
                    .file
                    .as_ref()
                    .is_some_and(|f| f.path == path);
                if path.exists() && !same_file {
                    self.mode = Mode::Confirm(ConfirmKind::Overwrite { path });
                    return Ok(());
                }
                self.save_as(path)
            }
            PromptKind::Shell => {
                self.shell_history.push(&text);
                let Some(parsed) = parse::parse_command(&text) else {
                    return Err(ZeError::UnknownCommand(text));
                };
                self.start_shell(parsed)
            }
            PromptKind::GotoLine => {
                let line: usize = text
                    .trim()
                    .parse()
                    .map_err(|_| ZeError::UnknownCommand(text.clone()))?;
                let bs = self.current();
                let line = line.saturating_sub(1).min(bs.buffer.line_count() - 1);
                bs.ctx.cursor = bs.buffer.get_line_start(line);
                bs.ctx.break_coalescing();
                Ok(())
            }
            PromptKind::Language => {
                let lang = crate::language::lookup(text.trim())
                    .ok_or_else(|| ZeError::UnknownCommand(text.clone()))?;
                let id = self.current_buffer_id();
                self.current().language = lang;
                for w in self.windows.iter_mut() {
                    if w.buffer_id == id {
                        w.view.mark_full_redraw();
                    }
                }
                self.set_status(format!("Language: {}", lang.name));
                Ok(())
            }
            PromptKind::ReplaceFrom => {
                if text.is_empty() {
                    return Ok(());
                }
                self.open_prompt(
                    PromptKind::ReplaceWith {
                        pattern: text.clone(),
                    },
                    &format!("Replace {} with: ", text),
                    "",
                );
                Ok(())
            }
            PromptKind::ReplaceWith { pattern } => {
                self.begin_query_replace(pattern, text)
            }
        }
    }

    fn complete_shell_prompt(&mut self) {
        let text = self.minibuffer.text().to_owned();
        let (words, last_start) = parse::tokenize(&text);
        let token = if last_start < text.len() {
            words.last().cloned().unwrap_or_default()
        } else {
            String::new()
        };
        // First word after the pipe completes commands, later words files
        let before = &text[..last_start];
        let is_command = !before.contains(|c: char| c == ' ' || c == '\t')
            || before.trim_end().ends_with('|');
        let kind = if is_command {
            CompletionKind::Command
        } else {
            CompletionKind::File
        };
        let candidates = shell::complete(&token, kind);
        if candidates.is_empty() {
            self.set_status("No completions");
            return;
        }
        let prefix = parse::common_prefix(&candidates);
        if prefix.len() > token.len() {
            self.minibuffer.insert_str(&prefix[token.len()..]);
        }
        if candidates.len() > 1 {
            self.set_status(format!("{} completions", candidates.len()));
        }
    }

    // =========================================================================
    // Incremental search
    // =========================================================================

    pub fn begin_isearch(&mut self, forward: bool) {
        let cursor = self.current_ref().ctx.cursor;
        self.isearch = Some(IncrementalSearch::new(forward, cursor));
        self.mode = Mode::ISearch;
        self.status_msg = None;
    }

    fn isearch_reposition(&mut self) {
        let Some(is) = &self.isearch else { return };
        if let Some(m) = is.current.clone() {
            let bs = self.current();
            bs.ctx.cursor = m.start;
            bs.ctx.break_coalescing();
        }
        let id = self.current_buffer_id();
        for w in self.windows.iter_mut() {
            if w.buffer_id == id {
                w.view.mark_full_redraw();
            }
        }
    }

    fn dispatch_isearch(&mut self, key: Key) -> Result<()> {
        let id = self.current_buffer_id();
        match key {
            Key::Char(c) => {
                if let Some(is) = &mut self.isearch {
                    is.pattern.push(c);
                    let bs = self.buffers.get(id).expect("window buffer exists");
                    is.update(&bs.buffer, &mut self.search)?;
                }
                self.isearch_reposition();
            }
            Key::Backspace => {
                if let Some(is) = &mut self.isearch {
                    is.pattern.pop();
                    let bs = self.buffers.get(id).expect("window buffer exists");
                    is.update(&bs.buffer, &mut self.search)?;
                }
                self.isearch_reposition();
            }
            Key::Ctrl('s') => {
                if let Some(is) = &mut self.isearch {
                    is.forward = true;
                    if is.pattern.is_empty() {
                        if let Some(last) = self.search_history.prev() {
                            is.pattern = last.to_owned();
                            self.search_history.reset_cursor();
                        }
                        let bs = self.buffers.get(id).expect("window buffer exists");
                        is.update(&bs.buffer, &mut self.search)?;
                    } else {
                        let bs = self.buffers.get(id).expect("window buffer exists");
                        is.advance(&bs.buffer, &mut self.search)?;
                    }
                }
                self.isearch_reposition();
            }
            Key::Ctrl('r') => {
                if let Some(is) = &mut self.isearch {
                    is.forward = false;
                    let bs = self.buffers.get(id).expect("window buffer exists");
                    is.advance(&bs.buffer, &mut self.search)?;
                }
                self.isearch_reposition();
            }
            Key::ArrowUp | Key::Alt('p') => {
                if let Some(prev) = self.search_history.prev().map(str::to_owned) {
                    if let Some(is) = &mut self.isearch {
                        is.pattern = prev;
                        let bs = self.buffers.get(id).expect("window buffer exists");
                        is.update(&bs.buffer, &mut self.search)?;
                    }
                    self.isearch_reposition();
                }
            }
            Key::ArrowDown | Key::Alt('n') => {
                let next = self.search_history.next().map(str::to_owned);
                if let Some(is) = &mut self.isearch {
                    is.pattern = next.unwrap_or_default();
                    let bs = self.buffers.get(id).expect("window buffer exists");
                    is.update(&bs.buffer, &mut self.search)?;
                }
                self.isearch_reposition();
            }
            Key::Enter => {
                if let Some(is) = self.isearch.take() {
                    if let Some(m) = is.current {
                        let bs = self.current();
                        bs.ctx.cursor = m.start;
                    }
                    if !is.pattern.is_empty() {
                        self.search_history.push(&is.pattern);
                    }
                }
                self.mode = Mode::Main;
                self.mark_all_views(id);
            }
            Key::Ctrl('g') | Key::Escape => {
                if let Some(is) = self.isearch.take() {
                    let bs = self.current();
                    bs.ctx.cursor = is.start_pos;
                }
                self.mode = Mode::Main;
                self.set_status("Quit");
                self.mark_all_views(id);
            }
            _ => {}
        }
        Ok(())
    }

    pub fn mark_all_views(&mut self, buffer_id: usize) {
        for w in self.windows.iter_mut() {
            if w.buffer_id == buffer_id {
                w.view.mark_full_redraw();
            }
        }
    }

    // =========================================================================
    // Query replace
    // =========================================================================

    fn begin_query_replace(&mut self, pattern: String, replacement: String) -> Result<()> {
        let id = self.current_buffer_id();
        let bs = self.buffers.get_mut(id).expect("window buffer exists");
        if bs.readonly() {
            return Err(ZeError::ReadOnly);
        }
        let mut qr = QueryReplace::new(pattern, replacement, bs.ctx.cursor);
        bs.ctx.begin_group();
        if !qr.find_next(&bs.buffer, &mut self.search)? {
            bs.ctx.end_group();
            return Err(ZeError::NotFound);
        }
        if let Some(m) = qr.current.clone() {
            bs.ctx.cursor = m.start;
        }
        self.qreplace = Some(qr);
        self.mode = Mode::ReplaceAsk;
        self.mark_all_views(id);
        Ok(())
    }

    fn replace_current_match(&mut self) -> Result<()> {
        let Some(qr) = &mut self.qreplace else {
            return Ok(());
        };
        let Some(range) = qr.current.clone() else {
            return Ok(());
        };
        let replacement = qr.replacement.clone().into_bytes();
        let was_empty = range.is_empty();
        let new_end = self.replace_range(range, &replacement)?;
        let id = self.current_buffer_id();
        let bs = self.buffers.get(id).expect("window buffer exists");
        if let Some(qr) = &mut self.qreplace {
            qr.advance_after_replace(new_end, was_empty, &bs.buffer);
        }
        Ok(())
    }

    fn query_replace_step(&mut self) -> Result<()> {
        let id = self.current_buffer_id();
        let found = {
            let Some(qr) = &mut self.qreplace else {
                return Ok(());
            };
            let bs = self.buffers.get(id).expect("window buffer exists");
            qr.find_next(&bs.buffer, &mut self.search)?
        };
        if found {
            let m = self.qreplace.as_ref().and_then(|q| q.current.clone());
            if let Some(m) = m {
                let bs = self.current();
                bs.ctx.cursor = m.start;
            }
        } else {
            self.finish_query_replace();
        }
        Ok(())
    }

    fn finish_query_replace(&mut self) {
        let id = self.current_buffer_id();
        if let Some(qr) = self.qreplace.take() {
            let bs = self.buffers.get_mut(id).expect("window buffer exists");
            bs.ctx.end_group();
            self.set_status(format!("Replaced {} occurrence(s)", qr.replaced));
        }
        self.mode = Mode::Main;
        self.mark_all_views(id);
    }

    fn dispatch_replace_ask(&mut self, key: Key) -> Result<()> {
        match key {
            Key::Char('y') => {
                self.replace_current_match()?;
                self.query_replace_step()
            }
            Key::Char('n') => {
                let id = self.current_buffer_id();
                if let Some(qr) = &mut self.qreplace {
                    let bs = self.buffers.get(id).expect("window buffer exists");
                    qr.skip(&bs.buffer);
                }
                self.query_replace_step()
            }
            Key::Char('!') => {
                // Replace the current match and everything still ahead
                loop {
                    self.replace_current_match()?;
                    let id = self.current_buffer_id();
                    let found = {
                        let Some(qr) = &mut self.qreplace else { break };
                        let bs = self.buffers.get(id).expect("window buffer exists");
                        qr.find_next(&bs.buffer, &mut self.search)?
                    };
                    if !found {
                        break;
                    }
                }
                self.finish_query_replace();
                Ok(())
            }
            Key::Char('q') | Key::Enter | Key::Escape | Key::Ctrl('g') => {
                self.finish_query_replace();
                Ok(())
            }
            _ => Ok(()),
        }
    }

    // =========================================================================
    // Confirm modals
    // =========================================================================

    fn dispatch_confirm(&mut self, kind: ConfirmKind, key: Key) -> Result<()> {
        let answer = match key {
            Key::Char('y') | Key::Char('Y') => 'y',
            Key::Char('n') | Key::Char('N') => 'n',
            Key::Char('c') | Key::Escape | Key::Ctrl('g') => 'c',
            _ => return Ok(()),
        };
        self.mode = Mode::Main;
        match kind {
            ConfirmKind::KillBuffer(id) => match answer {
                'y' => {
                    let has_file = self.buffers.get(id).is_some_and(|b| b.file.is_some());
                    if !has_file {
                        // Nowhere to save; leave the buffer alone
                        self.set_status("Buffer has no file; not killed");
                        return Ok(());
                    }
                    self.save_buffer_by_id(id, false)?;
                    self.kill_buffer_now(id);
                    Ok(())
                }
                'n' => {
                    self.kill_buffer_now(id);
                    Ok(())
                }
                _ => {
                    self.set_status("Cancelled");
                    Ok(())
                }
            },
            ConfirmKind::Quit => match answer {
                'y' => {
                    self.save_all_modified()?;
                    self.should_quit = true;
                    Ok(())
                }
                'n' => {
                    self.should_quit = true;
                    Ok(())
                }
                _ => {
                    self.set_status("Cancelled");
                    Ok(())
                }
            },
            ConfirmKind::Overwrite { path } => match answer {
                'y' => self.save_as(path),
                _ => {
                    // The buffer keeps its prior filename untouched
                    self.set_status("Save cancelled");
                    Ok(())
                }
            },
        }
    }

    // =========================================================================
    // Buffers, files, saving
    // =========================================================================

    /// Point the current window at a buffer
    pub fn show_buffer(&mut self, id: usize) {
        let win = self.windows.current_mut();
        win.buffer_id = id;
        win.view = crate::view::View::new();
    }

    pub fn save_current(&mut self) -> Result<()> {
        let id = self.current_buffer_id();
        self.save_buffer_by_id(id, false)
    }

    fn save_buffer_by_id(&mut self, id: usize, force: bool) -> Result<()> {
        let bs = self.buffers.get_mut(id).expect("buffer exists");
        if !bs.ctx.modified() && bs.file.is_some() && !force {
            self.set_status("No changes to save");
            return Ok(());
        }
        let Some(info) = bs.file.as_mut() else {
            // No filename yet: route through save-as
            self.open_prompt(PromptKind::SaveAs, "Save as: ", "");
            return Ok(());
        };
        buffile::save(&bs.buffer, info, force)?;
        bs.ctx.mark_saved();
        let name = bs.name.clone();
        self.set_status(format!("Saved {}", name));
        Ok(())
    }

    fn save_as(&mut self, path: PathBuf) -> Result<()> {
        let bs = self.current();
        let readonly = false;
        let mut info = FileInfo::new_for_path(&path, readonly);
        // Keep the recorded format when the buffer already had one
        if let Some(old) = &bs.file {
            info.format = old.format;
        }
        buffile::save(&bs.buffer, &mut info, true)?;
        bs.file = Some(info);
        bs.language = crate::language::detect(&path);
        bs.name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        bs.ctx.mark_saved();
        let name = bs.name.clone();
        let id = self.current_buffer_id();
        self.mark_all_views(id);
        self.set_status(format!("Saved {}", name));
        Ok(())
    }

    fn save_all_modified(&mut self) -> Result<()> {
        let ids: Vec<usize> = self
            .buffers
            .iter()
            .filter(|b| b.ctx.modified() && b.file.is_some())
            .map(|b| b.id)
            .collect();
        for id in ids {
            self.save_buffer_by_id(id, false)?;
        }
        Ok(())
    }

    pub fn request_kill_buffer(&mut self) -> Result<()> {
        let id = self.current_buffer_id();
        let bs = self.buffers.get(id).expect("window buffer exists");
        if bs.ctx.modified() {
            self.mode = Mode::Confirm(ConfirmKind::KillBuffer(id));
            return Ok(());
        }
        self.kill_buffer_now(id);
        Ok(())
    }

    fn kill_buffer_now(&mut self, id: usize) {
        let target = self.buffers.delete(id);
        self.windows.rebind_buffer(id, target);
    }

    pub fn request_quit(&mut self) -> Result<()> {
        let any_modified = self.buffers.iter().any(|b| b.ctx.modified());
        if any_modified {
            self.mode = Mode::Confirm(ConfirmKind::Quit);
        } else {
            self.should_quit = true;
        }
        Ok(())
    }

    // =========================================================================
    // Shell integration
    // =========================================================================

    fn start_shell(&mut self, parsed: ParsedCommand) -> Result<()> {
        let id = self.current_buffer_id();
        let bs = self.buffers.get(id).expect("window buffer exists");
        let (input, source_range) = match parsed.source {
            Source::Buffer => (bs.buffer.to_bytes(), 0..bs.buffer.len()),
            Source::Line => {
                let line = bs.buffer.find_line_by_pos(bs.ctx.cursor);
                let range = bs.buffer.line_range_with_newline(line);
                (bs.buffer.slice_to_vec(range.clone()), range)
            }
            Source::Selection => {
                let cursor = bs.ctx.cursor;
                match bs.ctx.mark {
                    Some(mark) if mark != cursor => {
                        let range = mark.min(cursor)..mark.max(cursor);
                        (bs.buffer.slice_to_vec(range.clone()), range)
                    }
                    _ if matches!(parsed.sink, Sink::Insert | Sink::NewBuffer) => {
                        (Vec::new(), bs.ctx.cursor..bs.ctx.cursor)
                    }
                    _ => return Err(ZeError::NoActiveRegion),
                }
            }
        };
        let job = ShellJob::spawn(&parsed.command, input)?;
        self.shell = Some(RunningShell {
            job,
            sink: parsed.sink,
            buffer_id: id,
            source_range,
        });
        self.set_status(format!("Running: {}", parsed.command));
        Ok(())
    }

    /// Cancel the running subprocess, if any. Returns true when one was.
    pub fn cancel_shell(&mut self) -> bool {
        if let Some(rs) = &mut self.shell {
            rs.job.cancel();
            true
        } else {
            false
        }
    }

    /// Pump subprocess pipes; apply the sink when the job completes
    pub fn tick_shell(&mut self) {
        let finished = match &mut self.shell {
            Some(rs) => rs.job.tick(),
            None => return,
        };
        if !finished {
            return;
        }
        let rs = self.shell.take().expect("checked above");
        if let Err(err) = self.finish_shell(rs) {
            self.set_status(err.to_string());
        }
    }

    fn finish_shell(&mut self, rs: RunningShell) -> Result<()> {
        if rs.job.cancelled {
            self.set_status("Command cancelled");
            return Ok(());
        }
        let status = rs.job.status.unwrap_or(-1);
        if status != 0 {
            let detail = String::from_utf8_lossy(&rs.job.stderr_data);
            let first = detail.lines().next().unwrap_or("");
            if first.is_empty() {
                return Err(ZeError::CommandExitNonZero(status));
            }
            self.set_status(format!(
                "{}: {}",
                ZeError::CommandExitNonZero(status),
                first
            ));
            return Ok(());
        }

        let output = rs.job.stdout_data.clone();
        match rs.sink {
            Sink::Replace => {
                // Only meaningful against the buffer the source came from
                let win_id = self.current_buffer_id();
                if win_id == rs.buffer_id {
                    let len = self.current_ref().buffer.len();
                    let range =
                        rs.source_range.start.min(len)..rs.source_range.end.min(len);
                    self.replace_range(range, &output)?;
                }
            }
            Sink::Insert => {
                let bs = self.current();
                bs.ctx.begin_group();
                self.insert_at_cursor(&output)?;
                self.current().ctx.end_group();
            }
            Sink::NewBuffer => {
                let id = self.buffers.create("*output*", output);
                self.show_buffer(id);
            }
            Sink::OutputBuffer => {
                let existing = self
                    .buffers
                    .iter()
                    .find(|b| b.name == SHELL_OUTPUT_NAME)
                    .map(|b| b.id);
                let id = match existing {
                    Some(id) => {
                        let bs = self.buffers.get_mut(id).expect("just found");
                        bs.buffer = crate::buffer::Buffer::from_bytes(output);
                        bs.ctx = crate::context::EditContext::new();
                        id
                    }
                    None => self.buffers.create(SHELL_OUTPUT_NAME, output),
                };
                self.show_buffer(id);
                self.mark_all_views(id);
            }
        }
        if rs.job.stdout_truncated || rs.job.stderr_truncated {
            return Err(ZeError::OutputTruncated);
        }
        self.set_status("Command finished");
        Ok(())
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    pub fn render_to(&mut self, out: &mut impl Write) -> io::Result<()> {
        let current_idx = self.windows.current_index();
        let isearch_hl = self.isearch.as_ref().and_then(|s| s.current.clone());
        let replace_hl = self.qreplace.as_ref().and_then(|q| q.current.clone());
        let highlight = isearch_hl.or(replace_hl);

        for (i, win) in self.windows.iter_mut().enumerate() {
            let Some(bs) = self.buffers.get(win.buffer_id) else {
                continue;
            };
            let focused = i == current_idx;
            if focused {
                win.view.ensure_visible(&bs.buffer, bs.ctx.cursor, win.rect);
            }
            let line = bs.buffer.find_line_by_pos(bs.ctx.cursor);
            let col = win.view.cursor_x;
            let status = format!(
                " {}{}  L{}:{}  {}  {}",
                bs.name,
                if bs.ctx.modified() { " *" } else { "" },
                line + 1,
                col + 1,
                bs.language.name,
                bs.file
                    .as_ref()
                    .map(|f| f.format.encoding.name())
                    .unwrap_or("utf-8"),
            );
            let selection = if focused {
                bs.ctx.mark.map(|m| {
                    let c = bs.ctx.cursor;
                    m.min(c)..m.max(c)
                })
            } else {
                None
            };
            let rctx = crate::view::RenderCtx {
                selection,
                highlight: if focused { highlight.clone() } else { None },
                comment_token: bs.language.line_comment,
                status: &status,
                focused,
            };
            win.view.render(&bs.buffer, win.rect, &mut self.grid, &rctx);
        }

        let cursor_park = self.compose_minibuffer_row();
        self.grid.flush(out, cursor_park)?;
        Ok(())
    }

    /// Fill the bottom row; returns where the terminal cursor should sit
    fn compose_minibuffer_row(&mut self) -> Option<(usize, usize)> {
        let row = (self.screen.rows as usize).saturating_sub(1);
        let cols = self.screen.cols as usize;
        for c in 0..cols {
            self.grid.set_cell(row, c, Cell::empty());
        }
        let text = match &self.mode {
            Mode::Prompt(_) => {
                format!("{}{}", self.minibuffer.prompt, self.minibuffer.text())
            }
            Mode::ISearch => {
                let is = self.isearch.as_ref();
                let pattern = is.map(|s| s.pattern.as_str()).unwrap_or("");
                let tag = match is {
                    Some(s) if s.failed => "Failing I-search",
                    Some(s) if s.wrapped => "Wrapped I-search",
                    Some(s) if !s.forward => "I-search backward",
                    _ => "I-search",
                };
                format!("{}: {}", tag, pattern)
            }
            Mode::ReplaceAsk => "Replace? (y/n/!/q)".to_owned(),
            Mode::Confirm(kind) => match kind {
                ConfirmKind::KillBuffer(_) => {
                    "Buffer modified; save before killing? (y/n/c)".to_owned()
                }
                ConfirmKind::Quit => "Modified buffers exist; save and quit? (y/n/c)".to_owned(),
                ConfirmKind::Overwrite { path } => {
                    format!("Overwrite {}? (y/n)", path.display())
                }
            },
            Mode::Main => self.status_msg.clone().unwrap_or_default(),
        };
        let mut col = 0;
        for cluster in grapheme::Clusters::new(text.as_bytes()) {
            if col >= cols {
                break;
            }
            self.grid.set_cell(
                row,
                col,
                Cell {
                    ch: cluster.base,
                    fg: None,
                    bg: None,
                    reverse: false,
                },
            );
            if cluster.width == 2 && col + 1 < cols {
                self.grid.set_cell(row, col + 1, Cell::continuation());
            }
            col += cluster.width.max(1);
        }
        match &self.mode {
            Mode::Prompt(_) => Some((row, self.minibuffer.display_col(crate::view::TAB_WIDTH))),
            Mode::ISearch | Mode::ReplaceAsk | Mode::Confirm(_) => Some((row, col)),
            Mode::Main => None,
        }
    }

    // =========================================================================
    // Event loop
    // =========================================================================

    /// Take over the terminal and run until quit
    pub fn run(&mut self) -> anyhow::Result<()> {
        let mut term = Terminal::init()?;
        let winch = WinchPipe::install()?;
        let mut reader = KeyReader::new();
        let mut out = io::BufWriter::new(io::stdout());

        let result = self.event_loop(&mut reader, &winch, &mut out);
        term.deinit();

        if let Err(err) = self.shell_history.save() {
            tracing::warn!(%err, "failed to write shell history");
        }
        if let Err(err) = self.search_history.save() {
            tracing::warn!(%err, "failed to write search history");
        }
        result
    }

    fn event_loop(
        &mut self,
        reader: &mut KeyReader,
        winch: &WinchPipe,
        out: &mut impl Write,
    ) -> anyhow::Result<()> {
        loop {
            self.render_to(out)?;
            if self.should_quit {
                break;
            }

            let (stdin_ready, winch_ready) = self.wait_event(reader, winch)?;
            if winch_ready {
                self.handle_resize()?;
            }
            if stdin_ready {
                // Assemble every buffered key before the next frame
                loop {
                    match input::read_key(reader)? {
                        Some(key) => self.dispatch_key(key)?,
                        None => break,
                    }
                    if !reader.has_buffered() {
                        break;
                    }
                }
            }
            self.tick_shell();
        }
        Ok(())
    }

    /// Block on poll over stdin, the SIGWINCH pipe, and subprocess pipes
    fn wait_event(&mut self, reader: &KeyReader, winch: &WinchPipe) -> io::Result<(bool, bool)> {
        if reader.has_buffered() {
            return Ok((true, winch.drain()));
        }
        // SAFETY: fds 0 and the winch pipe outlive the poll call
        let stdin_fd = unsafe { BorrowedFd::borrow_raw(0) };
        let winch_fd = unsafe { BorrowedFd::borrow_raw(winch.read_fd()) };
        let mut fds = vec![
            PollFd::new(stdin_fd, PollFlags::POLLIN),
            PollFd::new(winch_fd, PollFlags::POLLIN),
        ];
        let shell_fds: Vec<(RawFd, bool)> = self
            .shell
            .as_ref()
            .map(|rs| rs.job.poll_fds())
            .unwrap_or_default();
        for (fd, write) in &shell_fds {
            // SAFETY: pipe fds stay open while the job is owned by self
            let borrowed = unsafe { BorrowedFd::borrow_raw(*fd) };
            let flags = if *write {
                PollFlags::POLLOUT
            } else {
                PollFlags::POLLIN
            };
            fds.push(PollFd::new(borrowed, flags));
        }

        // A job with closed pipes still needs reaping, so keep ticking
        let timeout = if self.shell.is_some() {
            PollTimeout::try_from(50i32).unwrap_or(PollTimeout::NONE)
        } else {
            PollTimeout::NONE
        };
        loop {
            match poll(&mut fds, timeout) {
                Ok(_) => break,
                Err(nix::errno::Errno::EINTR) => {
                    // A signal (usually SIGWINCH) interrupted; re-check
                    if winch.drain() {
                        return Ok((false, true));
                    }
                }
                Err(err) => return Err(io::Error::from(err)),
            }
        }
        let stdin_ready = fds[0]
            .revents()
            .map(|r| r.contains(PollFlags::POLLIN))
            .unwrap_or(false);
        let winch_ready = fds[1]
            .revents()
            .map(|r| r.contains(PollFlags::POLLIN))
            .unwrap_or(false)
            && winch.drain();
        Ok((stdin_ready, winch_ready))
    }

    pub fn handle_resize(&mut self) -> io::Result<()> {
        let size = Terminal::size()?;
        self.screen = size;
        self.grid.resize(size.rows as usize, size.cols as usize);
        let win_h = (size.rows as usize).saturating_sub(1).max(1);
        self.windows
            .recalculate_window_sizes(size.cols as usize, win_h);
        tracing::debug!(rows = size.rows, cols = size.cols, "resize");
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
