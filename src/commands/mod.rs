//! Named editing operations and their dispatch
//!
//! Every operation is a variant of [`Command`]; `execute` is the single
//! dispatch point over `&mut Editor`, so commands and editor state never
//! form a cyclic ownership graph.

pub mod edit;
pub mod motion;
pub mod rect;


use crate::constants::ui::{PAGE_OVERLAP, SCROLL_STEP};
use crate::editor::{Editor, PromptKind};
use crate::error::Result;
use crate::key::Key;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    // Motion
    ForwardChar,
    BackwardChar,
    NextLine,
    PrevLine,
    ForwardWord,
    BackwardWord,
    LineStart,
    LineEnd,
    BufferStart,
    BufferEnd,
    ForwardParagraph,
    BackwardParagraph,
    PageDown,
    PageUp,
    Recenter,
    GotoLine,
    // Shift-selection
    SelectForwardChar,
    SelectBackwardChar,
    SelectNextLine,
    SelectPrevLine,
    SelectForwardWord,
    SelectBackwardWord,
    SelectPageDown,
    SelectPageUp,
    // Editing
    SelfInsert(char),
    Newline,
    Tab,
    DeleteChar,
    DeleteBackward,
    KillLine,
    KillRegion,
    CopyRegion,
    Yank,
    KillWordForward,
    KillWordBackward,
    Undo,
    Redo,
    JoinLine,
    ToggleComment,
    MoveLineUp,
    MoveLineDown,
    DuplicateLine,
    IndentRegion,
    UnindentRegion,
    // Mark
    SetMark,
    KeyboardQuit,
    // Files, buffers, windows
    FindFile,
    SaveBuffer,
    SaveBufferAs,
    KillBuffer,
    NextBuffer,
    SelectLanguage,
    SplitHorizontal,
    SplitVertical,
    CloseWindow,
    CloseOtherWindows,
    OtherWindow,
    Quit,
    // Search and shell
    ISearchForward,
    ISearchBackward,
    QueryReplace,
    ShellCommand,
    // Rectangles
    RectKill,
    RectCopy,
    RectYank,
    // Macros
    MacroStart,
    MacroEnd,
    MacroPlay,
    // Wheel
    ScrollUp,
    ScrollDown,
}

/// Run one command against the editor
pub fn execute(ed: &mut Editor, cmd: Command) -> Result<()> {
    match cmd {
        // Plain motions clear a shift-selection
        Command::ForwardChar => plain_motion(ed, |buf, pos| motion::forward_char(buf, pos)),
        Command::BackwardChar => plain_motion(ed, |buf, pos| motion::backward_char(buf, pos)),
        Command::NextLine => plain_motion(ed, |buf, pos| motion::next_line(buf, pos)),
        Command::PrevLine => plain_motion(ed, |buf, pos| motion::prev_line(buf, pos)),
        Command::ForwardWord => plain_motion(ed, |buf, pos| motion::forward_word(buf, pos)),
        Command::BackwardWord => plain_motion(ed, |buf, pos| motion::backward_word(buf, pos)),
        Command::LineStart => plain_motion(ed, |buf, pos| Ok(motion::line_start(buf, pos))),
        Command::LineEnd => plain_motion(ed, |buf, pos| Ok(motion::line_end(buf, pos))),
        Command::BufferStart => plain_motion(ed, |_buf, _pos| Ok(0)),
        Command::BufferEnd => plain_motion(ed, |buf, _pos| Ok(buf.len())),
        Command::ForwardParagraph => {
            plain_motion(ed, |buf, pos| motion::forward_paragraph(buf, pos))
        }
        Command::BackwardParagraph => {
            plain_motion(ed, |buf, pos| motion::backward_paragraph(buf, pos))
        }
        Command::PageDown => {
            let n = page_rows(ed);
            plain_motion(ed, move |buf, pos| Ok(motion::lines_down(buf, pos, n)))
        }
        Command::PageUp => {
            let n = page_rows(ed);
            plain_motion(ed, move |buf, pos| Ok(motion::lines_up(buf, pos, n)))
        }
        Command::Recenter => {
            let cursor = ed.current_ref().ctx.cursor;
            let line = ed.current_ref().buffer.find_line_by_pos(cursor);
            let text_h = ed.windows.current().rect.h.saturating_sub(1).max(1);
            let view = &mut ed.windows.current_mut().view;
            view.top_line = line.saturating_sub(text_h / 2);
            view.mark_full_redraw();
            Ok(())
        }
        Command::GotoLine => {
            ed.open_prompt(PromptKind::GotoLine, "Goto line: ", "");
            Ok(())
        }

        // Selecting motions set the mark on first use
        Command::SelectForwardChar => select_motion(ed, |buf, pos| motion::forward_char(buf, pos)),
        Command::SelectBackwardChar => {
            select_motion(ed, |buf, pos| motion::backward_char(buf, pos))
        }
        Command::SelectNextLine => select_motion(ed, |buf, pos| motion::next_line(buf, pos)),
        Command::SelectPrevLine => select_motion(ed, |buf, pos| motion::prev_line(buf, pos)),
        Command::SelectForwardWord => {
            select_motion(ed, |buf, pos| motion::forward_word(buf, pos))
        }
        Command::SelectBackwardWord => {
            select_motion(ed, |buf, pos| motion::backward_word(buf, pos))
        }
        Command::SelectPageDown => {
            let n = page_rows(ed);
            select_motion(ed, move |buf, pos| Ok(motion::lines_down(buf, pos, n)))
        }
        Command::SelectPageUp => {
            let n = page_rows(ed);
            select_motion(ed, move |buf, pos| Ok(motion::lines_up(buf, pos, n)))
        }

        Command::SelfInsert(c) => edit::self_insert(ed, c),
        Command::Newline => edit::newline(ed),
        Command::Tab => edit::tab(ed),
        Command::DeleteChar => edit::delete_char(ed),
        Command::DeleteBackward => edit::delete_backward(ed),
        Command::KillLine => edit::kill_line(ed),
        Command::KillRegion => edit::kill_region(ed),
        Command::CopyRegion => edit::copy_region(ed),
        Command::Yank => edit::yank(ed),
        Command::KillWordForward => edit::kill_word_forward(ed),
        Command::KillWordBackward => edit::kill_word_backward(ed),
        Command::Undo => edit::undo(ed),
        Command::Redo => edit::redo(ed),
        Command::JoinLine => edit::join_line(ed),
        Command::ToggleComment => edit::toggle_comment(ed),
        Command::MoveLineUp => edit::move_line(ed, true),
        Command::MoveLineDown => edit::move_line(ed, false),
        Command::DuplicateLine => edit::duplicate_line(ed),
        Command::IndentRegion => edit::indent_region(ed, true),
        Command::UnindentRegion => edit::indent_region(ed, false),

        Command::SetMark => {
            let bs = ed.current();
            bs.ctx.mark = Some(bs.ctx.cursor);
            ed.windows.current_mut().shift_select = false;
            ed.set_status("Mark set");
            Ok(())
        }
        Command::KeyboardQuit => {
            if ed.cancel_shell() {
                ed.set_status("Cancelling command");
                return Ok(());
            }
            let id = ed.current_buffer_id();
            let bs = ed.current();
            bs.ctx.mark = None;
            ed.windows.current_mut().shift_select = false;
            ed.mark_all_views(id);
            ed.set_status("Quit");
            Ok(())
        }

        Command::FindFile => {
            ed.open_prompt(PromptKind::FindFile, "Find file: ", "");
            Ok(())
        }
        Command::SaveBuffer => ed.save_current(),
        Command::SaveBufferAs => {
            let initial = ed
                .current_ref()
                .file
                .as_ref()
                .map(|f| f.path.display().to_string())
                .unwrap_or_default();
            ed.open_prompt(PromptKind::SaveAs, "Save as: ", &initial);
            Ok(())
        }
        Command::KillBuffer => ed.request_kill_buffer(),
        Command::NextBuffer => {
            let next = ed.buffers.next_after(ed.current_buffer_id());
            ed.show_buffer(next);
            Ok(())
        }
        Command::SelectLanguage => {
            ed.open_prompt(PromptKind::Language, "Language: ", "");
            Ok(())
        }

        Command::SplitHorizontal => {
            if !ed.windows.split_horizontal() {
                ed.set_status("Window too small to split");
            }
            Ok(())
        }
        Command::SplitVertical => {
            if !ed.windows.split_vertical() {
                ed.set_status("Window too small to split");
            }
            Ok(())
        }
        Command::CloseWindow => {
            if !ed.windows.close_current() {
                ed.set_status("Cannot close the only window");
            }
            Ok(())
        }
        Command::CloseOtherWindows => {
            ed.windows.close_others();
            Ok(())
        }
        Command::OtherWindow => {
            ed.windows.next_window();
            Ok(())
        }
        Command::Quit => ed.request_quit(),

        Command::ISearchForward => {
            ed.begin_isearch(true);
            Ok(())
        }
        Command::ISearchBackward => {
            ed.begin_isearch(false);
            Ok(())
        }
        Command::QueryReplace => {
            ed.open_prompt(PromptKind::ReplaceFrom, "Query replace: ", "");
            Ok(())
        }
        Command::ShellCommand => {
            ed.open_prompt(PromptKind::Shell, "Shell command: ", "");
            Ok(())
        }

        Command::RectKill => rect::kill(ed),
        Command::RectCopy => rect::copy(ed),
        Command::RectYank => rect::yank(ed),

        Command::MacroStart => {
            if ed.recording {
                ed.set_status("Already recording");
            } else {
                ed.recording = true;
                ed.macro_keys.clear();
                ed.set_status("Recording macro...");
            }
            Ok(())
        }
        Command::MacroEnd => {
            if ed.recording {
                ed.recording = false;
                ed.set_status(format!("Macro recorded ({} keys)", ed.macro_keys.len()));
            } else {
                ed.set_status("Not recording");
            }
            Ok(())
        }
        Command::MacroPlay => {
            if ed.recording {
                ed.set_status("Cannot replay while recording");
                return Ok(());
            }
            let keys: Vec<Key> = ed.macro_keys.clone();
            if keys.is_empty() {
                ed.set_status("No macro recorded");
                return Ok(());
            }
            ed.replaying = true;
            for key in keys {
                let _ = ed.dispatch_key(key);
            }
            ed.replaying = false;
            Ok(())
        }

        Command::ScrollUp => {
            scroll(ed, -(SCROLL_STEP as isize));
            Ok(())
        }
        Command::ScrollDown => {
            scroll(ed, SCROLL_STEP as isize);
            Ok(())
        }
    }
}

/// Rows one page motion covers in the current window
fn page_rows(ed: &Editor) -> usize {
    let text_h = ed.windows.current().rect.h.saturating_sub(1).max(1);
    text_h.saturating_sub(PAGE_OVERLAP).max(1)
}

/// Run a motion; clears the mark when it was set by shift-selection
fn plain_motion<F>(ed: &mut Editor, f: F) -> Result<()>
where
    F: FnOnce(&crate::buffer::Buffer, usize) -> Result<usize>,
{
    let id = ed.current_buffer_id();
    let new = {
        let bs = ed.current_ref();
        f(&bs.buffer, bs.ctx.cursor)?
    };
    let had_selection;
    {
        let bs = ed.current();
        bs.ctx.cursor = new;
        bs.ctx.break_coalescing();
        had_selection = bs.ctx.mark.is_some();
    }
    let win = ed.windows.current_mut();
    if win.shift_select {
        win.shift_select = false;
        ed.current().ctx.mark = None;
        ed.mark_all_views(id);
    } else if had_selection {
        // Keep an explicit mark, but the highlight must follow the cursor
        ed.mark_all_views(id);
    }
    Ok(())
}

/// Shift-selection motion: sets the mark on first use and keeps extending
fn select_motion<F>(ed: &mut Editor, f: F) -> Result<()>
where
    F: FnOnce(&crate::buffer::Buffer, usize) -> Result<usize>,
{
    let id = ed.current_buffer_id();
    {
        let win_selecting = ed.windows.current().shift_select;
        let bs = ed.current();
        if !win_selecting || bs.ctx.mark.is_none() {
            bs.ctx.mark = Some(bs.ctx.cursor);
        }
    }
    ed.windows.current_mut().shift_select = true;
    let new = {
        let bs = ed.current_ref();
        f(&bs.buffer, bs.ctx.cursor)?
    };
    let bs = ed.current();
    bs.ctx.cursor = new;
    bs.ctx.break_coalescing();
    ed.mark_all_views(id);
    Ok(())
}

/// Wheel scroll: moves the viewport and drags the cursor along just enough
/// to keep it visible
fn scroll(ed: &mut Editor, lines: isize) {
    let id = ed.current_buffer_id();
    let (line_count, cursor) = {
        let bs = ed.current_ref();
        (bs.buffer.line_count(), bs.ctx.cursor)
    };
    let text_h = ed.windows.current().rect.h.saturating_sub(1).max(1);
    let max_top = line_count.saturating_sub(1);
    let view = &mut ed.windows.current_mut().view;
    view.scroll(lines, max_top);
    let top = view.top_line;

    let bs = ed.buffers.get(id).expect("window buffer exists");
    let cur_line = bs.buffer.find_line_by_pos(cursor);
    let new_line = cur_line.clamp(top, top + text_h - 1).min(max_top);
    if new_line != cur_line {
        let col = motion::display_col(&bs.buffer, cursor);
        let new_pos = motion::pos_at_col(&bs.buffer, new_line, col);
        let bs = ed.current();
        bs.ctx.cursor = new_pos;
        bs.ctx.break_coalescing();
    }
}
