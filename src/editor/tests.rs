use super::*;
use crate::buffer::Buffer;
use crate::context::EditContext;

fn editor() -> Editor {
    Editor::new(
        Size { rows: 24, cols: 80 },
        None,
        false,
    )
    .unwrap()
}

/// Load text into the current buffer as if it had been opened from disk
fn set_text(ed: &mut Editor, s: &str) {
    let bs = ed.current();
    bs.buffer = Buffer::from_bytes(s.as_bytes().to_vec());
    bs.ctx = EditContext::new();
    let id = ed.current_buffer_id();
    ed.mark_all_views(id);
}

fn text(ed: &Editor) -> String {
    String::from_utf8(ed.current_ref().buffer.to_bytes()).unwrap()
}

fn cursor(ed: &Editor) -> usize {
    ed.current_ref().ctx.cursor
}

fn feed(ed: &mut Editor, keys: &[Key]) {
    for k in keys {
        ed.dispatch_key(*k).unwrap();
    }
}

fn type_str(ed: &mut Editor, s: &str) {
    for c in s.chars() {
        let key = match c {
            '\n' => Key::Enter,
            '\t' => Key::Tab,
            other => Key::Char(other),
        };
        ed.dispatch_key(key).unwrap();
    }
}

fn wait_shell(ed: &mut Editor) {
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
    while ed.shell.is_some() {
        assert!(std::time::Instant::now() < deadline, "shell job hung");
        ed.tick_shell();
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
}

// =============================================================================
// Spec walkthroughs
// =============================================================================

#[test]
fn test_scenario_type_hello_then_undo() {
    let mut ed = editor();
    type_str(&mut ed, "hello");
    assert_eq!(text(&ed), "hello");
    assert!(ed.current_ref().ctx.modified());

    feed(&mut ed, &[Key::Ctrl('/')]);
    assert_eq!(text(&ed), "");
    assert!(!ed.current_ref().ctx.modified());
}

#[test]
fn test_scenario_query_replace_bang() {
    let mut ed = editor();
    set_text(&mut ed, "abc\nabc\n");

    feed(&mut ed, &[Key::Alt('%')]);
    type_str(&mut ed, "abc");
    feed(&mut ed, &[Key::Enter]);
    type_str(&mut ed, "x");
    feed(&mut ed, &[Key::Enter]);
    assert_eq!(ed.mode, Mode::ReplaceAsk);
    feed(&mut ed, &[Key::Char('!')]);

    assert_eq!(text(&ed), "x\nx\n");
    feed(&mut ed, &[Key::Ctrl('/')]);
    assert_eq!(text(&ed), "abc\nabc\n");
}

#[test]
fn test_scenario_word_motion() {
    let mut ed = editor();
    set_text(&mut ed, "one two three");
    feed(&mut ed, &[Key::Alt('f')]);
    assert_eq!(cursor(&ed), 4);
    feed(&mut ed, &[Key::Alt('b')]);
    assert_eq!(cursor(&ed), 0);
}

#[test]
fn test_scenario_isearch_and_wrap() {
    let mut ed = editor();
    let body: String = (0..1000).map(|i| format!("line-{}\n", i)).collect();
    set_text(&mut ed, &body);

    feed(&mut ed, &[Key::Ctrl('s')]);
    type_str(&mut ed, "line-500");
    feed(&mut ed, &[Key::Enter]);
    let expect = body.find("line-500\n").unwrap();
    assert_eq!(cursor(&ed), expect);

    // From the end of the buffer, C-s C-s wraps to the first occurrence
    feed(&mut ed, &[Key::Alt('>')]);
    feed(&mut ed, &[Key::Ctrl('s'), Key::Ctrl('s'), Key::Enter]);
    assert_eq!(cursor(&ed), expect);
}

#[test]
fn test_scenario_rectangle_kill_and_yank() {
    let mut ed = editor();
    set_text(&mut ed, "abcdefgh\nbcdefghi\ncdefghij\n");

    // Mark at line 0 col 2, cursor at line 2 col 6
    ed.current().ctx.cursor = 2;
    feed(&mut ed, &[Key::Ctrl('@')]);
    ed.current().ctx.cursor = ed.current_ref().buffer.get_line_start(2) + 6;
    feed(&mut ed, &[Key::Ctrl('x'), Key::Char('r'), Key::Char('k')]);
    assert_eq!(text(&ed), "abgh\nbchi\ncdij\n");
    assert_eq!(ed.rect_ring.get().unwrap().len(), 3);

    // Yank the block back at a different column
    ed.current().ctx.cursor = 1;
    feed(&mut ed, &[Key::Ctrl('x'), Key::Char('r'), Key::Char('y')]);
    assert_eq!(text(&ed), "acdefbgh\nbdefgchi\ncefghdij\n");
}

#[test]
fn test_scenario_shell_sort_replace_and_undo() {
    let mut ed = editor();
    set_text(&mut ed, "c\nb\na\n");

    feed(&mut ed, &[Key::Alt('|')]);
    type_str(&mut ed, "%|sort >");
    feed(&mut ed, &[Key::Enter]);
    wait_shell(&mut ed);

    assert_eq!(text(&ed), "a\nb\nc\n");
    feed(&mut ed, &[Key::Ctrl('/')]);
    assert_eq!(text(&ed), "c\nb\na\n");
}

// =============================================================================
// Editing through the keymap
// =============================================================================

#[test]
fn test_kill_line_and_yank() {
    let mut ed = editor();
    set_text(&mut ed, "first line\nsecond\n");
    ed.current().ctx.cursor = 6;
    feed(&mut ed, &[Key::Ctrl('k')]);
    assert_eq!(text(&ed), "first \nsecond\n");
    feed(&mut ed, &[Key::Ctrl('y')]);
    assert_eq!(text(&ed), "first line\nsecond\n");
}

#[test]
fn test_kill_whole_line_at_col0() {
    let mut ed = editor();
    set_text(&mut ed, "one\ntwo\n");
    feed(&mut ed, &[Key::Ctrl('k')]);
    assert_eq!(text(&ed), "two\n");
    assert_eq!(ed.kill_ring.get().unwrap(), b"one\n");
}

#[test]
fn test_kill_newline_at_line_end() {
    let mut ed = editor();
    set_text(&mut ed, "one\ntwo\n");
    ed.current().ctx.cursor = 3;
    feed(&mut ed, &[Key::Ctrl('k')]);
    assert_eq!(text(&ed), "onetwo\n");
}

#[test]
fn test_region_kill_copy_yank() {
    let mut ed = editor();
    set_text(&mut ed, "hello world");
    feed(&mut ed, &[Key::Ctrl('@')]);
    ed.current().ctx.cursor = 5;
    feed(&mut ed, &[Key::Ctrl('w')]);
    assert_eq!(text(&ed), " world");
    assert_eq!(ed.kill_ring.get().unwrap(), b"hello");

    // Copy does not mutate
    feed(&mut ed, &[Key::Ctrl('@')]);
    ed.current().ctx.cursor = 6;
    feed(&mut ed, &[Key::Alt('w')]);
    assert_eq!(text(&ed), " world");
    assert_eq!(ed.kill_ring.get().unwrap(), b" world");
}

#[test]
fn test_yank_is_single_undo_group() {
    let mut ed = editor();
    set_text(&mut ed, "");
    ed.kill_ring.kill(b"paste me");
    feed(&mut ed, &[Key::Ctrl('y')]);
    assert_eq!(text(&ed), "paste me");
    feed(&mut ed, &[Key::Ctrl('/')]);
    assert_eq!(text(&ed), "");
}

#[test]
fn test_delete_char_at_eof_is_noop() {
    let mut ed = editor();
    set_text(&mut ed, "ab");
    ed.current().ctx.cursor = 2;
    feed(&mut ed, &[Key::Ctrl('d')]);
    assert_eq!(text(&ed), "ab");
    assert!(!ed.current_ref().ctx.modified());

    // Same on a fully empty buffer
    set_text(&mut ed, "");
    feed(&mut ed, &[Key::Ctrl('d')]);
    assert!(!ed.current_ref().ctx.modified());
}

#[test]
fn test_toggle_comment_twice_is_noop() {
    let mut ed = editor();
    set_text(&mut ed, "    let x = 1;\n");
    ed.current().language = crate::language::lookup("rust").unwrap();
    feed(&mut ed, &[Key::Alt(';')]);
    assert_eq!(text(&ed), "    // let x = 1;\n");
    feed(&mut ed, &[Key::Alt(';')]);
    assert_eq!(text(&ed), "    let x = 1;\n");
}

#[test]
fn test_move_line_down_and_up() {
    let mut ed = editor();
    set_text(&mut ed, "aaa\nbbb\nccc\n");
    ed.current().ctx.cursor = 1;
    feed(&mut ed, &[Key::AltArrowDown]);
    assert_eq!(text(&ed), "bbb\naaa\nccc\n");
    // Cursor followed its line
    assert_eq!(cursor(&ed), 5);
    feed(&mut ed, &[Key::AltArrowUp]);
    assert_eq!(text(&ed), "aaa\nbbb\nccc\n");
    assert_eq!(cursor(&ed), 1);
}

#[test]
fn test_duplicate_line() {
    let mut ed = editor();
    set_text(&mut ed, "one\ntwo\n");
    feed(&mut ed, &[Key::Ctrl('x'), Key::Ctrl('d')]);
    assert_eq!(text(&ed), "one\none\ntwo\n");
}

#[test]
fn test_join_line() {
    let mut ed = editor();
    set_text(&mut ed, "one\n    two\n");
    feed(&mut ed, &[Key::Alt('j')]);
    assert_eq!(text(&ed), "one two\n");
    assert_eq!(cursor(&ed), 3);
}

#[test]
fn test_shift_select_then_plain_motion_clears() {
    let mut ed = editor();
    set_text(&mut ed, "abcdef");
    feed(&mut ed, &[Key::ShiftArrowRight, Key::ShiftArrowRight]);
    assert_eq!(ed.current_ref().ctx.mark, Some(0));
    assert_eq!(cursor(&ed), 2);
    assert!(ed.windows.current().shift_select);

    feed(&mut ed, &[Key::ArrowRight]);
    assert_eq!(ed.current_ref().ctx.mark, None);
    assert!(!ed.windows.current().shift_select);
}

#[test]
fn test_explicit_mark_survives_motion() {
    let mut ed = editor();
    set_text(&mut ed, "abcdef");
    feed(&mut ed, &[Key::Ctrl('@'), Key::ArrowRight, Key::ArrowRight]);
    assert_eq!(ed.current_ref().ctx.mark, Some(0));
    assert_eq!(cursor(&ed), 2);
}

#[test]
fn test_indent_and_unindent_region() {
    let mut ed = editor();
    set_text(&mut ed, "a\nb\n");
    ed.current().language = crate::language::lookup("rust").unwrap();
    feed(&mut ed, &[Key::Ctrl('@')]);
    ed.current().ctx.cursor = 4;
    feed(&mut ed, &[Key::Tab]);
    assert_eq!(text(&ed), "    a\n    b\n");
    feed(&mut ed, &[Key::ShiftTab]);
    assert_eq!(text(&ed), "a\nb\n");
}

#[test]
fn test_bracketed_paste_is_one_undo_group() {
    let mut ed = editor();
    set_text(&mut ed, "");
    feed(&mut ed, &[Key::PasteStart]);
    type_str(&mut ed, "two\nlines");
    feed(&mut ed, &[Key::PasteEnd]);
    assert_eq!(text(&ed), "two\nlines");
    feed(&mut ed, &[Key::Ctrl('/')]);
    assert_eq!(text(&ed), "");
}

#[test]
fn test_goto_line_prompt() {
    let mut ed = editor();
    set_text(&mut ed, "a\nb\nc\nd\n");
    feed(&mut ed, &[Key::Alt('g')]);
    type_str(&mut ed, "3");
    feed(&mut ed, &[Key::Enter]);
    assert_eq!(cursor(&ed), 4);
}

// =============================================================================
// Macros
// =============================================================================

#[test]
fn test_macro_record_and_replay() {
    let mut ed = editor();
    set_text(&mut ed, "");
    feed(&mut ed, &[Key::Ctrl('x'), Key::Char('(')]);
    assert!(ed.recording);
    type_str(&mut ed, "ab");
    feed(&mut ed, &[Key::Ctrl('x'), Key::Char(')')]);
    assert!(!ed.recording);
    assert_eq!(text(&ed), "ab");

    feed(&mut ed, &[Key::Ctrl('x'), Key::Char('e')]);
    assert_eq!(text(&ed), "abab");
    feed(&mut ed, &[Key::Ctrl('x'), Key::Char('e')]);
    assert_eq!(text(&ed), "ababab");
}

#[test]
fn test_macro_filters_its_own_trigger_keys() {
    let mut ed = editor();
    set_text(&mut ed, "");
    feed(&mut ed, &[Key::Ctrl('x'), Key::Char('(')]);
    type_str(&mut ed, "x");
    feed(&mut ed, &[Key::Ctrl('x'), Key::Char(')')]);
    assert_eq!(ed.macro_keys, vec![Key::Char('x')]);
}

// =============================================================================
// Windows and buffers through the keymap
// =============================================================================

#[test]
fn test_split_and_close_windows() {
    let mut ed = editor();
    feed(&mut ed, &[Key::Ctrl('x'), Key::Char('2')]);
    assert_eq!(ed.windows.len(), 2);
    feed(&mut ed, &[Key::Ctrl('x'), Key::Char('o')]);
    assert_eq!(ed.windows.current_index(), 1);
    feed(&mut ed, &[Key::Ctrl('x'), Key::Char('0')]);
    assert_eq!(ed.windows.len(), 1);
}

#[test]
fn test_windows_share_buffer_and_dirty_marks() {
    let mut ed = editor();
    set_text(&mut ed, "shared\n");
    feed(&mut ed, &[Key::Ctrl('x'), Key::Char('2')]);
    // Render once to clear dirt, then edit and check both views are dirty
    let mut sink = Vec::new();
    ed.render_to(&mut sink).unwrap();
    assert!(ed.windows.iter().all(|w| !w.view.is_dirty()));
    type_str(&mut ed, "x");
    assert!(ed.windows.iter().all(|w| w.view.is_dirty()));
}

#[test]
fn test_kill_modified_buffer_asks() {
    let mut ed = editor();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("f.txt");
    std::fs::write(&path, b"disk\n").unwrap();
    let id = ed.buffers.open_file(&path, false).unwrap();
    ed.show_buffer(id);
    type_str(&mut ed, "edit ");
    feed(&mut ed, &[Key::Ctrl('x'), Key::Char('k')]);
    assert!(matches!(ed.mode, Mode::Confirm(ConfirmKind::KillBuffer(_))));
    // n: discard modifications and kill
    feed(&mut ed, &[Key::Char('n')]);
    assert_eq!(ed.mode, Mode::Main);
    assert!(ed.buffers.get(id).is_none());
    assert_eq!(ed.current_buffer_id(), ed.buffers.scratch_id());
    assert_eq!(std::fs::read(&path).unwrap(), b"disk\n");
}

#[test]
fn test_quit_unmodified_is_immediate() {
    let mut ed = editor();
    feed(&mut ed, &[Key::Ctrl('x'), Key::Ctrl('c')]);
    assert!(ed.should_quit);
}

#[test]
fn test_quit_modified_asks_and_cancel_stays() {
    let mut ed = editor();
    type_str(&mut ed, "dirty");
    feed(&mut ed, &[Key::Ctrl('x'), Key::Ctrl('c')]);
    assert!(matches!(ed.mode, Mode::Confirm(ConfirmKind::Quit)));
    feed(&mut ed, &[Key::Char('c')]);
    assert!(!ed.should_quit);
    assert_eq!(ed.mode, Mode::Main);
}

// =============================================================================
// Query replace details
// =============================================================================

#[test]
fn test_query_replace_all_n_leaves_unchanged() {
    let mut ed = editor();
    set_text(&mut ed, "a a a");
    feed(&mut ed, &[Key::Alt('%')]);
    type_str(&mut ed, "a");
    feed(&mut ed, &[Key::Enter]);
    type_str(&mut ed, "b");
    feed(&mut ed, &[Key::Enter]);
    feed(&mut ed, &[Key::Char('n'), Key::Char('n'), Key::Char('n')]);
    assert_eq!(ed.mode, Mode::Main);
    assert_eq!(text(&ed), "a a a");
    // Nothing to undo either
    assert!(!ed.current_ref().ctx.can_undo());
}

#[test]
fn test_query_replace_mixed_answers() {
    let mut ed = editor();
    set_text(&mut ed, "x x x x");
    feed(&mut ed, &[Key::Alt('%')]);
    type_str(&mut ed, "x");
    feed(&mut ed, &[Key::Enter]);
    type_str(&mut ed, "Y");
    feed(&mut ed, &[Key::Enter]);
    // y, n, then ! for the rest; the n-answered match stays untouched
    feed(&mut ed, &[Key::Char('y'), Key::Char('n'), Key::Char('!')]);
    assert_eq!(text(&ed), "Y x Y Y");
    // One undo reverses the whole run
    feed(&mut ed, &[Key::Ctrl('/')]);
    assert_eq!(text(&ed), "x x x x");
}

#[test]
fn test_query_replace_quit_midway() {
    let mut ed = editor();
    set_text(&mut ed, "k k k");
    feed(&mut ed, &[Key::Alt('%')]);
    type_str(&mut ed, "k");
    feed(&mut ed, &[Key::Enter]);
    type_str(&mut ed, "m");
    feed(&mut ed, &[Key::Enter]);
    feed(&mut ed, &[Key::Char('y'), Key::Char('q')]);
    assert_eq!(text(&ed), "m k k");
}

// =============================================================================
// Shell sinks
// =============================================================================

#[test]
fn test_shell_insert_sink() {
    let mut ed = editor();
    set_text(&mut ed, "ab");
    ed.current().ctx.cursor = 1;
    feed(&mut ed, &[Key::Alt('|')]);
    type_str(&mut ed, "|printf X +>");
    feed(&mut ed, &[Key::Enter]);
    wait_shell(&mut ed);
    assert_eq!(text(&ed), "aXb");
}

#[test]
fn test_shell_line_source_replace() {
    let mut ed = editor();
    set_text(&mut ed, "hello\nworld\n");
    ed.current().ctx.cursor = 7;
    feed(&mut ed, &[Key::Alt('|')]);
    type_str(&mut ed, ".| tr a-z A-Z >");
    feed(&mut ed, &[Key::Enter]);
    wait_shell(&mut ed);
    assert_eq!(text(&ed), "hello\nWORLD\n");
}

#[test]
fn test_shell_new_buffer_sink() {
    let mut ed = editor();
    set_text(&mut ed, "seed");
    feed(&mut ed, &[Key::Alt('|')]);
    type_str(&mut ed, "|echo made n>");
    feed(&mut ed, &[Key::Enter]);
    wait_shell(&mut ed);
    assert_eq!(text(&ed), "made\n");
    assert_eq!(ed.current_ref().name, "*output*");
}

#[test]
fn test_shell_selection_required_for_replace_sink() {
    let mut ed = editor();
    set_text(&mut ed, "abc");
    feed(&mut ed, &[Key::Alt('|')]);
    type_str(&mut ed, "|cat >");
    feed(&mut ed, &[Key::Enter]);
    assert!(ed.shell.is_none());
    assert_eq!(
        ed.status_msg.as_deref(),
        Some(ZeError::NoActiveRegion.to_string().as_str())
    );
}

#[test]
fn test_shell_nonzero_exit_reports() {
    let mut ed = editor();
    set_text(&mut ed, "x");
    feed(&mut ed, &[Key::Ctrl('@')]);
    ed.current().ctx.cursor = 1;
    feed(&mut ed, &[Key::Alt('|')]);
    type_str(&mut ed, "|false");
    feed(&mut ed, &[Key::Enter]);
    wait_shell(&mut ed);
    let msg = ed.status_msg.clone().unwrap_or_default();
    assert!(msg.contains("status 1"), "unexpected status: {}", msg);
}

// =============================================================================
// Rendering smoke
// =============================================================================

#[test]
fn test_render_emits_content_and_parks_cursor() {
    let mut ed = editor();
    set_text(&mut ed, "hello\n");
    let mut sink = Vec::new();
    ed.render_to(&mut sink).unwrap();
    let frame = String::from_utf8_lossy(&sink);
    assert!(frame.contains("hello"));

    // Second render with no changes emits almost nothing
    let mut sink2 = Vec::new();
    ed.render_to(&mut sink2).unwrap();
    assert!(sink2.len() < sink.len() / 4);
}

#[test]
fn test_status_line_shows_name_and_modified() {
    let mut ed = editor();
    type_str(&mut ed, "z");
    let mut sink = Vec::new();
    ed.render_to(&mut sink).unwrap();
    let frame = String::from_utf8_lossy(&sink);
    assert!(frame.contains("*scratch* *"));
}

#[test]
fn test_resize_rescales_layout() {
    let mut ed = editor();
    feed(&mut ed, &[Key::Ctrl('x'), Key::Char('2')]);
    ed.screen = Size { rows: 12, cols: 40 };
    ed.grid.resize(12, 40);
    ed.windows.recalculate_window_sizes(40, 11);
    for w in ed.windows.iter() {
        assert!(w.rect.x + w.rect.w <= 40);
        assert!(w.rect.y + w.rect.h <= 11);
    }
}
