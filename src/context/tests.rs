use super::*;

fn text(buf: &Buffer) -> String {
    String::from_utf8(buf.to_bytes()).unwrap()
}

/// Insert through the buffer and record it, the way commands do
fn do_insert(buf: &mut Buffer, ctx: &mut EditContext, pos: usize, s: &str) {
    buf.insert(pos, s.as_bytes());
    ctx.record_insert(pos, s.as_bytes(), ctx.cursor);
    ctx.cursor = pos + s.len();
}

fn do_delete(buf: &mut Buffer, ctx: &mut EditContext, pos: usize, len: usize) {
    let removed = buf.slice_to_vec(pos..pos + len);
    buf.delete(pos, len);
    ctx.record_delete(pos, removed, ctx.cursor);
    ctx.cursor = pos;
}

#[test]
fn test_fresh_context_is_unmodified() {
    let ctx = EditContext::new();
    assert!(!ctx.modified());
    assert!(!ctx.can_undo());
    assert!(!ctx.can_redo());
}

#[test]
fn test_undo_insert_restores_empty() {
    let mut buf = Buffer::new();
    let mut ctx = EditContext::new();
    do_insert(&mut buf, &mut ctx, 0, "hello");
    assert!(ctx.modified());

    let cursor = ctx.undo(&mut buf).unwrap();
    assert_eq!(text(&buf), "");
    assert_eq!(cursor, 0);
    assert!(!ctx.modified());
}

#[test]
fn test_undo_redo_roundtrip_bytes_and_cursor() {
    let mut buf = Buffer::new();
    let mut ctx = EditContext::new();
    do_insert(&mut buf, &mut ctx, 0, "abc");
    ctx.break_coalescing();
    do_insert(&mut buf, &mut ctx, 1, "XY");
    ctx.break_coalescing();
    do_delete(&mut buf, &mut ctx, 0, 2);
    let final_text = text(&buf);

    while ctx.can_undo() {
        ctx.undo(&mut buf);
    }
    assert_eq!(text(&buf), "");
    let mut last = 0;
    while ctx.can_redo() {
        last = ctx.redo(&mut buf).unwrap();
    }
    assert_eq!(text(&buf), final_text);
    assert_eq!(last, 0);
}

#[test]
fn test_typing_coalesces_to_one_entry() {
    let mut buf = Buffer::new();
    let mut ctx = EditContext::new();
    for (i, c) in ["h", "e", "y"].iter().enumerate() {
        do_insert(&mut buf, &mut ctx, i, c);
    }
    assert_eq!(ctx.undo_depth(), 1);
    ctx.undo(&mut buf);
    assert_eq!(text(&buf), "");
}

#[test]
fn test_non_contiguous_insert_breaks_coalescing() {
    let mut buf = Buffer::new();
    let mut ctx = EditContext::new();
    do_insert(&mut buf, &mut ctx, 0, "ab");
    do_insert(&mut buf, &mut ctx, 0, "c");
    assert_eq!(ctx.undo_depth(), 2);
}

#[test]
fn test_timeout_breaks_coalescing() {
    let mut buf = Buffer::new();
    let mut ctx = EditContext::new();
    let t0 = Instant::now();
    buf.insert(0, b"a");
    ctx.record_insert_with_time(0, b"a", 0, t0);
    buf.insert(1, b"b");
    ctx.record_insert_with_time(1, b"b", 1, t0 + Duration::from_millis(1500));
    assert_eq!(ctx.undo_depth(), 2);
}

#[test]
fn test_backspace_run_coalesces() {
    let mut buf = Buffer::from_bytes(b"abcd".to_vec());
    let mut ctx = EditContext::new();
    ctx.cursor = 4;
    do_delete(&mut buf, &mut ctx, 3, 1);
    do_delete(&mut buf, &mut ctx, 2, 1);
    do_delete(&mut buf, &mut ctx, 1, 1);
    assert_eq!(ctx.undo_depth(), 1);
    ctx.undo(&mut buf);
    assert_eq!(text(&buf), "abcd");
}

#[test]
fn test_forward_delete_run_coalesces() {
    let mut buf = Buffer::from_bytes(b"abcd".to_vec());
    let mut ctx = EditContext::new();
    do_delete(&mut buf, &mut ctx, 0, 1);
    do_delete(&mut buf, &mut ctx, 0, 1);
    assert_eq!(ctx.undo_depth(), 1);
    ctx.undo(&mut buf);
    assert_eq!(text(&buf), "abcd");
}

#[test]
fn test_mixed_kinds_do_not_coalesce() {
    let mut buf = Buffer::new();
    let mut ctx = EditContext::new();
    do_insert(&mut buf, &mut ctx, 0, "ab");
    do_delete(&mut buf, &mut ctx, 1, 1);
    do_insert(&mut buf, &mut ctx, 1, "c");
    assert_eq!(ctx.undo_depth(), 3);
}

#[test]
fn test_group_undone_as_one() {
    let mut buf = Buffer::new();
    let mut ctx = EditContext::new();
    do_insert(&mut buf, &mut ctx, 0, "base ");
    ctx.begin_group();
    do_insert(&mut buf, &mut ctx, 5, "one ");
    do_delete(&mut buf, &mut ctx, 0, 2);
    do_insert(&mut buf, &mut ctx, 0, "XX");
    ctx.end_group();
    assert_eq!(text(&buf), "XXse one ");

    let cursor = ctx.undo(&mut buf).unwrap();
    assert_eq!(text(&buf), "base ");
    assert_eq!(cursor, 5);

    ctx.redo(&mut buf);
    assert_eq!(text(&buf), "XXse one ");
}

#[test]
fn test_empty_group_leaves_no_entry() {
    let mut ctx = EditContext::new();
    ctx.begin_group();
    ctx.end_group();
    assert!(!ctx.can_undo());
}

#[test]
fn test_edits_inside_group_do_not_coalesce_with_outside() {
    let mut buf = Buffer::new();
    let mut ctx = EditContext::new();
    do_insert(&mut buf, &mut ctx, 0, "a");
    ctx.begin_group();
    do_insert(&mut buf, &mut ctx, 1, "b");
    ctx.end_group();
    // marker + group (begin, insert, end) + initial insert
    assert_eq!(ctx.undo_depth(), 4);
    ctx.undo(&mut buf);
    assert_eq!(text(&buf), "a");
}

#[test]
fn test_new_edit_clears_redo() {
    let mut buf = Buffer::new();
    let mut ctx = EditContext::new();
    do_insert(&mut buf, &mut ctx, 0, "a");
    ctx.undo(&mut buf);
    assert!(ctx.can_redo());
    do_insert(&mut buf, &mut ctx, 0, "b");
    assert!(!ctx.can_redo());
}

#[test]
fn test_savepoint_tracks_modified() {
    let mut buf = Buffer::new();
    let mut ctx = EditContext::new();
    do_insert(&mut buf, &mut ctx, 0, "a");
    assert!(ctx.modified());
    ctx.mark_saved();
    assert!(!ctx.modified());
    ctx.break_coalescing();
    do_insert(&mut buf, &mut ctx, 1, "b");
    assert!(ctx.modified());
    ctx.undo(&mut buf);
    assert!(!ctx.modified());
}

#[test]
fn test_replace_roundtrip() {
    let mut buf = Buffer::from_bytes(b"abc".to_vec());
    let mut ctx = EditContext::new();
    buf.delete(0, 3);
    buf.insert(0, b"xyz!");
    ctx.record_replace(0, b"abc".to_vec(), b"xyz!".to_vec(), 0);
    assert_eq!(text(&buf), "xyz!");

    ctx.undo(&mut buf);
    assert_eq!(text(&buf), "abc");
    let cursor = ctx.redo(&mut buf).unwrap();
    assert_eq!(text(&buf), "xyz!");
    assert_eq!(cursor, 4);
}

#[test]
fn test_depth_cap_drops_oldest_and_shifts_savepoint() {
    let mut buf = Buffer::new();
    let mut ctx = EditContext::new();
    do_insert(&mut buf, &mut ctx, 0, "s");
    ctx.mark_saved();
    for i in 0..crate::constants::limits::UNDO_DEPTH + 10 {
        ctx.break_coalescing();
        do_insert(&mut buf, &mut ctx, i + 1, "x");
    }
    assert_eq!(ctx.undo_depth(), crate::constants::limits::UNDO_DEPTH);
    // The savepoint fell off the bottom; the buffer must still read modified
    assert!(ctx.modified());
}

#[test]
fn test_kill_ring_single_slot() {
    let mut ring = KillRing::default();
    assert!(ring.get().is_none());
    ring.kill(b"one");
    assert_eq!(ring.get().unwrap(), b"one");
    ring.kill(b"two");
    assert_eq!(ring.get().unwrap(), b"two");
}

#[test]
fn test_rect_ring_disjoint_from_kill_ring() {
    let mut kill = KillRing::default();
    let mut rect = RectRing::default();
    rect.kill(vec![b"ab".to_vec(), b"cd".to_vec()]);
    assert!(kill.get().is_none());
    assert_eq!(rect.get().unwrap().len(), 2);
    kill.kill(b"z");
    assert_eq!(rect.get().unwrap()[0], b"ab");
}
