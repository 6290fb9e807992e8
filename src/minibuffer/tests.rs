use super::*;

#[test]
fn test_open_and_take() {
    let mut mb = Minibuffer::new();
    mb.open("Find file: ", "");
    mb.insert_char('a');
    mb.insert_char('b');
    assert_eq!(mb.text(), "ab");
    assert_eq!(mb.take(), "ab");
    assert_eq!(mb.text(), "");
    assert!(mb.prompt.is_empty());
}

#[test]
fn test_insert_mid_text() {
    let mut mb = Minibuffer::new();
    mb.open(": ", "ac");
    mb.left();
    mb.insert_char('b');
    assert_eq!(mb.text(), "abc");
    assert_eq!(mb.cursor(), 2);
}

#[test]
fn test_backspace_deletes_whole_cluster() {
    let mut mb = Minibuffer::new();
    mb.open("", "xe\u{301}");
    assert!(mb.backspace());
    assert_eq!(mb.text(), "x");
    assert!(mb.backspace());
    assert_eq!(mb.text(), "");
    assert!(!mb.backspace());
}

#[test]
fn test_delete_under_cursor() {
    let mut mb = Minibuffer::new();
    mb.open("", "漢x");
    mb.home();
    assert!(mb.delete());
    assert_eq!(mb.text(), "x");
    assert!(mb.delete());
    assert!(!mb.delete());
}

#[test]
fn test_motion_over_wide_chars() {
    let mut mb = Minibuffer::new();
    mb.open("", "a漢b");
    mb.home();
    mb.right();
    assert_eq!(mb.cursor(), 1);
    mb.right();
    assert_eq!(mb.cursor(), 4);
    mb.left();
    assert_eq!(mb.cursor(), 1);
    mb.end();
    assert_eq!(mb.cursor(), 5);
}

#[test]
fn test_display_col_counts_widths() {
    let mut mb = Minibuffer::new();
    mb.open("> ", "a漢");
    assert_eq!(mb.display_col(8), 2 + 1 + 2);
}

#[test]
fn test_history_recall_replaces_text() {
    let mut mb = Minibuffer::new();
    mb.open("$ ", "typed");
    mb.set_text("recalled");
    assert_eq!(mb.text(), "recalled");
    assert_eq!(mb.cursor(), 8);
}
