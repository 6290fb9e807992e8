use super::*;

/// Scripted byte source for decoder tests
struct Script {
    bytes: Vec<u8>,
    pos: usize,
    unread: Option<u8>,
}

impl Script {
    fn new(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
            pos: 0,
            unread: None,
        }
    }
}

impl ByteSource for Script {
    fn next_byte(&mut self, _timeout_ms: Option<u64>) -> io::Result<Option<u8>> {
        if let Some(b) = self.unread.take() {
            return Ok(Some(b));
        }
        if self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            self.pos += 1;
            Ok(Some(b))
        } else {
            // Script exhausted behaves like a timeout / closed input
            Ok(None)
        }
    }

    fn unread(&mut self, byte: u8) {
        self.unread = Some(byte);
    }
}

fn keys(bytes: &[u8]) -> Vec<Key> {
    let mut src = Script::new(bytes);
    let mut out = Vec::new();
    while let Some(k) = read_key(&mut src).unwrap() {
        out.push(k);
    }
    out
}

#[test]
fn test_plain_chars() {
    assert_eq!(
        keys(b"ab!"),
        vec![Key::Char('a'), Key::Char('b'), Key::Char('!')]
    );
}

#[test]
fn test_basic_editing_keys() {
    assert_eq!(keys(b"\r"), vec![Key::Enter]);
    assert_eq!(keys(b"\n"), vec![Key::Enter]);
    assert_eq!(keys(&[0x7F]), vec![Key::Backspace]);
    assert_eq!(keys(&[0x08]), vec![Key::Backspace]);
    assert_eq!(keys(b"\t"), vec![Key::Tab]);
}

#[test]
fn test_ctrl_keys() {
    assert_eq!(keys(&[0x01]), vec![Key::Ctrl('a')]);
    assert_eq!(keys(&[0x1A]), vec![Key::Ctrl('z')]);
    assert_eq!(keys(&[0x00]), vec![Key::Ctrl('@')]);
    assert_eq!(keys(&[0x1F]), vec![Key::Ctrl('/')]);
}

#[test]
fn test_lone_escape_resolves_on_quiescence() {
    assert_eq!(keys(&[0x1B]), vec![Key::Escape]);
}

#[test]
fn test_alt_and_ctrl_alt() {
    assert_eq!(keys(b"\x1bf"), vec![Key::Alt('f')]);
    assert_eq!(keys(b"\x1b%"), vec![Key::Alt('%')]);
    assert_eq!(keys(&[0x1B, 0x01]), vec![Key::CtrlAlt('a')]);
}

#[test]
fn test_arrows() {
    assert_eq!(keys(b"\x1b[A"), vec![Key::ArrowUp]);
    assert_eq!(keys(b"\x1b[B"), vec![Key::ArrowDown]);
    assert_eq!(keys(b"\x1b[C"), vec![Key::ArrowRight]);
    assert_eq!(keys(b"\x1b[D"), vec![Key::ArrowLeft]);
}

#[test]
fn test_modified_arrows() {
    assert_eq!(keys(b"\x1b[1;2C"), vec![Key::ShiftArrowRight]);
    assert_eq!(keys(b"\x1b[1;3A"), vec![Key::AltArrowUp]);
    assert_eq!(keys(b"\x1b[1;4D"), vec![Key::ShiftAltArrowLeft]);
}

#[test]
fn test_nav_keys() {
    assert_eq!(keys(b"\x1b[H"), vec![Key::Home]);
    assert_eq!(keys(b"\x1b[F"), vec![Key::End]);
    assert_eq!(keys(b"\x1b[1~"), vec![Key::Home]);
    assert_eq!(keys(b"\x1b[4~"), vec![Key::End]);
    assert_eq!(keys(b"\x1b[5~"), vec![Key::PageUp]);
    assert_eq!(keys(b"\x1b[6~"), vec![Key::PageDown]);
    assert_eq!(keys(b"\x1b[5;2~"), vec![Key::ShiftPageUp]);
    assert_eq!(keys(b"\x1b[3~"), vec![Key::Delete]);
    assert_eq!(keys(b"\x1b[3;3~"), vec![Key::AltDelete]);
}

#[test]
fn test_ctrl_tab_variants() {
    assert_eq!(keys(b"\x1b[27;5;9~"), vec![Key::CtrlTab]);
    assert_eq!(keys(b"\x1b[27;6;9~"), vec![Key::CtrlShiftTab]);
    assert_eq!(keys(b"\x1b[Z"), vec![Key::ShiftTab]);
}

#[test]
fn test_function_keys() {
    assert_eq!(keys(b"\x1bOP"), vec![Key::F(1)]);
    assert_eq!(keys(b"\x1b[11~"), vec![Key::F(1)]);
    assert_eq!(keys(b"\x1b[15~"), vec![Key::F(5)]);
    assert_eq!(keys(b"\x1b[17~"), vec![Key::F(6)]);
    assert_eq!(keys(b"\x1b[24~"), vec![Key::F(12)]);
}

#[test]
fn test_bracketed_paste_framing() {
    assert_eq!(
        keys(b"\x1b[200~hi\x1b[201~"),
        vec![
            Key::PasteStart,
            Key::Char('h'),
            Key::Char('i'),
            Key::PasteEnd
        ]
    );
}

#[test]
fn test_x10_scroll_wheel() {
    assert_eq!(keys(&[0x1B, b'[', b'M', 96, 33, 33]), vec![Key::ScrollUp]);
    assert_eq!(keys(&[0x1B, b'[', b'M', 97, 33, 33]), vec![Key::ScrollDown]);
    // Non-wheel button press is consumed and discarded
    assert_eq!(keys(&[0x1B, b'[', b'M', 32, 33, 33]), vec![]);
}

#[test]
fn test_sgr_mouse_discarded() {
    assert_eq!(keys(b"\x1b[<0;10;5Mx"), vec![Key::Char('x')]);
    assert_eq!(keys(b"\x1b[<0;10;5mx"), vec![Key::Char('x')]);
}

#[test]
fn test_utf8_multibyte() {
    assert_eq!(keys("é".as_bytes()), vec![Key::Char('é')]);
    assert_eq!(keys("漢a".as_bytes()), vec![Key::Char('漢'), Key::Char('a')]);
}

#[test]
fn test_bad_continuation_pushed_back() {
    // 0xC3 expects a continuation; 'x' is not one. The decoder yields
    // U+FFFD and the pushed-back 'x' still parses as its own key.
    let got = keys(&[0xC3, b'x']);
    assert_eq!(got, vec![Key::Char('\u{FFFD}'), Key::Char('x')]);
}

#[test]
fn test_truncated_utf8_yields_replacement() {
    assert_eq!(keys(&[0xE3, 0x81]), vec![Key::Char('\u{FFFD}')]);
}

#[test]
fn test_stray_continuation_byte() {
    assert_eq!(keys(&[0x81, b'a']), vec![Key::Char('\u{FFFD}'), Key::Char('a')]);
}
