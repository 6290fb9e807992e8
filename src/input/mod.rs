//! Byte-stream key decoder
//!
//! Turns raw terminal bytes into [`Key`] events: C0 controls, ESC-prefixed
//! Alt and Ctrl-Alt combinations, the CSI table (arrows with modifiers,
//! nav keys, F-keys, bracketed-paste framing, mouse), and multi-byte UTF-8
//! assembly. A wrong continuation byte is pushed back and U+FFFD yielded so
//! the next key still parses cleanly; the decoder never desynchronises.

use std::io;

use crate::constants::input::ESC_TIMEOUT_MS;
use crate::grapheme;
use crate::key::Key;

/// Where the decoder pulls bytes from; the terminal reader implements this,
/// tests substitute a scripted source
pub trait ByteSource {
    /// `timeout_ms: None` blocks; `Some(ms)` may return `Ok(None)`
    fn next_byte(&mut self, timeout_ms: Option<u64>) -> io::Result<Option<u8>>;
    /// One byte of pushback
    fn unread(&mut self, byte: u8);
}

impl ByteSource for crate::term::reader::KeyReader {
    fn next_byte(&mut self, timeout_ms: Option<u64>) -> io::Result<Option<u8>> {
        crate::term::reader::KeyReader::next_byte(self, timeout_ms)
    }
    fn unread(&mut self, byte: u8) {
        crate::term::reader::KeyReader::unread(self, byte)
    }
}

/// Decode the next key. Blocks for the first byte; returns `Ok(None)` only
/// when the source is exhausted.
pub fn read_key<S: ByteSource>(src: &mut S) -> io::Result<Option<Key>> {
    loop {
        let Some(b) = src.next_byte(None)? else {
            return Ok(None);
        };
        match b {
            b'\r' | b'\n' => return Ok(Some(Key::Enter)),
            0x08 | 0x7F => return Ok(Some(Key::Backspace)),
            b'\t' => return Ok(Some(Key::Tab)),
            0x1B => {
                if let Some(key) = decode_escape(src)? {
                    return Ok(Some(key));
                }
                // Consumed-and-discarded sequence; keep reading
            }
            0x00 => return Ok(Some(Key::Ctrl('@'))),
            0x1F => return Ok(Some(Key::Ctrl('/'))),
            0x01..=0x1A => return Ok(Some(Key::Ctrl((b + 0x60) as char))),
            0x1C => return Ok(Some(Key::Ctrl('\\'))),
            0x1D => return Ok(Some(Key::Ctrl(']'))),
            0x1E => return Ok(Some(Key::Ctrl('^'))),
            0x20..=0x7E => return Ok(Some(Key::Char(b as char))),
            _ => return Ok(Some(Key::Char(assemble_utf8(src, b)?))),
        }
    }
}

/// After a lone ESC: quiescence resolves as the Escape key, otherwise the
/// byte selects Ctrl-Alt, Alt, CSI, or SS3 decoding
fn decode_escape<S: ByteSource>(src: &mut S) -> io::Result<Option<Key>> {
    let Some(b) = src.next_byte(Some(ESC_TIMEOUT_MS))? else {
        return Ok(Some(Key::Escape));
    };
    match b {
        b'[' => decode_csi(src),
        b'O' => decode_ss3(src),
        0x1B => {
            src.unread(b);
            Ok(Some(Key::Escape))
        }
        0x01..=0x1A => Ok(Some(Key::CtrlAlt((b + 0x60) as char))),
        0x7F => Ok(Some(Key::AltBackspace)),
        0x20..=0x7E => Ok(Some(Key::Alt(b as char))),
        _ => Ok(Some(Key::Char(assemble_utf8(src, b)?))),
    }
}

fn decode_ss3<S: ByteSource>(src: &mut S) -> io::Result<Option<Key>> {
    let Some(b) = src.next_byte(Some(ESC_TIMEOUT_MS))? else {
        return Ok(Some(Key::Escape));
    };
    Ok(match b {
        b'A' => Some(Key::ArrowUp),
        b'B' => Some(Key::ArrowDown),
        b'C' => Some(Key::ArrowRight),
        b'D' => Some(Key::ArrowLeft),
        b'H' => Some(Key::Home),
        b'F' => Some(Key::End),
        b'P'..=b'S' => Some(Key::F(b - b'P' + 1)),
        _ => None,
    })
}

fn decode_csi<S: ByteSource>(src: &mut S) -> io::Result<Option<Key>> {
    let Some(first) = src.next_byte(Some(ESC_TIMEOUT_MS))? else {
        // Bare ESC [ — treat as Alt+[
        return Ok(Some(Key::Alt('[')));
    };

    // X10 mouse: ESC [ M {button} {x} {y}
    if first == b'M' {
        return decode_x10_mouse(src);
    }
    // SGR mouse: ESC [ < ... (m|M) — consumed and discarded
    if first == b'<' {
        while let Some(b) = src.next_byte(Some(ESC_TIMEOUT_MS))? {
            if b == b'm' || b == b'M' {
                break;
            }
        }
        return Ok(None);
    }

    let mut params = Vec::new();
    let mut byte = first;
    loop {
        match byte {
            0x30..=0x3F => params.push(byte),
            0x20..=0x2F => {} // intermediates, ignored
            0x40..=0x7E => return Ok(dispatch_csi(&params, byte)),
            _ => return Ok(None),
        }
        byte = match src.next_byte(Some(ESC_TIMEOUT_MS))? {
            Some(b) => b,
            None => return Ok(None),
        };
    }
}

fn decode_x10_mouse<S: ByteSource>(src: &mut S) -> io::Result<Option<Key>> {
    let mut raw = [0u8; 3];
    for slot in &mut raw {
        match src.next_byte(Some(ESC_TIMEOUT_MS))? {
            Some(b) => *slot = b,
            None => return Ok(None),
        }
    }
    Ok(match raw[0] {
        96 => Some(Key::ScrollUp),
        97 => Some(Key::ScrollDown),
        _ => None,
    })
}

fn parse_params(params: &[u8]) -> Vec<u32> {
    let mut out = Vec::new();
    let mut cur: Option<u32> = None;
    for &b in params {
        match b {
            b'0'..=b'9' => {
                cur = Some(cur.unwrap_or(0) * 10 + u32::from(b - b'0'));
            }
            b';' => {
                out.push(cur.take().unwrap_or(0));
            }
            _ => {}
        }
    }
    if let Some(v) = cur {
        out.push(v);
    }
    out
}

fn dispatch_csi(params: &[u8], final_byte: u8) -> Option<Key> {
    let nums = parse_params(params);
    let modifier = if nums.len() >= 2 { nums[1] } else { 1 };

    match final_byte {
        b'A' | b'B' | b'C' | b'D' => {
            let plain = match final_byte {
                b'A' => Key::ArrowUp,
                b'B' => Key::ArrowDown,
                b'C' => Key::ArrowRight,
                _ => Key::ArrowLeft,
            };
            Some(match modifier {
                2 => shift_arrow(plain),
                3 => alt_arrow(plain),
                4 => shift_alt_arrow(plain),
                _ => plain,
            })
        }
        b'H' => Some(Key::Home),
        b'F' => Some(Key::End),
        b'Z' => Some(Key::ShiftTab),
        b'~' => {
            let code = nums.first().copied().unwrap_or(0);
            match (code, modifier) {
                (1 | 7, _) => Some(Key::Home),
                (4 | 8, _) => Some(Key::End),
                (3, 3) => Some(Key::AltDelete),
                (3, _) => Some(Key::Delete),
                (5, 2) => Some(Key::ShiftPageUp),
                (5, _) => Some(Key::PageUp),
                (6, 2) => Some(Key::ShiftPageDown),
                (6, _) => Some(Key::PageDown),
                (11..=15, _) => Some(Key::F((code - 10) as u8)),
                (17..=21, _) => Some(Key::F((code - 11) as u8)),
                (23 | 24, _) => Some(Key::F((code - 12) as u8)),
                (27, _) => {
                    // ESC [ 27 ; {5|6} ; 9 ~ — Ctrl(+Shift)+Tab
                    match (nums.get(1).copied(), nums.get(2).copied()) {
                        (Some(5), Some(9)) => Some(Key::CtrlTab),
                        (Some(6), Some(9)) => Some(Key::CtrlShiftTab),
                        _ => None,
                    }
                }
                (200, _) => Some(Key::PasteStart),
                (201, _) => Some(Key::PasteEnd),
                _ => None,
            }
        }
        _ => None,
    }
}

fn shift_arrow(k: Key) -> Key {
    match k {
        Key::ArrowUp => Key::ShiftArrowUp,
        Key::ArrowDown => Key::ShiftArrowDown,
        Key::ArrowLeft => Key::ShiftArrowLeft,
        _ => Key::ShiftArrowRight,
    }
}

fn alt_arrow(k: Key) -> Key {
    match k {
        Key::ArrowUp => Key::AltArrowUp,
        Key::ArrowDown => Key::AltArrowDown,
        Key::ArrowLeft => Key::AltArrowLeft,
        _ => Key::AltArrowRight,
    }
}

fn shift_alt_arrow(k: Key) -> Key {
    match k {
        Key::ArrowUp => Key::ShiftAltArrowUp,
        Key::ArrowDown => Key::ShiftAltArrowDown,
        Key::ArrowLeft => Key::ShiftAltArrowLeft,
        _ => Key::ShiftAltArrowRight,
    }
}

/// Assemble a multi-byte UTF-8 sequence from its lead byte. A wrong
/// continuation byte is pushed back and U+FFFD returned.
fn assemble_utf8<S: ByteSource>(src: &mut S, lead: u8) -> io::Result<char> {
    let expect = grapheme::utf8_len(lead);
    if expect < 2 {
        return Ok('\u{FFFD}');
    }
    let mut seq = [0u8; 4];
    seq[0] = lead;
    for i in 1..expect {
        match src.next_byte(Some(ESC_TIMEOUT_MS))? {
            Some(b) if (b & 0xC0) == 0x80 => seq[i] = b,
            Some(b) => {
                src.unread(b);
                return Ok('\u{FFFD}');
            }
            None => return Ok('\u{FFFD}'),
        }
    }
    Ok(std::str::from_utf8(&seq[..expect])
        .ok()
        .and_then(|s| s.chars().next())
        .unwrap_or('\u{FFFD}'))
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
