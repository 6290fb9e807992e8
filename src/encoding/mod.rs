//! Source-encoding detection and round-trip conversion
//!
//! Files are decoded to UTF-8 with LF line endings on load; the detected
//! encoding and line ending are recorded and reproduced byte-for-byte on
//! save. UTF-16 is re-encoded by hand because encoding_rs is decode-only for
//! it.

use encoding_rs::{EUC_JP, SHIFT_JIS};

/// Encoding detected at load time and reproduced at save time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    Utf8,
    Utf8Bom,
    Utf16Le,
    Utf16Be,
    ShiftJis,
    EucJp,
}

impl SourceEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Utf8Bom => "utf-8-bom",
            Self::Utf16Le => "utf-16le",
            Self::Utf16Be => "utf-16be",
            Self::ShiftJis => "shift_jis",
            Self::EucJp => "euc-jp",
        }
    }
}

/// Line-ending convention detected at load time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    Crlf,
    Cr,
}

impl LineEnding {
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            Self::Lf => b"\n",
            Self::Crlf => b"\r\n",
            Self::Cr => b"\r",
        }
    }
}

/// What a file looked like on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileFormat {
    pub encoding: SourceEncoding,
    pub line_ending: LineEnding,
}

impl Default for FileFormat {
    fn default() -> Self {
        Self {
            encoding: SourceEncoding::Utf8,
            line_ending: LineEnding::Lf,
        }
    }
}

/// Result of decoding a file to the internal representation
#[derive(Debug)]
pub struct Decoded {
    /// UTF-8 text with LF line endings
    pub text: Vec<u8>,
    pub format: FileFormat,
}

/// True when the bytes are already valid UTF-8 without BOM and contain no CR.
/// Such files can be memory-mapped as-is.
pub fn is_clean_utf8_lf(bytes: &[u8]) -> bool {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return false;
    }
    if memchr::memchr(b'\r', bytes).is_some() {
        return false;
    }
    std::str::from_utf8(bytes).is_ok()
}

/// Sniff encoding from BOM and content, decode to UTF-8 LF
pub fn decode(bytes: &[u8]) -> Decoded {
    let (encoding, text) = decode_to_utf8(bytes);
    let (line_ending, text) = normalize_line_endings(text);
    Decoded {
        text,
        format: FileFormat {
            encoding,
            line_ending,
        },
    }
}

fn decode_to_utf8(bytes: &[u8]) -> (SourceEncoding, Vec<u8>) {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return (SourceEncoding::Utf8Bom, bytes[3..].to_vec());
    }
    if bytes.starts_with(&[0xFF, 0xFE]) {
        return (SourceEncoding::Utf16Le, decode_utf16(&bytes[2..], true));
    }
    if bytes.starts_with(&[0xFE, 0xFF]) {
        return (SourceEncoding::Utf16Be, decode_utf16(&bytes[2..], false));
    }
    if std::str::from_utf8(bytes).is_ok() {
        return (SourceEncoding::Utf8, bytes.to_vec());
    }

    let (sjis, sjis_bad) = SHIFT_JIS.decode_without_bom_handling(bytes);
    if !sjis_bad {
        return (SourceEncoding::ShiftJis, sjis.into_owned().into_bytes());
    }
    let (euc, euc_bad) = EUC_JP.decode_without_bom_handling(bytes);
    if !euc_bad {
        return (SourceEncoding::EucJp, euc.into_owned().into_bytes());
    }

    // Undecodable under every supported encoding: keep it as UTF-8 with
    // replacement characters rather than refuse the file.
    (
        SourceEncoding::Utf8,
        String::from_utf8_lossy(bytes).into_owned().into_bytes(),
    )
}

fn decode_utf16(bytes: &[u8], little_endian: bool) -> Vec<u8> {
    let mut units = Vec::with_capacity(bytes.len() / 2);
    for pair in bytes.chunks(2) {
        let unit = match (pair.first(), pair.get(1)) {
            (Some(&a), Some(&b)) => {
                if little_endian {
                    u16::from_le_bytes([a, b])
                } else {
                    u16::from_be_bytes([a, b])
                }
            }
            // Odd trailing byte
            _ => 0xFFFD,
        };
        units.push(unit);
    }
    String::from_utf16_lossy(&units).into_bytes()
}

/// Detect the dominant line ending and rewrite everything to LF
fn normalize_line_endings(text: Vec<u8>) -> (LineEnding, Vec<u8>) {
    let mut crlf = 0usize;
    let mut lone_cr = 0usize;
    let mut lone_lf = 0usize;
    let mut i = 0;
    while let Some(off) = memchr::memchr2(b'\r', b'\n', &text[i..]) {
        let at = i + off;
        if text[at] == b'\r' {
            if text.get(at + 1) == Some(&b'\n') {
                crlf += 1;
                i = at + 2;
            } else {
                lone_cr += 1;
                i = at + 1;
            }
        } else {
            lone_lf += 1;
            i = at + 1;
        }
    }

    let ending = if crlf > 0 && lone_lf == 0 {
        LineEnding::Crlf
    } else if lone_cr > 0 && crlf == 0 && lone_lf == 0 {
        LineEnding::Cr
    } else {
        LineEnding::Lf
    };

    if crlf == 0 && lone_cr == 0 {
        return (ending, text);
    }

    let mut out = Vec::with_capacity(text.len());
    let mut i = 0;
    while i < text.len() {
        let b = text[i];
        if b == b'\r' {
            out.push(b'\n');
            if text.get(i + 1) == Some(&b'\n') {
                i += 1;
            }
        } else {
            out.push(b);
        }
        i += 1;
    }
    (ending, out)
}

/// Re-encode internal UTF-8 LF text for the format recorded at load
pub fn encode(text: &[u8], format: &FileFormat) -> Vec<u8> {
    let with_endings = match format.line_ending {
        LineEnding::Lf => text.to_vec(),
        other => {
            let nl = other.as_bytes();
            let mut out = Vec::with_capacity(text.len() + text.len() / 16);
            for &b in text {
                if b == b'\n' {
                    out.extend_from_slice(nl);
                } else {
                    out.push(b);
                }
            }
            out
        }
    };

    match format.encoding {
        SourceEncoding::Utf8 => with_endings,
        SourceEncoding::Utf8Bom => {
            let mut out = vec![0xEF, 0xBB, 0xBF];
            out.extend_from_slice(&with_endings);
            out
        }
        SourceEncoding::Utf16Le | SourceEncoding::Utf16Be => {
            let le = format.encoding == SourceEncoding::Utf16Le;
            let s = String::from_utf8_lossy(&with_endings);
            let mut out = Vec::with_capacity(2 + s.len() * 2);
            out.extend_from_slice(if le { &[0xFF, 0xFE] } else { &[0xFE, 0xFF] });
            for unit in s.encode_utf16() {
                let pair = if le {
                    unit.to_le_bytes()
                } else {
                    unit.to_be_bytes()
                };
                out.extend_from_slice(&pair);
            }
            out
        }
        SourceEncoding::ShiftJis => {
            let s = String::from_utf8_lossy(&with_endings);
            SHIFT_JIS.encode(&s).0.into_owned()
        }
        SourceEncoding::EucJp => {
            let s = String::from_utf8_lossy(&with_endings);
            EUC_JP.encode(&s).0.into_owned()
        }
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
