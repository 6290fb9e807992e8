use super::*;

#[test]
fn test_clean_utf8_lf() {
    assert!(is_clean_utf8_lf(b"hello\nworld\n"));
    assert!(!is_clean_utf8_lf(b"hello\r\nworld\r\n"));
    assert!(!is_clean_utf8_lf(&[0xEF, 0xBB, 0xBF, b'a']));
    assert!(!is_clean_utf8_lf(&[0xFF, 0xFE, b'a', 0]));
}

#[test]
fn test_utf8_passthrough() {
    let d = decode(b"abc\ndef\n");
    assert_eq!(d.format.encoding, SourceEncoding::Utf8);
    assert_eq!(d.format.line_ending, LineEnding::Lf);
    assert_eq!(d.text, b"abc\ndef\n");
}

#[test]
fn test_utf8_bom_roundtrip() {
    let src = [&[0xEF, 0xBB, 0xBF][..], b"abc\n"].concat();
    let d = decode(&src);
    assert_eq!(d.format.encoding, SourceEncoding::Utf8Bom);
    assert_eq!(d.text, b"abc\n");
    assert_eq!(encode(&d.text, &d.format), src);
}

#[test]
fn test_crlf_roundtrip() {
    let d = decode(b"a\r\nb\r\n");
    assert_eq!(d.format.line_ending, LineEnding::Crlf);
    assert_eq!(d.text, b"a\nb\n");
    assert_eq!(encode(&d.text, &d.format), b"a\r\nb\r\n");
}

#[test]
fn test_lone_cr_roundtrip() {
    let d = decode(b"a\rb\r");
    assert_eq!(d.format.line_ending, LineEnding::Cr);
    assert_eq!(d.text, b"a\nb\n");
    assert_eq!(encode(&d.text, &d.format), b"a\rb\r");
}

#[test]
fn test_mixed_endings_normalize_to_lf() {
    let d = decode(b"a\r\nb\nc\r");
    assert_eq!(d.format.line_ending, LineEnding::Lf);
    assert_eq!(d.text, b"a\nb\nc\n");
}

#[test]
fn test_utf16le_roundtrip() {
    // BOM + "ab\n" in UTF-16LE
    let src = vec![0xFF, 0xFE, b'a', 0, b'b', 0, b'\n', 0];
    let d = decode(&src);
    assert_eq!(d.format.encoding, SourceEncoding::Utf16Le);
    assert_eq!(d.text, b"ab\n");
    assert_eq!(encode(&d.text, &d.format), src);
}

#[test]
fn test_utf16be_decode() {
    let src = vec![0xFE, 0xFF, 0, b'h', 0, b'i'];
    let d = decode(&src);
    assert_eq!(d.format.encoding, SourceEncoding::Utf16Be);
    assert_eq!(d.text, b"hi");
}

#[test]
fn test_shift_jis_roundtrip() {
    // "日本" in Shift_JIS
    let src = vec![0x93, 0xFA, 0x96, 0x7B];
    let d = decode(&src);
    assert_eq!(d.format.encoding, SourceEncoding::ShiftJis);
    assert_eq!(d.text, "日本".as_bytes());
    assert_eq!(encode(&d.text, &d.format), src);
}

#[test]
fn test_euc_jp_roundtrip() {
    // "漢字" in EUC-JP. The trailing 0xFA is a lone Shift_JIS lead byte, so
    // the Shift_JIS attempt reports errors and detection falls through.
    let src = vec![0xB4, 0xC1, 0xBB, 0xFA];
    let d = decode(&src);
    assert_eq!(d.format.encoding, SourceEncoding::EucJp);
    assert_eq!(d.text, "漢字".as_bytes());
    assert_eq!(encode(&d.text, &d.format), src);
}

#[test]
fn test_undecodable_falls_back_lossy() {
    let src = vec![0x80, 0x00, 0xFF, 0xFF];
    let d = decode(&src);
    assert_eq!(d.format.encoding, SourceEncoding::Utf8);
    assert!(String::from_utf8(d.text).is_ok());
}
