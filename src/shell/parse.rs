//! Shell command-line grammar
//!
//! `[source_prefix] "|" command [sink_suffix]`
//!
//! Prefixes: `%` whole buffer, `.` current line, none = selection. A prefix
//! only counts at the top of the line when followed by whitespace or `|`
//! (so `./x` is a command). Sinks: ` >` replace source, ` +>` insert at
//! cursor, ` n>` new buffer, none = output buffer; a sink is only honoured
//! when preceded by whitespace and outside quotes. Quote tracking knows
//! single quotes (no escapes), double quotes (`\"` and `\\` only), and
//! unquoted backslash escapes.

/// Where the subprocess stdin comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Buffer,
    Line,
    Selection,
}

/// Where the subprocess output goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sink {
    Replace,
    Insert,
    NewBuffer,
    OutputBuffer,
}

/// A parsed shell command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub source: Source,
    pub sink: Sink,
    pub command: String,
}

/// In-quote state per byte of the input, following the grammar's rules
fn quote_map(s: &str) -> Vec<bool> {
    let bytes = s.as_bytes();
    let mut map = vec![false; bytes.len()];
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                map[i] = true;
                i += 1;
                while i < bytes.len() {
                    map[i] = true;
                    if bytes[i] == b'\'' {
                        i += 1;
                        break;
                    }
                    i += 1;
                }
            }
            b'"' => {
                map[i] = true;
                i += 1;
                while i < bytes.len() {
                    map[i] = true;
                    match bytes[i] {
                        b'\\' if matches!(bytes.get(i + 1), Some(b'"') | Some(b'\\')) => {
                            map[i + 1] = true;
                            i += 2;
                        }
                        b'"' => {
                            i += 1;
                            break;
                        }
                        _ => i += 1,
                    }
                }
            }
            b'\\' if i + 1 < bytes.len() => {
                map[i] = true;
                map[i + 1] = true;
                i += 2;
            }
            _ => i += 1,
        }
    }
    map
}

/// Parse a full command line; `None` when the mandatory `|` is missing
pub fn parse_command(line: &str) -> Option<ParsedCommand> {
    let bytes = line.as_bytes();
    let mut idx = 0;

    let source = match bytes.first() {
        Some(b'%') if matches!(bytes.get(1), Some(b' ') | Some(b'\t') | Some(b'|') | None) => {
            idx = 1;
            Source::Buffer
        }
        Some(b'.') if matches!(bytes.get(1), Some(b' ') | Some(b'\t') | Some(b'|') | None) => {
            idx = 1;
            Source::Line
        }
        _ => Source::Selection,
    };

    while idx < bytes.len() && (bytes[idx] == b' ' || bytes[idx] == b'\t') {
        idx += 1;
    }
    if bytes.get(idx) != Some(&b'|') {
        return None;
    }
    idx += 1;

    let rest = &line[idx..];
    let (command, sink) = split_sink(rest);
    let command = command.trim().to_owned();
    if command.is_empty() {
        return None;
    }
    Some(ParsedCommand {
        source,
        sink,
        command,
    })
}

/// Peel a trailing sink token off the command text
fn split_sink(rest: &str) -> (&str, Sink) {
    let map = quote_map(rest);
    let trimmed_len = rest.trim_end().len();
    if trimmed_len == 0 || rest.as_bytes()[trimmed_len - 1] != b'>' {
        return (rest, Sink::OutputBuffer);
    }
    let gt = trimmed_len - 1;
    if map.get(gt).copied().unwrap_or(false) {
        return (rest, Sink::OutputBuffer);
    }
    let (tok_start, sink) = match rest.as_bytes().get(gt.wrapping_sub(1)) {
        Some(b'+') => (gt - 1, Sink::Insert),
        Some(b'n') => (gt - 1, Sink::NewBuffer),
        _ => (gt, Sink::Replace),
    };
    if tok_start == 0 {
        // Nothing before the sink means no command
        return (rest, Sink::OutputBuffer);
    }
    let before = rest.as_bytes()[tok_start - 1];
    if before != b' ' && before != b'\t' {
        return (rest, Sink::OutputBuffer);
    }
    if map.get(tok_start).copied().unwrap_or(false) {
        return (rest, Sink::OutputBuffer);
    }
    (&rest[..tok_start], sink)
}

/// Split into words with the same quote rules, unquoting as it goes.
/// Returns the words and the byte offset where the final word begins
/// (for completion insertion).
pub fn tokenize(line: &str) -> (Vec<String>, usize) {
    let bytes = line.as_bytes();
    let mut words = Vec::new();
    let mut current: Vec<u8> = Vec::new();
    let mut word_start = 0;
    let mut in_word = false;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b' ' | b'\t' => {
                if in_word {
                    words.push(String::from_utf8_lossy(&current).into_owned());
                    current.clear();
                    in_word = false;
                }
                i += 1;
            }
            b'\'' => {
                if !in_word {
                    word_start = i;
                    in_word = true;
                }
                i += 1;
                while i < bytes.len() && bytes[i] != b'\'' {
                    current.push(bytes[i]);
                    i += 1;
                }
                i += 1;
            }
            b'"' => {
                if !in_word {
                    word_start = i;
                    in_word = true;
                }
                i += 1;
                while i < bytes.len() {
                    match bytes[i] {
                        b'\\' if matches!(bytes.get(i + 1), Some(b'"') | Some(b'\\')) => {
                            current.push(bytes[i + 1]);
                            i += 2;
                        }
                        b'"' => {
                            i += 1;
                            break;
                        }
                        c => {
                            current.push(c);
                            i += 1;
                        }
                    }
                }
            }
            b'\\' if i + 1 < bytes.len() => {
                if !in_word {
                    word_start = i;
                    in_word = true;
                }
                current.push(bytes[i + 1]);
                i += 2;
            }
            c => {
                if !in_word {
                    word_start = i;
                    in_word = true;
                }
                current.push(c);
                i += 1;
            }
        }
    }
    if in_word {
        words.push(String::from_utf8_lossy(&current).into_owned());
    } else {
        word_start = bytes.len();
    }
    (words, word_start)
}

/// Longest byte-identical common prefix of the candidates
pub fn common_prefix(candidates: &[String]) -> String {
    let Some(first) = candidates.first() else {
        return String::new();
    };
    let mut len = first.len();
    for c in &candidates[1..] {
        let shared = first
            .as_bytes()
            .iter()
            .zip(c.as_bytes())
            .take_while(|(a, b)| a == b)
            .count();
        len = len.min(shared);
    }
    // Back off to a char boundary
    while len > 0 && !first.is_char_boundary(len) {
        len -= 1;
    }
    first[..len].to_owned()
}
