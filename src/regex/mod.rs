//! Small backtracking regex engine
//!
//! Supported dialect: `.` `*` `+` `?`, anchors `^` `$` (line-relative),
//! classes `[...]` with ranges and negation, escapes `\d \D \w \W \s \S`
//! `\n \r \t \\` and literal-escaped metacharacters. Groups, alternation,
//! counted repetition, backreferences and `\b` are not part of the dialect;
//! `{ } ( ) |` match themselves. Each match attempt runs under its own
//! step budget; an attempt that blows the budget counts as no match at
//! that position and the scan moves on to the next one.

use crate::constants::limits::REGEX_STEP_BUDGET;
use crate::error::{Result, ZeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PerlClass {
    Digit,
    NotDigit,
    Word,
    NotWord,
    Space,
    NotSpace,
}

impl PerlClass {
    fn matches(self, c: char) -> bool {
        match self {
            Self::Digit => c.is_ascii_digit(),
            Self::NotDigit => !c.is_ascii_digit(),
            Self::Word => c.is_alphanumeric() || c == '_',
            Self::NotWord => !(c.is_alphanumeric() || c == '_'),
            Self::Space => c.is_whitespace(),
            Self::NotSpace => !c.is_whitespace(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ClassItem {
    Char(char),
    Range(char, char),
    Perl(PerlClass),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Literal(char),
    Any,
    Class { negated: bool, items: Vec<ClassItem> },
    LineStart,
    LineEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rep {
    One,
    Star,
    Plus,
    Quest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Term {
    node: Node,
    rep: Rep,
}

/// A compiled pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Regex {
    terms: Vec<Term>,
}

impl Regex {
    pub fn compile(pattern: &str) -> Result<Self> {
        let mut terms: Vec<Term> = Vec::new();
        let mut chars = pattern.chars().peekable();
        while let Some(c) = chars.next() {
            let node = match c {
                '.' => Node::Any,
                '^' => Node::LineStart,
                '$' => Node::LineEnd,
                '[' => parse_class(&mut chars)?,
                '*' | '+' | '?' => {
                    let rep = match c {
                        '*' => Rep::Star,
                        '+' => Rep::Plus,
                        _ => Rep::Quest,
                    };
                    let last = terms
                        .last_mut()
                        .ok_or_else(|| ZeError::InvalidRegex("nothing to repeat".into()))?;
                    if last.rep != Rep::One
                        || matches!(last.node, Node::LineStart | Node::LineEnd)
                    {
                        return Err(ZeError::InvalidRegex("nothing to repeat".into()));
                    }
                    last.rep = rep;
                    continue;
                }
                ']' => Node::Literal(']'),
                '\\' => {
                    let e = chars
                        .next()
                        .ok_or_else(|| ZeError::InvalidRegex("trailing backslash".into()))?;
                    escape_node(e)?
                }
                other => Node::Literal(other),
            };
            terms.push(Term {
                node,
                rep: Rep::One,
            });
        }
        Ok(Self { terms })
    }

    /// Leftmost match starting at or after `from` (a byte offset on a char
    /// boundary). Returns byte range of the match.
    pub fn find(&self, text: &str, from: usize) -> Option<(usize, usize)> {
        let mut starts: Vec<usize> = Vec::new();
        if from <= text.len() {
            starts.push(from);
            starts.extend(text[from..].char_indices().skip(1).map(|(i, _)| from + i));
            if !text[from..].is_empty() {
                starts.push(text.len());
            }
        }
        for start in starts {
            let mut m = Matcher::new(text);
            if let Some(end) = m.run(&self.terms, 0, start) {
                return Some((start, end));
            }
            // An exhausted attempt is a failed attempt at this position
            // only; later positions still get their own budget
        }
        None
    }

    /// Rightmost match starting strictly before `before`
    pub fn rfind(&self, text: &str, before: usize) -> Option<(usize, usize)> {
        let mut starts: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .take_while(|&i| i < before)
            .collect();
        while let Some(start) = starts.pop() {
            let mut m = Matcher::new(text);
            if let Some(end) = m.run(&self.terms, 0, start) {
                return Some((start, end));
            }
        }
        None
    }
}

fn escape_node(e: char) -> Result<Node> {
    Ok(match e {
        'd' => Node::Class {
            negated: false,
            items: vec![ClassItem::Perl(PerlClass::Digit)],
        },
        'D' => Node::Class {
            negated: false,
            items: vec![ClassItem::Perl(PerlClass::NotDigit)],
        },
        'w' => Node::Class {
            negated: false,
            items: vec![ClassItem::Perl(PerlClass::Word)],
        },
        'W' => Node::Class {
            negated: false,
            items: vec![ClassItem::Perl(PerlClass::NotWord)],
        },
        's' => Node::Class {
            negated: false,
            items: vec![ClassItem::Perl(PerlClass::Space)],
        },
        'S' => Node::Class {
            negated: false,
            items: vec![ClassItem::Perl(PerlClass::NotSpace)],
        },
        'n' => Node::Literal('\n'),
        'r' => Node::Literal('\r'),
        't' => Node::Literal('\t'),
        '\\' | '.' | '*' | '+' | '?' | '[' | ']' | '^' | '$' => Node::Literal(e),
        other => {
            return Err(ZeError::InvalidRegex(format!(
                "unsupported escape \\{}",
                other
            )))
        }
    })
}

fn parse_class(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<Node> {
    let mut items = Vec::new();
    let negated = chars.peek() == Some(&'^') && {
        chars.next();
        true
    };
    // A leading ] is a literal member
    if chars.peek() == Some(&']') {
        chars.next();
        items.push(ClassItem::Char(']'));
    }
    loop {
        let c = chars
            .next()
            .ok_or_else(|| ZeError::InvalidRegex("unterminated class".into()))?;
        if c == ']' {
            break;
        }
        let lo = if c == '\\' {
            let e = chars
                .next()
                .ok_or_else(|| ZeError::InvalidRegex("trailing backslash".into()))?;
            match class_escape(e)? {
                Ok(item) => {
                    items.push(item);
                    continue;
                }
                Err(lit) => lit,
            }
        } else {
            c
        };
        // Range when a dash follows and does not close the class
        if chars.peek() == Some(&'-') {
            let mut ahead = chars.clone();
            ahead.next();
            if ahead.peek().is_some() && ahead.peek() != Some(&']') {
                chars.next();
                let hi = chars.next().unwrap();
                let hi = if hi == '\\' {
                    let e = chars
                        .next()
                        .ok_or_else(|| ZeError::InvalidRegex("trailing backslash".into()))?;
                    match class_escape(e)? {
                        Err(lit) => lit,
                        Ok(_) => {
                            return Err(ZeError::InvalidRegex("bad range endpoint".into()))
                        }
                    }
                } else {
                    hi
                };
                if lo > hi {
                    return Err(ZeError::InvalidRegex("reversed range".into()));
                }
                items.push(ClassItem::Range(lo, hi));
                continue;
            }
        }
        items.push(ClassItem::Char(lo));
    }
    Ok(Node::Class { negated, items })
}

/// Inside a class: `Ok(item)` for perl classes, `Err(char)` for literals
#[allow(clippy::type_complexity)]
fn class_escape(e: char) -> Result<std::result::Result<ClassItem, char>> {
    Ok(match e {
        'd' => Ok(ClassItem::Perl(PerlClass::Digit)),
        'D' => Ok(ClassItem::Perl(PerlClass::NotDigit)),
        'w' => Ok(ClassItem::Perl(PerlClass::Word)),
        'W' => Ok(ClassItem::Perl(PerlClass::NotWord)),
        's' => Ok(ClassItem::Perl(PerlClass::Space)),
        'S' => Ok(ClassItem::Perl(PerlClass::NotSpace)),
        'n' => Err('\n'),
        'r' => Err('\r'),
        't' => Err('\t'),
        '\\' | ']' | '[' | '^' | '-' | '.' | '*' | '+' | '?' | '$' => Err(e),
        other => {
            return Err(ZeError::InvalidRegex(format!(
                "unsupported escape \\{}",
                other
            )))
        }
    })
}

fn node_matches(node: &Node, c: char) -> bool {
    match node {
        Node::Literal(l) => *l == c,
        Node::Any => c != '\n',
        Node::Class { negated, items } => {
            let hit = items.iter().any(|item| match item {
                ClassItem::Char(x) => *x == c,
                ClassItem::Range(lo, hi) => (*lo..=*hi).contains(&c),
                ClassItem::Perl(p) => p.matches(c),
            });
            hit != *negated
        }
        Node::LineStart | Node::LineEnd => false,
    }
}

struct Matcher<'a> {
    text: &'a str,
    budget: usize,
    exhausted: bool,
}

impl<'a> Matcher<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            budget: REGEX_STEP_BUDGET,
            exhausted: false,
        }
    }

    fn char_at(&self, pos: usize) -> Option<char> {
        self.text[pos..].chars().next()
    }

    fn at_line_start(&self, pos: usize) -> bool {
        pos == 0 || self.text.as_bytes()[pos - 1] == b'\n'
    }

    fn at_line_end(&self, pos: usize) -> bool {
        pos == self.text.len() || self.text.as_bytes()[pos] == b'\n'
    }

    /// Match `terms[ti..]` at byte `pos`; returns the match end
    fn run(&mut self, terms: &[Term], ti: usize, pos: usize) -> Option<usize> {
        if self.budget == 0 {
            self.exhausted = true;
            return None;
        }
        self.budget -= 1;

        let Some(term) = terms.get(ti) else {
            return Some(pos);
        };

        match term.node {
            Node::LineStart => {
                return if self.at_line_start(pos) {
                    self.run(terms, ti + 1, pos)
                } else {
                    None
                };
            }
            Node::LineEnd => {
                return if self.at_line_end(pos) {
                    self.run(terms, ti + 1, pos)
                } else {
                    None
                };
            }
            _ => {}
        }

        match term.rep {
            Rep::One => {
                let c = self.char_at(pos)?;
                if node_matches(&term.node, c) {
                    self.run(terms, ti + 1, pos + c.len_utf8())
                } else {
                    None
                }
            }
            Rep::Quest => {
                if let Some(c) = self.char_at(pos) {
                    if node_matches(&term.node, c) {
                        if let Some(end) = self.run(terms, ti + 1, pos + c.len_utf8()) {
                            return Some(end);
                        }
                        if self.exhausted {
                            return None;
                        }
                    }
                }
                self.run(terms, ti + 1, pos)
            }
            Rep::Star | Rep::Plus => {
                let min = if term.rep == Rep::Plus { 1 } else { 0 };
                let mut ends = vec![pos];
                let mut at = pos;
                while let Some(c) = self.char_at(at) {
                    if !node_matches(&term.node, c) {
                        break;
                    }
                    at += c.len_utf8();
                    ends.push(at);
                }
                while ends.len() > min {
                    let end = ends.pop().unwrap();
                    if let Some(r) = self.run(terms, ti + 1, end) {
                        return Some(r);
                    }
                    if self.exhausted {
                        return None;
                    }
                }
                None
            }
        }
    }
}
