//! One-line prompt editor
//!
//! The minibuffer has its own cursor and grapheme-aware edit primitives; it
//! is reused by every prompting mode (file open, shell command, search,
//! query-replace) and displays status messages between prompts.

use crate::grapheme;

#[derive(Debug, Default)]
pub struct Minibuffer {
    pub prompt: String,
    text: String,
    /// Byte offset into `text`, always on a cluster boundary
    cursor: usize,
}

impl Minibuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a prompt session with optional pre-filled text
    pub fn open(&mut self, prompt: &str, initial: &str) {
        self.prompt = prompt.to_owned();
        self.text = initial.to_owned();
        self.cursor = self.text.len();
    }

    pub fn clear(&mut self) {
        self.prompt.clear();
        self.text.clear();
        self.cursor = 0;
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Replace the content, e.g. on history recall
    pub fn set_text(&mut self, text: &str) {
        self.text = text.to_owned();
        self.cursor = self.text.len();
    }

    /// Finish the session, returning the entered text
    pub fn take(&mut self) -> String {
        self.prompt.clear();
        self.cursor = 0;
        std::mem::take(&mut self.text)
    }

    pub fn insert_char(&mut self, c: char) {
        self.text.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    pub fn insert_str(&mut self, s: &str) {
        self.text.insert_str(self.cursor, s);
        self.cursor += s.len();
    }

    /// Delete the cluster before the cursor
    pub fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let start = grapheme::prev_boundary(self.text.as_bytes(), self.cursor);
        self.text.replace_range(start..self.cursor, "");
        self.cursor = start;
        true
    }

    /// Delete the cluster under the cursor
    pub fn delete(&mut self) -> bool {
        if self.cursor >= self.text.len() {
            return false;
        }
        let end = grapheme::next_boundary(self.text.as_bytes(), self.cursor);
        self.text.replace_range(self.cursor..end, "");
        true
    }

    pub fn left(&mut self) {
        self.cursor = grapheme::prev_boundary(self.text.as_bytes(), self.cursor);
    }

    pub fn right(&mut self) {
        if self.cursor < self.text.len() {
            self.cursor = grapheme::next_boundary(self.text.as_bytes(), self.cursor);
        }
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.text.len();
    }

    /// Display column of the cursor, after the prompt
    pub fn display_col(&self, tab_width: usize) -> usize {
        grapheme::width_up_to(self.prompt.as_bytes(), self.prompt.len(), tab_width)
            + grapheme::width_up_to(self.text.as_bytes(), self.cursor, tab_width)
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
