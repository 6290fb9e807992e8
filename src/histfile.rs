//! Persisted histories under `~/.ze`
//!
//! Newline-separated, oldest first, capped. Files are loaded lazily on
//! first navigation and rewritten once on clean exit.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use crate::constants::limits::HISTORY_CAP;
use crate::constants::paths;

/// Absolute path of the config directory, if a home directory exists
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(paths::CONFIG_DIR))
}

/// Path of a file inside the config directory
pub fn config_file(name: &str) -> Option<PathBuf> {
    config_dir().map(|d| d.join(name))
}

/// A lazily loaded, capped history list
#[derive(Debug)]
pub struct History {
    file: &'static str,
    entries: Vec<String>,
    loaded: bool,
    /// Navigation position; `None` means "past the newest entry"
    cursor: Option<usize>,
}

impl History {
    pub fn new(file: &'static str) -> Self {
        Self {
            file,
            entries: Vec::new(),
            loaded: false,
            cursor: None,
        }
    }

    fn ensure_loaded(&mut self) {
        if self.loaded {
            return;
        }
        self.loaded = true;
        let Some(path) = config_file(self.file) else {
            return;
        };
        if let Ok(content) = fs::read_to_string(&path) {
            self.entries = content
                .lines()
                .filter(|l| !l.is_empty())
                .map(str::to_owned)
                .collect();
            let overflow = self.entries.len().saturating_sub(HISTORY_CAP);
            if overflow > 0 {
                self.entries.drain(..overflow);
            }
        }
    }

    /// Append an entry, dropping a duplicate of the newest and enforcing the cap
    pub fn push(&mut self, entry: &str) {
        if entry.is_empty() {
            return;
        }
        self.ensure_loaded();
        if self.entries.last().map(String::as_str) == Some(entry) {
            self.reset_cursor();
            return;
        }
        self.entries.push(entry.to_owned());
        let overflow = self.entries.len().saturating_sub(HISTORY_CAP);
        if overflow > 0 {
            self.entries.drain(..overflow);
        }
        self.reset_cursor();
    }

    /// Step to the previous (older) entry
    pub fn prev(&mut self) -> Option<&str> {
        self.ensure_loaded();
        if self.entries.is_empty() {
            return None;
        }
        let next = match self.cursor {
            None => self.entries.len() - 1,
            Some(0) => 0,
            Some(i) => i - 1,
        };
        self.cursor = Some(next);
        Some(&self.entries[next])
    }

    /// Step to the next (newer) entry; `None` when walking past the newest
    pub fn next(&mut self) -> Option<&str> {
        self.ensure_loaded();
        match self.cursor {
            Some(i) if i + 1 < self.entries.len() => {
                self.cursor = Some(i + 1);
                Some(&self.entries[i + 1])
            }
            Some(_) => {
                self.cursor = None;
                None
            }
            None => None,
        }
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = None;
    }

    /// Rewrite the backing file; called once on clean exit
    pub fn save(&self) -> std::io::Result<()> {
        if !self.loaded && self.entries.is_empty() {
            return Ok(());
        }
        let Some(dir) = config_dir() else {
            return Ok(());
        };
        fs::create_dir_all(&dir)?;
        let mut f = fs::File::create(dir.join(self.file))?;
        for e in &self.entries {
            writeln!(f, "{}", e)?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn entries(&self) -> &[String] {
        &self.entries
    }
}
