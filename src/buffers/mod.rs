//! The set of open buffers
//!
//! Buffers are addressed by numeric id; views hold ids, never references,
//! so deleting a buffer invalidates nothing. A scratch buffer always exists
//! and adopts the views of any buffer that goes away.

use std::path::Path;

use crate::buffer::file::{self, FileInfo};
use crate::buffer::Buffer;
use crate::constants::ui::SCRATCH_NAME;
use crate::context::EditContext;
use crate::error::Result;
use crate::language::{self, Language};

/// One open buffer with its editing state and file identity
#[derive(Debug)]
pub struct BufferState {
    pub id: usize,
    pub buffer: Buffer,
    pub ctx: EditContext,
    pub file: Option<FileInfo>,
    pub language: &'static Language,
    pub name: String,
}

impl BufferState {
    pub fn display_name(&self) -> &str {
        &self.name
    }

    pub fn readonly(&self) -> bool {
        self.file.as_ref().is_some_and(|f| f.readonly)
    }
}

/// Registry of buffers plus the scratch buffer id
#[derive(Debug)]
pub struct BufferManager {
    buffers: Vec<BufferState>,
    next_id: usize,
    scratch_id: usize,
}

impl BufferManager {
    pub fn new() -> Self {
        let scratch = BufferState {
            id: 1,
            buffer: Buffer::new(),
            ctx: EditContext::new(),
            file: None,
            language: &language::PLAIN,
            name: SCRATCH_NAME.to_owned(),
        };
        Self {
            buffers: vec![scratch],
            next_id: 2,
            scratch_id: 1,
        }
    }

    pub fn scratch_id(&self) -> usize {
        self.scratch_id
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&BufferState> {
        self.buffers.iter().find(|b| b.id == id)
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut BufferState> {
        self.buffers.iter_mut().find(|b| b.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BufferState> {
        self.buffers.iter()
    }

    /// Buffer already holding this file, by symlink-resolved path
    pub fn find_by_path(&self, path: &Path) -> Option<usize> {
        let normalised = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        self.buffers
            .iter()
            .find(|b| {
                b.file
                    .as_ref()
                    .is_some_and(|f| f.real_path == normalised)
            })
            .map(|b| b.id)
    }

    /// Open a file, reusing an existing buffer for the same path. A missing
    /// file opens as an empty buffer that will be created on save.
    pub fn open_file(&mut self, path: &Path, readonly: bool) -> Result<usize> {
        if let Some(id) = self.find_by_path(path) {
            return Ok(id);
        }
        let (buffer, info) = match file::open(path, readonly) {
            Ok(pair) => pair,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                (Buffer::new(), FileInfo::new_for_path(path, readonly))
            }
            Err(err) => return Err(err.into()),
        };
        let id = self.next_id;
        self.next_id += 1;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.buffers.push(BufferState {
            id,
            buffer,
            ctx: EditContext::new(),
            file: Some(info),
            language: language::detect(path),
            name,
        });
        tracing::info!(%id, path = %path.display(), "buffer opened");
        Ok(id)
    }

    /// New unsaved buffer (shell output, `n>` sink)
    pub fn create(&mut self, name: &str, content: Vec<u8>) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        self.buffers.push(BufferState {
            id,
            buffer: Buffer::from_bytes(content),
            ctx: EditContext::new(),
            file: None,
            language: &language::PLAIN,
            name: name.to_owned(),
        });
        id
    }

    /// Remove a buffer. The scratch buffer is emptied instead of removed.
    /// Returns the id views should rebind to.
    pub fn delete(&mut self, id: usize) -> usize {
        if id == self.scratch_id {
            let scratch = self.get_mut(id).expect("scratch always exists");
            scratch.buffer = Buffer::new();
            scratch.ctx = EditContext::new();
            return id;
        }
        self.buffers.retain(|b| b.id != id);
        tracing::info!(%id, "buffer deleted");
        self.scratch_id
    }

    /// Next buffer after `id` in registry order, wrapping
    pub fn next_after(&self, id: usize) -> usize {
        let idx = self.buffers.iter().position(|b| b.id == id).unwrap_or(0);
        self.buffers[(idx + 1) % self.buffers.len()].id
    }
}

impl Default for BufferManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
