//! Centralized error handling for ze
//! Every user-visible failure is one of these kinds, reported as a single
//! status line in the minibuffer area. None of them aborts the editor.

use std::fmt;

/// An error surfaced to the user or propagated between subsystems
#[derive(Debug)]
pub enum ZeError {
    /// Buffer was opened read-only
    ReadOnly,
    /// Operation needs a non-empty buffer
    BufferEmpty,
    /// Operation needs a mark and none is set
    NoMark,
    /// Mark is set but the region is empty
    NoActiveRegion,
    /// Yank with nothing killed yet
    KillRingEmpty,
    /// Motion hit the start of the buffer
    BeginningOfBuffer,
    /// Motion hit the end of the buffer
    EndOfBuffer,
    /// Search or lookup found nothing
    NotFound,
    /// Pattern failed to compile
    InvalidRegex(String),
    /// Subprocess exited with a non-zero status
    CommandExitNonZero(i32),
    /// Subprocess output hit the size cap and was cut off
    OutputTruncated,
    /// Save failed; the original file is untouched
    SaveFailed(String),
    /// File mtime changed since load
    FileChangedOnDisk,
    /// Named command or language does not exist
    UnknownCommand(String),
    /// Underlying I/O failure
    Io(std::io::Error),
}

impl fmt::Display for ZeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadOnly => write!(f, "Buffer is read-only"),
            Self::BufferEmpty => write!(f, "Buffer is empty"),
            Self::NoMark => write!(f, "No mark set"),
            Self::NoActiveRegion => write!(f, "No active region"),
            Self::KillRingEmpty => write!(f, "Kill ring is empty"),
            Self::BeginningOfBuffer => write!(f, "Beginning of buffer"),
            Self::EndOfBuffer => write!(f, "End of buffer"),
            Self::NotFound => write!(f, "Not found"),
            Self::InvalidRegex(msg) => write!(f, "Invalid regex: {}", msg),
            Self::CommandExitNonZero(code) => write!(f, "Command exited with status {}", code),
            Self::OutputTruncated => write!(f, "Output truncated"),
            Self::SaveFailed(reason) => write!(f, "Save failed: {}", reason),
            Self::FileChangedOnDisk => write!(f, "File changed on disk since last read"),
            Self::UnknownCommand(name) => write!(f, "Unknown command: {}", name),
            Self::Io(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for ZeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ZeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

/// Result alias for ze operations
pub type Result<T> = std::result::Result<T, ZeError>;
