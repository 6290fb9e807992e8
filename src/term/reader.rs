//! Ring-buffered byte reader over raw stdin
//!
//! The decoder pulls single bytes with an optional timeout (lone-ESC
//! disambiguation, CSI continuation). One byte of pushback lets the UTF-8
//! assembler reject a bad continuation byte without losing it.

use std::io::{self, Read};
use std::os::fd::BorrowedFd;

use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

use crate::constants::input::READER_BUF_SIZE;

pub struct KeyReader {
    buf: [u8; READER_BUF_SIZE],
    start: usize,
    end: usize,
    unread: Option<u8>,
}

fn stdin_fd() -> BorrowedFd<'static> {
    // SAFETY: fd 0 outlives the process
    unsafe { BorrowedFd::borrow_raw(0) }
}

impl KeyReader {
    pub fn new() -> Self {
        Self {
            buf: [0; READER_BUF_SIZE],
            start: 0,
            end: 0,
            unread: None,
        }
    }

    /// Push one byte back; the next `next_byte` returns it first
    pub fn unread(&mut self, byte: u8) {
        debug_assert!(self.unread.is_none());
        self.unread = Some(byte);
    }

    /// True when a byte is available without touching the file descriptor
    pub fn has_buffered(&self) -> bool {
        self.unread.is_some() || self.start < self.end
    }

    /// Next input byte. `timeout_ms: None` blocks; `Some(ms)` returns
    /// `Ok(None)` when nothing arrives in time.
    pub fn next_byte(&mut self, timeout_ms: Option<u64>) -> io::Result<Option<u8>> {
        if let Some(b) = self.unread.take() {
            return Ok(Some(b));
        }
        if self.start < self.end {
            let b = self.buf[self.start];
            self.start += 1;
            return Ok(Some(b));
        }
        if !poll_stdin(timeout_ms)? {
            return Ok(None);
        }
        let n = io::stdin().lock().read(&mut self.buf)?;
        if n == 0 {
            return Ok(None);
        }
        self.start = 1;
        self.end = n;
        Ok(Some(self.buf[0]))
    }
}

impl Default for KeyReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for stdin readability; `None` waits indefinitely
pub fn poll_stdin(timeout_ms: Option<u64>) -> io::Result<bool> {
    let timeout = match timeout_ms {
        None => PollTimeout::NONE,
        Some(ms) => PollTimeout::try_from(ms.min(i32::MAX as u64) as i32)
            .unwrap_or(PollTimeout::MAX),
    };
    let mut fds = [PollFd::new(stdin_fd(), PollFlags::POLLIN)];
    loop {
        match poll(&mut fds, timeout) {
            Ok(0) => return Ok(false),
            Ok(_) => return Ok(true),
            Err(nix::errno::Errno::EINTR) => continue,
            Err(err) => return Err(io::Error::from(err)),
        }
    }
}
