//! Non-blocking shell pipe subsystem
//!
//! A spawned command gets the selected text on stdin and its output
//! collected per stream, all through non-blocking pipes pumped from the
//! editor's poll loop, so a saturated pipe can never deadlock or freeze the
//! UI. Output is capped per stream; past the cap the pipe is closed and the
//! stream marked truncated.

pub mod parse;

use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, BorrowedFd, RawFd};
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{Duration, Instant};

use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

use crate::constants::limits::{COMPLETION_TIMEOUT_MS, SHELL_OUTPUT_CAP, SHELL_STDIN_CHUNK};
use crate::constants::paths;

fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    // SAFETY: fd belongs to a live child pipe owned by the caller
    let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
    let flags = fcntl(borrowed, FcntlArg::F_GETFL).map_err(io::Error::from)?;
    let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
    fcntl(borrowed, FcntlArg::F_SETFL(flags)).map_err(io::Error::from)?;
    Ok(())
}

/// Locate a `bash` on PATH
fn find_bash() -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join("bash"))
        .find(|candidate| candidate.is_file())
}

/// Escape for interpolation inside a double-quoted bash string
fn escape_double_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '"' | '$' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Build the command invocation: when bash exists and `~/.ze/aliases` is
/// present the command runs through an alias-expanding wrapper, otherwise
/// plain `sh -c`.
fn build_command(cmd: &str) -> Command {
    if let Some(bash) = find_bash() {
        if let Some(aliases) = crate::histfile::config_file(paths::ALIASES) {
            if aliases.is_file() {
                let script = format!(
                    "shopt -s expand_aliases; . \"{}\"; eval \"{}\"",
                    aliases.display(),
                    escape_double_quoted(cmd)
                );
                let mut c = Command::new(bash);
                c.arg("-c").arg(script);
                return c;
            }
        }
    }
    let mut c = Command::new("sh");
    c.arg("-c").arg(cmd);
    c
}

/// A running subprocess with streamed stdin and bounded output collection
pub struct ShellJob {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    input: Vec<u8>,
    input_off: usize,
    pub stdout_data: Vec<u8>,
    pub stderr_data: Vec<u8>,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
    /// Exit code; signalled termination reads as 128 + signal number
    pub status: Option<i32>,
    pub cancelled: bool,
}

impl ShellJob {
    pub fn spawn(cmd: &str, input: Vec<u8>) -> io::Result<Self> {
        let mut command = build_command(cmd);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = command.spawn()?;

        let mut stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        if let Some(w) = &stdin {
            set_nonblocking(w.as_raw_fd())?;
        }
        if let Some(r) = &stdout {
            set_nonblocking(r.as_raw_fd())?;
        }
        if let Some(r) = &stderr {
            set_nonblocking(r.as_raw_fd())?;
        }
        if input.is_empty() {
            // Close stdin right away so filters see EOF
            stdin = None;
        }
        tracing::info!(pid = child.id(), %cmd, input_bytes = input.len(), "shell spawn");
        Ok(Self {
            child,
            stdin,
            stdout,
            stderr,
            input,
            input_off: 0,
            stdout_data: Vec::new(),
            stderr_data: Vec::new(),
            stdout_truncated: false,
            stderr_truncated: false,
            status: None,
            cancelled: false,
        })
    }

    /// Open pipe fds and whether each is polled for write (stdin) or read
    pub fn poll_fds(&self) -> Vec<(RawFd, bool)> {
        let mut fds = Vec::new();
        if let Some(w) = &self.stdin {
            fds.push((w.as_raw_fd(), true));
        }
        if let Some(r) = &self.stdout {
            fds.push((r.as_raw_fd(), false));
        }
        if let Some(r) = &self.stderr {
            fds.push((r.as_raw_fd(), false));
        }
        fds
    }

    /// Pump all pipes once and try a non-blocking reap.
    /// Returns true when the job is fully finished.
    pub fn tick(&mut self) -> bool {
        self.pump_stdin();

        // Alternate between the two output pipes until each reports
        // WouldBlock, so one saturated pipe cannot starve the other
        let mut buf = [0u8; 8192];
        loop {
            let a = drain_once(
                &mut self.stdout,
                &mut self.stdout_data,
                &mut self.stdout_truncated,
                &mut buf,
            );
            let b = drain_once(
                &mut self.stderr,
                &mut self.stderr_data,
                &mut self.stderr_truncated,
                &mut buf,
            );
            if !a && !b {
                break;
            }
        }

        if self.status.is_none() {
            if let Ok(Some(st)) = self.child.try_wait() {
                let code = st
                    .code()
                    .or_else(|| st.signal().map(|sig| 128 + sig))
                    .unwrap_or(-1);
                self.status = Some(code);
                tracing::info!(pid = self.child.id(), code, "shell exit");
            }
        }
        self.finished()
    }

    pub fn finished(&self) -> bool {
        self.status.is_some() && self.stdout.is_none() && self.stderr.is_none()
    }

    /// SIGKILL the child and attempt an immediate reap; later ticks retry
    pub fn cancel(&mut self) {
        self.cancelled = true;
        let _ = self.child.kill();
        if let Ok(Some(st)) = self.child.try_wait() {
            self.status = Some(
                st.code()
                    .or_else(|| st.signal().map(|sig| 128 + sig))
                    .unwrap_or(-1),
            );
        }
        self.stdin = None;
        self.stdout = None;
        self.stderr = None;
        tracing::info!(pid = self.child.id(), "shell cancelled");
    }

    fn pump_stdin(&mut self) {
        let Some(w) = self.stdin.as_mut() else {
            return;
        };
        loop {
            if self.input_off >= self.input.len() {
                self.stdin = None;
                return;
            }
            let end = (self.input_off + SHELL_STDIN_CHUNK).min(self.input.len());
            match w.write(&self.input[self.input_off..end]) {
                Ok(0) => {
                    self.stdin = None;
                    return;
                }
                Ok(n) => self.input_off += n,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return,
                Err(_) => {
                    // Reader went away; drop our end
                    self.stdin = None;
                    return;
                }
            }
        }
    }
}

impl Drop for ShellJob {
    fn drop(&mut self) {
        if self.status.is_none() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// One read from a pipe; closes it on EOF, error, or hitting the cap.
/// Returns true when progress was made.
fn drain_once<R: Read>(
    pipe: &mut Option<R>,
    data: &mut Vec<u8>,
    truncated: &mut bool,
    buf: &mut [u8],
) -> bool {
    let Some(r) = pipe.as_mut() else {
        return false;
    };
    match r.read(buf) {
        Ok(0) => {
            *pipe = None;
            false
        }
        Ok(n) => {
            let room = SHELL_OUTPUT_CAP.saturating_sub(data.len());
            let take = n.min(room);
            data.extend_from_slice(&buf[..take]);
            if take < n || data.len() >= SHELL_OUTPUT_CAP {
                *truncated = true;
                *pipe = None;
                return false;
            }
            true
        }
        Err(err) if err.kind() == io::ErrorKind::WouldBlock => false,
        Err(_) => {
            *pipe = None;
            false
        }
    }
}

/// What `complete` asks compgen for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    Command,
    File,
}

/// Run `compgen` for the token under a hard timeout; an overdue bash is
/// killed and whatever arrived is discarded
pub fn complete(token: &str, kind: CompletionKind) -> Vec<String> {
    let flag = match kind {
        CompletionKind::Command => "-c",
        CompletionKind::File => "-f",
    };
    let quoted = format!("'{}'", token.replace('\'', r"'\''"));
    let script = format!("compgen {} -- {}", flag, quoted);

    let Ok(mut child) = Command::new("bash")
        .arg("-c")
        .arg(script)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
    else {
        return Vec::new();
    };
    let Some(mut out) = child.stdout.take() else {
        let _ = child.kill();
        return Vec::new();
    };
    if set_nonblocking(out.as_raw_fd()).is_err() {
        let _ = child.kill();
        let _ = child.wait();
        return Vec::new();
    }

    let deadline = Instant::now() + Duration::from_millis(COMPLETION_TIMEOUT_MS);
    let mut collected = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        match out.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => collected.extend_from_slice(&buf[..n]),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Vec::new();
                }
                // SAFETY: the pipe fd is alive for the duration of the poll
                let borrowed = unsafe { BorrowedFd::borrow_raw(out.as_raw_fd()) };
                let mut fds = [PollFd::new(borrowed, PollFlags::POLLIN)];
                let timeout = PollTimeout::try_from(remaining.as_millis().min(1000) as i32)
                    .unwrap_or(PollTimeout::ZERO);
                let _ = poll(&mut fds, timeout);
            }
            Err(_) => break,
        }
    }
    let _ = child.wait();

    let mut names: Vec<String> = String::from_utf8_lossy(&collected)
        .lines()
        .filter(|l| !l.is_empty())
        .map(str::to_owned)
        .collect();
    names.sort();
    names.dedup();
    names
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
