//! Terminal control: raw mode, feature toggles, size
//!
//! ## term/ Invariants
//!
//! - Raw mode is enabled before input processing begins.
//! - Terminal state is restored on normal exit and on drop.
//! - VMIN=1 VTIME=1 so a blocking read returns on one key or a short tick.
//! - Bracketed paste and X10 wheel reporting are enabled for the session
//!   and switched off again on exit.

pub mod grid;
pub mod reader;

use std::io::{self, Write};
use std::os::fd::{AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::sync::atomic::{AtomicI32, Ordering};

use anyhow::Context;
use crossterm::cursor::{Hide, Show};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use nix::libc;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::sys::termios::{self, SetArg, SpecialCharacterIndices};

/// Enable bracketed paste framing
const BRACKETED_PASTE_ON: &[u8] = b"\x1b[?2004h";
const BRACKETED_PASTE_OFF: &[u8] = b"\x1b[?2004l";
/// X10-style mouse button reporting (wheel events arrive as `ESC [ M`)
const MOUSE_REPORT_ON: &[u8] = b"\x1b[?1000h";
const MOUSE_REPORT_OFF: &[u8] = b"\x1b[?1000l";

/// Terminal size in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub rows: u16,
    pub cols: u16,
}

/// Owns the terminal session state
pub struct Terminal {
    active: bool,
}

fn stdin_fd() -> BorrowedFd<'static> {
    // SAFETY: fd 0 outlives the process
    unsafe { BorrowedFd::borrow_raw(0) }
}

impl Terminal {
    /// Enter raw mode and enable the session features
    pub fn init() -> anyhow::Result<Self> {
        enable_raw_mode().context("enable raw mode")?;

        // Raw mode alone leaves VMIN/VTIME at their defaults; a 100 ms tick
        // lets a lone ESC resolve without a dedicated timer
        let mut tio = termios::tcgetattr(stdin_fd()).context("tcgetattr")?;
        tio.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
        tio.control_chars[SpecialCharacterIndices::VTIME as usize] = 1;
        termios::tcsetattr(stdin_fd(), SetArg::TCSANOW, &tio).context("tcsetattr")?;

        let mut out = io::stdout();
        execute!(out, EnterAlternateScreen, Hide).context("enter alternate screen")?;
        out.write_all(BRACKETED_PASTE_ON)?;
        out.write_all(MOUSE_REPORT_ON)?;
        out.flush()?;
        tracing::debug!("terminal initialised");
        Ok(Self { active: true })
    }

    pub fn size() -> io::Result<Size> {
        let (cols, rows) = crossterm::terminal::size()?;
        Ok(Size { rows, cols })
    }

    /// Restore everything; also runs on drop
    pub fn deinit(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        let mut out = io::stdout();
        let _ = out.write_all(MOUSE_REPORT_OFF);
        let _ = out.write_all(BRACKETED_PASTE_OFF);
        let _ = execute!(out, Show, LeaveAlternateScreen);
        let _ = out.flush();
        let _ = disable_raw_mode();
        tracing::debug!("terminal restored");
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        self.deinit();
    }
}

/// Self-pipe for SIGWINCH: the handler writes one byte, the event loop's
/// poll set includes the read end, and re-layout happens on the loop tick
pub struct WinchPipe {
    read_fd: OwnedFd,
    _write_fd: OwnedFd,
}

static WINCH_WRITE_FD: AtomicI32 = AtomicI32::new(-1);

extern "C" fn on_winch(_: libc::c_int) {
    let fd = WINCH_WRITE_FD.load(Ordering::Relaxed);
    if fd >= 0 {
        // SAFETY: async-signal-safe single write syscall
        let fd = unsafe { BorrowedFd::borrow_raw(fd) };
        let _ = nix::unistd::write(fd, &[1u8]);
    }
}

impl WinchPipe {
    pub fn install() -> anyhow::Result<Self> {
        let (read_fd, write_fd) = nix::unistd::pipe().context("winch pipe")?;
        for fd in [&read_fd, &write_fd] {
            let flags = nix::fcntl::fcntl(fd, nix::fcntl::FcntlArg::F_GETFL)?;
            let flags =
                nix::fcntl::OFlag::from_bits_truncate(flags) | nix::fcntl::OFlag::O_NONBLOCK;
            nix::fcntl::fcntl(fd, nix::fcntl::FcntlArg::F_SETFL(flags))?;
        }
        WINCH_WRITE_FD.store(write_fd.as_raw_fd(), Ordering::Relaxed);

        let action = SigAction::new(
            SigHandler::Handler(on_winch),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );
        // SAFETY: the handler only performs a write(2)
        unsafe { sigaction(Signal::SIGWINCH, &action).context("sigaction SIGWINCH")? };

        Ok(Self {
            read_fd,
            _write_fd: write_fd,
        })
    }

    pub fn read_fd(&self) -> RawFd {
        self.read_fd.as_raw_fd()
    }

    /// Drain pending notifications; true when at least one arrived
    pub fn drain(&self) -> bool {
        let mut any = false;
        let mut buf = [0u8; 16];
        while let Ok(n) = nix::unistd::read(&self.read_fd, &mut buf) {
            if n == 0 {
                break;
            }
            any = true;
        }
        any
    }
}
