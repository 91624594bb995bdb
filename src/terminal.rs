//! Terminal device operations and low-level terminal control.
//!
//! This module provides:
//! - The [`TerminalStream`] seam the theme querier talks through
//! - [`TtyStream`], which opens the controlling terminal (`/dev/tty`),
//!   toggles raw mode with termios and reads without blocking the runtime
//! - Restoration of the terminal state when the stream is dropped

use std::fs::{File, OpenOptions};
use std::io::{self, IsTerminal, Read, Write};
use std::os::unix::io::AsRawFd;

use anyhow::{Context, Result};
use async_trait::async_trait;
use nix::fcntl::{FcntlArg, OFlag, fcntl};
use termios::{ECHO, ICANON, TCSANOW, Termios, tcsetattr};
use tokio::io::unix::AsyncFd;

/// A bidirectional terminal connection the theme querier can drive.
///
/// The querier owns the raw-mode flag for the duration of one exchange and
/// puts it back to the value reported by [`is_raw_mode`](Self::is_raw_mode)
/// beforehand.
#[async_trait]
pub trait TerminalStream: Send {
    /// Whether the output side is an interactive terminal.
    fn is_terminal(&self) -> bool;

    /// Whether the input side currently delivers bytes unprocessed.
    fn is_raw_mode(&self) -> bool;

    /// Switch raw mode on or off.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal attributes cannot be changed.
    fn set_raw_mode(&mut self, enabled: bool) -> io::Result<()>;

    /// Write all of `bytes` to the output side.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Read the next available chunk from the input side.
    ///
    /// Returns `Ok(0)` at end of stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    async fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Opens the terminal device for direct access.
///
/// This function opens `/dev/tty` with both read and write permissions,
/// which allows direct communication with the terminal regardless of
/// how stdin/stdout are redirected.
///
/// # Errors
///
/// Returns an error if the process has no controlling terminal.
pub fn open_terminal_device() -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .open("/dev/tty")
        .context("Failed to open /dev/tty")
}

/// Makes the file descriptor non-blocking, returning the original flags.
fn setup_non_blocking(file: &File) -> Result<OFlag> {
    let flags = fcntl(file, FcntlArg::F_GETFL).context("Failed to get file status flags")?;
    let original = OFlag::from_bits_truncate(flags);
    fcntl(file, FcntlArg::F_SETFL(original | OFlag::O_NONBLOCK))
        .context("Failed to set terminal to non-blocking mode")?;
    Ok(original)
}

/// The controlling terminal, opened for asynchronous reads and writes.
pub struct TtyStream {
    fd: AsyncFd<File>,
    original_termios: Termios,
    original_flags: OFlag,
}

impl TtyStream {
    /// Open `/dev/tty` and register it with the current tokio runtime.
    ///
    /// Must be called from within a tokio runtime with I/O enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no controlling terminal, its attributes
    /// cannot be read, or it cannot be switched to non-blocking mode.
    pub fn open() -> Result<Self> {
        let file = open_terminal_device()?;
        let original_termios =
            Termios::from_fd(file.as_raw_fd()).context("Failed to get terminal attributes")?;
        let original_flags = setup_non_blocking(&file)?;

        let fd = AsyncFd::new(file).context("Failed to register terminal with the runtime")?;

        Ok(Self {
            fd,
            original_termios,
            original_flags,
        })
    }

    fn termios(&self) -> io::Result<Termios> {
        Termios::from_fd(self.fd.as_raw_fd())
    }
}

#[async_trait]
impl TerminalStream for TtyStream {
    fn is_terminal(&self) -> bool {
        self.fd.get_ref().is_terminal()
    }

    fn is_raw_mode(&self) -> bool {
        self.termios()
            .is_ok_and(|termios| termios.c_lflag & (ICANON | ECHO) == 0)
    }

    fn set_raw_mode(&mut self, enabled: bool) -> io::Result<()> {
        let mut termios = self.termios()?;
        termios.c_lflag &= !(ICANON | ECHO);
        if !enabled {
            // back to the canonical/echo bits the terminal was opened with
            termios.c_lflag |= self.original_termios.c_lflag & (ICANON | ECHO);
        }
        tcsetattr(self.fd.as_raw_fd(), TCSANOW, &termios)
    }

    async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut written = 0;
        while written < bytes.len() {
            let mut guard = self.fd.writable().await?;
            match guard.try_io(|inner| inner.get_ref().write(&bytes[written..])) {
                Ok(Ok(0)) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(Ok(n)) => written += n,
                Ok(Err(err)) if err.kind() == io::ErrorKind::Interrupted => {}
                Ok(Err(err)) => return Err(err),
                Err(_would_block) => {}
            }
        }
        self.fd.get_ref().flush()
    }

    async fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let mut guard = self.fd.readable().await?;
            match guard.try_io(|inner| inner.get_ref().read(buf)) {
                Ok(Err(err)) if err.kind() == io::ErrorKind::Interrupted => {}
                Ok(result) => return result,
                Err(_would_block) => {}
            }
        }
    }
}

impl Drop for TtyStream {
    fn drop(&mut self) {
        // Cleanup: errors are ignored
        let fd = self.fd.as_raw_fd();
        let _ = tcsetattr(fd, TCSANOW, &self.original_termios);
        let _ = fcntl(self.fd.get_ref(), FcntlArg::F_SETFL(self.original_flags));
    }
}
