//! Scoped Non-Blocking Mode
//!
//! The connect engine needs `O_NONBLOCK` for exactly one call. The guard
//! captures the descriptor's flags on entry and writes them back when dropped,
//! so every exit path (success, failure, timeout) leaves the socket in the mode
//! it had before.

use std::io;
use std::os::unix::io::RawFd;

use tracing::{trace, warn};

fn get_flags(fd: RawFd) -> io::Result<libc::c_int> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(flags)
}

fn set_flags(fd: RawFd, flags: libc::c_int) -> io::Result<()> {
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Whether `O_NONBLOCK` is currently set on `fd`
pub fn is_nonblocking(fd: RawFd) -> io::Result<bool> {
    Ok(get_flags(fd)? & libc::O_NONBLOCK != 0)
}

/// Restores the original file status flags on drop
#[derive(Debug)]
pub struct NonBlockingGuard {
    fd: RawFd,
    saved: libc::c_int,
}

impl NonBlockingGuard {
    /// Put `fd` into non-blocking mode until the guard is dropped
    ///
    /// # Returns
    ///
    /// * `Ok(NonBlockingGuard)` - Mode switched; restored on drop
    /// * `Err(io::Error)` - Flags could not be read or written
    pub fn enter(fd: RawFd) -> io::Result<Self> {
        let saved = get_flags(fd)?;
        if saved & libc::O_NONBLOCK == 0 {
            set_flags(fd, saved | libc::O_NONBLOCK)?;
        }
        trace!(fd, "non-blocking mode entered");
        Ok(Self { fd, saved })
    }
}

impl Drop for NonBlockingGuard {
    fn drop(&mut self) {
        if let Err(err) = set_flags(self.fd, self.saved) {
            warn!(fd = self.fd, error = %err, "failed to restore socket blocking mode");
        } else {
            trace!(fd = self.fd, "blocking mode restored");
        }
    }
}
