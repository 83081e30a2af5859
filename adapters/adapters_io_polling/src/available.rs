//! Bytes-Available Probe
//!
//! Reports how many bytes can be read from a socket without blocking. The
//! `FIONREAD` ioctl answers directly where it works on sockets; otherwise a
//! zero-timeout poll followed by a `MSG_PEEK` read gives the same answer for
//! the data currently queued. The tier is detected once per process.

use std::io;
use std::os::unix::io::RawFd;
use std::sync::OnceLock;
use std::time::Duration;

use tracing::debug;

use crate::poller::{Interest, PollPoller, Readiness, ReadinessPoller};

/// Number of bytes readable without blocking
pub trait BytesAvailable: Send + Sync {
    /// Bytes queued for reading on `fd`
    fn available(&self, fd: RawFd) -> io::Result<usize>;

    /// Short name for diagnostics
    fn name(&self) -> &'static str;
}

/// `ioctl(FIONREAD)` probe
#[derive(Debug, Clone, Copy, Default)]
pub struct FionreadProbe;

impl BytesAvailable for FionreadProbe {
    fn available(&self, fd: RawFd) -> io::Result<usize> {
        let mut count: libc::c_int = 0;
        let rc = unsafe { libc::ioctl(fd, libc::FIONREAD, &mut count as *mut libc::c_int) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(count.max(0) as usize)
    }

    fn name(&self) -> &'static str {
        "fionread"
    }
}

/// Poll + `MSG_PEEK` probe.
///
/// Counts at most `limit` bytes.
#[derive(Debug, Clone, Copy)]
pub struct PeekProbe {
    limit: usize,
}

impl PeekProbe {
    /// Default upper bound on the bytes counted per call
    pub const DEFAULT_LIMIT: usize = 64 * 1024;

    /// Create a probe counting up to `limit` bytes
    pub fn new(limit: usize) -> Self {
        Self { limit: limit.max(1) }
    }
}

impl Default for PeekProbe {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LIMIT)
    }
}

impl BytesAvailable for PeekProbe {
    fn available(&self, fd: RawFd) -> io::Result<usize> {
        if fd < 0 {
            return Err(io::Error::from_raw_os_error(libc::EBADF));
        }
        if PollPoller::new().wait(fd, Interest::Readable, Duration::ZERO)? == Readiness::TimedOut {
            return Ok(0);
        }
        let mut scratch = vec![0u8; self.limit];
        loop {
            let rc = unsafe {
                libc::recv(
                    fd,
                    scratch.as_mut_ptr() as *mut libc::c_void,
                    scratch.len(),
                    libc::MSG_PEEK | libc::MSG_DONTWAIT,
                )
            };
            if rc >= 0 {
                return Ok(rc as usize);
            }
            let err = io::Error::last_os_error();
            match err.kind() {
                io::ErrorKind::Interrupted => continue,
                io::ErrorKind::WouldBlock => return Ok(0),
                _ => return Err(err),
            }
        }
    }

    fn name(&self) -> &'static str {
        "peek"
    }
}

/// Pick the probe tier for this platform.
///
/// `FIONREAD` is tried on a scratch datagram socket; if the ioctl is rejected
/// the peek tier is used.
pub fn detect_bytes_available() -> Box<dyn BytesAvailable> {
    let probe_fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM, 0) };
    let fionread_works = probe_fd >= 0 && FionreadProbe.available(probe_fd).is_ok();
    if probe_fd >= 0 {
        unsafe {
            libc::close(probe_fd);
        }
    }

    if fionread_works {
        debug!("bytes-available probe: fionread");
        Box::new(FionreadProbe)
    } else {
        debug!("bytes-available probe: peek");
        Box::new(PeekProbe::default())
    }
}

static BYTES_AVAILABLE: OnceLock<Box<dyn BytesAvailable>> = OnceLock::new();

/// The process-wide probe, detected on first use
pub fn bytes_available_probe() -> &'static dyn BytesAvailable {
    BYTES_AVAILABLE.get_or_init(detect_bytes_available).as_ref()
}
