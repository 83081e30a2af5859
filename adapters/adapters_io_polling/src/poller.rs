//! Readiness Poller
//!
//! Waits for a single descriptor to become readable or writable with a
//! deadline. Two multiplexing primitives are supported and picked once at
//! startup through [`PollerKind`]:
//!
//! - [`PollPoller`] uses `poll(2)` with a millisecond timeout, rounded up so a
//!   wait never ends before the requested duration
//! - [`SelectPoller`] uses `select(2)` with a `timeval` (seconds +
//!   microseconds); it only handles descriptors below `FD_SETSIZE`
//!
//! Both retry `EINTR` against the original deadline.

use std::io;
use std::os::unix::io::RawFd;
use std::time::{Duration, Instant};

use tracing::trace;

/// Readiness the caller is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    /// Data (or a pending connection) is available to read
    Readable,
    /// The socket can be written; also signals non-blocking connect completion
    Writable,
}

impl Interest {
    fn poll_events(self) -> libc::c_short {
        match self {
            Interest::Readable => libc::POLLIN,
            Interest::Writable => libc::POLLOUT,
        }
    }
}

/// Result of a bounded wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The descriptor is ready (or in an error/hang-up state the next
    /// syscall will report)
    Ready,
    /// The deadline passed first
    TimedOut,
}

/// Bounded wait on one descriptor
pub trait ReadinessPoller: Send + Sync {
    /// Block until `fd` satisfies `interest` or `timeout` elapses.
    ///
    /// A zero timeout checks readiness without blocking.
    fn wait(&self, fd: RawFd, interest: Interest, timeout: Duration) -> io::Result<Readiness>;

    /// Short name for diagnostics
    fn name(&self) -> &'static str;
}

/// Multiplexing primitive selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollerKind {
    /// `poll(2)`
    #[default]
    Poll,
    /// `select(2)`
    Select,
}

impl std::str::FromStr for PollerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "poll" => Ok(PollerKind::Poll),
            "select" => Ok(PollerKind::Select),
            other => Err(format!("unknown poller kind: {}", other)),
        }
    }
}

/// Build the poller for `kind`
pub fn poller_for(kind: PollerKind) -> Box<dyn ReadinessPoller> {
    match kind {
        PollerKind::Poll => Box::new(PollPoller::new()),
        PollerKind::Select => Box::new(SelectPoller::new()),
    }
}

/// Milliseconds for `poll(2)`, rounded up and clamped to `c_int`
fn poll_timeout_ms(remaining: Duration) -> libc::c_int {
    let ms = remaining.as_nanos().div_ceil(1_000_000);
    ms.min(libc::c_int::MAX as u128) as libc::c_int
}

/// Loop `attempt` until it stops reporting `EINTR`, handing it the time left
/// before the deadline each round.
fn retry_until_deadline<F>(timeout: Duration, mut attempt: F) -> io::Result<Readiness>
where
    F: FnMut(Duration) -> io::Result<Readiness>,
{
    let deadline = Instant::now().checked_add(timeout);
    loop {
        let remaining = match deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => timeout,
        };
        match attempt(remaining) {
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {
                trace!(remaining_ms = remaining.as_millis() as u64, "wait interrupted, retrying");
                continue;
            }
            other => return other,
        }
    }
}

/// `poll(2)` based poller
#[derive(Debug, Clone, Copy, Default)]
pub struct PollPoller;

impl PollPoller {
    /// Create a poller
    pub fn new() -> Self {
        Self
    }
}

impl ReadinessPoller for PollPoller {
    fn wait(&self, fd: RawFd, interest: Interest, timeout: Duration) -> io::Result<Readiness> {
        retry_until_deadline(timeout, |remaining| {
            let mut poll_fd = libc::pollfd {
                fd,
                events: interest.poll_events(),
                revents: 0,
            };
            let rc = unsafe { libc::poll(&mut poll_fd, 1, poll_timeout_ms(remaining)) };
            if rc < 0 {
                return Err(io::Error::last_os_error());
            }
            if rc == 0 {
                trace!(fd, ?interest, "poll timed out");
                return Ok(Readiness::TimedOut);
            }
            if poll_fd.revents & libc::POLLNVAL != 0 {
                return Err(io::Error::from_raw_os_error(libc::EBADF));
            }
            trace!(fd, ?interest, revents = poll_fd.revents, "poll ready");
            Ok(Readiness::Ready)
        })
    }

    fn name(&self) -> &'static str {
        "poll"
    }
}

/// `select(2)` based poller
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectPoller;

impl SelectPoller {
    /// Create a poller
    pub fn new() -> Self {
        Self
    }
}

fn timeval_from(remaining: Duration) -> libc::timeval {
    // Round up to the next microsecond so the wait is never shorter than asked.
    let micros = remaining.as_nanos().div_ceil(1_000);
    libc::timeval {
        tv_sec: (micros / 1_000_000).min(libc::time_t::MAX as u128) as libc::time_t,
        tv_usec: (micros % 1_000_000) as libc::suseconds_t,
    }
}

impl ReadinessPoller for SelectPoller {
    fn wait(&self, fd: RawFd, interest: Interest, timeout: Duration) -> io::Result<Readiness> {
        if fd < 0 {
            return Err(io::Error::from_raw_os_error(libc::EBADF));
        }
        if fd as usize >= libc::FD_SETSIZE as usize {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "descriptor exceeds FD_SETSIZE",
            ));
        }

        retry_until_deadline(timeout, |remaining| {
            let mut tv = timeval_from(remaining);
            let rc = unsafe {
                let mut set: libc::fd_set = std::mem::zeroed();
                libc::FD_ZERO(&mut set);
                libc::FD_SET(fd, &mut set);
                let (read_set, write_set): (*mut libc::fd_set, *mut libc::fd_set) = match interest {
                    Interest::Readable => (&mut set as *mut libc::fd_set, std::ptr::null_mut()),
                    Interest::Writable => (std::ptr::null_mut(), &mut set as *mut libc::fd_set),
                };
                libc::select(fd + 1, read_set, write_set, std::ptr::null_mut(), &mut tv)
            };
            if rc < 0 {
                return Err(io::Error::last_os_error());
            }
            if rc == 0 {
                trace!(fd, ?interest, "select timed out");
                return Ok(Readiness::TimedOut);
            }
            trace!(fd, ?interest, "select ready");
            Ok(Readiness::Ready)
        })
    }

    fn name(&self) -> &'static str {
        "select"
    }
}
