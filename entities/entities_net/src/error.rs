//! Network Error Taxonomy
//!
//! Every socket operation returns a [`NetError`] on failure. The variants cover
//! the conditions the calling layer distinguishes; anything else keeps its raw
//! OS error number in [`NetError::Os`].

use std::io::{self, ErrorKind};

/// Socket operation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetError {
    /// Bounded operation did not complete within its timeout
    Timeout,
    /// Connection refused by the remote host
    ConnectionRefused,
    /// Connection reset by the peer
    ConnectionReset,
    /// Address already in use
    AddressInUse,
    /// Socket is not connected
    NotConnected,
    /// Operation would block on a non-blocking socket
    WouldBlock,
    /// Handle is not an open socket known to this layer
    BadFileDescriptor,
    /// Allocation failed
    InsufficientMemory,
    /// Invalid argument
    InvalidArgument,
    /// Operation not permitted
    OperationNotPermitted,
    /// Blocking primitive interrupted by a signal
    Interrupted,
    /// Any other OS error, by errno
    Os(i32),
    /// Failure with no OS error number attached
    Unknown(String),
}

/// Error returned by the connect engine
pub type ConnectError = NetError;
/// Error returned by the accept engine
pub type AcceptError = NetError;
/// Error returned by the receive engine
pub type ReceiveError = NetError;

impl NetError {
    /// Map a raw errno to an error
    pub fn from_errno(code: i32) -> Self {
        match code {
            libc::ETIMEDOUT => NetError::Timeout,
            libc::ECONNREFUSED => NetError::ConnectionRefused,
            libc::ECONNRESET => NetError::ConnectionReset,
            libc::EADDRINUSE => NetError::AddressInUse,
            libc::ENOTCONN => NetError::NotConnected,
            libc::EBADF | libc::ENOTSOCK => NetError::BadFileDescriptor,
            libc::ENOMEM | libc::ENOBUFS => NetError::InsufficientMemory,
            libc::EINVAL => NetError::InvalidArgument,
            libc::EPERM | libc::EACCES => NetError::OperationNotPermitted,
            libc::EINTR => NetError::Interrupted,
            c if c == libc::EWOULDBLOCK || c == libc::EAGAIN => NetError::WouldBlock,
            other => NetError::Os(other),
        }
    }

    /// POSIX errno equivalent, used by the last-error slot
    pub fn code(&self) -> i32 {
        match self {
            NetError::Timeout => libc::ETIMEDOUT,
            NetError::ConnectionRefused => libc::ECONNREFUSED,
            NetError::ConnectionReset => libc::ECONNRESET,
            NetError::AddressInUse => libc::EADDRINUSE,
            NetError::NotConnected => libc::ENOTCONN,
            NetError::WouldBlock => libc::EWOULDBLOCK,
            NetError::BadFileDescriptor => libc::EBADF,
            NetError::InsufficientMemory => libc::ENOMEM,
            NetError::InvalidArgument => libc::EINVAL,
            NetError::OperationNotPermitted => libc::EPERM,
            NetError::Interrupted => libc::EINTR,
            NetError::Os(code) => *code,
            NetError::Unknown(_) => -1,
        }
    }

    /// True for conditions this layer manufactures itself rather than
    /// receiving from a failed syscall.
    pub fn is_emulated(&self) -> bool {
        matches!(self, NetError::Timeout | NetError::InsufficientMemory)
    }

    /// True for the timeout condition
    pub fn is_timeout(&self) -> bool {
        matches!(self, NetError::Timeout)
    }
}

impl From<io::Error> for NetError {
    fn from(err: io::Error) -> Self {
        if let Some(code) = err.raw_os_error() {
            return NetError::from_errno(code);
        }
        match err.kind() {
            ErrorKind::TimedOut => NetError::Timeout,
            ErrorKind::ConnectionRefused => NetError::ConnectionRefused,
            ErrorKind::ConnectionReset => NetError::ConnectionReset,
            ErrorKind::AddrInUse => NetError::AddressInUse,
            ErrorKind::NotConnected => NetError::NotConnected,
            ErrorKind::WouldBlock => NetError::WouldBlock,
            ErrorKind::InvalidInput => NetError::InvalidArgument,
            ErrorKind::PermissionDenied => NetError::OperationNotPermitted,
            ErrorKind::Interrupted => NetError::Interrupted,
            ErrorKind::OutOfMemory => NetError::InsufficientMemory,
            _ => NetError::Unknown(err.to_string()),
        }
    }
}

impl std::fmt::Display for NetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetError::Timeout => write!(f, "operation timed out"),
            NetError::ConnectionRefused => write!(f, "connection refused"),
            NetError::ConnectionReset => write!(f, "connection reset by peer"),
            NetError::AddressInUse => write!(f, "address already in use"),
            NetError::NotConnected => write!(f, "socket is not connected"),
            NetError::WouldBlock => write!(f, "operation would block"),
            NetError::BadFileDescriptor => write!(f, "bad file descriptor"),
            NetError::InsufficientMemory => write!(f, "insufficient memory"),
            NetError::InvalidArgument => write!(f, "invalid argument"),
            NetError::OperationNotPermitted => write!(f, "operation not permitted"),
            NetError::Interrupted => write!(f, "interrupted system call"),
            NetError::Os(code) => write!(f, "{}", io::Error::from_raw_os_error(*code)),
            NetError::Unknown(msg) => write!(f, "unknown error: {}", msg),
        }
    }
}

impl std::error::Error for NetError {}
