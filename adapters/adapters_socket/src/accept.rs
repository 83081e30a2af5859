//! Accept Engine
//!
//! A bounded accept waits for the listener to become readable first; the
//! accept itself then runs on the blocking listener.

use std::io;
use std::time::Duration;

use adapters_io_polling::{Interest, Readiness, ReadinessPoller};
use entities_net::{AcceptError, AddressEndpoint, NetError};
use tracing::debug;

use crate::socket::{retry_interrupted, Socket, SocketType};

/// Accept one connection from `listener`, bounded by `timeout_ms` (`0` = no bound)
///
/// # Returns
///
/// * `Ok((Socket, AddressEndpoint))` - The connected socket (blocking) and the
///   client's endpoint
/// * `Err(NetError::Timeout)` - No connection arrived within `timeout_ms`
/// * `Err(NetError)` - Accept failed
pub fn accept(
    listener: &Socket,
    timeout_ms: u32,
    poller: &dyn ReadinessPoller,
) -> Result<(Socket, AddressEndpoint), AcceptError> {
    if listener.socket_type() != SocketType::Stream {
        return Err(NetError::Os(libc::EOPNOTSUPP));
    }
    let fd = listener.raw_fd();

    if timeout_ms > 0 {
        let timeout = Duration::from_millis(u64::from(timeout_ms));
        if poller.wait(fd, Interest::Readable, timeout)? == Readiness::TimedOut {
            debug!(handle = fd, timeout_ms, "accept timed out");
            return Err(NetError::Timeout);
        }
    }

    let (inner, addr) = retry_interrupted(|| listener.inner().accept()).map_err(|err| {
        // SO_RCVTIMEO on the listener expired
        if err == NetError::WouldBlock {
            NetError::Timeout
        } else {
            err
        }
    })?;
    let peer = addr
        .as_socket_ipv4()
        .map(AddressEndpoint::from)
        .ok_or_else(|| NetError::from(io::Error::from(io::ErrorKind::InvalidData)))?;

    let accepted = Socket::from_accepted(inner);
    debug!(handle = fd, accepted = accepted.raw_fd(), %peer, "connection accepted");
    Ok((accepted, peer))
}
