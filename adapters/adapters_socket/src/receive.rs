//! Receive Engine
//!
//! Stream and datagram reads. A bounded read waits for readability first, so a
//! timeout never consumes data: whatever arrives later is still there for the
//! next call.

use std::mem::MaybeUninit;
use std::time::Duration;

use adapters_io_polling::{Interest, Readiness, ReadinessPoller};
use entities_net::{AddressEndpoint, NetError, ReceiveError, Received};
use tracing::{debug, trace};

use crate::socket::{retry_interrupted, Socket, SocketType};

fn uninit(buf: &mut [u8]) -> &mut [MaybeUninit<u8>] {
    // SAFETY: u8 and MaybeUninit<u8> share layout and recv only writes
    unsafe { std::slice::from_raw_parts_mut(buf.as_mut_ptr() as *mut MaybeUninit<u8>, buf.len()) }
}

fn wait_readable(socket: &Socket, timeout_ms: u32, poller: &dyn ReadinessPoller) -> Result<(), ReceiveError> {
    if timeout_ms == 0 {
        return Ok(());
    }
    let timeout = Duration::from_millis(u64::from(timeout_ms));
    match poller.wait(socket.raw_fd(), Interest::Readable, timeout)? {
        Readiness::Ready => Ok(()),
        Readiness::TimedOut => {
            debug!(handle = socket.raw_fd(), timeout_ms, "receive timed out");
            Err(NetError::Timeout)
        }
    }
}

/// A blocking socket only reports `EAGAIN` when its native receive timeout expired.
fn native_timeout(err: NetError) -> NetError {
    match err {
        NetError::WouldBlock => NetError::Timeout,
        other => other,
    }
}

fn classify(socket: &Socket, n: usize) -> Received {
    if n == 0 && socket.socket_type() == SocketType::Stream {
        trace!(handle = socket.raw_fd(), "peer shut down");
        Received::Shutdown
    } else {
        Received::Bytes(n)
    }
}

/// Read into `buf`, bounded by `timeout_ms` (`0` = no bound)
///
/// # Returns
///
/// * `Ok(Received::Bytes(n))` - `n` bytes were copied into `buf`
/// * `Ok(Received::Shutdown)` - The stream peer shut down its sending side
/// * `Err(NetError::Timeout)` - Nothing arrived within `timeout_ms`
/// * `Err(NetError)` - Read failed
pub fn receive(
    socket: &Socket,
    buf: &mut [u8],
    timeout_ms: u32,
    poller: &dyn ReadinessPoller,
) -> Result<Received, ReceiveError> {
    if buf.is_empty() {
        return Ok(Received::Bytes(0));
    }
    wait_readable(socket, timeout_ms, poller)?;

    let n = retry_interrupted(|| socket.inner().recv(uninit(buf))).map_err(native_timeout)?;
    trace!(handle = socket.raw_fd(), received = n, "receive");
    Ok(classify(socket, n))
}

/// Read into `buf` and report the sender, bounded by `timeout_ms`
///
/// For stream sockets the sender is the connected peer.
pub fn receive_from(
    socket: &Socket,
    buf: &mut [u8],
    timeout_ms: u32,
    poller: &dyn ReadinessPoller,
) -> Result<(Received, AddressEndpoint), ReceiveError> {
    if socket.socket_type() == SocketType::Stream {
        let received = receive(socket, buf, timeout_ms, poller)?;
        return Ok((received, socket.peer_endpoint()?));
    }
    wait_readable(socket, timeout_ms, poller)?;

    let (n, addr) =
        retry_interrupted(|| socket.inner().recv_from(uninit(buf))).map_err(native_timeout)?;
    let sender = addr
        .as_socket_ipv4()
        .map(AddressEndpoint::from)
        .unwrap_or(AddressEndpoint::ANY);
    trace!(handle = socket.raw_fd(), received = n, %sender, "receive_from");
    Ok((Received::Bytes(n), sender))
}
