//! Connect Engine
//!
//! With no timeout the connect is a plain blocking call. With a timeout the
//! socket is switched to non-blocking mode for the call, the in-progress
//! connect is waited on for writability, and the outcome is read back from
//! `SO_ERROR`. The socket's blocking mode is restored on every path.

use std::io;
use std::time::Duration;

use adapters_io_polling::{Interest, Readiness, ReadinessPoller};
use entities_net::{AddressEndpoint, ConnectError, NetError};
use socket2::SockAddr;
use tracing::{debug, trace};

use crate::blocking::NonBlockingGuard;
use crate::socket::Socket;

/// Slice used when waiting out an interrupted blocking connect
const UNBOUNDED_WAIT_SLICE: Duration = Duration::from_secs(3600);

fn in_progress(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(libc::EINPROGRESS) | Some(libc::EALREADY))
        || err.kind() == io::ErrorKind::WouldBlock
}

/// Outcome of a connect that has become writable
fn connect_result(socket: &Socket) -> Result<(), ConnectError> {
    match socket.inner().take_error()? {
        None => Ok(()),
        Some(err) => Err(NetError::from(err)),
    }
}

/// Connect `socket` to `endpoint`, bounded by `timeout_ms` (`0` = no bound)
///
/// # Arguments
///
/// * `socket` - Stream socket to connect
/// * `endpoint` - Remote IPv4 address and port
/// * `timeout_ms` - Upper bound in milliseconds; `0` blocks until the OS decides
/// * `poller` - Readiness poller used for the bounded wait
///
/// # Returns
///
/// * `Ok(())` - Connected
/// * `Err(NetError::Timeout)` - Not connected within `timeout_ms`
/// * `Err(NetError)` - Connection failed (refused, unreachable, ...)
pub fn connect(
    socket: &Socket,
    endpoint: AddressEndpoint,
    timeout_ms: u32,
    poller: &dyn ReadinessPoller,
) -> Result<(), ConnectError> {
    let addr = SockAddr::from(endpoint.to_socket_addr());
    let fd = socket.raw_fd();

    if timeout_ms == 0 {
        return connect_blocking(socket, &addr, endpoint, poller);
    }

    let guard = NonBlockingGuard::enter(fd)?;
    match socket.inner().connect(&addr) {
        Ok(()) => {
            debug!(handle = fd, %endpoint, "connected immediately");
            return Ok(());
        }
        Err(err) if in_progress(&err) || err.kind() == io::ErrorKind::Interrupted => {
            trace!(handle = fd, %endpoint, "connect in progress");
        }
        Err(err) => return Err(NetError::from(err)),
    }

    let timeout = Duration::from_millis(u64::from(timeout_ms));
    let readiness = poller.wait(fd, Interest::Writable, timeout)?;
    drop(guard);

    match readiness {
        Readiness::TimedOut => {
            debug!(handle = fd, %endpoint, timeout_ms, "connect timed out");
            Err(NetError::Timeout)
        }
        Readiness::Ready => {
            connect_result(socket)?;
            debug!(handle = fd, %endpoint, "connected");
            Ok(())
        }
    }
}

fn connect_blocking(
    socket: &Socket,
    addr: &SockAddr,
    endpoint: AddressEndpoint,
    poller: &dyn ReadinessPoller,
) -> Result<(), ConnectError> {
    let fd = socket.raw_fd();
    match socket.inner().connect(addr) {
        Ok(()) => {
            debug!(handle = fd, %endpoint, "connected");
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::Interrupted => {
            // The handshake keeps going in the kernel; wait for it to settle.
            trace!(handle = fd, %endpoint, "blocking connect interrupted, waiting");
            while poller.wait(fd, Interest::Writable, UNBOUNDED_WAIT_SLICE)? == Readiness::TimedOut {}
            connect_result(socket)
        }
        // A blocking socket only reports this when a native send timeout expired.
        Err(err) if in_progress(&err) => {
            debug!(handle = fd, %endpoint, "native connect timeout expired");
            Err(NetError::Timeout)
        }
        Err(err) => Err(NetError::from(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocking::is_nonblocking;
    use crate::socket::SocketType;
    use adapters_io_polling::PollPoller;
    use mockall::mock;
    use std::net::Ipv4Addr;
    use std::os::unix::io::RawFd;
    use std::time::Instant;

    mock! {
        pub Poller {}

        impl ReadinessPoller for Poller {
            fn wait(&self, fd: RawFd, interest: Interest, timeout: Duration) -> io::Result<Readiness>;
            fn name(&self) -> &'static str;
        }
    }

    fn listening() -> Socket {
        let listener = Socket::new(SocketType::Stream).unwrap();
        listener
            .bind(AddressEndpoint::new(u32::from(Ipv4Addr::LOCALHOST), 0))
            .unwrap();
        listener.listen(16).unwrap();
        listener
    }

    /// Listener with a full accept queue; further SYNs go unanswered
    fn saturated() -> (Socket, Vec<Socket>) {
        let listener = Socket::new(SocketType::Stream).unwrap();
        listener
            .bind(AddressEndpoint::new(u32::from(Ipv4Addr::LOCALHOST), 0))
            .unwrap();
        listener.listen(0).unwrap();
        let target = listener.local_endpoint().unwrap();

        let mut fillers = Vec::new();
        for _ in 0..16 {
            let filler = Socket::new(SocketType::Stream).unwrap();
            let result = connect(&filler, target, 50, &PollPoller::new());
            fillers.push(filler);
            if result == Err(NetError::Timeout) {
                return (listener, fillers);
            }
        }
        panic!("accept queue never filled");
    }

    fn closed_port() -> AddressEndpoint {
        let socket = Socket::new(SocketType::Stream).unwrap();
        socket
            .bind(AddressEndpoint::new(u32::from(Ipv4Addr::LOCALHOST), 0))
            .unwrap();
        socket.local_endpoint().unwrap()
    }

    #[test]
    fn test_connect_with_timeout_succeeds() {
        let listener = listening();
        let target = listener.local_endpoint().unwrap();

        let client = Socket::new(SocketType::Stream).unwrap();
        connect(&client, target, 1000, &PollPoller::new()).unwrap();

        assert_eq!(client.peer_endpoint().unwrap(), target);
        assert!(!is_nonblocking(client.raw_fd()).unwrap());
    }

    #[test]
    fn test_connect_without_timeout_succeeds() {
        let listener = listening();
        let target = listener.local_endpoint().unwrap();

        let client = Socket::new(SocketType::Stream).unwrap();
        connect(&client, target, 0, &PollPoller::new()).unwrap();
        assert_eq!(client.peer_endpoint().unwrap(), target);
    }

    #[test]
    fn test_connect_refused() {
        let target = closed_port();

        let bounded = Socket::new(SocketType::Stream).unwrap();
        let result = connect(&bounded, target, 500, &PollPoller::new());
        assert_eq!(result, Err(NetError::ConnectionRefused));
        assert!(!is_nonblocking(bounded.raw_fd()).unwrap());

        let unbounded = Socket::new(SocketType::Stream).unwrap();
        let result = connect(&unbounded, target, 0, &PollPoller::new());
        assert_eq!(result, Err(NetError::ConnectionRefused));
    }

    #[test]
    fn test_connect_times_out_on_unanswered_syn() {
        let (listener, _fillers) = saturated();
        let target = listener.local_endpoint().unwrap();

        let client = Socket::new(SocketType::Stream).unwrap();
        let start = Instant::now();
        let result = connect(&client, target, 100, &PollPoller::new());
        let elapsed = start.elapsed();

        assert_eq!(result, Err(NetError::Timeout));
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(150));
        assert!(!is_nonblocking(client.raw_fd()).unwrap());
    }

    #[test]
    fn test_connect_wait_times_out() {
        let (listener, _fillers) = saturated();
        let target = listener.local_endpoint().unwrap();

        let mut poller = MockPoller::new();
        poller
            .expect_wait()
            .withf(|_, interest, timeout| {
                *interest == Interest::Writable && *timeout == Duration::from_millis(250)
            })
            .times(1)
            .returning(|_, _, _| Ok(Readiness::TimedOut));

        let client = Socket::new(SocketType::Stream).unwrap();
        let result = connect(&client, target, 250, &poller);

        assert_eq!(result, Err(NetError::Timeout));
        assert!(!is_nonblocking(client.raw_fd()).unwrap());
    }

    #[test]
    fn test_connect_poller_error_restores_mode() {
        let (listener, _fillers) = saturated();
        let target = listener.local_endpoint().unwrap();

        let mut poller = MockPoller::new();
        poller
            .expect_wait()
            .times(1)
            .returning(|_, _, _| Err(io::Error::from_raw_os_error(libc::EBADF)));

        let client = Socket::new(SocketType::Stream).unwrap();
        let result = connect(&client, target, 250, &poller);

        assert_eq!(result, Err(NetError::BadFileDescriptor));
        assert!(!is_nonblocking(client.raw_fd()).unwrap());
    }

    #[test]
    fn test_in_progress_classification() {
        assert!(in_progress(&io::Error::from_raw_os_error(libc::EINPROGRESS)));
        assert!(in_progress(&io::Error::from(io::ErrorKind::WouldBlock)));
        assert!(!in_progress(&io::Error::from_raw_os_error(libc::ECONNREFUSED)));
    }
}
