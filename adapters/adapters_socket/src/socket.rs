//! Socket Module
//!
//! Provides the IPv4 socket wrapper used by the engines. Sockets are created
//! in blocking mode; bounded operations switch modes only for the duration of
//! a single call.

use std::io;
use std::net::Shutdown;
use std::os::unix::io::{AsRawFd, RawFd};

use entities_net::{AddressEndpoint, NetError, SocketHandle};
use socket2::{Domain, Protocol, SockAddr, Socket as Socket2, Type};
use tracing::{debug, trace};

#[cfg(any(target_os = "linux", target_os = "android"))]
const SEND_FLAGS: libc::c_int = libc::MSG_NOSIGNAL;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SEND_FLAGS: libc::c_int = 0;

/// Socket type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketType {
    /// Stream socket (TCP)
    Stream,
    /// Datagram socket (UDP)
    Datagram,
}

impl From<SocketType> for Type {
    fn from(ty: SocketType) -> Self {
        match ty {
            SocketType::Stream => Type::STREAM,
            SocketType::Datagram => Type::DGRAM,
        }
    }
}

impl SocketType {
    fn protocol(self) -> Protocol {
        match self {
            SocketType::Stream => Protocol::TCP,
            SocketType::Datagram => Protocol::UDP,
        }
    }
}

/// Which direction(s) to shut down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownHow {
    /// No further receives
    Read,
    /// No further sends; the peer sees an orderly shutdown
    Write,
    /// Both directions
    Both,
}

impl From<ShutdownHow> for Shutdown {
    fn from(how: ShutdownHow) -> Self {
        match how {
            ShutdownHow::Read => Shutdown::Read,
            ShutdownHow::Write => Shutdown::Write,
            ShutdownHow::Both => Shutdown::Both,
        }
    }
}

/// Run a syscall wrapper until it stops failing with `EINTR`
pub(crate) fn retry_interrupted<T, F>(mut op: F) -> Result<T, NetError>
where
    F: FnMut() -> io::Result<T>,
{
    loop {
        match op() {
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {
                trace!("syscall interrupted, retrying");
                continue;
            }
            other => return other.map_err(NetError::from),
        }
    }
}

fn ipv4_endpoint(addr: SockAddr) -> Result<AddressEndpoint, NetError> {
    addr.as_socket_ipv4()
        .map(AddressEndpoint::from)
        .ok_or(NetError::InvalidArgument)
}

/// Socket wrapper
///
/// Owns the OS socket; dropping it closes the descriptor.
#[derive(Debug)]
pub struct Socket {
    inner: Socket2,
    socket_type: SocketType,
}

impl Socket {
    /// Create a new blocking IPv4 socket
    ///
    /// # Arguments
    ///
    /// * `socket_type` - Stream or Datagram
    ///
    /// # Returns
    ///
    /// * `Ok(Socket)` - Created socket
    /// * `Err(NetError)` - Error creating socket
    pub fn new(socket_type: SocketType) -> Result<Self, NetError> {
        let inner = Socket2::new(Domain::IPV4, socket_type.into(), Some(socket_type.protocol()))?;
        debug!(handle = inner.as_raw_fd(), ?socket_type, "socket opened");
        Ok(Self { inner, socket_type })
    }

    pub(crate) fn from_accepted(inner: Socket2) -> Self {
        Self {
            inner,
            socket_type: SocketType::Stream,
        }
    }

    /// Bind socket to an endpoint
    pub fn bind(&self, endpoint: AddressEndpoint) -> Result<(), NetError> {
        let addr = SockAddr::from(endpoint.to_socket_addr());
        self.inner.bind(&addr)?;
        debug!(handle = self.raw_fd(), %endpoint, "socket bound");
        Ok(())
    }

    /// Listen for incoming connections (stream only)
    ///
    /// # Arguments
    ///
    /// * `backlog` - Maximum number of pending connections
    pub fn listen(&self, backlog: i32) -> Result<(), NetError> {
        if self.socket_type != SocketType::Stream {
            return Err(NetError::Os(libc::EOPNOTSUPP));
        }
        self.inner.listen(backlog)?;
        debug!(handle = self.raw_fd(), backlog, "socket listening");
        Ok(())
    }

    /// Send data on a connected socket
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Number of bytes sent
    /// * `Err(NetError)` - Error sending
    pub fn send(&self, buf: &[u8]) -> Result<usize, NetError> {
        let sent = retry_interrupted(|| self.inner.send_with_flags(buf, SEND_FLAGS))?;
        trace!(handle = self.raw_fd(), sent, "send");
        Ok(sent)
    }

    /// Send a datagram to `endpoint`
    pub fn send_to(&self, buf: &[u8], endpoint: AddressEndpoint) -> Result<usize, NetError> {
        let addr = SockAddr::from(endpoint.to_socket_addr());
        let sent = retry_interrupted(|| self.inner.send_to_with_flags(buf, &addr, SEND_FLAGS))?;
        trace!(handle = self.raw_fd(), sent, %endpoint, "send_to");
        Ok(sent)
    }

    /// Shut down one or both directions of a connected socket
    pub fn shutdown(&self, how: ShutdownHow) -> Result<(), NetError> {
        self.inner.shutdown(how.into())?;
        debug!(handle = self.raw_fd(), ?how, "socket shut down");
        Ok(())
    }

    /// Local endpoint the socket is bound to
    pub fn local_endpoint(&self) -> Result<AddressEndpoint, NetError> {
        ipv4_endpoint(self.inner.local_addr()?)
    }

    /// Endpoint of the connected peer
    pub fn peer_endpoint(&self) -> Result<AddressEndpoint, NetError> {
        ipv4_endpoint(self.inner.peer_addr()?)
    }

    /// Handle identifying this socket
    pub fn handle(&self) -> SocketHandle {
        SocketHandle::new(self.raw_fd())
    }

    /// Raw file descriptor
    pub fn raw_fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }

    /// Get the underlying socket2 socket
    pub fn inner(&self) -> &Socket2 {
        &self.inner
    }

    /// Get the socket type
    pub fn socket_type(&self) -> SocketType {
        self.socket_type
    }
}

impl AsRawFd for Socket {
    fn as_raw_fd(&self) -> RawFd {
        self.raw_fd()
    }
}
