//! Handles and Endpoints
//!
//! Identifiers and addresses as they cross the boundary to the calling layer.
//! Addresses and ports are always in host byte order here; conversion to wire
//! order happens when an endpoint is turned into a `SocketAddrV4`.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use crate::error::NetError;

/// Opaque identifier of an open stream or datagram socket.
///
/// The value is the raw OS descriptor. The handle itself owns nothing; the
/// socket it names is closed only by an explicit close operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SocketHandle(i32);

impl SocketHandle {
    /// Wrap a raw descriptor
    pub fn new(raw: i32) -> Self {
        Self(raw)
    }

    /// Raw descriptor value
    pub fn raw(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for SocketHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// IPv4 address and port, both in host byte order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressEndpoint {
    /// 32-bit IPv4 address, host byte order
    pub address: u32,
    /// Port, host byte order
    pub port: u16,
}

impl AddressEndpoint {
    /// The wildcard address with an ephemeral port
    pub const ANY: AddressEndpoint = AddressEndpoint { address: 0, port: 0 };

    /// Create an endpoint from host-order address and port
    pub fn new(address: u32, port: u16) -> Self {
        Self { address, port }
    }

    /// The address as an `Ipv4Addr`
    pub fn ip(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.address)
    }

    /// Convert to a socket address usable with the OS
    pub fn to_socket_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.ip(), self.port)
    }
}

impl From<SocketAddrV4> for AddressEndpoint {
    fn from(addr: SocketAddrV4) -> Self {
        Self {
            address: u32::from(*addr.ip()),
            port: addr.port(),
        }
    }
}

impl TryFrom<SocketAddr> for AddressEndpoint {
    type Error = NetError;

    fn try_from(addr: SocketAddr) -> Result<Self, Self::Error> {
        match addr {
            SocketAddr::V4(v4) => Ok(v4.into()),
            SocketAddr::V6(_) => Err(NetError::InvalidArgument),
        }
    }
}

impl fmt::Display for AddressEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip(), self.port)
    }
}

/// Timeout configured for one open handle.
///
/// `timeout_ms == 0` means the operation blocks indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutEntry {
    /// Handle the timeout applies to
    pub handle: SocketHandle,
    /// Timeout in milliseconds, 0 = disabled
    pub timeout_ms: u32,
}

impl TimeoutEntry {
    /// New entry with the timeout disabled
    pub fn new(handle: SocketHandle) -> Self {
        Self {
            handle,
            timeout_ms: 0,
        }
    }

    /// Whether operations on this handle are bounded
    pub fn is_enabled(&self) -> bool {
        self.timeout_ms > 0
    }

    /// The timeout as a duration, `None` when disabled
    pub fn timeout(&self) -> Option<Duration> {
        if self.is_enabled() {
            Some(Duration::from_millis(u64::from(self.timeout_ms)))
        } else {
            None
        }
    }
}

/// Outcome of a successful read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    /// Bytes copied into the caller's buffer (may be 0 for an empty datagram
    /// or an empty buffer)
    Bytes(usize),
    /// The stream peer performed an orderly shutdown
    Shutdown,
}

impl Received {
    /// Number of bytes received; orderly shutdown counts as 0
    pub fn len(&self) -> usize {
        match self {
            Received::Bytes(n) => *n,
            Received::Shutdown => 0,
        }
    }

    /// True if nothing was copied into the buffer
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if the peer closed its sending side
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Received::Shutdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    #[test]
    fn test_endpoint_host_order() {
        let endpoint = AddressEndpoint::new(0xC0A8_0102, 443);
        assert_eq!(endpoint.ip(), Ipv4Addr::new(192, 168, 1, 2));
        assert_eq!(endpoint.to_socket_addr().port(), 443);
        assert_eq!(endpoint.to_string(), "192.168.1.2:443");
    }

    #[test]
    fn test_endpoint_from_socket_addr() {
        let addr = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 9000);
        let endpoint = AddressEndpoint::from(addr);
        assert_eq!(endpoint.address, 0x7F00_0001);
        assert_eq!(endpoint.port, 9000);
        assert_eq!(endpoint.to_socket_addr(), addr);
    }

    #[test]
    fn test_endpoint_rejects_ipv6() {
        let addr = SocketAddr::new(Ipv6Addr::LOCALHOST.into(), 80);
        assert_eq!(AddressEndpoint::try_from(addr), Err(NetError::InvalidArgument));
    }

    #[test]
    fn test_timeout_entry_disabled_by_default() {
        let entry = TimeoutEntry::new(SocketHandle::new(3));
        assert!(!entry.is_enabled());
        assert_eq!(entry.timeout(), None);

        let bounded = TimeoutEntry { timeout_ms: 250, ..entry };
        assert_eq!(bounded.timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_received_len() {
        assert_eq!(Received::Bytes(4).len(), 4);
        assert_eq!(Received::Shutdown.len(), 0);
        assert!(Received::Shutdown.is_shutdown());
        assert!(Received::Bytes(0).is_empty());
        assert!(!Received::Bytes(0).is_shutdown());
    }

    #[test]
    fn test_handle_ordering() {
        let mut handles = vec![SocketHandle::new(9), SocketHandle::new(3), SocketHandle::new(5)];
        handles.sort();
        assert_eq!(handles, vec![SocketHandle::new(3), SocketHandle::new(5), SocketHandle::new(9)]);
        assert_eq!(SocketHandle::new(5).to_string(), "#5");
    }
}
