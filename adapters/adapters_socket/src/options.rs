//! Socket Options
//!
//! Get/set of the standard socket knobs through `socket2`. [`SocketOption::Timeout`]
//! here is the platform's own `SO_RCVTIMEO`/`SO_SNDTIMEO` pair; the emulated
//! timeout lives in the socket registry and is handled by the facade.

use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

use entities_net::NetError;
use tracing::trace;

use crate::socket::Socket;

/// Option selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketOption {
    /// `TCP_NODELAY`
    NoDelay,
    /// `SO_LINGER`
    Linger,
    /// `SO_SNDBUF`
    SendBufferSize,
    /// `SO_RCVBUF`
    ReceiveBufferSize,
    /// `IP_TTL`
    Ttl,
    /// `IP_MULTICAST_IF`
    MulticastInterface,
    /// `SO_REUSEADDR`
    ReuseAddress,
    /// `IP_ADD_MEMBERSHIP` (set only)
    AddMembership,
    /// `IP_DROP_MEMBERSHIP` (set only)
    DropMembership,
    /// `SO_KEEPALIVE`
    KeepAlive,
    /// `SO_BROADCAST`
    Broadcast,
    /// Native `SO_RCVTIMEO` + `SO_SNDTIMEO`, in milliseconds
    Timeout,
}

impl fmt::Display for SocketOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SocketOption::NoDelay => "TCP_NODELAY",
            SocketOption::Linger => "SO_LINGER",
            SocketOption::SendBufferSize => "SO_SNDBUF",
            SocketOption::ReceiveBufferSize => "SO_RCVBUF",
            SocketOption::Ttl => "IP_TTL",
            SocketOption::MulticastInterface => "IP_MULTICAST_IF",
            SocketOption::ReuseAddress => "SO_REUSEADDR",
            SocketOption::AddMembership => "IP_ADD_MEMBERSHIP",
            SocketOption::DropMembership => "IP_DROP_MEMBERSHIP",
            SocketOption::KeepAlive => "SO_KEEPALIVE",
            SocketOption::Broadcast => "SO_BROADCAST",
            SocketOption::Timeout => "SO_RCVTIMEO",
        };
        f.write_str(name)
    }
}

/// Option value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionValue {
    /// Boolean switch
    Flag(bool),
    /// Byte count or hop count
    Size(u32),
    /// Linger time in seconds, `None` = linger disabled
    Linger(Option<u32>),
    /// IPv4 address in host byte order
    Address(u32),
    /// Multicast group and local interface, host byte order
    Membership { group: u32, interface: u32 },
    /// Milliseconds, 0 = disabled
    Millis(u32),
}

fn millis(duration: Option<Duration>) -> u32 {
    duration
        .map(|d| d.as_millis().min(u128::from(u32::MAX)) as u32)
        .unwrap_or(0)
}

fn duration(ms: u32) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(u64::from(ms)))
}

fn to_u32(value: usize) -> u32 {
    value.min(u32::MAX as usize) as u32
}

/// Set `option` on `socket`
///
/// # Returns
///
/// * `Ok(())` - Option applied
/// * `Err(NetError::InvalidArgument)` - `value` has the wrong shape for `option`
/// * `Err(NetError)` - The OS rejected the option
pub fn set_option(socket: &Socket, option: SocketOption, value: OptionValue) -> Result<(), NetError> {
    let inner = socket.inner();
    match (option, value) {
        (SocketOption::NoDelay, OptionValue::Flag(on)) => inner.set_nodelay(on)?,
        (SocketOption::Linger, OptionValue::Linger(secs)) => {
            inner.set_linger(secs.map(|s| Duration::from_secs(u64::from(s))))?
        }
        (SocketOption::SendBufferSize, OptionValue::Size(n)) => inner.set_send_buffer_size(n as usize)?,
        (SocketOption::ReceiveBufferSize, OptionValue::Size(n)) => inner.set_recv_buffer_size(n as usize)?,
        (SocketOption::Ttl, OptionValue::Size(n)) => inner.set_ttl(n)?,
        (SocketOption::MulticastInterface, OptionValue::Address(addr)) => {
            inner.set_multicast_if_v4(&Ipv4Addr::from(addr))?
        }
        (SocketOption::ReuseAddress, OptionValue::Flag(on)) => inner.set_reuse_address(on)?,
        (SocketOption::AddMembership, OptionValue::Membership { group, interface }) => {
            inner.join_multicast_v4(&Ipv4Addr::from(group), &Ipv4Addr::from(interface))?
        }
        (SocketOption::DropMembership, OptionValue::Membership { group, interface }) => {
            inner.leave_multicast_v4(&Ipv4Addr::from(group), &Ipv4Addr::from(interface))?
        }
        (SocketOption::KeepAlive, OptionValue::Flag(on)) => inner.set_keepalive(on)?,
        (SocketOption::Broadcast, OptionValue::Flag(on)) => inner.set_broadcast(on)?,
        (SocketOption::Timeout, OptionValue::Millis(ms)) => {
            inner.set_read_timeout(duration(ms))?;
            inner.set_write_timeout(duration(ms))?;
        }
        _ => return Err(NetError::InvalidArgument),
    }
    trace!(handle = socket.raw_fd(), %option, ?value, "option set");
    Ok(())
}

/// Read `option` from `socket`
///
/// Membership options are write-only and report `InvalidArgument`.
pub fn get_option(socket: &Socket, option: SocketOption) -> Result<OptionValue, NetError> {
    let inner = socket.inner();
    let value = match option {
        SocketOption::NoDelay => OptionValue::Flag(inner.nodelay()?),
        SocketOption::Linger => {
            OptionValue::Linger(inner.linger()?.map(|d| d.as_secs().min(u64::from(u32::MAX)) as u32))
        }
        SocketOption::SendBufferSize => OptionValue::Size(to_u32(inner.send_buffer_size()?)),
        SocketOption::ReceiveBufferSize => OptionValue::Size(to_u32(inner.recv_buffer_size()?)),
        SocketOption::Ttl => OptionValue::Size(inner.ttl()?),
        SocketOption::MulticastInterface => OptionValue::Address(u32::from(inner.multicast_if_v4()?)),
        SocketOption::ReuseAddress => OptionValue::Flag(inner.reuse_address()?),
        SocketOption::KeepAlive => OptionValue::Flag(inner.keepalive()?),
        SocketOption::Broadcast => OptionValue::Flag(inner.broadcast()?),
        SocketOption::Timeout => OptionValue::Millis(millis(inner.read_timeout()?)),
        SocketOption::AddMembership | SocketOption::DropMembership => {
            return Err(NetError::InvalidArgument)
        }
    };
    Ok(value)
}
