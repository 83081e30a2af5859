//! Socket Facades
//!
//! Free functions over the process-wide [`NetFacade`]. This is the surface the
//! calling layer binds to: plain handles, host-order `u32` addresses and
//! `u16` ports, typed results.

use adapters_socket::{OptionValue, ShutdownHow, SocketOption};
use entities_net::{NetError, SocketHandle, TimeoutEntry};

use crate::net_facade::NetFacade;

lazy_static::lazy_static! {
    static ref NET: NetFacade = NetFacade::global();
}

/// The process-wide facade
pub fn net() -> &'static NetFacade {
    &NET
}

pub fn open_stream() -> Result<SocketHandle, NetError> {
    NET.open_stream()
}

pub fn open_datagram() -> Result<SocketHandle, NetError> {
    NET.open_datagram()
}

pub fn close(handle: SocketHandle) -> Result<(), NetError> {
    NET.close(handle)
}

pub fn connect(handle: SocketHandle, address: u32, port: u16) -> Result<(), NetError> {
    NET.connect(handle, address, port)
}

pub fn bind(handle: SocketHandle, address: u32, port: u16) -> Result<(), NetError> {
    NET.bind(handle, address, port)
}

pub fn listen(handle: SocketHandle, backlog: i32) -> Result<(), NetError> {
    NET.listen(handle, backlog)
}

pub fn accept(handle: SocketHandle) -> Result<SocketHandle, NetError> {
    NET.accept(handle)
}

pub fn get_local_info(handle: SocketHandle) -> Result<(u32, u16), NetError> {
    NET.get_local_info(handle)
}

pub fn get_remote_info(handle: SocketHandle) -> Result<(u32, u16), NetError> {
    NET.get_remote_info(handle)
}

pub fn receive_available(handle: SocketHandle) -> Result<usize, NetError> {
    NET.receive_available(handle)
}

/// `Ok(0)` on a stream means orderly shutdown
pub fn receive(handle: SocketHandle, buf: &mut [u8]) -> Result<usize, NetError> {
    NET.receive(handle, buf)
}

pub fn receive_from(handle: SocketHandle, buf: &mut [u8]) -> Result<(usize, u32, u16), NetError> {
    NET.receive_from(handle, buf)
}

pub fn send(handle: SocketHandle, buf: &[u8]) -> Result<usize, NetError> {
    NET.send(handle, buf)
}

pub fn send_to(handle: SocketHandle, buf: &[u8], address: u32, port: u16) -> Result<usize, NetError> {
    NET.send_to(handle, buf, address, port)
}

pub fn shutdown(handle: SocketHandle, how: ShutdownHow) -> Result<(), NetError> {
    NET.shutdown(handle, how)
}

pub fn registry_snapshot() -> Vec<TimeoutEntry> {
    NET.registry_snapshot()
}

pub fn set_option_timeout(handle: SocketHandle, timeout_ms: u32) -> Result<(), NetError> {
    NET.set_option_timeout(handle, timeout_ms)
}

pub fn get_option_timeout(handle: SocketHandle) -> Result<u32, NetError> {
    NET.get_option_timeout(handle)
}

fn get_flag(handle: SocketHandle, option: SocketOption) -> Result<bool, NetError> {
    match NET.get_option(handle, option)? {
        OptionValue::Flag(on) => Ok(on),
        _ => Err(NetError::InvalidArgument),
    }
}

fn get_size(handle: SocketHandle, option: SocketOption) -> Result<u32, NetError> {
    match NET.get_option(handle, option)? {
        OptionValue::Size(n) => Ok(n),
        _ => Err(NetError::InvalidArgument),
    }
}

pub fn set_option_tcp_nodelay(handle: SocketHandle, on: bool) -> Result<(), NetError> {
    NET.set_option(handle, SocketOption::NoDelay, OptionValue::Flag(on))
}

pub fn get_option_tcp_nodelay(handle: SocketHandle) -> Result<bool, NetError> {
    get_flag(handle, SocketOption::NoDelay)
}

/// Linger time in seconds, `None` disables lingering
pub fn set_option_linger(handle: SocketHandle, seconds: Option<u32>) -> Result<(), NetError> {
    NET.set_option(handle, SocketOption::Linger, OptionValue::Linger(seconds))
}

pub fn get_option_linger(handle: SocketHandle) -> Result<Option<u32>, NetError> {
    match NET.get_option(handle, SocketOption::Linger)? {
        OptionValue::Linger(seconds) => Ok(seconds),
        _ => Err(NetError::InvalidArgument),
    }
}

pub fn set_option_sndbuf(handle: SocketHandle, bytes: u32) -> Result<(), NetError> {
    NET.set_option(handle, SocketOption::SendBufferSize, OptionValue::Size(bytes))
}

pub fn get_option_sndbuf(handle: SocketHandle) -> Result<u32, NetError> {
    get_size(handle, SocketOption::SendBufferSize)
}

pub fn set_option_rcvbuf(handle: SocketHandle, bytes: u32) -> Result<(), NetError> {
    NET.set_option(handle, SocketOption::ReceiveBufferSize, OptionValue::Size(bytes))
}

pub fn get_option_rcvbuf(handle: SocketHandle) -> Result<u32, NetError> {
    get_size(handle, SocketOption::ReceiveBufferSize)
}

pub fn set_option_ip_ttl(handle: SocketHandle, ttl: u32) -> Result<(), NetError> {
    NET.set_option(handle, SocketOption::Ttl, OptionValue::Size(ttl))
}

pub fn get_option_ip_ttl(handle: SocketHandle) -> Result<u32, NetError> {
    get_size(handle, SocketOption::Ttl)
}

pub fn set_option_ip_multicast_if(handle: SocketHandle, interface: u32) -> Result<(), NetError> {
    NET.set_option(handle, SocketOption::MulticastInterface, OptionValue::Address(interface))
}

pub fn get_option_ip_multicast_if(handle: SocketHandle) -> Result<u32, NetError> {
    match NET.get_option(handle, SocketOption::MulticastInterface)? {
        OptionValue::Address(interface) => Ok(interface),
        _ => Err(NetError::InvalidArgument),
    }
}

pub fn set_option_reuseaddr(handle: SocketHandle, on: bool) -> Result<(), NetError> {
    NET.set_option(handle, SocketOption::ReuseAddress, OptionValue::Flag(on))
}

pub fn get_option_reuseaddr(handle: SocketHandle) -> Result<bool, NetError> {
    get_flag(handle, SocketOption::ReuseAddress)
}

/// Join multicast `group` on the local `interface`
pub fn set_option_add_membership(handle: SocketHandle, group: u32, interface: u32) -> Result<(), NetError> {
    NET.set_option(
        handle,
        SocketOption::AddMembership,
        OptionValue::Membership { group, interface },
    )
}

/// Leave multicast `group` on the local `interface`
pub fn set_option_drop_membership(handle: SocketHandle, group: u32, interface: u32) -> Result<(), NetError> {
    NET.set_option(
        handle,
        SocketOption::DropMembership,
        OptionValue::Membership { group, interface },
    )
}

pub fn set_option_keepalive(handle: SocketHandle, on: bool) -> Result<(), NetError> {
    NET.set_option(handle, SocketOption::KeepAlive, OptionValue::Flag(on))
}

pub fn get_option_keepalive(handle: SocketHandle) -> Result<bool, NetError> {
    get_flag(handle, SocketOption::KeepAlive)
}

pub fn set_option_broadcast(handle: SocketHandle, on: bool) -> Result<(), NetError> {
    NET.set_option(handle, SocketOption::Broadcast, OptionValue::Flag(on))
}

pub fn get_option_broadcast(handle: SocketHandle) -> Result<bool, NetError> {
    get_flag(handle, SocketOption::Broadcast)
}
