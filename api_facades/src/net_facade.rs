//! Socket Facade
//!
//! Handle-based socket API. A [`NetFacade`] owns the open sockets, the
//! timeout registry, the readiness poller and the last-error slot; every
//! operation resolves the handle, looks up the handle's timeout and hands
//! both to the matching engine.
//!
//! Handles are the sockets' descriptors. Closing a handle removes its
//! registry entry, so a descriptor reused by a later open starts with the
//! timeout disabled.

use std::collections::HashMap;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use adapters_io_polling::{bytes_available_probe, poller_for, BytesAvailable, ReadinessPoller};
use adapters_socket::{self as engines, OptionValue, ShutdownHow, Socket, SocketOption, SocketType};
use entities_net::{AddressEndpoint, NetError, SocketHandle, TimeoutEntry};
use infrastructure_socket_registry::{
    clear_errno, global_error_slot, global_registry, ErrorSlot, LastError, SocketRegistry,
};
use tracing::{debug, warn};

use crate::config::{NetConfig, TimeoutMode};

/// Socket facade
pub struct NetFacade {
    config: NetConfig,
    registry: Arc<SocketRegistry>,
    sockets: Mutex<HashMap<SocketHandle, Arc<Socket>>>,
    poller: Box<dyn ReadinessPoller>,
    probe: &'static dyn BytesAvailable,
    errors: Arc<ErrorSlot>,
}

impl NetFacade {
    /// Facade with its own registry and error slot
    pub fn new(config: NetConfig) -> Self {
        let poller = poller_for(config.poller);
        Self::with_parts(
            config,
            Arc::new(SocketRegistry::new()),
            Arc::new(ErrorSlot::new()),
            poller,
        )
    }

    /// Facade over the process-wide registry and error slot, configured
    /// from the environment
    pub(crate) fn global() -> Self {
        let config = NetConfig::from_env();
        let poller = poller_for(config.poller);
        Self::with_parts(config, global_registry(), global_error_slot(), poller)
    }

    /// Facade assembled from explicit parts
    pub fn with_parts(
        config: NetConfig,
        registry: Arc<SocketRegistry>,
        errors: Arc<ErrorSlot>,
        poller: Box<dyn ReadinessPoller>,
    ) -> Self {
        let probe = bytes_available_probe();
        debug!(
            poller = poller.name(),
            probe = probe.name(),
            timeout_mode = %config.timeout_mode,
            "socket facade ready"
        );
        Self {
            config,
            registry,
            sockets: Mutex::new(HashMap::new()),
            poller,
            probe,
            errors,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    fn sockets(&self) -> MutexGuard<'_, HashMap<SocketHandle, Arc<Socket>>> {
        self.sockets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Emulated failures leave no trace in `errno`, so they go to the slot.
    fn track<T>(&self, result: Result<T, NetError>) -> Result<T, NetError> {
        if let Err(err) = &result {
            if err.is_emulated() {
                self.errors.record(err);
                clear_errno();
            }
        }
        result
    }

    fn socket(&self, handle: SocketHandle) -> Result<Arc<Socket>, NetError> {
        self.sockets()
            .get(&handle)
            .cloned()
            .ok_or(NetError::BadFileDescriptor)
    }

    /// Timeout handed to the engines; native mode leaves bounding to the OS
    fn engine_timeout(&self, handle: SocketHandle) -> u32 {
        match self.config.timeout_mode {
            TimeoutMode::Emulated => self.registry.timeout_ms(handle),
            TimeoutMode::Native => 0,
        }
    }

    fn adopt(&self, socket: Socket) -> Result<SocketHandle, NetError> {
        let handle = socket.handle();
        // on failure the socket is dropped and its descriptor closed
        self.registry.register(handle)?;
        self.sockets().insert(handle, Arc::new(socket));
        debug!(handle = handle.raw(), "handle registered");
        Ok(handle)
    }

    fn open(&self, socket_type: SocketType) -> Result<SocketHandle, NetError> {
        let result = Socket::new(socket_type).and_then(|socket| self.adopt(socket));
        self.track(result)
    }

    /// Open a stream (TCP) socket
    pub fn open_stream(&self) -> Result<SocketHandle, NetError> {
        self.open(SocketType::Stream)
    }

    /// Open a datagram (UDP) socket
    pub fn open_datagram(&self) -> Result<SocketHandle, NetError> {
        self.open(SocketType::Datagram)
    }

    /// Close `handle` and drop its timeout entry
    ///
    /// The descriptor is released once no operation on another thread still
    /// holds the socket.
    pub fn close(&self, handle: SocketHandle) -> Result<(), NetError> {
        let socket = self.sockets().remove(&handle).ok_or(NetError::BadFileDescriptor)?;
        if self.registry.remove(handle).is_none() {
            warn!(handle = handle.raw(), "open handle had no registry entry");
        }
        drop(socket);
        debug!(handle = handle.raw(), "handle closed");
        Ok(())
    }

    /// Connect to `address:port`, bounded by the handle's timeout
    pub fn connect(&self, handle: SocketHandle, address: u32, port: u16) -> Result<(), NetError> {
        let result = self.socket(handle).and_then(|socket| {
            engines::connect(
                &socket,
                AddressEndpoint::new(address, port),
                self.engine_timeout(handle),
                self.poller.as_ref(),
            )
        });
        self.track(result)
    }

    /// Bind to `address:port`
    pub fn bind(&self, handle: SocketHandle, address: u32, port: u16) -> Result<(), NetError> {
        self.socket(handle)?.bind(AddressEndpoint::new(address, port))
    }

    /// Start listening; a non-positive backlog uses the configured default
    pub fn listen(&self, handle: SocketHandle, backlog: i32) -> Result<(), NetError> {
        self.socket(handle)?.listen(self.config.effective_backlog(backlog))
    }

    /// Accept a connection, bounded by the listener's timeout
    ///
    /// The new handle is registered with its timeout disabled.
    pub fn accept(&self, handle: SocketHandle) -> Result<SocketHandle, NetError> {
        let result = self.socket(handle).and_then(|listener| {
            let (accepted, _) =
                engines::accept(&listener, self.engine_timeout(handle), self.poller.as_ref())?;
            if self.config.timeout_mode == TimeoutMode::Native {
                // the kernel copies the listener's SO_RCVTIMEO/SO_SNDTIMEO
                engines::set_option(&accepted, SocketOption::Timeout, OptionValue::Millis(0))?;
            }
            self.adopt(accepted)
        });
        self.track(result)
    }

    /// Local address and port, host byte order
    pub fn get_local_info(&self, handle: SocketHandle) -> Result<(u32, u16), NetError> {
        let endpoint = self.socket(handle)?.local_endpoint()?;
        Ok((endpoint.address, endpoint.port))
    }

    /// Peer address and port, host byte order
    pub fn get_remote_info(&self, handle: SocketHandle) -> Result<(u32, u16), NetError> {
        let endpoint = self.socket(handle)?.peer_endpoint()?;
        Ok((endpoint.address, endpoint.port))
    }

    /// Bytes readable without blocking
    pub fn receive_available(&self, handle: SocketHandle) -> Result<usize, NetError> {
        let socket = self.socket(handle)?;
        Ok(self.probe.available(socket.raw_fd())?)
    }

    /// Read into `buf`, bounded by the handle's timeout
    ///
    /// `Ok(0)` on a stream means the peer shut down its sending side.
    pub fn receive(&self, handle: SocketHandle, buf: &mut [u8]) -> Result<usize, NetError> {
        let result = self.socket(handle).and_then(|socket| {
            engines::receive(&socket, buf, self.engine_timeout(handle), self.poller.as_ref())
        });
        self.track(result).map(|received| received.len())
    }

    /// Read into `buf` and report the sender's address and port
    pub fn receive_from(
        &self,
        handle: SocketHandle,
        buf: &mut [u8],
    ) -> Result<(usize, u32, u16), NetError> {
        let result = self.socket(handle).and_then(|socket| {
            engines::receive_from(&socket, buf, self.engine_timeout(handle), self.poller.as_ref())
        });
        self.track(result)
            .map(|(received, from)| (received.len(), from.address, from.port))
    }

    /// Send on a connected socket
    pub fn send(&self, handle: SocketHandle, buf: &[u8]) -> Result<usize, NetError> {
        self.socket(handle)?.send(buf)
    }

    /// Send a datagram to `address:port`
    pub fn send_to(
        &self,
        handle: SocketHandle,
        buf: &[u8],
        address: u32,
        port: u16,
    ) -> Result<usize, NetError> {
        self.socket(handle)?
            .send_to(buf, AddressEndpoint::new(address, port))
    }

    /// Half- or fully close the connection without releasing the handle
    pub fn shutdown(&self, handle: SocketHandle, how: ShutdownHow) -> Result<(), NetError> {
        self.socket(handle)?.shutdown(how)
    }

    /// Set the connect/accept/receive timeout, 0 disables it
    pub fn set_option_timeout(&self, handle: SocketHandle, timeout_ms: u32) -> Result<(), NetError> {
        let socket = self.socket(handle)?;
        if self.config.timeout_mode == TimeoutMode::Native {
            engines::set_option(&socket, SocketOption::Timeout, OptionValue::Millis(timeout_ms))?;
        }
        self.registry.set_timeout(handle, timeout_ms)?;
        debug!(handle = handle.raw(), timeout_ms, "timeout set");
        Ok(())
    }

    /// Current timeout in milliseconds, 0 = disabled
    ///
    /// Reported from the registry in both modes; the kernel rounds native
    /// timeouts to its timer tick.
    pub fn get_option_timeout(&self, handle: SocketHandle) -> Result<u32, NetError> {
        self.socket(handle)?;
        Ok(self.registry.timeout_ms(handle))
    }

    /// Set a socket option
    ///
    /// [`SocketOption::Timeout`] takes [`OptionValue::Millis`] and follows
    /// the configured timeout mode.
    pub fn set_option(
        &self,
        handle: SocketHandle,
        option: SocketOption,
        value: OptionValue,
    ) -> Result<(), NetError> {
        match (option, value) {
            (SocketOption::Timeout, OptionValue::Millis(ms)) => self.set_option_timeout(handle, ms),
            (SocketOption::Timeout, _) => Err(NetError::InvalidArgument),
            _ => engines::set_option(&*self.socket(handle)?, option, value),
        }
    }

    /// Read a socket option
    pub fn get_option(&self, handle: SocketHandle, option: SocketOption) -> Result<OptionValue, NetError> {
        match option {
            SocketOption::Timeout => self.get_option_timeout(handle).map(OptionValue::Millis),
            _ => engines::get_option(&*self.socket(handle)?, option),
        }
    }

    /// Registry contents ordered by handle
    pub fn registry_snapshot(&self) -> Vec<TimeoutEntry> {
        self.registry.snapshot()
    }

    /// Most recent emulated failure recorded by this facade
    pub fn last_error(&self) -> Option<LastError> {
        self.errors.get()
    }

    /// Number of open handles
    pub fn open_handles(&self) -> usize {
        self.sockets().len()
    }
}

/// Resolve `name` through the platform resolver, IPv4 results only
///
/// Addresses are returned in host byte order, without duplicates, in
/// resolver order.
pub fn resolve_host(name: &str) -> Result<Vec<u32>, NetError> {
    let mut addresses = Vec::new();
    for addr in (name, 0u16).to_socket_addrs()? {
        if let SocketAddr::V4(v4) = addr {
            let address = u32::from(*v4.ip());
            if !addresses.contains(&address) {
                addresses.push(address);
            }
        }
    }
    if addresses.is_empty() {
        return Err(NetError::Unknown(format!("no IPv4 address for {}", name)));
    }
    Ok(addresses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use adapters_io_polling::{Interest, Readiness};
    use mockall::mock;
    use std::io;
    use std::net::Ipv4Addr;
    use std::os::unix::io::RawFd;
    use std::time::Duration;

    mock! {
        pub Poller {}

        impl ReadinessPoller for Poller {
            fn wait(&self, fd: RawFd, interest: Interest, timeout: Duration) -> io::Result<Readiness>;
            fn name(&self) -> &'static str;
        }
    }

    const LOCALHOST: u32 = 0x7f00_0001;

    fn facade() -> NetFacade {
        NetFacade::new(NetConfig::default())
    }

    fn mocked(poller: MockPoller) -> NetFacade {
        NetFacade::with_parts(
            NetConfig::default(),
            Arc::new(SocketRegistry::new()),
            Arc::new(ErrorSlot::new()),
            Box::new(poller),
        )
    }

    #[test]
    fn test_open_registers_with_timeout_disabled() {
        let net = facade();
        let handle = net.open_stream().unwrap();

        assert_eq!(net.registry_snapshot(), vec![TimeoutEntry::new(handle)]);
        assert_eq!(net.get_option_timeout(handle).unwrap(), 0);
        assert_eq!(net.open_handles(), 1);
    }

    #[test]
    fn test_close_removes_registry_entry() {
        let net = facade();
        let handle = net.open_datagram().unwrap();
        net.set_option_timeout(handle, 250).unwrap();

        net.close(handle).unwrap();

        assert!(net.registry_snapshot().is_empty());
        assert_eq!(net.close(handle), Err(NetError::BadFileDescriptor));
        assert_eq!(net.get_option_timeout(handle), Err(NetError::BadFileDescriptor));
    }

    #[test]
    fn test_unknown_handle() {
        let net = facade();
        let bogus = SocketHandle::new(-7);
        assert_eq!(net.connect(bogus, LOCALHOST, 1), Err(NetError::BadFileDescriptor));
        assert_eq!(net.send(bogus, b"x"), Err(NetError::BadFileDescriptor));
        assert_eq!(net.set_option_timeout(bogus, 10), Err(NetError::BadFileDescriptor));
    }

    #[test]
    fn test_accept_timeout_is_recorded() {
        let mut poller = MockPoller::new();
        poller.expect_name().return_const("mock");
        poller
            .expect_wait()
            .withf(|_, interest, timeout| {
                *interest == Interest::Readable && *timeout == Duration::from_millis(50)
            })
            .times(1)
            .returning(|_, _, _| Ok(Readiness::TimedOut));
        let net = mocked(poller);

        let listener = net.open_stream().unwrap();
        net.bind(listener, LOCALHOST, 0).unwrap();
        net.listen(listener, 0).unwrap();
        net.set_option_timeout(listener, 50).unwrap();

        assert_eq!(net.accept(listener), Err(NetError::Timeout));
        assert_eq!(net.open_handles(), 1);
        assert_eq!(net.last_error().map(|e| e.code), Some(NetError::Timeout.code()));
    }

    #[test]
    fn test_os_failures_are_not_recorded() {
        let net = facade();
        let handle = net.open_stream().unwrap();
        assert_eq!(net.get_remote_info(handle), Err(NetError::NotConnected));
        assert_eq!(net.last_error(), None);
    }

    #[test]
    fn test_stream_session() {
        let net = facade();
        let listener = net.open_stream().unwrap();
        net.bind(listener, LOCALHOST, 0).unwrap();
        net.listen(listener, 4).unwrap();
        let (_, port) = net.get_local_info(listener).unwrap();

        let client = net.open_stream().unwrap();
        net.set_option_timeout(client, 1000).unwrap();
        net.connect(client, LOCALHOST, port).unwrap();

        net.set_option_timeout(listener, 1000).unwrap();
        let server = net.accept(listener).unwrap();
        assert_eq!(net.get_option_timeout(server).unwrap(), 0);
        assert_eq!(net.get_remote_info(server).unwrap(), net.get_local_info(client).unwrap());

        assert_eq!(net.send(client, b"ping").unwrap(), 4);
        let mut buf = [0u8; 4];
        net.set_option_timeout(server, 1000).unwrap();
        assert_eq!(net.receive(server, &mut buf).unwrap(), 4);
        assert_eq!(&buf, b"ping");

        net.shutdown(client, ShutdownHow::Write).unwrap();
        assert_eq!(net.receive(server, &mut buf).unwrap(), 0);

        for handle in [client, server, listener] {
            net.close(handle).unwrap();
        }
        assert!(net.registry_snapshot().is_empty());
    }

    #[test]
    fn test_receive_available() {
        let net = facade();
        let receiver = net.open_datagram().unwrap();
        net.bind(receiver, LOCALHOST, 0).unwrap();
        let (_, port) = net.get_local_info(receiver).unwrap();
        let sender = net.open_datagram().unwrap();

        assert_eq!(net.receive_available(receiver).unwrap(), 0);
        net.send_to(sender, b"abc", LOCALHOST, port).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(1);
        let mut available = 0;
        while available == 0 && std::time::Instant::now() < deadline {
            available = net.receive_available(receiver).unwrap();
        }
        assert_eq!(available, 3);
    }

    #[test]
    fn test_timeout_option_routing() {
        let net = facade();
        let handle = net.open_stream().unwrap();

        net.set_option(handle, SocketOption::Timeout, OptionValue::Millis(75)).unwrap();
        assert_eq!(net.get_option(handle, SocketOption::Timeout).unwrap(), OptionValue::Millis(75));
        assert_eq!(
            net.set_option(handle, SocketOption::Timeout, OptionValue::Flag(true)),
            Err(NetError::InvalidArgument)
        );

        // emulated mode leaves the native option alone
        let socket = net.socket(handle).unwrap();
        assert_eq!(socket.inner().read_timeout().unwrap(), None);
    }

    #[test]
    fn test_native_mode_passes_timeout_through() {
        let config = NetConfig {
            timeout_mode: TimeoutMode::Native,
            ..NetConfig::default()
        };
        let net = NetFacade::new(config);
        let handle = net.open_stream().unwrap();

        net.set_option_timeout(handle, 150).unwrap();
        assert_eq!(net.get_option_timeout(handle).unwrap(), 150);
        assert_eq!(net.get_option(handle, SocketOption::Timeout).unwrap(), OptionValue::Millis(150));
        assert_eq!(net.engine_timeout(handle), 0);

        let socket = net.socket(handle).unwrap();
        assert!(socket.inner().read_timeout().unwrap().is_some());
    }

    #[test]
    fn test_native_mode_accepted_handle_starts_disabled() {
        let config = NetConfig {
            timeout_mode: TimeoutMode::Native,
            ..NetConfig::default()
        };
        let net = NetFacade::new(config);
        let listener = net.open_stream().unwrap();
        net.bind(listener, LOCALHOST, 0).unwrap();
        net.listen(listener, 4).unwrap();
        net.set_option_timeout(listener, 150).unwrap();
        let (_, port) = net.get_local_info(listener).unwrap();

        let client = net.open_stream().unwrap();
        net.connect(client, LOCALHOST, port).unwrap();
        let accepted = net.accept(listener).unwrap();

        assert_eq!(net.get_option_timeout(accepted).unwrap(), 0);
        let socket = net.socket(accepted).unwrap();
        assert_eq!(socket.inner().read_timeout().unwrap(), None);
        assert_eq!(socket.inner().write_timeout().unwrap(), None);
    }

    #[test]
    fn test_option_pass_through() {
        let net = facade();
        let handle = net.open_stream().unwrap();
        net.set_option(handle, SocketOption::NoDelay, OptionValue::Flag(true)).unwrap();
        assert_eq!(net.get_option(handle, SocketOption::NoDelay).unwrap(), OptionValue::Flag(true));
        assert_eq!(
            net.get_option(SocketHandle::new(-9), SocketOption::NoDelay),
            Err(NetError::BadFileDescriptor)
        );
    }

    #[test]
    fn test_resolve_localhost() {
        let addresses = resolve_host("127.0.0.1").unwrap();
        assert_eq!(addresses, vec![u32::from(Ipv4Addr::LOCALHOST)]);
    }
}
