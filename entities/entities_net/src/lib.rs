//! Entities Layer: Network Primitives
//!
//! Plain data types shared by every layer of the socket timeout stack.
//!
//! ## Overview
//!
//! The `entities_net` crate provides:
//! - **[`SocketHandle`]**: the OS descriptor identifying an open socket
//! - **[`AddressEndpoint`]**: an IPv4 address/port pair in host byte order
//! - **[`TimeoutEntry`]**: the per-handle timeout record kept by the registry
//! - **[`Received`]**: the outcome of a read, separating data from orderly shutdown
//! - **[`NetError`]**: the error taxonomy returned by every socket operation
//!
//! ## Usage
//!
//! ```rust
//! use entities_net::{AddressEndpoint, NetError, SocketHandle, TimeoutEntry};
//!
//! let endpoint = AddressEndpoint::new(0x7f00_0001, 8080);
//! assert_eq!(endpoint.to_string(), "127.0.0.1:8080");
//!
//! let entry = TimeoutEntry::new(SocketHandle::new(7));
//! assert_eq!(entry.timeout_ms, 0);
//! assert!(entry.timeout().is_none());
//!
//! assert_eq!(NetError::Timeout.code(), libc::ETIMEDOUT);
//! ```
//!
//! ## See Also
//!
//! - [`infrastructure_socket_registry`](../infrastructure_socket_registry/index.html): registry built on these types
//! - [`adapters_socket`](../adapters_socket/index.html): socket engines returning [`NetError`]

pub mod error;
pub mod handle;

pub use error::{AcceptError, ConnectError, NetError, ReceiveError};
pub use handle::{AddressEndpoint, Received, SocketHandle, TimeoutEntry};
