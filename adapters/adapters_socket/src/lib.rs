//! Adapters Layer: Sockets with Timeout Emulation
//!
//! Provides IPv4 stream and datagram sockets for the runtime, with connect,
//! accept and receive optionally bounded by a timeout even though the
//! underlying sockets stay in plain blocking mode. This crate implements socket
//! operations using the `socket2` crate and waits for readiness through
//! `adapters_io_polling`.
//!
//! ## Overview
//!
//! The `adapters_socket` crate provides:
//! - **[`socket`](socket/index.html)**: the [`Socket`] wrapper (bind, listen,
//!   send, shutdown, endpoints)
//! - **[`connect`](connect/index.html)**: connection establishment, bounded
//!   through non-blocking mode plus a writability wait
//! - **[`accept`](accept/index.html)**: connection acceptance gated on readability
//! - **[`receive`](receive/index.html)**: stream and datagram reads gated on readability
//! - **[`options`](options/index.html)**: get/set of the standard socket options
//! - **[`blocking`](blocking/index.html)**: scoped non-blocking mode with guaranteed restore
//!
//! Engines take the timeout as an argument (`0` = block indefinitely); where
//! the value comes from is up to the caller.
//!
//! ## See Also
//!
//! - [`adapters_io_polling`](../adapters_io_polling/index.html): readiness waits
//! - [`entities_net`](../entities_net/index.html): handles, endpoints and errors

pub mod accept;
pub mod blocking;
pub mod connect;
pub mod options;
pub mod receive;
pub mod socket;

pub use accept::accept;
pub use blocking::{is_nonblocking, NonBlockingGuard};
pub use connect::connect;
pub use options::{get_option, set_option, OptionValue, SocketOption};
pub use receive::{receive, receive_from};
pub use socket::{ShutdownHow, Socket, SocketType};
