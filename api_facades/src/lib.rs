//! API Facades Layer
//!
//! Handle-based socket API for the calling layer. Sockets are named by
//! [`SocketHandle`]; addresses are host-order `u32` values and ports `u16`.
//! Connect, accept and receive honour a per-handle timeout set through
//! [`set_option_timeout`] (`0` = block indefinitely).
//!
//! ```no_run
//! use api_facades::*;
//!
//! let handle = open_stream()?;
//! set_option_timeout(handle, 500)?;
//! match connect(handle, 0x7f00_0001, 8080) {
//!     Err(NetError::Timeout) => println!("no answer within 500 ms"),
//!     other => other?,
//! }
//! close(handle)?;
//! # Ok::<(), NetError>(())
//! ```
//!
//! [`NetFacade`] is the same API as an instance with its own registry, for
//! embedding and tests.

pub mod config;
pub mod net_facade;
pub mod socket_facades;

pub use adapters_socket::{OptionValue, ShutdownHow, SocketOption};
pub use config::{NetConfig, TimeoutMode};
pub use entities_net::{NetError, SocketHandle, TimeoutEntry};
pub use infrastructure_socket_registry::{clear_last_error, last_error, LastError};
pub use net_facade::{resolve_host, NetFacade};
pub use socket_facades::*;
