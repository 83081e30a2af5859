//! Infrastructure Layer: Socket Registry
//!
//! Shared state of the socket timeout layer:
//!
//! - **[`registry`]**: maps each open handle to its configured timeout. Every
//!   bounded connect/accept/receive consults it before touching the socket.
//! - **[`last_error`]**: the out-of-band error slot read by callers whose
//!   calling convention cannot carry a typed error.
//!
//! Both are available as process-wide instances ([`global_registry`],
//! [`global_error_slot`]) and as plain values for isolated use.

pub mod last_error;
pub mod registry;

pub use last_error::{
    clear_errno, clear_last_error, global_error_slot, last_error, set_last_error, ErrorSlot, LastError,
};
pub use registry::{global_registry, SocketRegistry};
