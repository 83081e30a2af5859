//! Adapters Layer: I/O Readiness Polling
//!
//! Blocks the calling thread until a socket is readable or writable, or a
//! deadline passes. Every timeout-bounded socket operation goes through here
//! before issuing its syscall.
//!
//! ## Overview
//!
//! The `adapters_io_polling` crate provides:
//! - **[`poller`](poller/index.html)**: the [`ReadinessPoller`] trait with a
//!   `poll(2)` implementation ([`PollPoller`]) and a `select(2)` implementation
//!   ([`SelectPoller`]) whose deadline is expressed as seconds + microseconds
//! - **[`available`](available/index.html)**: the [`BytesAvailable`] probe used by
//!   `receive_available`, with an `FIONREAD` tier and a `MSG_PEEK` fallback
//!   chosen once per process
//!
//! Interrupted waits are retried with the remaining time recomputed, so a
//! signal never shortens or extends the caller's deadline.
//!
//! ## See Also
//!
//! - [`adapters_socket`](../adapters_socket/index.html): engines that drive the poller

pub mod available;
pub mod poller;

pub use available::{bytes_available_probe, detect_bytes_available, BytesAvailable, FionreadProbe, PeekProbe};
pub use poller::{poller_for, Interest, PollPoller, PollerKind, Readiness, ReadinessPoller, SelectPoller};
