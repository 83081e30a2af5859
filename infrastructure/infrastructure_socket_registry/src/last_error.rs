//! Last Error Slot
//!
//! Out-of-band error channel for callers that only see a failure flag. The
//! slot is written only for conditions this layer manufactures itself
//! (timeouts, allocation failure); failed syscalls already leave their cause
//! in `errno`, which [`ErrorSlot::resolve`] prefers when it is non-zero.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use entities_net::NetError;
use tracing::trace;

/// Code and message of the most recent emulated failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastError {
    /// errno-style code
    pub code: i32,
    /// Human-readable description
    pub message: String,
}

/// Mutex-guarded last-error storage
#[derive(Debug, Default)]
pub struct ErrorSlot {
    slot: Mutex<Option<LastError>>,
}

impl ErrorSlot {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<LastError>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Overwrite the slot
    pub fn set(&self, code: i32, message: impl Into<String>) {
        let message = message.into();
        trace!(code, %message, "last error set");
        *self.lock() = Some(LastError { code, message });
    }

    /// Store an error value
    pub fn record(&self, err: &NetError) {
        self.set(err.code(), err.to_string());
    }

    /// Current slot contents
    pub fn get(&self) -> Option<LastError> {
        self.lock().clone()
    }

    /// Empty the slot
    pub fn clear(&self) {
        *self.lock() = None;
    }

    /// Resolve the error to report: the ambient `errno` if non-zero,
    /// otherwise the slot, otherwise `(0, "success")`.
    pub fn resolve(&self, ambient: i32) -> (i32, String) {
        if ambient != 0 {
            return (ambient, std::io::Error::from_raw_os_error(ambient).to_string());
        }
        match self.get() {
            Some(LastError { code, message }) => (code, message),
            None => (0, "success".to_string()),
        }
    }
}

lazy_static::lazy_static! {
    static ref LAST_ERROR: Arc<ErrorSlot> = Arc::new(ErrorSlot::new());
}

/// The process-wide slot
pub fn global_error_slot() -> Arc<ErrorSlot> {
    Arc::clone(&LAST_ERROR)
}

#[cfg(unix)]
fn ambient_errno() -> i32 {
    nix::errno::Errno::last() as i32
}

#[cfg(not(unix))]
fn ambient_errno() -> i32 {
    0
}

/// Reset the calling thread's `errno` to 0
#[cfg(unix)]
pub fn clear_errno() {
    nix::errno::Errno::clear();
}

/// Reset the calling thread's `errno` to 0
#[cfg(not(unix))]
pub fn clear_errno() {}

/// Overwrite the process-wide slot.
///
/// The calling thread's `errno` is cleared so the slot is what
/// [`last_error`] reports next.
pub fn set_last_error(code: i32, message: impl Into<String>) {
    LAST_ERROR.set(code, message);
    clear_errno();
}

/// Report the most recent error: `errno` if set, else the process-wide slot
pub fn last_error() -> (i32, String) {
    LAST_ERROR.resolve(ambient_errno())
}

/// Empty the process-wide slot and the calling thread's `errno`
pub fn clear_last_error() {
    LAST_ERROR.clear();
    clear_errno();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_slot_reports_success() {
        let slot = ErrorSlot::new();
        assert_eq!(slot.get(), None);
        assert_eq!(slot.resolve(0), (0, "success".to_string()));
    }

    #[test]
    fn test_set_overwrites() {
        let slot = ErrorSlot::new();
        slot.set(1, "first");
        slot.set(2, "second");
        assert_eq!(
            slot.get(),
            Some(LastError {
                code: 2,
                message: "second".to_string()
            })
        );
    }

    #[test]
    fn test_record_timeout() {
        let slot = ErrorSlot::new();
        slot.record(&NetError::Timeout);
        let (code, message) = slot.resolve(0);
        assert_eq!(code, NetError::Timeout.code());
        assert_eq!(message, "operation timed out");
    }

    #[test]
    fn test_ambient_errno_wins() {
        let slot = ErrorSlot::new();
        slot.record(&NetError::Timeout);
        let (code, message) = slot.resolve(NetError::ConnectionRefused.code());
        assert_eq!(code, NetError::ConnectionRefused.code());
        assert!(!message.is_empty());
    }

    #[test]
    fn test_clear() {
        let slot = ErrorSlot::new();
        slot.record(&NetError::InsufficientMemory);
        slot.clear();
        assert_eq!(slot.get(), None);
    }
}
