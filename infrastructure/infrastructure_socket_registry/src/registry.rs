//! Socket Registry
//!
//! Associates each open socket handle with its timeout. Entries are created
//! when a handle is opened or accepted and removed when it is closed; there is
//! at most one entry per handle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use entities_net::{NetError, SocketHandle, TimeoutEntry};
use tracing::{debug, warn};

/// Handle-to-timeout table, guarded by a single mutex
#[derive(Debug, Default)]
pub struct SocketRegistry {
    entries: Mutex<HashMap<SocketHandle, TimeoutEntry>>,
}

impl SocketRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SocketHandle, TimeoutEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a freshly opened or accepted handle with the timeout disabled.
    ///
    /// The OS only hands out a descriptor that is not currently open, so an
    /// existing entry for the same handle is stale: it is reset rather than
    /// duplicated.
    ///
    /// # Errors
    ///
    /// `InsufficientMemory` if the table cannot grow. The caller still owns
    /// the handle and must close it.
    pub fn register(&self, handle: SocketHandle) -> Result<TimeoutEntry, NetError> {
        let mut entries = self.lock();
        let entry = TimeoutEntry::new(handle);

        if let Some(stale) = entries.get_mut(&handle) {
            warn!(handle = handle.raw(), stale_timeout_ms = stale.timeout_ms, "replacing stale registry entry");
            *stale = entry;
            return Ok(entry);
        }

        entries
            .try_reserve(1)
            .map_err(|_| NetError::InsufficientMemory)?;
        entries.insert(handle, entry);
        debug!(handle = handle.raw(), "registered socket");
        Ok(entry)
    }

    /// Look up a handle's entry
    pub fn find(&self, handle: SocketHandle) -> Option<TimeoutEntry> {
        self.lock().get(&handle).copied()
    }

    /// Effective timeout for a handle; an absent entry means disabled
    pub fn timeout_ms(&self, handle: SocketHandle) -> u32 {
        self.find(handle).map(|entry| entry.timeout_ms).unwrap_or(0)
    }

    /// Set the timeout of a registered handle
    ///
    /// # Errors
    ///
    /// `BadFileDescriptor` if the handle has no entry.
    pub fn set_timeout(&self, handle: SocketHandle, timeout_ms: u32) -> Result<(), NetError> {
        let mut entries = self.lock();
        let entry = entries
            .get_mut(&handle)
            .ok_or(NetError::BadFileDescriptor)?;
        entry.timeout_ms = timeout_ms;
        debug!(handle = handle.raw(), timeout_ms, "socket timeout changed");
        Ok(())
    }

    /// Remove a handle's entry; no-op if absent
    pub fn remove(&self, handle: SocketHandle) -> Option<TimeoutEntry> {
        let removed = self.lock().remove(&handle);
        if removed.is_some() {
            debug!(handle = handle.raw(), "unregistered socket");
        }
        removed
    }

    /// Whether the handle has an entry
    pub fn contains(&self, handle: SocketHandle) -> bool {
        self.lock().contains_key(&handle)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True if no handle is registered
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// All entries, ordered by handle
    pub fn snapshot(&self) -> Vec<TimeoutEntry> {
        let mut entries: Vec<TimeoutEntry> = self.lock().values().copied().collect();
        entries.sort_by_key(|entry| entry.handle);
        entries
    }
}

lazy_static::lazy_static! {
    static ref SOCKET_REGISTRY: Arc<SocketRegistry> = Arc::new(SocketRegistry::new());
}

/// The process-wide registry
pub fn global_registry() -> Arc<SocketRegistry> {
    Arc::clone(&SOCKET_REGISTRY)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(raw: i32) -> SocketHandle {
        SocketHandle::new(raw)
    }

    #[test]
    fn test_register_starts_disabled() {
        let registry = SocketRegistry::new();
        let entry = registry.register(handle(5)).unwrap();
        assert_eq!(entry.timeout_ms, 0);
        assert_eq!(registry.find(handle(5)), Some(entry));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_twice_never_duplicates() {
        let registry = SocketRegistry::new();
        registry.register(handle(5)).unwrap();
        registry.set_timeout(handle(5), 300).unwrap();

        let entry = registry.register(handle(5)).unwrap();
        assert_eq!(entry.timeout_ms, 0);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.timeout_ms(handle(5)), 0);
    }

    #[test]
    fn test_find_absent_is_none() {
        let registry = SocketRegistry::new();
        assert_eq!(registry.find(handle(9)), None);
        assert_eq!(registry.timeout_ms(handle(9)), 0);
    }

    #[test]
    fn test_set_timeout_requires_entry() {
        let registry = SocketRegistry::new();
        assert_eq!(registry.set_timeout(handle(1), 10), Err(NetError::BadFileDescriptor));

        registry.register(handle(1)).unwrap();
        registry.set_timeout(handle(1), 10).unwrap();
        assert_eq!(registry.timeout_ms(handle(1)), 10);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = SocketRegistry::new();
        registry.register(handle(2)).unwrap();
        assert!(registry.remove(handle(2)).is_some());
        assert!(registry.remove(handle(2)).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reused_handle_starts_disabled() {
        let registry = SocketRegistry::new();
        registry.register(handle(4)).unwrap();
        registry.set_timeout(handle(4), 1000).unwrap();
        registry.remove(handle(4));

        registry.register(handle(4)).unwrap();
        assert_eq!(registry.timeout_ms(handle(4)), 0);
    }

    #[test]
    fn test_snapshot_is_ordered() {
        let registry = SocketRegistry::new();
        for raw in [12, 3, 7] {
            registry.register(handle(raw)).unwrap();
        }
        let handles: Vec<i32> = registry.snapshot().iter().map(|e| e.handle.raw()).collect();
        assert_eq!(handles, vec![3, 7, 12]);
    }

    #[test]
    fn test_concurrent_registration() {
        use std::thread;

        let registry = Arc::new(SocketRegistry::new());
        let workers: Vec<_> = (0..8)
            .map(|t| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for i in 0..50 {
                        let h = handle(t * 100 + i);
                        registry.register(h).unwrap();
                        registry.set_timeout(h, i as u32).unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(registry.len(), 400);
        assert_eq!(registry.timeout_ms(handle(749)), 49);
    }
}
