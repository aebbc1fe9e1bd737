//! Single-slot, last-write-wins snapshot store.
//!
//! A request clears the slot and records its correlation key. The response,
//! arriving later on the stack thread, overwrites the slot wholesale. Readers
//! see either nothing or the latest answer.

use crate::error::{BridgeError, Result};
use log::trace;
use parking_lot::Mutex;

struct Slot<T> {
    /// Key of the most recent request (usually the target short address).
    request_addr: Option<u16>,
    value: Option<T>,
}

pub struct SnapshotStore<T> {
    kind: &'static str,
    slot: Mutex<Slot<T>>,
}

impl<T: Clone> SnapshotStore<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            slot: Mutex::new(Slot {
                request_addr: None,
                value: None,
            }),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn clear(&self) {
        let mut slot = self.slot.lock();
        slot.request_addr = None;
        slot.value = None;
    }

    /// Invalidate the current answer ahead of a new request to `addr`.
    pub fn begin_request(&self, addr: u16) {
        let mut slot = self.slot.lock();
        slot.request_addr = Some(addr);
        slot.value = None;
        trace!("[ZDO] {} request to 0x{addr:04X}", self.kind);
    }

    /// Store a response. `build` receives the key of the last request so
    /// responses without an address can be correlated.
    pub fn store_with(&self, build: impl FnOnce(Option<u16>) -> T) {
        let mut slot = self.slot.lock();
        let value = build(slot.request_addr);
        slot.value = Some(value);
    }

    pub fn store(&self, value: T) {
        self.slot.lock().value = Some(value);
    }

    pub fn is_valid(&self) -> bool {
        self.slot.lock().value.is_some()
    }

    pub fn get(&self) -> Result<T> {
        self.slot
            .lock()
            .value
            .clone()
            .ok_or_else(|| BridgeError::not_found(format!("no {} response yet", self.kind)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_not_found() {
        let store: SnapshotStore<u8> = SnapshotStore::new("test");
        assert!(matches!(store.get(), Err(BridgeError::NotFound(_))));
    }

    #[test]
    fn test_request_clears_previous_answer() {
        let store = SnapshotStore::new("test");
        store.store(1u8);
        assert_eq!(store.get().unwrap(), 1);
        store.begin_request(0x1234);
        assert!(!store.is_valid());
        store.store(2);
        assert_eq!(store.get().unwrap(), 2);
    }

    #[test]
    fn test_store_with_sees_request_addr() {
        let store = SnapshotStore::new("test");
        store.begin_request(0x2222);
        store.store_with(|addr| addr.unwrap_or_default());
        assert_eq!(store.get().unwrap(), 0x2222);
        store.clear();
        store.store_with(|addr| addr.unwrap_or_default());
        assert_eq!(store.get().unwrap(), 0);
    }
}
