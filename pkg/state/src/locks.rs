use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slot = Arc<AsyncMutex<()>>;

/// Per-key exclusive guards.
///
/// A key's slot lives in the map only while a guard or a waiter references it,
/// so guards on different keys never contend and the map does not grow with
/// the keyspace.
#[derive(Clone, Default)]
pub struct KeyLocks {
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

/// Exclusive hold on one key; released on drop.
pub struct KeyGuard {
    key: String,
    slots: Arc<Mutex<HashMap<String, Slot>>>,
    slot: Slot,
    _held: OwnedMutexGuard<()>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until `key` is free, then hold it until the guard is dropped.
    pub async fn lock(&self, key: &str) -> KeyGuard {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
            slots.entry(key.to_string()).or_default().clone()
        };
        let held = slot.clone().lock_owned().await;
        KeyGuard {
            key: key.to_string(),
            slots: self.slots.clone(),
            slot,
            _held: held,
        }
    }

    /// Number of keys currently guarded or waited on.
    pub fn active(&self) -> usize {
        self.slots.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

impl KeyGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        // Map entry, this guard's handle and the owned lock guard's handle.
        if Arc::strong_count(&self.slot) <= 3 {
            slots.remove(&self.key);
        }
    }
}
