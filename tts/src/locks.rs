//! Per-key async locks.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// A set of async mutexes addressed by string keys.
///
/// Holding the lock for one key never blocks another key. An entry lives
/// exactly as long as somebody holds or awaits its key.
#[derive(Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<String, Slot>>,
}

struct Slot {
    mutex: Arc<AsyncMutex<()>>,
    /// Holders plus waiters.
    users: usize,
}

/// Guard returned by [`KeyedLocks::lock`]. Releases the key on drop.
pub struct KeyGuard<'a> {
    // Field order matters: the mutex is released before the user is
    // unregistered.
    _guard: OwnedMutexGuard<()>,
    _user: SlotUser<'a>,
}

/// Registration of one holder or waiter. Dropping it, including when a
/// pending `lock` future is cancelled, removes an entry nobody uses.
struct SlotUser<'a> {
    locks: &'a KeyedLocks,
    key: String,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until `key` is free and take it.
    pub async fn lock(&self, key: &str) -> KeyGuard<'_> {
        let (user, mutex) = {
            let mut slots = self.slots.lock();
            let slot = slots.entry(key.to_string()).or_insert_with(|| Slot {
                mutex: Arc::default(),
                users: 0,
            });
            slot.users += 1;
            let user = SlotUser {
                locks: self,
                key: key.to_string(),
            };
            (user, Arc::clone(&slot.mutex))
        };
        let guard = mutex.lock_owned().await;
        KeyGuard {
            _guard: guard,
            _user: user,
        }
    }

    /// Number of keys currently held or awaited.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for SlotUser<'_> {
    fn drop(&mut self) {
        let mut slots = self.locks.slots.lock();
        let idle = match slots.get_mut(&self.key) {
            Some(slot) => {
                slot.users -= 1;
                slot.users == 0
            }
            None => false,
        };
        if idle {
            slots.remove(&self.key);
        }
    }
}
