use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = HashMap<String, Arc<AsyncMutex<()>>>;

/// One async lock per key, created on first use and dropped once nobody
/// holds or waits for it
#[derive(Default)]
pub struct KeyedLocks {
    locks: Arc<Mutex<LockMap>>,
}

/// Holds the lock on one key until dropped
pub struct KeyedGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: String,
    locks: Arc<Mutex<LockMap>>,
}

fn lock_map(locks: &Mutex<LockMap>) -> MutexGuard<'_, LockMap> {
    match locks.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, key: &str) -> Arc<AsyncMutex<()>> {
        Arc::clone(lock_map(&self.locks).entry(key.to_string()).or_default())
    }

    fn guard(&self, key: &str, guard: OwnedMutexGuard<()>) -> KeyedGuard {
        KeyedGuard { guard: Some(guard), key: key.to_string(), locks: Arc::clone(&self.locks) }
    }

    /// Wait for the lock on `key`
    pub async fn acquire(&self, key: &str) -> KeyedGuard {
        let guard = self.lock_for(key).lock_owned().await;
        self.guard(key, guard)
    }

    /// Take the lock on `key` only if nobody holds it
    pub fn try_acquire(&self, key: &str) -> Option<KeyedGuard> {
        self.lock_for(key).try_lock_owned().ok().map(|guard| self.guard(key, guard))
    }

    /// Number of keys currently tracked
    pub fn len(&self) -> usize {
        lock_map(&self.locks).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Remove `key` when the map holds the only reference to its lock
fn forget_if_idle(locks: &Mutex<LockMap>, key: &str) {
    let mut map = lock_map(locks);
    if map.get(key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
        map.remove(key);
    }
}

impl Drop for KeyedGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        forget_if_idle(&self.locks, &self.key);
    }
}
