//! Keyed mutual exclusion for operations that must not interleave per
//! identifier, such as writes to the inline policies of one role.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// A map of identifier to lock. Different keys never block each other.
///
/// Entries are never removed, so the map grows with the number of distinct
/// keys ever locked.
#[derive(Debug, Default)]
pub struct MutexKV {
    store: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Holds the lock for one key until dropped.
#[derive(Debug)]
pub struct MutexKVGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl MutexKV {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide instance shared by all workflows.
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<MutexKV> = OnceLock::new();
        GLOBAL.get_or_init(MutexKV::new)
    }

    /// Wait for and take the lock on `key`.
    pub async fn lock(&self, key: &str) -> MutexKVGuard {
        log::debug!("Locking {key:?}");
        let guard = self.get(key).lock_owned().await;
        log::debug!("Locked {key:?}");
        MutexKVGuard {
            key: key.to_string(),
            _guard: guard,
        }
    }

    /// Take the lock on `key` if nobody holds it.
    pub fn try_lock(&self, key: &str) -> Option<MutexKVGuard> {
        let guard = self.get(key).try_lock_owned().ok()?;
        Some(MutexKVGuard {
            key: key.to_string(),
            _guard: guard,
        })
    }

    fn get(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(store.entry(key.to_string()).or_default())
    }
}

impl MutexKVGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for MutexKVGuard {
    fn drop(&mut self) {
        log::debug!("Unlocked {:?}", self.key);
    }
}
