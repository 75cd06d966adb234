use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Async mutual exclusion keyed by string.
///
/// Read-then-write operations on a single entity (mutual-match detection,
/// member append, invitation accept, proposal respond/evaluate) serialize
/// on the entity key so no caller can act on a stale read. Lock entries
/// are pruned once no task holds or waits on them.
#[derive(Clone, Default)]
pub struct KeyedMutex {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl KeyedMutex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, waiting if another task holds it.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut table = self.inner.lock().await;
            // Drop entries nobody else references before taking a new one.
            table.retain(|_, slot| Arc::strong_count(slot) > 1);
            table.entry(key.to_string()).or_default().clone()
        };
        slot.lock_owned().await
    }
}
