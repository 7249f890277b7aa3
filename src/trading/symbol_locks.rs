//! Per-symbol mutual exclusion around the size -> place sequence.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Hands out one async lock per exchange symbol.
///
/// Holding the guard means no other trade on the same symbol is reading the
/// balance or placing orders. Different symbols never block each other.
#[derive(Default)]
pub struct SymbolLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SymbolLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, symbol: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            // only the map holds an idle lock
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry(symbol.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
