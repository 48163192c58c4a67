//! Per-device exclusion for passes that write device state.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per device name, created on first use.
///
/// Entries nobody holds or waits on are pruned on the next acquire, so
/// lookups of unknown names do not accumulate.
#[derive(Debug, Default)]
pub(crate) struct DeviceLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DeviceLocks {
    pub(crate) async fn acquire(&self, name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(name.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_name_is_exclusive() {
        let locks = DeviceLocks::default();
        let guard = locks.acquire("a1").await;
        let second = tokio::time::timeout(Duration::from_millis(20), locks.acquire("a1")).await;
        assert!(second.is_err());
        drop(guard);
        assert!(tokio::time::timeout(Duration::from_millis(20), locks.acquire("a1")).await.is_ok());
    }

    #[tokio::test]
    async fn other_names_do_not_block() {
        let locks = DeviceLocks::default();
        let _a1 = locks.acquire("a1").await;
        assert!(tokio::time::timeout(Duration::from_millis(20), locks.acquire("b2")).await.is_ok());
    }

    #[tokio::test]
    async fn released_entries_are_pruned() {
        let locks = DeviceLocks::default();
        drop(locks.acquire("ghost-1").await);
        drop(locks.acquire("ghost-2").await);
        let _held = locks.acquire("a1").await;
        assert_eq!(locks.len().await, 1);
    }
}
