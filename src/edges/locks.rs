//! Keyed single-writer locks on unordered member pairs.
//!
//! `link(a, b, _)` and `link(b, a, _)` touch the same two edges, so both
//! take the lock for `{a, b}`. Entries are created on demand and removed
//! when the last holder or waiter goes away, including a waiter whose
//! future is dropped before it gets the lock.
//!
//! Every pair write also holds the type gate for reading. Removing a
//! relationship type takes the gate for writing, so it never interleaves
//! with a pair write that has already resolved the type.

use std::sync::Arc;
use hashbrown::HashMap;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::model::MemberId;

type PairKey = (MemberId, MemberId);
type Slot = Arc<AsyncMutex<()>>;

fn pair_key(a: MemberId, b: MemberId) -> PairKey {
    if a <= b { (a, b) } else { (b, a) }
}

#[derive(Default)]
pub struct PairLocks {
    table: Mutex<HashMap<PairKey, Slot>>,
    types: RwLock<()>,
}

impl PairLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to the pair `{a, b}`.
    pub async fn acquire(&self, a: MemberId, b: MemberId) -> PairGuard<'_> {
        let types = self.types.read().await;
        let entry = PairEntry::claim(self, pair_key(a, b));
        let guard = Arc::clone(&entry.slot).lock_owned().await;
        PairGuard { _pair: guard, _entry: entry, _types: types }
    }

    /// Wait until no pair write is in flight, and hold new ones off until
    /// the returned guard is dropped.
    pub async fn lock_types(&self) -> RwLockWriteGuard<'_, ()> {
        self.types.write().await
    }

    /// Number of pairs currently locked or awaited.
    pub fn active(&self) -> usize {
        self.table.lock().len()
    }
}

/// One holder's or waiter's share of a table entry.
struct PairEntry<'a> {
    locks: &'a PairLocks,
    key: PairKey,
    slot: Slot,
}

impl<'a> PairEntry<'a> {
    fn claim(locks: &'a PairLocks, key: PairKey) -> Self {
        let slot = Arc::clone(locks.table.lock().entry(key).or_default());
        Self { locks, key, slot }
    }
}

impl Drop for PairEntry<'_> {
    fn drop(&mut self) {
        let mut table = self.locks.table.lock();
        // The table and this entry are the last two owners.
        if Arc::strong_count(&self.slot) == 2 {
            table.remove(&self.key);
        }
    }
}

// Fields drop in order: the pair lock is released before its entry.
pub struct PairGuard<'a> {
    _pair: OwnedMutexGuard<()>,
    _entry: PairEntry<'a>,
    _types: RwLockReadGuard<'a, ()>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_pair_key_is_unordered() {
        assert_eq!(pair_key(MemberId(2), MemberId(1)), pair_key(MemberId(1), MemberId(2)));
    }

    #[tokio::test]
    async fn test_entries_are_released() {
        let locks = PairLocks::new();
        {
            let _g = locks.acquire(MemberId(2), MemberId(1)).await;
            assert_eq!(locks.active(), 1);
        }
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_second_acquire_waits() {
        let locks = Arc::new(PairLocks::new());
        let guard = locks.acquire(MemberId(1), MemberId(2)).await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _g = locks.acquire(MemberId(2), MemberId(1)).await;
            })
        };
        tokio::task::yield_now().await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_abandoned_waiter_releases_entry() {
        let locks = PairLocks::new();
        let guard = locks.acquire(MemberId(1), MemberId(2)).await;

        let waited = tokio::time::timeout(Duration::from_millis(20), locks.acquire(MemberId(2), MemberId(1))).await;
        assert!(waited.is_err());
        assert_eq!(locks.active(), 1);

        drop(guard);
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_aborted_waiter_task_releases_entry() {
        let locks = Arc::new(PairLocks::new());
        let guard = locks.acquire(MemberId(1), MemberId(2)).await;

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _g = locks.acquire(MemberId(1), MemberId(2)).await;
            })
        };
        tokio::task::yield_now().await;
        waiter.abort();
        assert!(waiter.await.unwrap_err().is_cancelled());

        // The holder leaves last and still finds itself the only owner.
        drop(guard);
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_type_lock_waits_for_pair_writes() {
        let locks = PairLocks::new();
        let guard = locks.acquire(MemberId(1), MemberId(2)).await;
        assert!(tokio::time::timeout(Duration::from_millis(20), locks.lock_types()).await.is_err());

        drop(guard);
        let types = locks.lock_types().await;
        assert!(tokio::time::timeout(Duration::from_millis(20), locks.acquire(MemberId(3), MemberId(4))).await.is_err());
        drop(types);
        assert_eq!(locks.active(), 0);
    }
}
