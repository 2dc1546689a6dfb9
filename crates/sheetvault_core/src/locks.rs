//! Per-key write exclusion.

use crate::types::UserId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// What a write lock protects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum LockKey {
    /// One sheet of one user.
    Sheet(UserId, String),
    /// The preferences record of one user.
    Preferences(UserId),
}

/// A map of lazily created mutexes, one per [`LockKey`].
///
/// Writers to the same key serialize; writers to different keys never wait on
/// each other beyond the brief map lookup.
#[derive(Debug, Default)]
pub(crate) struct KeyLocks {
    locks: Mutex<HashMap<LockKey, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    /// Runs `f` while holding the lock for `key`.
    pub fn with_lock<T>(&self, key: LockKey, f: impl FnOnce() -> T) -> T {
        let lock = Arc::clone(self.locks.lock().entry(key.clone()).or_default());

        let result = {
            let _guard = lock.lock();
            f()
        };

        // Drop the entry once no other writer is queued on it. The count is
        // read and our handle released under the map guard, so the last
        // writer out always sees 2.
        let mut locks = self.locks.lock();
        let last = Arc::strong_count(&lock) == 2;
        drop(lock);
        if last {
            locks.remove(&key);
        }
        result
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn sheet(key: &str) -> LockKey {
        LockKey::Sheet(UserId::new("u"), key.into())
    }

    #[test]
    fn same_key_is_exclusive() {
        let locks = Arc::new(KeyLocks::default());
        let inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                thread::spawn(move || {
                    for _ in 0..100 {
                        locks.with_lock(sheet("a"), || {
                            assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                            thread::yield_now();
                            inside.fetch_sub(1, Ordering::SeqCst);
                        });
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn released_locks_are_pruned() {
        let locks = KeyLocks::default();
        locks.with_lock(sheet("a"), || ());
        locks.with_lock(LockKey::Preferences(UserId::new("u")), || ());
        assert_eq!(locks.len(), 0);
    }

    #[test]
    fn contended_locks_are_pruned() {
        let locks = Arc::new(KeyLocks::default());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                thread::spawn(move || {
                    for _ in 0..200 {
                        locks.with_lock(sheet("a"), thread::yield_now);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(locks.len(), 0);
    }

    #[test]
    fn nested_locks_on_different_keys() {
        let locks = KeyLocks::default();
        let value = locks.with_lock(sheet("a"), || locks.with_lock(sheet("b"), || 7));
        assert_eq!(value, 7);
    }
}
