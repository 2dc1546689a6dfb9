//! Fault-injecting backend wrapper.
//!
//! Wraps any backend and fails chosen operations on demand. The switches live
//! in a shared [`FaultInjector`] so a test can keep flipping them after the
//! backend itself has been moved into a store.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Switches controlling which operations of a [`FaultyBackend`] fail.
#[derive(Debug, Default)]
pub struct FaultInjector {
    fail_appends: AtomicBool,
    tear_appends: AtomicBool,
    fail_syncs: AtomicBool,
    appends: AtomicUsize,
}

impl FaultInjector {
    /// Makes every append fail without writing anything.
    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Makes every append write half of its data and then fail, the way a
    /// crash or full disk leaves a torn tail.
    pub fn tear_appends(&self, tear: bool) {
        self.tear_appends.store(tear, Ordering::SeqCst);
    }

    /// Makes every sync fail.
    pub fn fail_syncs(&self, fail: bool) {
        self.fail_syncs.store(fail, Ordering::SeqCst);
    }

    /// Clears all switches.
    pub fn reset(&self) {
        self.fail_appends(false);
        self.tear_appends(false);
        self.fail_syncs(false);
    }

    /// Number of successful appends seen so far.
    #[must_use]
    pub fn appends(&self) -> usize {
        self.appends.load(Ordering::SeqCst)
    }
}

/// A backend wrapper that fails operations selected through its
/// [`FaultInjector`].
pub struct FaultyBackend {
    inner: Box<dyn StorageBackend>,
    faults: Arc<FaultInjector>,
}

impl FaultyBackend {
    /// Wraps `inner` with all faults switched off.
    pub fn new(inner: Box<dyn StorageBackend>) -> Self {
        Self {
            inner,
            faults: Arc::new(FaultInjector::default()),
        }
    }

    /// Returns the shared switches.
    #[must_use]
    pub fn faults(&self) -> Arc<FaultInjector> {
        Arc::clone(&self.faults)
    }
}

impl StorageBackend for FaultyBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        if self.faults.fail_appends.load(Ordering::SeqCst) {
            return Err(StorageError::Injected("append rejected"));
        }
        if self.faults.tear_appends.load(Ordering::SeqCst) {
            self.inner.append(&data[..data.len() / 2])?;
            return Err(StorageError::Injected("append torn"));
        }
        let offset = self.inner.append(data)?;
        self.faults.appends.fetch_add(1, Ordering::SeqCst);
        Ok(offset)
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn sync(&mut self) -> StorageResult<()> {
        if self.faults.fail_syncs.load(Ordering::SeqCst) {
            return Err(StorageError::Injected("sync failed"));
        }
        self.inner.sync()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.inner.truncate(new_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryBackend;

    #[test]
    fn passes_through_when_healthy() {
        let mut backend = FaultyBackend::new(Box::new(InMemoryBackend::new()));
        backend.append(b"abc").unwrap();
        backend.sync().unwrap();

        assert_eq!(backend.read_all().unwrap(), b"abc");
        assert_eq!(backend.faults().appends(), 1);
    }

    #[test]
    fn rejected_append_writes_nothing() {
        let mut backend = FaultyBackend::new(Box::new(InMemoryBackend::new()));
        let faults = backend.faults();

        faults.fail_appends(true);
        assert!(backend.append(b"abc").is_err());
        assert_eq!(backend.size().unwrap(), 0);

        faults.reset();
        assert_eq!(backend.append(b"abc").unwrap(), 0);
    }

    #[test]
    fn torn_append_leaves_partial_tail() {
        let mut backend = FaultyBackend::new(Box::new(InMemoryBackend::new()));
        backend.faults().tear_appends(true);

        assert!(backend.append(b"abcdef").is_err());
        assert_eq!(backend.read_all().unwrap(), b"abc");
    }

    #[test]
    fn failing_sync() {
        let mut backend = FaultyBackend::new(Box::new(InMemoryBackend::new()));
        backend.faults().fail_syncs(true);
        assert!(matches!(backend.sync(), Err(StorageError::Injected(_))));
    }
}
