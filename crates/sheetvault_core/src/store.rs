//! The record store.

use crate::config::StoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::locks::{KeyLocks, LockKey};
use crate::log::{self, LogEntry, LogReport};
use crate::types::{PreferencesRecord, SheetRecord, UserId};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use sheetvault_storage::{FileBackend, InMemoryBackend, StorageBackend, StorageError};
use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

/// Records of one user.
#[derive(Debug, Default)]
struct UserRecords {
    sheets: BTreeMap<String, SheetRecord>,
    preferences: Option<PreferencesRecord>,
}

/// In-memory view of the log.
#[derive(Debug, Default)]
struct Index {
    users: HashMap<UserId, UserRecords>,
    entries: u64,
}

impl Index {
    fn apply(&mut self, entry: LogEntry) {
        self.entries += 1;
        match entry {
            LogEntry::Sheet { user, record } => {
                self.users
                    .entry(user)
                    .or_default()
                    .sheets
                    .insert(record.save_key.clone(), record);
            }
            LogEntry::Preferences { user, record } => {
                self.users.entry(user).or_default().preferences = Some(record);
            }
        }
    }

    fn sheet(&self, user: &UserId, key: &str) -> Option<&SheetRecord> {
        self.users.get(user)?.sheets.get(key)
    }

    fn preferences(&self, user: &UserId) -> Option<&PreferencesRecord> {
        self.users.get(user)?.preferences.as_ref()
    }
}

/// Counts describing the store contents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Users with at least one record.
    pub users: u64,
    /// Sheets that are not tombstoned.
    pub live_sheets: u64,
    /// Tombstoned sheets.
    pub tombstones: u64,
    /// Users with a preferences record.
    pub preference_records: u64,
    /// Entries in the log, superseded ones included.
    pub log_entries: u64,
    /// Size of the log in bytes.
    pub log_bytes: u64,
}

/// Result of [`RecordStore::compact_into`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompactionReport {
    /// Entries in the source log.
    pub entries_before: u64,
    /// Entries written to the target.
    pub entries_after: u64,
    /// Size of the source log.
    pub bytes_before: u64,
    /// Size of the target after compaction.
    pub bytes_after: u64,
}

/// Durable keyed storage of sheets and preferences.
///
/// Records live in an append-only log on a [`StorageBackend`] and are served
/// from an in-memory index rebuilt on open.
///
/// # Concurrency
///
/// [`RecordStore::update`] and [`RecordStore::update_preferences`] run their
/// closure under a lock scoped to one sheet or one user's preferences, so a
/// read-decide-write cycle on a key never interleaves with another writer of
/// that key. Different keys proceed in parallel; only the append itself is
/// serialized.
///
/// # Failure
///
/// A write is appended (and synced when configured) before the index changes.
/// If the medium fails, the partial append is truncated away, the index is
/// left untouched and the caller gets [`CoreError::StorageUnavailable`].
pub struct RecordStore {
    config: StoreConfig,
    log: Mutex<Box<dyn StorageBackend>>,
    index: RwLock<Index>,
    locks: KeyLocks,
    poisoned: AtomicBool,
}

impl RecordStore {
    /// Opens a store over `backend`, replaying its log.
    ///
    /// A torn entry at the end of the log is truncated away.
    ///
    /// # Errors
    ///
    /// Returns a corruption error if the log is damaged before its end, or
    /// [`CoreError::StorageUnavailable`] if the backend cannot be read.
    pub fn open(mut backend: Box<dyn StorageBackend>, config: StoreConfig) -> CoreResult<Self> {
        let data = backend.read_all()?;
        let scan = log::scan(&data)?;

        if scan.torn_bytes > 0 {
            warn!(
                valid_bytes = scan.valid_len,
                torn_bytes = scan.torn_bytes,
                "discarding torn entry at end of record log"
            );
            backend.truncate(scan.valid_len)?;
        }

        let mut index = Index::default();
        for (_, entry) in scan.entries {
            index.apply(entry);
        }

        info!(
            entries = index.entries,
            users = index.users.len(),
            bytes = scan.valid_len,
            "record store opened"
        );

        Ok(Self {
            config,
            log: Mutex::new(backend),
            index: RwLock::new(index),
            locks: KeyLocks::default(),
            poisoned: AtomicBool::new(false),
        })
    }

    /// Opens an empty store that lives in memory.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the signature matches [`RecordStore::open`].
    pub fn in_memory() -> CoreResult<Self> {
        Self::open(Box::new(InMemoryBackend::new()), StoreConfig::default())
    }

    /// Opens the store kept in the log file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StoreMissing`] if the file does not exist and
    /// `config.create_if_missing` is false, and
    /// [`CoreError::StorageUnavailable`] if the file is locked by another
    /// process or cannot be opened.
    pub fn open_file(path: &Path, config: StoreConfig) -> CoreResult<Self> {
        let backend = if config.create_if_missing {
            FileBackend::open(path)?
        } else {
            FileBackend::open_existing(path).map_err(|err| match err {
                StorageError::Io(e) if e.kind() == ErrorKind::NotFound => {
                    CoreError::StoreMissing(path.to_path_buf())
                }
                other => other.into(),
            })?
        };
        Self::open(Box::new(backend), config)
    }

    /// Returns the store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // === Sheets ===

    /// Returns the sheet stored under `key`, tombstones included.
    pub fn get(&self, user: &UserId, key: &str) -> Option<SheetRecord> {
        self.index.read().sheet(user, key).cloned()
    }

    /// Returns all sheets of `user`, tombstones included, ordered by key.
    pub fn list(&self, user: &UserId) -> Vec<SheetRecord> {
        self.index
            .read()
            .users
            .get(user)
            .map(|records| records.sheets.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Stores `record` under `key`, replacing any previous record.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StorageUnavailable`] if the log cannot be written.
    pub fn put(&self, user: &UserId, key: &str, mut record: SheetRecord) -> CoreResult<()> {
        record.save_key = key.to_string();
        self.locks.with_lock(LockKey::Sheet(user.clone(), key.to_string()), || {
            self.commit(LogEntry::Sheet {
                user: user.clone(),
                record,
            })
        })
    }

    /// Atomically reads, decides on and writes the sheet under `key`.
    ///
    /// `f` sees the current record (tombstones included) and returns the
    /// record to write, or `None` to leave the store as it is, along with a
    /// value handed back to the caller. No other writer of the key runs
    /// between the read and the write. If `f` fails nothing is written.
    ///
    /// # Errors
    ///
    /// Returns the error of `f`, or [`CoreError::StorageUnavailable`]
    /// converted into `E` if the write fails.
    pub fn update<T, E, F>(&self, user: &UserId, key: &str, f: F) -> Result<T, E>
    where
        F: FnOnce(Option<&SheetRecord>) -> Result<(Option<SheetRecord>, T), E>,
        E: From<CoreError>,
    {
        self.locks.with_lock(LockKey::Sheet(user.clone(), key.to_string()), || {
            let current = self.get(user, key);
            let (write, value) = f(current.as_ref())?;

            if let Some(mut record) = write {
                record.save_key = key.to_string();
                self.commit(LogEntry::Sheet {
                    user: user.clone(),
                    record,
                })?;
            }
            Ok(value)
        })
    }

    // === Preferences ===

    /// Returns the preferences record of `user`.
    pub fn get_preferences(&self, user: &UserId) -> Option<PreferencesRecord> {
        self.index.read().preferences(user).cloned()
    }

    /// Stores the preferences record of `user`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StorageUnavailable`] if the log cannot be written.
    pub fn put_preferences(&self, user: &UserId, record: PreferencesRecord) -> CoreResult<()> {
        self.locks.with_lock(LockKey::Preferences(user.clone()), || {
            self.commit(LogEntry::Preferences {
                user: user.clone(),
                record,
            })
        })
    }

    /// Atomically reads, decides on and writes the preferences of `user`.
    ///
    /// Same contract as [`RecordStore::update`].
    ///
    /// # Errors
    ///
    /// Returns the error of `f`, or the write failure converted into `E`.
    pub fn update_preferences<T, E, F>(&self, user: &UserId, f: F) -> Result<T, E>
    where
        F: FnOnce(Option<&PreferencesRecord>) -> Result<(Option<PreferencesRecord>, T), E>,
        E: From<CoreError>,
    {
        self.locks.with_lock(LockKey::Preferences(user.clone()), || {
            let current = self.get_preferences(user);
            let (write, value) = f(current.as_ref())?;

            if let Some(record) = write {
                self.commit(LogEntry::Preferences {
                    user: user.clone(),
                    record,
                })?;
            }
            Ok(value)
        })
    }

    /// Hands out the user's next set id and advances the counter.
    ///
    /// The first allocation for a user returns 0.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CounterExhausted`] if the counter is at its
    /// maximum, or [`CoreError::StorageUnavailable`] if the write fails.
    pub fn allocate_next_set_id(&self, user: &UserId) -> CoreResult<u32> {
        self.update_preferences(user, |current| {
            let mut record = current.cloned().unwrap_or_default();
            let id = record.next_set_id;
            record.next_set_id = id.checked_add(1).ok_or(CoreError::CounterExhausted)?;
            Ok((Some(record), id))
        })
    }

    // === Maintenance ===

    /// Returns the users owning at least one record, sorted.
    pub fn users(&self) -> Vec<UserId> {
        let mut users: Vec<_> = self.index.read().users.keys().cloned().collect();
        users.sort();
        users
    }

    /// Returns counts describing the store.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StorageUnavailable`] if the log size cannot be read.
    pub fn stats(&self) -> CoreResult<StoreStats> {
        let log_bytes = self.log.lock().size()?;
        let index = self.index.read();

        let mut stats = StoreStats {
            users: index.users.len() as u64,
            log_entries: index.entries,
            log_bytes,
            ..StoreStats::default()
        };
        for records in index.users.values() {
            for sheet in records.sheets.values() {
                if sheet.deleted {
                    stats.tombstones += 1;
                } else {
                    stats.live_sheets += 1;
                }
            }
            if records.preferences.is_some() {
                stats.preference_records += 1;
            }
        }
        Ok(stats)
    }

    /// Rescans the whole log from the backend.
    ///
    /// # Errors
    ///
    /// Returns a corruption error if any entry fails to verify.
    pub fn verify(&self) -> CoreResult<LogReport> {
        let data = self.log.lock().read_all()?;
        let report = log::scan(&data)?.report();
        debug!(entries = report.entries, bytes = report.valid_bytes, "record log verified");
        Ok(report)
    }

    /// Writes the latest record of every key into `target`, which must be
    /// empty, and syncs it.
    ///
    /// Writers are blocked for the duration so the copy is a consistent
    /// snapshot. Tombstones are kept.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TargetNotEmpty`] if `target` holds data, or
    /// [`CoreError::StorageUnavailable`] if either backend fails.
    pub fn compact_into(&self, target: &mut dyn StorageBackend) -> CoreResult<CompactionReport> {
        let log = self.log.lock();
        let index = self.index.read();

        let target_size = target.size()?;
        if target_size != 0 {
            return Err(CoreError::TargetNotEmpty { size: target_size });
        }

        let mut users: Vec<_> = index.users.iter().collect();
        users.sort_by(|a, b| a.0.cmp(b.0));

        let mut entries_after = 0u64;
        for (user, records) in users {
            if let Some(preferences) = &records.preferences {
                let entry = LogEntry::Preferences {
                    user: user.clone(),
                    record: preferences.clone(),
                };
                target.append(&entry.encode()?)?;
                entries_after += 1;
            }
            for record in records.sheets.values() {
                let entry = LogEntry::Sheet {
                    user: user.clone(),
                    record: record.clone(),
                };
                target.append(&entry.encode()?)?;
                entries_after += 1;
            }
        }
        target.sync()?;

        let report = CompactionReport {
            entries_before: index.entries,
            entries_after,
            bytes_before: log.size()?,
            bytes_after: target.size()?,
        };
        info!(
            entries_before = report.entries_before,
            entries_after = report.entries_after,
            bytes_before = report.bytes_before,
            bytes_after = report.bytes_after,
            "record log compacted"
        );
        Ok(report)
    }

    // === Write path ===

    /// Appends `entry` to the log, then applies it to the index.
    fn commit(&self, entry: LogEntry) -> CoreResult<()> {
        if self.poisoned.load(Ordering::SeqCst) {
            return Err(CoreError::Poisoned);
        }
        let frame = entry.encode()?;

        // The log guard is held until the index is updated so a snapshot
        // taken under the log lock always matches the log.
        let mut log = self.log.lock();
        let before = log.size()?;

        let written = log.append(&frame).and_then(|_| {
            if self.config.sync_on_write {
                log.sync()
            } else {
                Ok(())
            }
        });

        if let Err(err) = written {
            error!(user = %entry.user(), error = %err, "record log write failed");
            if let Err(rollback) = log.truncate(before) {
                error!(error = %rollback, "record log rollback failed");
                self.poisoned.store(true, Ordering::SeqCst);
            }
            return Err(err.into());
        }

        match &entry {
            LogEntry::Sheet { user, record } => debug!(
                user = %user,
                key = %record.save_key,
                version = record.version,
                deleted = record.deleted,
                "sheet record written"
            ),
            LogEntry::Preferences { user, record } => debug!(
                user = %user,
                next_set_id = record.next_set_id,
                "preferences record written"
            ),
        }
        self.index.write().apply(entry);
        Ok(())
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("config", &self.config)
            .field("entries", &self.index.read().entries)
            .finish_non_exhaustive()
    }
}
