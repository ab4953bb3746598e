//! Authoritative slot table with write-through snapshot persistence.
//!
//! The table is a partial function from slot identity to booking record.
//! Every successful mutation rewrites the full snapshot atomically before
//! returning; a failed snapshot write rolls the in-memory change back so
//! memory and disk never diverge.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use crate::core::{BookingRecord, SlotDate, SlotKey, SlotTime};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("slot already booked: {key}")]
    SlotTaken { key: SlotKey },

    #[error("snapshot write failed at {path}: {source}")]
    SnapshotIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("snapshot corrupt at {path}: {source}")]
    SnapshotCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("snapshot encode failed: {source}")]
    SnapshotEncode {
        #[source]
        source: serde_json::Error,
    },
}

type Table = BTreeMap<SlotKey, BookingRecord>;

pub struct SlotStore {
    table: RwLock<Table>,
    // Serializes snapshot writers; the snapshot file is single-writer.
    snapshot: Mutex<SnapshotFile>,
}

impl SlotStore {
    /// Open a store backed by the snapshot at `path`, rehydrating any
    /// existing state. A corrupt snapshot is a startup error, never a silent
    /// reset.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let table: Table = match fs::read(&path) {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|source| StoreError::SnapshotCorrupt {
                    path: path.clone(),
                    source,
                })?
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Table::new(),
            Err(source) => {
                return Err(StoreError::SnapshotIo {
                    path: path.clone(),
                    source,
                });
            }
        };
        if !table.is_empty() {
            tracing::info!(bookings = table.len(), "rehydrated slot store");
        }
        Ok(Self {
            table: RwLock::new(table),
            snapshot: Mutex::new(SnapshotFile { path }),
        })
    }

    /// Atomically claim a free slot: check-for-absence and insert are one
    /// step with respect to all concurrent mutations on the table.
    pub fn try_book(&self, key: SlotKey, record: BookingRecord) -> Result<(), StoreError> {
        let snapshot = self.lock_snapshot();
        let mut table = self.write_table();
        if table.contains_key(&key) {
            return Err(StoreError::SlotTaken { key });
        }
        table.insert(key.clone(), record);
        if let Err(err) = snapshot.write(&table) {
            table.remove(&key);
            return Err(err);
        }
        Ok(())
    }

    /// Remove a booking, returning it. Removing an absent key is a no-op so
    /// the audit-then-delete caller can retry after a partial failure.
    pub fn remove(&self, key: &SlotKey) -> Result<Option<BookingRecord>, StoreError> {
        let snapshot = self.lock_snapshot();
        let mut table = self.write_table();
        let Some(record) = table.remove(key) else {
            return Ok(None);
        };
        if let Err(err) = snapshot.write(&table) {
            table.insert(key.clone(), record);
            return Err(err);
        }
        Ok(Some(record))
    }

    pub fn get(&self, key: &SlotKey) -> Option<BookingRecord> {
        self.read_table().get(key).cloned()
    }

    pub fn list_for_day(&self, date: SlotDate) -> BTreeMap<SlotTime, BookingRecord> {
        self.read_table()
            .iter()
            .filter(|(key, _)| key.date == date)
            .map(|(key, record)| (key.time, record.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read_table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_table().is_empty()
    }

    // Poisoned locks are recovered: mutators roll back before unwinding, so
    // the table a panicking writer leaves behind is still consistent.
    fn read_table(&self) -> RwLockReadGuard<'_, Table> {
        self.table.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_table(&self) -> RwLockWriteGuard<'_, Table> {
        self.table.write().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_snapshot(&self) -> MutexGuard<'_, SnapshotFile> {
        self.snapshot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    /// Serialize the full table and replace the snapshot atomically
    /// (tempfile in the same directory, fsync, rename).
    fn write(&self, table: &Table) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(table)
            .map_err(|source| StoreError::SnapshotEncode { source })?;
        let dir = self.path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(dir).map_err(|source| self.io_error(source))?;
        let mut temp =
            tempfile::NamedTempFile::new_in(dir).map_err(|source| self.io_error(source))?;
        temp.write_all(&bytes)
            .map_err(|source| self.io_error(source))?;
        temp.as_file()
            .sync_all()
            .map_err(|source| self.io_error(source))?;
        temp.persist(&self.path)
            .map_err(|source| self.io_error(source.error))?;
        Ok(())
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::SnapshotIo {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DeviceId, DisplayName, WallClock};

    fn record(device: &str) -> BookingRecord {
        BookingRecord {
            booked_by: DisplayName::parse("Ana").unwrap(),
            device_id: DeviceId::parse(device).unwrap(),
            booked_at: WallClock::now(),
            kiosk: false,
        }
    }

    fn key(s: &str) -> SlotKey {
        SlotKey::parse(s).unwrap()
    }

    fn open_store(dir: &tempfile::TempDir) -> SlotStore {
        SlotStore::open(dir.path().join("bookings.json")).unwrap()
    }

    #[test]
    fn second_booking_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        store
            .try_book(key("2025-11-03_09:00"), record("dev0000001"))
            .unwrap();
        let err = store
            .try_book(key("2025-11-03_09:00"), record("dev0000002"))
            .unwrap_err();
        assert!(matches!(err, StoreError::SlotTaken { .. }));
        // the original record survives
        assert_eq!(
            store
                .get(&key("2025-11-03_09:00"))
                .unwrap()
                .device_id
                .as_str(),
            "dev0000001"
        );
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        store
            .try_book(key("2025-11-03_09:00"), record("dev0000001"))
            .unwrap();
        assert!(store.remove(&key("2025-11-03_09:00")).unwrap().is_some());
        assert!(store.remove(&key("2025-11-03_09:00")).unwrap().is_none());
    }

    #[test]
    fn snapshot_round_trips_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bookings.json");
        let store = SlotStore::open(&path).unwrap();
        store
            .try_book(key("2025-11-03_09:15"), record("abcdefghij"))
            .unwrap();
        drop(store);

        let store = SlotStore::open(&path).unwrap();
        let got = store.get(&key("2025-11-03_09:15")).unwrap();
        assert_eq!(got.device_id.as_str(), "abcdefghij");
        assert_eq!(got.booked_by.as_str(), "Ana");
    }

    #[test]
    fn list_for_day_filters_by_date() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        store
            .try_book(key("2025-11-03_09:00"), record("dev0000001"))
            .unwrap();
        store
            .try_book(key("2025-11-03_14:30"), record("dev0000002"))
            .unwrap();
        store
            .try_book(key("2025-11-04_09:00"), record("dev0000003"))
            .unwrap();

        let day = store.list_for_day(SlotDate::parse("2025-11-03").unwrap());
        assert_eq!(day.len(), 2);
        assert!(day.contains_key(&SlotTime::parse("09:00").unwrap()));
        assert!(day.contains_key(&SlotTime::parse("14:30").unwrap()));
    }

    #[test]
    fn failed_snapshot_rolls_back_the_mutation() {
        let dir = tempfile::tempdir().unwrap();
        // Open against a not-yet-existing subdirectory, then block that
        // path with a regular file so the snapshot write fails.
        let sub = dir.path().join("sub");
        let store = SlotStore::open(sub.join("bookings.json")).unwrap();
        fs::write(&sub, b"x").unwrap();

        let err = store
            .try_book(key("2025-11-03_09:00"), record("dev0000001"))
            .unwrap_err();
        assert!(matches!(err, StoreError::SnapshotIo { .. }));
        assert!(store.get(&key("2025-11-03_09:00")).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn corrupt_snapshot_is_a_startup_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bookings.json");
        fs::write(&path, b"{not json").unwrap();
        assert!(matches!(
            SlotStore::open(&path),
            Err(StoreError::SnapshotCorrupt { .. })
        ));
    }
}
