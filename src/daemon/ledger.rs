//! Append-only per-day CSV audit ledger.
//!
//! One file per slot date, created with a header row on first write and
//! never rewritten. A row must be durably appended before the corresponding
//! store removal is allowed to proceed.

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use thiserror::Error;

use crate::core::{AuditReason, BookingRecord, DeviceId, DisplayName, SlotKey, WallClock};

const HEADER: [&str; 8] = [
    "Date",
    "Time",
    "Booked By",
    "Device ID",
    "Booked At",
    "Updated At",
    "Reason",
    "Kiosk",
];

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger write failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("ledger encode failed at {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// One row of the audit trail.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub key: SlotKey,
    pub booked_by: DisplayName,
    pub device_id: DeviceId,
    pub booked_at: WallClock,
    pub removed_at: WallClock,
    pub reason: AuditReason,
    pub kiosk: bool,
}

impl AuditEntry {
    pub fn from_record(key: &SlotKey, record: &BookingRecord, reason: AuditReason) -> Self {
        Self {
            key: key.clone(),
            booked_by: record.booked_by.clone(),
            device_id: record.device_id.clone(),
            booked_at: record.booked_at,
            removed_at: WallClock::now(),
            reason,
            kiosk: record.kiosk,
        }
    }
}

pub struct AuditLedger {
    root: PathBuf,
    // Ledger files are single-writer; one process-wide writer lock is enough
    // at this scale.
    writer: Mutex<()>,
}

impl AuditLedger {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            writer: Mutex::new(()),
        }
    }

    pub fn day_path(&self, entry_key: &SlotKey) -> PathBuf {
        self.root.join(format!("bookings_{}.csv", entry_key.date))
    }

    /// Append one row, creating the day's file with its header on first use.
    /// Returns the ledger file the row landed in. The row is flushed and
    /// fsynced before this returns.
    pub fn append(&self, entry: &AuditEntry) -> Result<PathBuf, LedgerError> {
        let _writer = self.lock_writer();
        std::fs::create_dir_all(&self.root).map_err(|source| LedgerError::Io {
            path: self.root.clone(),
            source,
        })?;

        let path = self.day_path(&entry.key);
        let existed = path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| LedgerError::Io {
                path: path.clone(),
                source,
            })?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if !existed {
            self.write_row(&mut writer, &path, HEADER)?;
        }
        self.write_row(
            &mut writer,
            &path,
            [
                entry.key.date.to_string().as_str(),
                entry.key.time.to_string().as_str(),
                entry.booked_by.as_str(),
                entry.device_id.as_str(),
                entry.booked_at.to_rfc3339().as_str(),
                entry.removed_at.to_rfc3339().as_str(),
                entry.reason.as_str(),
                if entry.kiosk { "yes" } else { "no" },
            ],
        )?;
        writer.flush().map_err(|source| LedgerError::Io {
            path: path.clone(),
            source,
        })?;
        let file = writer.into_inner().map_err(|e| LedgerError::Io {
            path: path.clone(),
            source: e.into_error(),
        })?;
        file.sync_all().map_err(|source| LedgerError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    fn write_row<W: io::Write, I, T>(
        &self,
        writer: &mut csv::Writer<W>,
        path: &Path,
        row: I,
    ) -> Result<(), LedgerError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        writer.write_record(row).map_err(|source| LedgerError::Csv {
            path: path.to_path_buf(),
            source,
        })
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, device: &str, reason: AuditReason) -> AuditEntry {
        let key = SlotKey::parse(key).unwrap();
        let record = BookingRecord {
            booked_by: DisplayName::parse("Ana").unwrap(),
            device_id: DeviceId::parse(device).unwrap(),
            booked_at: WallClock::now(),
            kiosk: false,
        };
        AuditEntry::from_record(&key, &record, reason)
    }

    #[test]
    fn header_is_written_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = AuditLedger::new(dir.path());

        let path = ledger
            .append(&entry("2025-11-03_09:00", "dev0000001", AuditReason::Booked))
            .unwrap();
        ledger
            .append(&entry(
                "2025-11-03_09:00",
                "dev0000001",
                AuditReason::Cancelled,
            ))
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Date,Time,Booked By"));
        assert!(lines[1].contains("booked"));
        assert!(lines[2].contains("cancelled"));
        assert_eq!(contents.matches("Booked By").count(), 1);
    }

    #[test]
    fn days_get_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = AuditLedger::new(dir.path());

        let a = ledger
            .append(&entry(
                "2025-11-03_09:00",
                "dev0000001",
                AuditReason::Completed,
            ))
            .unwrap();
        let b = ledger
            .append(&entry(
                "2025-11-04_09:00",
                "dev0000001",
                AuditReason::Extracted,
            ))
            .unwrap();

        assert_ne!(a, b);
        assert!(a.ends_with("bookings_2025-11-03.csv"));
        assert!(b.ends_with("bookings_2025-11-04.csv"));
    }

    #[test]
    fn kiosk_flag_renders_yes_no() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = AuditLedger::new(dir.path());
        let mut kiosk_entry = entry("2025-11-03_10:00", "dev0000001", AuditReason::Cancelled);
        kiosk_entry.kiosk = true;
        let path = ledger.append(&kiosk_entry).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.lines().nth(1).unwrap().ends_with(",yes"));
    }

    #[test]
    fn append_fails_when_root_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("ledger");
        std::fs::write(&blocker, b"x").unwrap();
        let ledger = AuditLedger::new(&blocker);
        let err = ledger
            .append(&entry(
                "2025-11-03_09:00",
                "dev0000001",
                AuditReason::Cancelled,
            ))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Io { .. }));
    }
}
