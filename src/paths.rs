//! XDG directory helpers for config/data locations.

use std::path::PathBuf;

/// Base directory for persistent data (snapshot, ledger, logs).
///
/// Uses `SLOTDESK_DATA_DIR` if set, otherwise `$XDG_DATA_HOME/slotdesk` or
/// `~/.local/share/slotdesk`.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SLOTDESK_DATA_DIR")
        && !dir.trim().is_empty()
    {
        return PathBuf::from(dir);
    }

    std::env::var("XDG_DATA_HOME")
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join(".local")
                .join("share")
        })
        .join("slotdesk")
}

/// Base directory for configuration files.
///
/// Uses `SLOTDESK_CONFIG_DIR` if set, otherwise `$XDG_CONFIG_HOME/slotdesk`
/// or `~/.config/slotdesk`.
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SLOTDESK_CONFIG_DIR")
        && !dir.trim().is_empty()
    {
        return PathBuf::from(dir);
    }

    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join(".config")
        })
        .join("slotdesk")
}

/// Live slot-table snapshot, rewritten atomically on every mutation.
pub fn snapshot_path() -> PathBuf {
    data_dir().join("bookings.json")
}

/// Directory of per-day audit ledger files.
pub fn ledger_dir() -> PathBuf {
    data_dir().join("ledger")
}

/// Directory for daemon log files.
pub fn log_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Display-name roster consumed by client type-ahead.
pub fn names_path() -> PathBuf {
    config_dir().join("display_names.txt")
}

/// Cached per-machine client device token.
pub fn device_id_path() -> PathBuf {
    config_dir().join("device_id")
}
