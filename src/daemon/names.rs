//! Display-name roster for client type-ahead.
//!
//! Loaded once at init and replaced atomically on an explicit reload:
//! readers always see either the old list or the new one, never a partial
//! read.

use std::io;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub struct DisplayNameRoster {
    path: PathBuf,
    names: RwLock<Arc<Vec<String>>>,
}

impl DisplayNameRoster {
    /// Load the roster at startup. A missing or unreadable file degrades to
    /// an empty list (logged), matching the roster's advisory role.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let names = match read_names(&path) {
            Ok(names) => {
                tracing::info!(count = names.len(), "loaded display names");
                names
            }
            Err(RosterError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "display names file not found, using empty list");
                Vec::new()
            }
            Err(err) => {
                tracing::error!("failed to load display names: {err}");
                Vec::new()
            }
        };
        Self {
            path,
            names: RwLock::new(Arc::new(names)),
        }
    }

    pub fn names(&self) -> Arc<Vec<String>> {
        Arc::clone(&self.names.read().unwrap_or_else(|e| e.into_inner()))
    }

    /// Re-read the file and swap the list in atomically. Unlike startup,
    /// an explicit reload surfaces failures to the caller.
    pub fn reload(&self) -> Result<usize, RosterError> {
        let names = read_names(&self.path)?;
        let count = names.len();
        *self.names.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(names);
        tracing::info!(count, "reloaded display names");
        Ok(count)
    }
}

fn read_names(path: &PathBuf) -> Result<Vec<String>, RosterError> {
    let contents = std::fs::read_to_string(path).map_err(|source| RosterError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let roster = DisplayNameRoster::load(dir.path().join("display_names.txt"));
        assert!(roster.names().is_empty());
    }

    #[test]
    fn reload_swaps_the_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("display_names.txt");
        std::fs::write(&path, "Ana\n\n  Ben  \n").unwrap();

        let roster = DisplayNameRoster::load(&path);
        assert_eq!(*roster.names(), vec!["Ana".to_string(), "Ben".to_string()]);

        std::fs::write(&path, "Cara\n").unwrap();
        assert_eq!(roster.reload().unwrap(), 1);
        assert_eq!(*roster.names(), vec!["Cara".to_string()]);
    }

    #[test]
    fn reload_of_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("display_names.txt");
        std::fs::write(&path, "Ana\n").unwrap();
        let roster = DisplayNameRoster::load(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(roster.reload().is_err());
        // the previous list survives a failed reload
        assert_eq!(*roster.names(), vec!["Ana".to_string()]);
    }
}
