//! I/O boundary traits for testability
//!
//! The ledger is the only thing this tool persists. Services talk to a
//! `LedgerStore`, so tests can swap the JSON file for an in-memory mock.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, instrument};

use crate::domain::Ledger;

/// Persistence of the ledger snapshot.
pub trait LedgerStore: Send + Sync {
    /// Load the ledger; `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> io::Result<Option<Ledger>>;

    /// Replace the stored ledger.
    fn save(&self, ledger: &Ledger) -> io::Result<()>;

    /// Human-readable location, used in messages.
    fn location(&self) -> PathBuf;
}

// ============================================================
// REAL IMPLEMENTATIONS
// ============================================================

/// Ledger stored as pretty-printed JSON in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LedgerStore for JsonFileStore {
    #[instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    fn load(&self) -> io::Result<Option<Ledger>> {
        if !self.path.exists() {
            debug!("no ledger file yet");
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let ledger: Ledger = serde_json::from_str(&content)?;
        debug!(
            "loaded {} owners, {} persons, {} documents",
            ledger.owners.len(),
            ledger.persons.len(),
            ledger.documents.len()
        );
        Ok(Some(ledger))
    }

    /// Write through a temp file in the target directory, then rename over the ledger.
    #[instrument(level = "debug", skip(self, ledger), fields(path = %self.path.display()))]
    fn save(&self, ledger: &Ledger) -> io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let json = serde_json::to_string_pretty(ledger)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.write_all(b"\n")?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn location(&self) -> PathBuf {
        self.path.clone()
    }
}
