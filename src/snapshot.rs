//! Persistence of the last tracked session, so a restarted client can
//! re-view it on the ledger.

use crate::ledger::SessionId;
use crate::session::Role;
use derive_more::{Display, Error};
use derive_new::new;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// What is remembered about a session between runs.
///
/// Only the id is used to resume; the role is informational and is
/// re-derived from the ledger record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, new)]
pub struct SessionSnapshot {
    /// Session id.
    pub id: SessionId,
    /// Role held when the snapshot was taken.
    pub role: Role,
}

/// File-backed store for a single [`SessionSnapshot`].
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// Creates a store writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `snapshot`, replacing any previous one.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn save(&self, snapshot: &SessionSnapshot) -> Result<(), SnapshotError> {
        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| SnapshotError::new(format!("Failed to encode snapshot: {}", e)))?;
        std::fs::write(&self.path, json)
            .map_err(|e| SnapshotError::new(format!("Failed to write snapshot: {}", e)))?;
        info!(session_id = %snapshot.id, "Snapshot saved");
        Ok(())
    }

    /// Reads the stored snapshot; `None` when nothing has been saved.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> Result<Option<SessionSnapshot>, SnapshotError> {
        if !self.path.exists() {
            debug!("No snapshot on disk");
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| SnapshotError::new(format!("Failed to read snapshot: {}", e)))?;
        let snapshot = serde_json::from_str(&content)
            .map_err(|e| SnapshotError::new(format!("Failed to parse snapshot: {}", e)))?;
        Ok(Some(snapshot))
    }

    /// Mirrors a machine's current snapshot: saves it, or clears the file
    /// once nothing is tracked.
    pub fn sync(&self, snapshot: Option<&SessionSnapshot>) -> Result<(), SnapshotError> {
        match snapshot {
            Some(snapshot) => self.save(snapshot),
            None => self.clear(),
        }
    }

    /// Removes the stored snapshot, if any.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn clear(&self) -> Result<(), SnapshotError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SnapshotError::new(format!("Failed to remove snapshot: {}", e))),
        }
    }
}

/// Snapshot persistence error.
#[derive(Debug, Clone, Display, Error)]
#[display("Snapshot error: {} at {}:{}", message, file, line)]
pub struct SnapshotError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl SnapshotError {
    /// Creates a new snapshot error with caller location tracking.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}
