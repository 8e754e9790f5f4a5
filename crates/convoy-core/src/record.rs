use crate::error::{ConvoyError, Result};
use crate::io;
use crate::paths;
use crate::types::{BuildStatus, SyncPhase};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

const HISTORY_LIMIT: usize = 200;

// ---------------------------------------------------------------------------
// ReconciliationRecord
// ---------------------------------------------------------------------------

/// Per-unit reconciliation status: which desired-state revision the loop is
/// converging toward (or has converged to), and how that is going.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationRecord {
    pub unit: String,
    /// Revision currently being converged toward, or the last one reached.
    pub revision: u64,
    pub phase: SyncPhase,
    /// Convergence attempts for the current revision.
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Supporting history entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionEntry {
    pub unit: String,
    pub from: SyncPhase,
    pub to: SyncPhase,
    pub revision: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildEntry {
    pub unit: String,
    pub commit_sha: String,
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<u64>,
    pub attempts: u32,
    pub status: BuildStatus,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// RecordStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordStore {
    #[serde(default = "default_version")]
    pub version: u32,
    pub records: Vec<ReconciliationRecord>,
    #[serde(default)]
    pub transitions: Vec<TransitionEntry>,
    #[serde(default)]
    pub builds: Vec<BuildEntry>,
    pub last_updated: DateTime<Utc>,
}

fn default_version() -> u32 {
    1
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore {
    pub fn new() -> Self {
        Self {
            version: 1,
            records: Vec::new(),
            transitions: Vec::new(),
            builds: Vec::new(),
            last_updated: Utc::now(),
        }
    }

    // ---------------------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------------------

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::records_path(root);
        if !path.exists() {
            return Err(ConvoyError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let store: RecordStore = serde_yaml::from_str(&data)?;
        Ok(store)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::records_path(root);
        let data = serde_yaml::to_string(self)?;
        io::atomic_write(&path, data.as_bytes())
    }

    // ---------------------------------------------------------------------------
    // Lookups
    // ---------------------------------------------------------------------------

    pub fn record(&self, unit: &str) -> Option<&ReconciliationRecord> {
        self.records.iter().find(|r| r.unit == unit)
    }

    pub fn phase(&self, unit: &str) -> SyncPhase {
        self.record(unit).map(|r| r.phase).unwrap_or(SyncPhase::Unknown)
    }

    // ---------------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------------

    /// Ensure a record exists for `unit`, created in `Unknown` at the given
    /// revision when first seen.
    pub fn ensure(&mut self, unit: &str, revision: u64) -> &mut ReconciliationRecord {
        if self.record(unit).is_none() {
            let now = Utc::now();
            self.records.push(ReconciliationRecord {
                unit: unit.to_string(),
                revision,
                phase: SyncPhase::Unknown,
                attempts: 0,
                last_error: None,
                started_at: now,
                updated_at: now,
            });
            self.last_updated = now;
        }
        self.records
            .iter_mut()
            .find(|r| r.unit == unit)
            .expect("record just ensured")
    }

    /// Move a unit to `phase` for `revision`, appending to the transition
    /// history. Entering a new revision resets the attempt counter; entering
    /// `Degraded` increments it.
    pub fn transition(
        &mut self,
        unit: &str,
        phase: SyncPhase,
        revision: u64,
        note: Option<String>,
    ) {
        let now = Utc::now();
        let record = self.ensure(unit, revision);
        let from = record.phase;

        if record.revision != revision {
            record.revision = revision;
            record.attempts = 0;
            record.started_at = now;
        }
        if phase == SyncPhase::Degraded {
            record.attempts += 1;
            record.last_error = note.clone();
        }
        if phase == SyncPhase::Synced {
            record.last_error = None;
        }
        record.phase = phase;
        record.updated_at = now;

        self.transitions.push(TransitionEntry {
            unit: unit.to_string(),
            from,
            to: phase,
            revision,
            timestamp: now,
            note,
        });
        if self.transitions.len() > HISTORY_LIMIT {
            self.transitions
                .drain(..self.transitions.len() - HISTORY_LIMIT);
        }
        self.last_updated = now;
    }

    pub fn record_build(&mut self, entry: BuildEntry) {
        self.builds.push(entry);
        if self.builds.len() > HISTORY_LIMIT {
            self.builds.drain(..self.builds.len() - HISTORY_LIMIT);
        }
        self.last_updated = Utc::now();
    }

    pub fn last_build(&self, unit: &str) -> Option<&BuildEntry> {
        self.builds.iter().rev().find(|b| b.unit == unit)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
