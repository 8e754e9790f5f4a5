use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// SyncPhase
// ---------------------------------------------------------------------------

/// Per-unit reconciliation phase. `Unknown` is the initial phase before the
/// first observation; `Degraded` is reachable from `Progressing` (health
/// window elapsed, apply rejected) and from `Synced` (observed regression).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Unknown,
    OutOfSync,
    Progressing,
    Synced,
    Degraded,
}

impl SyncPhase {
    pub fn all() -> &'static [SyncPhase] {
        &[
            SyncPhase::Unknown,
            SyncPhase::OutOfSync,
            SyncPhase::Progressing,
            SyncPhase::Synced,
            SyncPhase::Degraded,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SyncPhase::Unknown => "unknown",
            SyncPhase::OutOfSync => "out_of_sync",
            SyncPhase::Progressing => "progressing",
            SyncPhase::Synced => "synced",
            SyncPhase::Degraded => "degraded",
        }
    }

    /// Terminal for a given revision: nothing left to do until desired
    /// state changes again.
    pub fn is_settled(self) -> bool {
        matches!(self, SyncPhase::Synced)
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SyncPhase {
    type Err = crate::error::ConvoyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(SyncPhase::Unknown),
            "out_of_sync" => Ok(SyncPhase::OutOfSync),
            "progressing" => Ok(SyncPhase::Progressing),
            "synced" => Ok(SyncPhase::Synced),
            "degraded" => Ok(SyncPhase::Degraded),
            _ => Err(crate::error::ConvoyError::InvalidPhase(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// TriggerDecision
// ---------------------------------------------------------------------------

/// Outcome of admission filtering over a commit event. Computed per event,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum TriggerDecision {
    Admit,
    Reject { reason: String },
}

impl TriggerDecision {
    pub fn reject(reason: impl Into<String>) -> Self {
        TriggerDecision::Reject {
            reason: reason.into(),
        }
    }

    pub fn is_admit(&self) -> bool {
        matches!(self, TriggerDecision::Admit)
    }
}

impl fmt::Display for TriggerDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerDecision::Admit => f.write_str("admit"),
            TriggerDecision::Reject { reason } => write!(f, "reject: {reason}"),
        }
    }
}

// ---------------------------------------------------------------------------
// BuildStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Succeeded,
    Failed,
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildStatus::Succeeded => "succeeded",
            BuildStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
