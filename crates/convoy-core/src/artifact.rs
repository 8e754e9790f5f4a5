use crate::error::{ConvoyError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Artifact
// ---------------------------------------------------------------------------

/// An immutable built unit of deployable software. Produced exactly once
/// per successful build; referenced by desired state, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub tag: String,
    pub digest: String,
    pub source_sha: String,
    pub published_at: DateTime<Utc>,
}

impl Artifact {
    pub fn new(tag: impl Into<String>, digest: impl Into<String>, source_sha: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            digest: digest.into(),
            source_sha: source_sha.into(),
            published_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tag derivation
// ---------------------------------------------------------------------------

const TAG_LEN: usize = 7;

/// Derive the deterministic image tag for a source revision: the lowercase
/// 7-character prefix of the commit sha, the same short form `git rev-parse
/// --short` prints.
pub fn tag_for_revision(commit_sha: &str) -> Result<String> {
    let sha = commit_sha.trim().to_ascii_lowercase();
    if sha.len() < TAG_LEN || !sha.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ConvoyError::BuildFailed {
            sha: commit_sha.to_string(),
            reason: "not a hex revision id".to_string(),
        });
    }
    Ok(sha[..TAG_LEN].to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
