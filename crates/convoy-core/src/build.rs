use crate::artifact::{self, Artifact};
use crate::error::{ConvoyError, Result};
use crate::registry::ImageRegistry;
use crate::repo::DesiredStore;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// BuildReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub artifact: Artifact,
    /// Desired-state revision created by the tag write.
    pub revision: u64,
    /// Compare-and-write attempts used (1 means no conflict).
    pub attempts: u32,
}

// ---------------------------------------------------------------------------
// BuildExecutor
// ---------------------------------------------------------------------------

/// Runs on an admitted commit: derives a deterministic tag, publishes the
/// artifact, then issues exactly one desired-state write substituting the
/// tag for the target unit.
///
/// Ordering is the atomicity guarantee: registry publish failure aborts
/// before any desired-state mutation, and the tag write itself is a
/// whole-manifest compare-and-write, so it either lands fully or not at
/// all. Conflicting writes are rebased and retried within a bounded budget.
pub struct BuildExecutor {
    registry: Arc<dyn ImageRegistry>,
    store: Arc<dyn DesiredStore>,
    write_attempts: u32,
    bot_identity: String,
}

impl BuildExecutor {
    pub fn new(
        registry: Arc<dyn ImageRegistry>,
        store: Arc<dyn DesiredStore>,
        write_attempts: u32,
        bot_identity: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            store,
            write_attempts: write_attempts.max(1),
            bot_identity: bot_identity.into(),
        }
    }

    pub fn run(&self, unit: &str, commit_sha: &str, artifact_bytes: &[u8]) -> Result<BuildReport> {
        let tag = artifact::tag_for_revision(commit_sha)?;

        let digest = self.registry.push(artifact_bytes, &tag)?;
        let published = Artifact::new(tag.clone(), digest, commit_sha);
        tracing::info!(unit, tag = %published.tag, "artifact published");

        let mut attempts = 0;
        while attempts < self.write_attempts {
            attempts += 1;
            let (manifest, revision) = self.store.read_latest(unit)?;
            let next = manifest.with_image_tag(&tag);
            match self
                .store
                .compare_and_write(unit, revision, next, &self.bot_identity)
            {
                Ok(new_revision) => {
                    tracing::info!(unit, revision = new_revision, "image tag recorded");
                    return Ok(BuildReport {
                        artifact: published,
                        revision: new_revision,
                        attempts,
                    });
                }
                Err(ConvoyError::RevisionConflict { latest, .. }) => {
                    tracing::warn!(unit, latest, attempt = attempts, "write conflict, rebasing");
                }
                Err(e) => return Err(e),
            }
        }

        Err(ConvoyError::RetryBudgetExhausted {
            unit: unit.to_string(),
            attempts,
        })
    }
}

/// Compare-and-write attempts consumed by a failed run. Zero for failures
/// that abort before the first write (bad revision id, registry down).
pub fn attempts_spent(error: &ConvoyError) -> u32 {
    match error {
        ConvoyError::RetryBudgetExhausted { attempts, .. } => *attempts,
        _ => 0,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
