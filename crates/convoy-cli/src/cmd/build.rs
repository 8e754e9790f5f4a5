use crate::output::print_json;
use anyhow::{Context, Result};
use chrono::Utc;
use convoy_core::build::BuildExecutor;
use convoy_core::config::Config;
use convoy_core::record::{BuildEntry, RecordStore};
use convoy_core::registry::FsRegistry;
use convoy_core::repo::DesiredStateRepo;
use convoy_core::types::BuildStatus;
use std::path::Path;
use std::sync::Arc;

pub fn run(root: &Path, unit: &str, sha: &str, source: Option<&Path>, json: bool) -> Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let repo = Arc::new(DesiredStateRepo::load(root).context("failed to load desired state")?);
    let mut records = RecordStore::load(root).context("failed to load records")?;

    // Stand-in for the built image: the named source file, or bytes derived
    // from the revision id when none is given.
    let artifact_bytes = match source {
        Some(path) => std::fs::read(path)
            .with_context(|| format!("failed to read source '{}'", path.display()))?,
        None => sha.as_bytes().to_vec(),
    };

    let registry = Arc::new(FsRegistry::new(root));
    let executor = BuildExecutor::new(
        registry,
        repo.clone(),
        config.build.write_attempts,
        config.build.bot_identity.clone(),
    );

    match executor.run(unit, sha, &artifact_bytes) {
        Ok(report) => {
            repo.save(root)?;
            records.record_build(BuildEntry {
                unit: unit.to_string(),
                commit_sha: sha.to_string(),
                tag: report.artifact.tag.clone(),
                digest: Some(report.artifact.digest.clone()),
                revision: Some(report.revision),
                attempts: report.attempts,
                status: BuildStatus::Succeeded,
                timestamp: Utc::now(),
            });
            records.save(root)?;

            if json {
                print_json(&serde_json::json!({
                    "unit": unit,
                    "tag": report.artifact.tag,
                    "digest": report.artifact.digest,
                    "revision": report.revision,
                    "attempts": report.attempts,
                }))?;
            } else {
                println!(
                    "Built {unit}: tag {} ({}) recorded at revision {}",
                    report.artifact.tag, report.artifact.digest, report.revision
                );
            }
            Ok(())
        }
        Err(e) => {
            // The failed run is part of the operational record too.
            records.record_build(BuildEntry {
                unit: unit.to_string(),
                commit_sha: sha.to_string(),
                tag: String::new(),
                digest: None,
                revision: None,
                attempts: convoy_core::build::attempts_spent(&e),
                status: BuildStatus::Failed,
                timestamp: Utc::now(),
            });
            records.save(root)?;
            Err(e).context("build failed")
        }
    }
}
