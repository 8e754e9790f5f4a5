use axum::extract::State;
use axum::Json;
use chrono::Utc;
use convoy_core::build::BuildExecutor;
use convoy_core::config::Config;
use convoy_core::record::{BuildEntry, RecordStore};
use convoy_core::registry::FsRegistry;
use convoy_core::repo::DesiredStateRepo;
use convoy_core::trigger::{CommitEvent, TriggerFilter};
use convoy_core::types::BuildStatus;
use convoy_core::ConvoyError;
use std::sync::Arc;

use crate::error::AppError;
use crate::state::AppState;

#[derive(serde::Deserialize)]
pub struct WebhookBody {
    pub branch: String,
    pub commit_sha: String,
    #[serde(default)]
    pub changed_paths: Vec<String>,
    #[serde(default)]
    pub author: Option<String>,
}

/// POST /api/webhook — evaluate a commit event and, when admitted, run the
/// build executor for every registered unit.
///
/// Malformed events return 400; rejections return 200 with the reject
/// decision in the body, since a filtered-out commit is a normal outcome.
pub async fn receive(
    State(app): State<AppState>,
    Json(body): Json<WebhookBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.root.clone();

    // Each request loads its own snapshot of the desired-state repository
    // and saves it whole. Serializing the cycle makes the repository's
    // compare-and-write the arbiter between requests: a later request
    // rebases onto the earlier one's write instead of clobbering it.
    let _write_guard = app.build_lock.lock().await;
    let result = tokio::task::spawn_blocking(move || {
        let config = Config::load(&root)?;
        let filter = TriggerFilter::new(&config.trigger)?;

        let event = CommitEvent {
            branch: body.branch,
            commit_sha: body.commit_sha,
            changed_paths: body.changed_paths,
            author: body.author,
        };
        let decision = filter.evaluate(&event)?;
        if !decision.is_admit() {
            tracing::info!(sha = %event.commit_sha, "webhook rejected: {decision}");
            return Ok::<_, ConvoyError>(serde_json::json!({
                "decision": decision,
                "builds": [],
            }));
        }

        let repo = Arc::new(DesiredStateRepo::load(&root)?);
        let mut records = RecordStore::load(&root)?;
        let executor = BuildExecutor::new(
            Arc::new(FsRegistry::new(&root)),
            repo.clone(),
            config.build.write_attempts,
            config.build.bot_identity.clone(),
        );

        let mut builds = Vec::new();
        for unit in repo.units() {
            match executor.run(&unit, &event.commit_sha, event.commit_sha.as_bytes()) {
                Ok(report) => {
                    records.record_build(BuildEntry {
                        unit: unit.clone(),
                        commit_sha: event.commit_sha.clone(),
                        tag: report.artifact.tag.clone(),
                        digest: Some(report.artifact.digest.clone()),
                        revision: Some(report.revision),
                        attempts: report.attempts,
                        status: BuildStatus::Succeeded,
                        timestamp: Utc::now(),
                    });
                    builds.push(serde_json::json!({
                        "unit": unit,
                        "status": "succeeded",
                        "tag": report.artifact.tag,
                        "digest": report.artifact.digest,
                        "revision": report.revision,
                        "attempts": report.attempts,
                    }));
                }
                Err(e) => {
                    tracing::warn!(unit, "webhook build failed: {e}");
                    records.record_build(BuildEntry {
                        unit: unit.clone(),
                        commit_sha: event.commit_sha.clone(),
                        tag: String::new(),
                        digest: None,
                        revision: None,
                        attempts: convoy_core::build::attempts_spent(&e),
                        status: BuildStatus::Failed,
                        timestamp: Utc::now(),
                    });
                    builds.push(serde_json::json!({
                        "unit": unit,
                        "status": "failed",
                        "error": e.to_string(),
                    }));
                }
            }
        }
        repo.save(&root)?;
        records.save(&root)?;

        Ok(serde_json::json!({
            "decision": decision,
            "builds": builds,
        }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    drop(_write_guard);

    let _ = app.event_tx.send(());
    Ok(Json(result))
}
