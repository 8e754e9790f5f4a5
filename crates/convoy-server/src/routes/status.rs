use axum::extract::State;
use axum::Json;
use convoy_core::record::RecordStore;
use convoy_core::ConvoyError;

use crate::error::AppError;
use crate::state::AppState;

/// GET /healthz — liveness probe.
pub async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /api/status — reconciliation records for all units.
pub async fn get_status(
    State(app): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.root.clone();
    let result = tokio::task::spawn_blocking(move || {
        let records = RecordStore::load(&root)?;
        let units: Vec<serde_json::Value> = records
            .records
            .iter()
            .map(|r| {
                serde_json::json!({
                    "unit": r.unit,
                    "phase": r.phase,
                    "revision": r.revision,
                    "attempts": r.attempts,
                    "last_error": r.last_error,
                    "last_build": records.last_build(&r.unit),
                    "updated_at": r.updated_at,
                })
            })
            .collect();
        Ok::<_, ConvoyError>(serde_json::json!({
            "units": units,
            "last_updated": records.last_updated,
        }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}
