use axum::extract::{Path, State};
use axum::Json;
use convoy_core::repo::DesiredStateRepo;
use convoy_core::ConvoyError;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/units — registered units with their latest manifests.
pub async fn list_units(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.root.clone();
    let result = tokio::task::spawn_blocking(move || {
        let repo = DesiredStateRepo::load(&root)?;
        let list: Vec<serde_json::Value> = repo
            .units()
            .iter()
            .map(|u| {
                let (manifest, revision) = repo.read_latest(u)?;
                Ok(serde_json::json!({
                    "unit": u,
                    "revision": revision,
                    "manifest": manifest,
                }))
            })
            .collect::<Result<_, ConvoyError>>()?;
        Ok::<_, ConvoyError>(serde_json::json!(list))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// GET /api/units/:name — latest manifest for one unit.
pub async fn get_unit(
    State(app): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.root.clone();
    let result = tokio::task::spawn_blocking(move || {
        let repo = DesiredStateRepo::load(&root)?;
        let (manifest, revision) = repo.read_latest(&name)?;
        Ok::<_, ConvoyError>(serde_json::json!({
            "unit": name,
            "revision": revision,
            "manifest": manifest,
        }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// GET /api/units/:name/history — full revision history for one unit.
pub async fn get_history(
    State(app): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.root.clone();
    let result = tokio::task::spawn_blocking(move || {
        let repo = DesiredStateRepo::load(&root)?;
        repo.read_latest(&name)?;
        Ok::<_, ConvoyError>(serde_json::json!(repo.history(&name)))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}
