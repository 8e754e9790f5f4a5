use axum::extract::{Query, State};
use axum::Json;
use convoy_core::ingress::IngressRouter;
use convoy_core::ConvoyError;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/ingress — the published routing table.
pub async fn get_routes(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.root.clone();
    let result = tokio::task::spawn_blocking(move || {
        let router = IngressRouter::load(&root)?;
        let routes: Vec<serde_json::Value> = router
            .routes()
            .iter()
            .map(|(key, route)| {
                serde_json::json!({
                    "host": key.host,
                    "path_prefix": key.path_prefix,
                    "unit": route.unit,
                    "service_port": route.service_port,
                    "endpoints": route.endpoints,
                })
            })
            .collect();
        Ok::<_, ConvoyError>(serde_json::json!(routes))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

#[derive(serde::Deserialize)]
pub struct ResolveQuery {
    pub host: String,
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_path() -> String {
    "/".to_string()
}

/// GET /api/ingress/resolve?host=&path= — longest-prefix route lookup.
pub async fn resolve(
    State(app): State<AppState>,
    Query(query): Query<ResolveQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.root.clone();
    let resolved = tokio::task::spawn_blocking(move || {
        let router = IngressRouter::load(&root)?;
        Ok::<_, ConvoyError>(router.resolve(&query.host, &query.path))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    match resolved {
        Some(route) => Ok(Json(serde_json::json!(route))),
        None => Err(AppError::not_found("no route matches the given host and path")),
    }
}
