use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use convoy_core::ConvoyError;

/// Private sentinel error type used to carry an explicit HTTP 404 through
/// the `anyhow::Error` chain without touching the `ConvoyError` enum.
#[derive(Debug)]
struct NotFoundError(String);

impl std::fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for NotFoundError {}

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// Construct a 404 Not Found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self(NotFoundError(msg.into()).into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(n) = self.0.downcast_ref::<NotFoundError>() {
            let body = serde_json::json!({ "error": n.0.clone() });
            return (StatusCode::NOT_FOUND, axum::Json(body)).into_response();
        }

        let status = if let Some(e) = self.0.downcast_ref::<ConvoyError>() {
            match e {
                ConvoyError::NotInitialized
                | ConvoyError::MalformedEvent(_)
                | ConvoyError::InvalidUnitName(_)
                | ConvoyError::InvalidPhase(_) => StatusCode::BAD_REQUEST,
                ConvoyError::UnitNotFound(_) => StatusCode::NOT_FOUND,
                ConvoyError::UnitExists(_)
                | ConvoyError::RevisionConflict { .. }
                | ConvoyError::RetryBudgetExhausted { .. } => StatusCode::CONFLICT,
                ConvoyError::InvalidManifest { .. }
                | ConvoyError::BuildFailed { .. }
                | ConvoyError::ApplyRejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                ConvoyError::RegistryUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                ConvoyError::HealthTimeout { .. }
                | ConvoyError::Io(_)
                | ConvoyError::Yaml(_)
                | ConvoyError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
