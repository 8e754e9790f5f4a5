use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvoyError {
    #[error("not initialized: run 'convoy init'")]
    NotInitialized,

    #[error("unit not found: {0}")]
    UnitNotFound(String),

    #[error("unit already exists: {0}")]
    UnitExists(String),

    #[error("invalid unit name '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidUnitName(String),

    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("invalid manifest for '{unit}': {reason}")]
    InvalidManifest { unit: String, reason: String },

    #[error("revision conflict on '{unit}': expected {expected}, latest is {latest}")]
    RevisionConflict {
        unit: String,
        expected: u64,
        latest: u64,
    },

    #[error("write retry budget exhausted for '{unit}' after {attempts} attempts")]
    RetryBudgetExhausted { unit: String, attempts: u32 },

    #[error("registry unavailable: {0}")]
    RegistryUnavailable(String),

    #[error("build failed for revision {sha}: {reason}")]
    BuildFailed { sha: String, reason: String },

    #[error("platform rejected manifest for '{unit}': {reason}")]
    ApplyRejected { unit: String, reason: String },

    #[error("health window ({window_secs}s) elapsed before '{unit}' converged")]
    HealthTimeout { unit: String, window_secs: u64 },

    #[error("invalid sync phase: {0}")]
    InvalidPhase(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConvoyError>;
