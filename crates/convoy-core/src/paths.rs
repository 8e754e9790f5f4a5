use crate::error::{ConvoyError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const CONVOY_DIR: &str = ".convoy";
pub const REGISTRY_DIR: &str = ".convoy/registry";

pub const CONFIG_FILE: &str = ".convoy/config.yaml";
pub const DESIRED_FILE: &str = ".convoy/desired.yaml";
pub const RECORDS_FILE: &str = ".convoy/records.yaml";
pub const INGRESS_FILE: &str = ".convoy/ingress.yaml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn convoy_dir(root: &Path) -> PathBuf {
    root.join(CONVOY_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn desired_path(root: &Path) -> PathBuf {
    root.join(DESIRED_FILE)
}

pub fn records_path(root: &Path) -> PathBuf {
    root.join(RECORDS_FILE)
}

pub fn registry_dir(root: &Path) -> PathBuf {
    root.join(REGISTRY_DIR)
}

pub fn ingress_path(root: &Path) -> PathBuf {
    root.join(INGRESS_FILE)
}

// ---------------------------------------------------------------------------
// Unit-name validation
// ---------------------------------------------------------------------------

static UNIT_RE: OnceLock<Regex> = OnceLock::new();

fn unit_re() -> &'static Regex {
    UNIT_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").unwrap())
}

/// Deployable unit names double as service names and file keys, so they
/// follow the DNS-label shape: lowercase alphanumeric with inner hyphens.
pub fn validate_unit_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 63 || !unit_re().is_match(name) {
        return Err(ConvoyError::InvalidUnitName(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
