use crate::error::{ConvoyError, Result};
use crate::io;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// TriggerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Regex a branch must match for a commit to be considered for a build.
    #[serde(default = "default_release_branch")]
    pub release_branch: String,

    /// Path globs that never constitute an application change on their own.
    /// A commit is admitted unless every changed path matches one of these.
    #[serde(default = "default_ignore_paths")]
    pub ignore_paths: Vec<String>,

    /// Commit authors treated as machine identities. Events from these
    /// authors are convergence commits and never trigger a build.
    #[serde(default = "default_bot_authors")]
    pub bot_authors: Vec<String>,
}

fn default_release_branch() -> String {
    "^main$".to_string()
}

fn default_ignore_paths() -> Vec<String> {
    vec![
        "charts/**".to_string(),
        "infra/**".to_string(),
        "docs/**".to_string(),
        "*.md".to_string(),
        ".convoy/**".to_string(),
    ]
}

fn default_bot_authors() -> Vec<String> {
    vec!["convoy-bot".to_string()]
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            release_branch: default_release_branch(),
            ignore_paths: default_ignore_paths(),
            bot_authors: default_bot_authors(),
        }
    }
}

// ---------------------------------------------------------------------------
// BuildConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Total compare-and-write attempts (first try plus rebases) before a
    /// build run is reported FAILED.
    #[serde(default = "default_write_attempts")]
    pub write_attempts: u32,

    /// Author recorded on desired-state writes made by the build executor.
    #[serde(default = "default_bot_identity")]
    pub bot_identity: String,
}

fn default_write_attempts() -> u32 {
    3
}

fn default_bot_identity() -> String {
    "convoy-bot".to_string()
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            write_attempts: default_write_attempts(),
            bot_identity: default_bot_identity(),
        }
    }
}

// ---------------------------------------------------------------------------
// ReconcilerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// How long a unit may stay Progressing before it is marked Degraded.
    #[serde(default = "default_health_window")]
    pub health_window_secs: u64,

    #[serde(default = "default_backoff_base")]
    pub backoff_base_secs: u64,

    #[serde(default = "default_backoff_max")]
    pub backoff_max_secs: u64,
}

fn default_poll_interval() -> u64 {
    5
}

fn default_health_window() -> u64 {
    300
}

fn default_backoff_base() -> u64 {
    2
}

fn default_backoff_max() -> u64 {
    60
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            health_window_secs: default_health_window(),
            backoff_base_secs: default_backoff_base(),
            backoff_max_secs: default_backoff_max(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub trigger: TriggerConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(ConvoyError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let config: Config = serde_yaml::from_str(&data)?;
        Ok(config)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        io::atomic_write(&path, data.as_bytes())
    }

    /// Check everything that can fail lazily at runtime: regex and glob
    /// compilation, zero-valued windows. Returns human-readable problems.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if let Err(e) = regex::Regex::new(&self.trigger.release_branch) {
            problems.push(format!(
                "trigger.release_branch is not a valid regex: {e}"
            ));
        }
        for glob in &self.trigger.ignore_paths {
            if glob.trim().is_empty() {
                problems.push("trigger.ignore_paths contains an empty glob".to_string());
            }
        }
        if self.build.write_attempts == 0 {
            problems.push("build.write_attempts must be at least 1".to_string());
        }
        if self.reconciler.poll_interval_secs == 0 {
            problems.push("reconciler.poll_interval_secs must be at least 1".to_string());
        }
        if self.reconciler.health_window_secs == 0 {
            problems.push("reconciler.health_window_secs must be at least 1".to_string());
        }
        if self.reconciler.backoff_base_secs > self.reconciler.backoff_max_secs {
            problems.push(
                "reconciler.backoff_base_secs exceeds reconciler.backoff_max_secs".to_string(),
            );
        }

        problems
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_empty());
        assert_eq!(config.reconciler.health_window_secs, 300);
        assert_eq!(config.build.write_attempts, 3);
    }

    #[test]
    fn roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.trigger.release_branch = "^release/.*$".to_string();
        config.reconciler.poll_interval_secs = 1;
        config.save(dir.path()).unwrap();

        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.trigger.release_branch, "^release/.*$");
        assert_eq!(loaded.reconciler.poll_interval_secs, 1);
    }

    #[test]
    fn load_without_init_fails() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Config::load(dir.path()),
            Err(ConvoyError::NotInitialized)
        ));
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = "trigger:\n  release_branch: '^main$'\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.build.write_attempts, 3);
        assert!(config
            .trigger
            .ignore_paths
            .iter()
            .any(|g| g == "charts/**"));
    }

    #[test]
    fn validate_flags_bad_regex_and_zeroes() {
        let mut config = Config::default();
        config.trigger.release_branch = "([".to_string();
        config.build.write_attempts = 0;
        config.reconciler.health_window_secs = 0;
        let problems = config.validate();
        assert_eq!(problems.len(), 3);
    }
}
