use crate::error::{ConvoyError, Result};
use crate::io;
use crate::manifest::UnitManifest;
use crate::paths;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// RevisionEntry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionEntry {
    pub revision: u64,
    pub unit: String,
    pub manifest: UnitManifest,
    pub author: String,
    pub written_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RepoData {
    #[serde(default)]
    history: Vec<RevisionEntry>,
}

impl RepoData {
    fn latest_for(&self, unit: &str) -> Option<&RevisionEntry> {
        self.history.iter().rev().find(|e| e.unit == unit)
    }

    fn next_revision(&self) -> u64 {
        self.history.last().map(|e| e.revision).unwrap_or(0) + 1
    }
}

// ---------------------------------------------------------------------------
// DesiredStateRepo
// ---------------------------------------------------------------------------

/// Append-only revision history over a keyed mapping of deployable unit to
/// manifest. Revisions are totally ordered across the repository; writes go
/// through compare-and-write, the system's only transactional boundary.
/// Interior locking lets the build executor and operators race from
/// concurrent tasks against a shared handle.
#[derive(Debug, Default)]
pub struct DesiredStateRepo {
    inner: Mutex<RepoData>,
}

impl DesiredStateRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::desired_path(root);
        if !path.exists() {
            return Err(ConvoyError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let repo: RepoData = serde_yaml::from_str(&data)?;
        Ok(Self {
            inner: Mutex::new(repo),
        })
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let data = {
            let inner = self.inner.lock().expect("repo lock poisoned");
            serde_yaml::to_string(&*inner)?
        };
        io::atomic_write(&paths::desired_path(root), data.as_bytes())
    }

    /// First-time registration of a unit at revision 1 (of this unit's
    /// lineage; revision ids stay globally monotonic).
    pub fn register(&self, unit: &str, manifest: UnitManifest, author: &str) -> Result<u64> {
        paths::validate_unit_name(unit)?;
        manifest.validate(unit)?;
        let mut inner = self.inner.lock().expect("repo lock poisoned");
        if inner.latest_for(unit).is_some() {
            return Err(ConvoyError::UnitExists(unit.to_string()));
        }
        let revision = inner.next_revision();
        inner.history.push(RevisionEntry {
            revision,
            unit: unit.to_string(),
            manifest,
            author: author.to_string(),
            written_at: Utc::now(),
        });
        Ok(revision)
    }

    /// Latest manifest and revision id for a unit.
    pub fn read_latest(&self, unit: &str) -> Result<(UnitManifest, u64)> {
        let inner = self.inner.lock().expect("repo lock poisoned");
        let entry = inner
            .latest_for(unit)
            .ok_or_else(|| ConvoyError::UnitNotFound(unit.to_string()))?;
        Ok((entry.manifest.clone(), entry.revision))
    }

    /// Compare-and-write: succeeds only when `expected_revision` is still
    /// the unit's latest. Two racing writers against the same expected
    /// revision never both succeed; the loser gets `RevisionConflict` and
    /// must rebase onto the new latest.
    pub fn compare_and_write(
        &self,
        unit: &str,
        expected_revision: u64,
        manifest: UnitManifest,
        author: &str,
    ) -> Result<u64> {
        manifest.validate(unit)?;
        let mut inner = self.inner.lock().expect("repo lock poisoned");
        let latest = inner
            .latest_for(unit)
            .ok_or_else(|| ConvoyError::UnitNotFound(unit.to_string()))?
            .revision;
        if latest != expected_revision {
            return Err(ConvoyError::RevisionConflict {
                unit: unit.to_string(),
                expected: expected_revision,
                latest,
            });
        }
        let revision = inner.next_revision();
        inner.history.push(RevisionEntry {
            revision,
            unit: unit.to_string(),
            manifest,
            author: author.to_string(),
            written_at: Utc::now(),
        });
        Ok(revision)
    }

    /// Full revision history for one unit, oldest first.
    pub fn history(&self, unit: &str) -> Vec<RevisionEntry> {
        let inner = self.inner.lock().expect("repo lock poisoned");
        inner
            .history
            .iter()
            .filter(|e| e.unit == unit)
            .cloned()
            .collect()
    }

    /// All registered unit names, in first-registration order.
    pub fn units(&self) -> Vec<String> {
        let inner = self.inner.lock().expect("repo lock poisoned");
        let mut units = Vec::new();
        for entry in &inner.history {
            if !units.contains(&entry.unit) {
                units.push(entry.unit.clone());
            }
        }
        units
    }
}

// ---------------------------------------------------------------------------
// DesiredStore
// ---------------------------------------------------------------------------

/// The slice of the repository the build executor writes through. A trait
/// so conflict behavior can be injected in tests.
pub trait DesiredStore: Send + Sync {
    fn read_latest(&self, unit: &str) -> Result<(UnitManifest, u64)>;
    fn compare_and_write(
        &self,
        unit: &str,
        expected_revision: u64,
        manifest: UnitManifest,
        author: &str,
    ) -> Result<u64>;
}

impl DesiredStore for DesiredStateRepo {
    fn read_latest(&self, unit: &str) -> Result<(UnitManifest, u64)> {
        DesiredStateRepo::read_latest(self, unit)
    }

    fn compare_and_write(
        &self,
        unit: &str,
        expected_revision: u64,
        manifest: UnitManifest,
        author: &str,
    ) -> Result<u64> {
        DesiredStateRepo::compare_and_write(self, unit, expected_revision, manifest, author)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::UnitManifest;
    use std::sync::Arc;

    fn manifest(tag: &str) -> UnitManifest {
        UnitManifest::new("registry.example.com/quote-app", tag, 5000, "quotes.example.com")
    }

    #[test]
    fn register_and_read_latest() {
        let repo = DesiredStateRepo::new();
        let rev = repo.register("quote-app", manifest("v1"), "alice").unwrap();
        assert_eq!(rev, 1);
        let (m, latest) = repo.read_latest("quote-app").unwrap();
        assert_eq!(m.image.tag, "v1");
        assert_eq!(latest, 1);
    }

    #[test]
    fn register_twice_fails() {
        let repo = DesiredStateRepo::new();
        repo.register("quote-app", manifest("v1"), "alice").unwrap();
        assert!(matches!(
            repo.register("quote-app", manifest("v1"), "alice"),
            Err(ConvoyError::UnitExists(_))
        ));
    }

    #[test]
    fn cas_succeeds_against_latest_only() {
        let repo = DesiredStateRepo::new();
        let r1 = repo.register("quote-app", manifest("v1"), "alice").unwrap();
        let r2 = repo
            .compare_and_write("quote-app", r1, manifest("abc123f"), "convoy-bot")
            .unwrap();
        assert!(r2 > r1);

        // Stale expected revision loses.
        let err = repo
            .compare_and_write("quote-app", r1, manifest("def456a"), "bob")
            .unwrap_err();
        match err {
            ConvoyError::RevisionConflict { expected, latest, .. } => {
                assert_eq!(expected, r1);
                assert_eq!(latest, r2);
            }
            other => panic!("expected RevisionConflict, got {other}"),
        }
    }

    #[test]
    fn concurrent_writers_exactly_one_succeeds() {
        let repo = Arc::new(DesiredStateRepo::new());
        let base = repo.register("quote-app", manifest("v1"), "alice").unwrap();

        let handles: Vec<_> = ["aaa1111", "bbb2222"]
            .into_iter()
            .map(|tag| {
                let repo = Arc::clone(&repo);
                std::thread::spawn(move || {
                    repo.compare_and_write("quote-app", base, manifest(tag), "writer")
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let wins = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(ConvoyError::RevisionConflict { .. })))
            .count();
        assert_eq!(wins, 1);
        assert_eq!(conflicts, 1);

        // Loser retries against the new latest and succeeds.
        let (_, latest) = repo.read_latest("quote-app").unwrap();
        repo.compare_and_write("quote-app", latest, manifest("ccc3333"), "writer")
            .unwrap();
    }

    #[test]
    fn revisions_are_globally_monotonic() {
        let repo = DesiredStateRepo::new();
        let a = repo.register("app-a", manifest("v1"), "alice").unwrap();
        let b = repo.register("app-b", manifest("v1"), "alice").unwrap();
        let a2 = repo
            .compare_and_write("app-a", a, manifest("v2"), "alice")
            .unwrap();
        assert!(a < b && b < a2);
        assert_eq!(repo.units(), vec!["app-a".to_string(), "app-b".to_string()]);
    }

    #[test]
    fn history_is_per_unit_and_ordered() {
        let repo = DesiredStateRepo::new();
        let r1 = repo.register("quote-app", manifest("v1"), "alice").unwrap();
        repo.register("other", manifest("v1"), "alice").unwrap();
        repo.compare_and_write("quote-app", r1, manifest("v2"), "bob")
            .unwrap();

        let history = repo.history("quote-app");
        assert_eq!(history.len(), 2);
        assert!(history[0].revision < history[1].revision);
        assert_eq!(history[1].manifest.image.tag, "v2");
    }

    #[test]
    fn persistence_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let repo = DesiredStateRepo::new();
        repo.register("quote-app", manifest("v1"), "alice").unwrap();
        repo.save(dir.path()).unwrap();

        let loaded = DesiredStateRepo::load(dir.path()).unwrap();
        let (m, rev) = loaded.read_latest("quote-app").unwrap();
        assert_eq!(m.image.tag, "v1");
        assert_eq!(rev, 1);
    }

    #[test]
    fn load_without_init_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(matches!(
            DesiredStateRepo::load(dir.path()),
            Err(ConvoyError::NotInitialized)
        ));
    }

    #[test]
    fn invalid_manifest_never_written() {
        let repo = DesiredStateRepo::new();
        let rev = repo.register("quote-app", manifest("v1"), "alice").unwrap();
        let mut bad = manifest("v2");
        bad.replica_count = 0;
        assert!(repo
            .compare_and_write("quote-app", rev, bad, "alice")
            .is_err());
        let (_, latest) = repo.read_latest("quote-app").unwrap();
        assert_eq!(latest, rev);
    }
}
