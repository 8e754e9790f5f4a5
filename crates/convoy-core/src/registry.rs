use crate::error::{ConvoyError, Result};
use crate::io;
use crate::paths;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// ImageRegistry
// ---------------------------------------------------------------------------

/// Artifact registry collaborator. Push is the only mutation; pull
/// availability for the orchestration platform is implied by a successful
/// push.
pub trait ImageRegistry: Send + Sync {
    /// Publish artifact bytes under `tag`, returning the content digest.
    fn push(&self, artifact_bytes: &[u8], tag: &str) -> Result<String>;

    /// Digest for a published tag, if present.
    fn digest_of(&self, tag: &str) -> Option<String>;
}

fn content_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256:{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// InMemoryRegistry
// ---------------------------------------------------------------------------

/// Registry held entirely in memory, with an unavailability switch so tests
/// can exercise publish failure without touching the filesystem.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    tags: Mutex<HashMap<String, String>>,
    unavailable: AtomicBool,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }
}

impl ImageRegistry for InMemoryRegistry {
    fn push(&self, artifact_bytes: &[u8], tag: &str) -> Result<String> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ConvoyError::RegistryUnavailable(
                "registry is offline".to_string(),
            ));
        }
        let digest = content_digest(artifact_bytes);
        self.tags
            .lock()
            .expect("registry lock poisoned")
            .insert(tag.to_string(), digest.clone());
        Ok(digest)
    }

    fn digest_of(&self, tag: &str) -> Option<String> {
        self.tags
            .lock()
            .expect("registry lock poisoned")
            .get(tag)
            .cloned()
    }
}

// ---------------------------------------------------------------------------
// FsRegistry
// ---------------------------------------------------------------------------

/// Registry backed by blob files under `.convoy/registry/`, so CLI builds
/// survive across invocations. Layout: one `<tag>.blob` per published tag
/// with a sibling `<tag>.digest`.
#[derive(Debug)]
pub struct FsRegistry {
    dir: PathBuf,
}

impl FsRegistry {
    pub fn new(root: &Path) -> Self {
        Self {
            dir: paths::registry_dir(root),
        }
    }

    fn blob_path(&self, tag: &str) -> PathBuf {
        self.dir.join(format!("{tag}.blob"))
    }

    fn digest_path(&self, tag: &str) -> PathBuf {
        self.dir.join(format!("{tag}.digest"))
    }
}

impl ImageRegistry for FsRegistry {
    fn push(&self, artifact_bytes: &[u8], tag: &str) -> Result<String> {
        io::ensure_dir(&self.dir)
            .map_err(|e| ConvoyError::RegistryUnavailable(e.to_string()))?;
        let digest = content_digest(artifact_bytes);
        io::atomic_write(&self.blob_path(tag), artifact_bytes)
            .map_err(|e| ConvoyError::RegistryUnavailable(e.to_string()))?;
        io::atomic_write(&self.digest_path(tag), digest.as_bytes())
            .map_err(|e| ConvoyError::RegistryUnavailable(e.to_string()))?;
        Ok(digest)
    }

    fn digest_of(&self, tag: &str) -> Option<String> {
        std::fs::read_to_string(self.digest_path(tag)).ok()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
