use std::path::{Path, PathBuf};

/// Directory markers that identify a project root, in lookup order. Any
/// `.convoy/` on the way up beats any `.git/`.
const ROOT_MARKERS: &[&str] = &[".convoy", ".git"];

/// Resolve the convoy root directory. An explicit root (`--root` flag or
/// `CONVOY_ROOT`) always wins; otherwise the nearest ancestor of the
/// working directory carrying a marker is used, falling back to the
/// working directory itself.
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    resolve_from(&cwd, explicit)
}

fn resolve_from(cwd: &Path, explicit: Option<&Path>) -> PathBuf {
    if let Some(root) = explicit {
        return root.to_path_buf();
    }
    ROOT_MARKERS
        .iter()
        .find_map(|marker| nearest_ancestor_with(cwd, marker))
        .unwrap_or_else(|| cwd.to_path_buf())
}

fn nearest_ancestor_with(start: &Path, marker: &str) -> Option<PathBuf> {
    let mut dir = start;
    loop {
        if dir.join(marker).is_dir() {
            return Some(dir.to_path_buf());
        }
        dir = dir.parent()?;
    }
}
