use anyhow::Result;
use convoy_core::config::Config;
use convoy_core::record::RecordStore;
use convoy_core::repo::DesiredStateRepo;
use convoy_core::{io, paths};
use std::path::Path;

pub fn run(root: &Path) -> Result<()> {
    io::ensure_dir(&paths::convoy_dir(root))?;

    if !paths::config_path(root).exists() {
        Config::default().save(root)?;
    }
    if !paths::desired_path(root).exists() {
        DesiredStateRepo::new().save(root)?;
    }
    if !paths::records_path(root).exists() {
        RecordStore::new().save(root)?;
    }

    // Runtime state must not feed back into the trigger filter's notion of
    // an application change.
    io::ensure_gitignore_entry(root, paths::RECORDS_FILE)?;
    io::ensure_gitignore_entry(root, paths::INGRESS_FILE)?;
    io::ensure_gitignore_entry(root, paths::REGISTRY_DIR)?;

    println!("Initialized convoy in {}", root.display());
    println!("Next: convoy unit add <name> --image <repo> --port <port> --host <host>");
    Ok(())
}
