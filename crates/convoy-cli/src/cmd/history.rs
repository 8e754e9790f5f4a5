use crate::output::{col, num, print_json, print_table};
use anyhow::{Context, Result};
use convoy_core::repo::DesiredStateRepo;
use std::path::Path;

pub fn run(root: &Path, unit: &str, json: bool) -> Result<()> {
    let repo = DesiredStateRepo::load(root).context("failed to load desired state")?;

    // Validates the unit exists before rendering an empty table.
    repo.read_latest(unit)?;
    let entries = repo.history(unit);

    if json {
        print_json(&entries)?;
        return Ok(());
    }

    let rows = entries
        .iter()
        .map(|e| {
            vec![
                e.revision.to_string(),
                e.manifest.image.tag.clone(),
                e.manifest.replica_count.to_string(),
                e.author.clone(),
                e.written_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ]
        })
        .collect();
    print_table(
        &[
            num("REVISION"),
            col("TAG"),
            num("REPLICAS"),
            col("AUTHOR"),
            col("WRITTEN"),
        ],
        rows,
    );
    Ok(())
}
