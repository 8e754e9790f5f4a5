use crate::output::{col, num, print_json, print_table};
use anyhow::{Context, Result};
use convoy_core::record::RecordStore;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> Result<()> {
    let records = RecordStore::load(root).context("failed to load records")?;

    if json {
        print_json(&records.records)?;
        return Ok(());
    }

    if records.records.is_empty() {
        println!("No units have been reconciled yet.");
        return Ok(());
    }

    let rows = records
        .records
        .iter()
        .map(|r| {
            vec![
                r.unit.clone(),
                r.phase.to_string(),
                r.revision.to_string(),
                r.attempts.to_string(),
                r.last_error.clone().unwrap_or_else(|| "-".to_string()),
                r.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ]
        })
        .collect();
    print_table(
        &[
            col("UNIT"),
            col("PHASE"),
            num("REVISION"),
            num("ATTEMPTS"),
            col("LAST ERROR"),
            col("UPDATED"),
        ],
        rows,
    );
    Ok(())
}
