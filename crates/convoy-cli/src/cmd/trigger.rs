use crate::output::print_json;
use anyhow::{Context, Result};
use convoy_core::config::Config;
use convoy_core::trigger::{CommitEvent, TriggerFilter};
use std::path::Path;

/// Exit code 0 on admit, 1 on reject, so CI glue can branch on the result.
pub fn run(
    root: &Path,
    branch: &str,
    sha: &str,
    paths: Vec<String>,
    author: Option<&str>,
    json: bool,
) -> Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let filter = TriggerFilter::new(&config.trigger)?;

    let event = CommitEvent {
        branch: branch.to_string(),
        commit_sha: sha.to_string(),
        changed_paths: paths,
        author: author.map(|a| a.to_string()),
    };

    let decision = filter.decide(&event);
    if json {
        print_json(&decision)?;
    } else {
        println!("{decision}");
    }

    if !decision.is_admit() {
        std::process::exit(1);
    }
    Ok(())
}
