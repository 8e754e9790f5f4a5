use crate::output::print_json;
use anyhow::{bail, Context, Result};
use clap::Subcommand;
use convoy_core::config::Config;
use std::path::Path;

#[derive(Subcommand, Debug)]
pub enum ConfigSubcommand {
    /// Print the effective configuration
    Show,

    /// Check the configuration for problems
    Validate,
}

pub fn run(root: &Path, subcommand: ConfigSubcommand, json: bool) -> Result<()> {
    let config = Config::load(root).context("failed to load config")?;

    match subcommand {
        ConfigSubcommand::Show => {
            if json {
                print_json(&config)?;
            } else {
                print!("{}", serde_yaml::to_string(&config)?);
            }
        }

        ConfigSubcommand::Validate => {
            let problems = config.validate();
            if problems.is_empty() {
                println!("Configuration OK");
            } else {
                for problem in &problems {
                    eprintln!("  - {problem}");
                }
                bail!("{} configuration problem(s)", problems.len());
            }
        }
    }

    Ok(())
}
