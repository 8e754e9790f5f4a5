use crate::output::{col, num, print_json, print_table};
use anyhow::{Context, Result};
use clap::Subcommand;
use convoy_core::manifest::UnitManifest;
use convoy_core::repo::DesiredStateRepo;
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand definition
// ---------------------------------------------------------------------------

#[derive(Subcommand, Debug)]
pub enum UnitSubcommand {
    /// Register a deployable unit at revision 1
    Add {
        /// Unit name (DNS-label shape)
        name: String,

        /// Image repository (without tag)
        #[arg(long)]
        image: String,

        /// Initial image tag
        #[arg(long, default_value = "latest")]
        tag: String,

        /// Service port
        #[arg(long)]
        port: u16,

        /// Ingress host
        #[arg(long)]
        host: String,

        /// Ingress path prefix
        #[arg(long, default_value = "/")]
        path: String,

        /// Replica count
        #[arg(long, default_value = "1")]
        replicas: u32,

        /// Author recorded on the registration write
        #[arg(long, default_value = "operator")]
        author: String,
    },

    /// List registered units with their latest manifests
    List,

    /// Show a unit's latest manifest
    Show { name: String },
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcommand: UnitSubcommand, json: bool) -> Result<()> {
    let repo = DesiredStateRepo::load(root).context("failed to load desired state")?;

    match subcommand {
        UnitSubcommand::Add {
            name,
            image,
            tag,
            port,
            host,
            path,
            replicas,
            author,
        } => {
            let mut manifest = UnitManifest::new(image, tag, port, host);
            manifest.replica_count = replicas;
            manifest.ingress.path = path;
            let revision = repo.register(&name, manifest, &author)?;
            repo.save(root)?;
            if json {
                print_json(&serde_json::json!({ "unit": name, "revision": revision }))?;
            } else {
                println!("Registered '{name}' at revision {revision}");
            }
        }

        UnitSubcommand::List => {
            let units = repo.units();
            if json {
                let list: Vec<serde_json::Value> = units
                    .iter()
                    .map(|u| {
                        let (manifest, revision) = repo.read_latest(u)?;
                        Ok(serde_json::json!({
                            "unit": u,
                            "revision": revision,
                            "manifest": manifest,
                        }))
                    })
                    .collect::<Result<_>>()?;
                print_json(&list)?;
            } else {
                let rows = units
                    .iter()
                    .map(|u| {
                        let (m, revision) = repo.read_latest(u)?;
                        Ok(vec![
                            u.clone(),
                            m.image.tag.clone(),
                            m.replica_count.to_string(),
                            format!("{}{}", m.ingress.host, m.ingress.path),
                            revision.to_string(),
                        ])
                    })
                    .collect::<Result<Vec<_>>>()?;
                print_table(
                    &[
                        col("UNIT"),
                        col("TAG"),
                        num("REPLICAS"),
                        col("INGRESS"),
                        num("REVISION"),
                    ],
                    rows,
                );
            }
        }

        UnitSubcommand::Show { name } => {
            let (manifest, revision) = repo.read_latest(&name)?;
            if json {
                print_json(&serde_json::json!({
                    "unit": name,
                    "revision": revision,
                    "manifest": manifest,
                }))?;
            } else {
                println!("# revision {revision}");
                print!("{}", serde_yaml::to_string(&manifest)?);
            }
        }
    }

    Ok(())
}
