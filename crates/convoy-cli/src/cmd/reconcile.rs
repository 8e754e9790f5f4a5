use crate::output::{col, num, print_json, print_table};
use anyhow::{Context, Result};
use convoy_core::config::Config;
use convoy_core::ingress::IngressRouter;
use convoy_core::platform::SimPlatform;
use convoy_core::reconcile::Reconciler;
use convoy_core::record::RecordStore;
use convoy_core::repo::DesiredStateRepo;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Drives the convergence loop against the in-process platform and persists
/// the resulting records and ingress table so other commands can read them.
pub fn run(root: &Path, passes: u32, watch_mode: bool, json: bool) -> Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let repo = Arc::new(DesiredStateRepo::load(root).context("failed to load desired state")?);
    let records = Arc::new(Mutex::new(
        RecordStore::load(root).context("failed to load records")?,
    ));
    let ingress = Arc::new(IngressRouter::load(root).context("failed to load ingress table")?);

    let platform = Arc::new(SimPlatform::new(0));
    platform.set_auto_advance(true);

    let reconciler = Arc::new(Reconciler::new(
        Arc::clone(&repo),
        platform,
        Arc::clone(&ingress),
        Arc::clone(&records),
        config.reconciler,
    ));

    let units = repo.units();
    if units.is_empty() {
        println!("No units registered. Run `convoy unit add` first.");
        return Ok(());
    }

    let runtime = tokio::runtime::Runtime::new()?;
    if watch_mode {
        runtime.block_on(watch_loop(Arc::clone(&reconciler), units))?;
    } else {
        runtime.block_on(async {
            for _ in 0..passes {
                let mut settled = true;
                for unit in &units {
                    let phase = reconciler.reconcile_once(unit).await?;
                    tracing::info!(unit, %phase, "pass complete");
                    settled &= phase.is_settled();
                }
                // Remaining passes are no-ops once every unit has settled.
                if settled {
                    break;
                }
            }
            anyhow::Ok(())
        })?;
    }

    {
        let records = records.lock().expect("record store poisoned");
        records.save(root)?;
    }
    ingress.save(root)?;

    let records = records.lock().expect("record store poisoned");
    if json {
        print_json(&records.records)?;
    } else {
        let rows = records
            .records
            .iter()
            .map(|r| {
                vec![
                    r.unit.clone(),
                    r.phase.to_string(),
                    r.revision.to_string(),
                    r.last_error.clone().unwrap_or_else(|| "-".to_string()),
                ]
            })
            .collect();
        print_table(
            &[col("UNIT"), col("PHASE"), num("REVISION"), col("LAST ERROR")],
            rows,
        );
    }
    Ok(())
}

async fn watch_loop(reconciler: Arc<Reconciler>, units: Vec<String>) -> Result<()> {
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(reconciler.run(units, rx));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutting down");
    let _ = tx.send(true);
    let _ = handle.await;
    Ok(())
}
