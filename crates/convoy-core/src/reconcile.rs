use crate::config::ReconcilerConfig;
use crate::error::Result;
use crate::ingress::IngressRouter;
use crate::manifest::UnitManifest;
use crate::platform::{ObservedState, OrchestrationPlatform};
use crate::record::RecordStore;
use crate::repo::DesiredStateRepo;
use crate::types::SyncPhase;
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// Next action for one unit, computed from a desired/observed snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Apply the desired manifest (entering Progressing).
    Apply,
    /// Applied and inside the health window; keep polling.
    AwaitHealth,
    /// Observed state matches desired; settle as Synced.
    MarkSynced,
    /// Convergence failed or regressed.
    MarkDegraded(String),
    /// Settled; nothing to do until desired state changes.
    Hold,
}

#[derive(Debug)]
pub struct PlanInput<'a> {
    pub desired_revision: u64,
    pub desired: &'a UnitManifest,
    pub observed: &'a ObservedState,
    pub phase: SyncPhase,
    /// Revision the record last converged toward.
    pub record_revision: u64,
    pub window_elapsed: bool,
}

/// One reconciliation tick as a pure function of (desired, observed,
/// record). All platform interaction happens outside, against the snapshot.
pub fn plan(input: &PlanInput<'_>) -> Step {
    // A newer desired revision supersedes whatever the record was doing.
    if input.record_revision != input.desired_revision {
        return Step::Apply;
    }
    match input.phase {
        SyncPhase::Unknown | SyncPhase::OutOfSync | SyncPhase::Degraded => Step::Apply,
        SyncPhase::Progressing => {
            if input.observed.matches(input.desired) {
                Step::MarkSynced
            } else if input.window_elapsed {
                Step::MarkDegraded(format!(
                    "health window elapsed before revision {} converged",
                    input.desired_revision
                ))
            } else {
                Step::AwaitHealth
            }
        }
        SyncPhase::Synced => {
            if input.observed.matches(input.desired) {
                Step::Hold
            } else {
                Step::MarkDegraded("observed state regressed after sync".to_string())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// The GitOps control loop: converges observed cluster state toward the
/// desired-state repository, one independent task per unit, serialized per
/// unit by a lease. A unit's Degraded state never stalls the others.
pub struct Reconciler {
    repo: Arc<DesiredStateRepo>,
    platform: Arc<dyn OrchestrationPlatform>,
    ingress: Arc<IngressRouter>,
    records: Arc<StdMutex<RecordStore>>,
    config: ReconcilerConfig,
    leases: StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl Reconciler {
    pub fn new(
        repo: Arc<DesiredStateRepo>,
        platform: Arc<dyn OrchestrationPlatform>,
        ingress: Arc<IngressRouter>,
        records: Arc<StdMutex<RecordStore>>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            repo,
            platform,
            ingress,
            records,
            config,
            leases: StdMutex::new(HashMap::new()),
        }
    }

    pub fn records(&self) -> Arc<StdMutex<RecordStore>> {
        Arc::clone(&self.records)
    }

    fn lease(&self, unit: &str) -> Arc<AsyncMutex<()>> {
        let mut leases = self.leases.lock().expect("lease map poisoned");
        Arc::clone(
            leases
                .entry(unit.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    fn phase_and_revision(&self, unit: &str) -> (SyncPhase, u64) {
        let records = self.records.lock().expect("record store poisoned");
        records
            .record(unit)
            .map(|r| (r.phase, r.revision))
            .unwrap_or((SyncPhase::Unknown, 0))
    }

    fn transition(&self, unit: &str, phase: SyncPhase, revision: u64, note: Option<String>) {
        let mut records = self.records.lock().expect("record store poisoned");
        records.transition(unit, phase, revision, note);
    }

    fn attempts(&self, unit: &str) -> u32 {
        let records = self.records.lock().expect("record store poisoned");
        records.record(unit).map(|r| r.attempts).unwrap_or(0)
    }

    /// Capped exponential backoff with ±50% jitter.
    pub fn backoff_delay(&self, attempts: u32) -> Duration {
        let base = self.config.backoff_base_secs.max(1);
        let exp = attempts.saturating_sub(1).min(16);
        let secs = base
            .saturating_mul(1u64 << exp)
            .min(self.config.backoff_max_secs.max(base));
        let jittered = secs as f64 * rand::thread_rng().gen_range(0.5..1.5);
        Duration::from_secs_f64(jittered.max(0.5))
    }

    /// One bounded convergence attempt toward the latest desired revision.
    ///
    /// Holds the unit's lease for the whole attempt, so there is at most
    /// one active convergence per unit. Restarts internally when a newer
    /// revision supersedes the one being converged; returns the resulting
    /// phase (`Synced` or `Degraded`) without retrying Degraded — backoff
    /// scheduling belongs to the caller's loop.
    pub async fn reconcile_once(&self, unit: &str) -> Result<SyncPhase> {
        let lease = self.lease(unit);
        let _held = lease.lock().await;

        'converge: loop {
            let (desired, revision) = self.repo.read_latest(unit)?;
            let (phase, record_revision) = self.phase_and_revision(unit);
            let observed = self.platform.status(unit)?;

            match plan(&PlanInput {
                desired_revision: revision,
                desired: &desired,
                observed: &observed,
                phase,
                record_revision,
                window_elapsed: false,
            }) {
                Step::Hold => return Ok(SyncPhase::Synced),
                Step::MarkSynced => {
                    self.settle(unit, &desired, revision, &observed);
                    return Ok(SyncPhase::Synced);
                }
                Step::MarkDegraded(reason) => {
                    return Ok(self.degrade(unit, revision, reason));
                }
                Step::Apply | Step::AwaitHealth => {}
            }

            self.transition(unit, SyncPhase::OutOfSync, revision, None);
            if let Err(e) = self.platform.apply(unit, &desired) {
                return Ok(self.degrade(unit, revision, e.to_string()));
            }
            self.transition(unit, SyncPhase::Progressing, revision, None);
            tracing::info!(unit, revision, tag = %desired.image.tag, "progressing");

            let deadline = Instant::now() + Duration::from_secs(self.config.health_window_secs);
            loop {
                // A newer revision cancels convergence toward this one.
                let (_, latest) = self.repo.read_latest(unit)?;
                if latest != revision {
                    tracing::info!(unit, stale = revision, latest, "superseded mid-convergence");
                    continue 'converge;
                }

                let observed = self.platform.status(unit)?;
                match plan(&PlanInput {
                    desired_revision: revision,
                    desired: &desired,
                    observed: &observed,
                    phase: SyncPhase::Progressing,
                    record_revision: revision,
                    window_elapsed: Instant::now() >= deadline,
                }) {
                    Step::MarkSynced => {
                        self.settle(unit, &desired, revision, &observed);
                        return Ok(SyncPhase::Synced);
                    }
                    Step::MarkDegraded(_) => {
                        // Progressing only degrades here when the window closed.
                        let reason = crate::error::ConvoyError::HealthTimeout {
                            unit: unit.to_string(),
                            window_secs: self.config.health_window_secs,
                        }
                        .to_string();
                        return Ok(self.degrade(unit, revision, reason));
                    }
                    _ => {
                        tokio::time::sleep(Duration::from_secs(self.config.poll_interval_secs))
                            .await;
                    }
                }
            }
        }
    }

    fn degrade(&self, unit: &str, revision: u64, reason: String) -> SyncPhase {
        tracing::warn!(unit, revision, "degraded: {reason}");
        self.transition(unit, SyncPhase::Degraded, revision, Some(reason));
        // A degraded unit must not keep serving through routes published
        // for an earlier sync.
        self.ingress.clear_unit(unit);
        SyncPhase::Degraded
    }

    fn settle(&self, unit: &str, desired: &UnitManifest, revision: u64, observed: &ObservedState) {
        self.transition(unit, SyncPhase::Synced, revision, None);
        self.ingress.set_route(
            &desired.ingress.host,
            &desired.ingress.path,
            unit,
            desired.service.port,
            observed.endpoints.clone(),
        );
        tracing::info!(unit, revision, endpoints = observed.endpoints.len(), "synced");
    }

    /// Continuous loop for one unit: converge, back off while Degraded,
    /// poll for new revisions while Synced, stop on shutdown signal.
    pub async fn run_unit(self: Arc<Self>, unit: String, mut shutdown: watch::Receiver<bool>) {
        loop {
            let outcome = tokio::select! {
                result = self.reconcile_once(&unit) => result,
                _ = shutdown.changed() => return,
            };

            let delay = match outcome {
                Ok(SyncPhase::Degraded) => self.backoff_delay(self.attempts(&unit)),
                Ok(_) => Duration::from_secs(self.config.poll_interval_secs),
                Err(e) => {
                    tracing::error!(unit, "reconcile error: {e}");
                    self.backoff_delay(1)
                }
            };
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => return,
            }
        }
    }

    /// Spawn one task per unit and wait for all of them to observe the
    /// shutdown signal. Units reconcile independently and in parallel.
    pub async fn run(self: Arc<Self>, units: Vec<String>, shutdown: watch::Receiver<bool>) {
        let mut handles = Vec::new();
        for unit in units {
            let reconciler = Arc::clone(&self);
            let rx = shutdown.clone();
            handles.push(tokio::spawn(reconciler.run_unit(unit, rx)));
        }
        for handle in handles {
            let _ = handle.await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
