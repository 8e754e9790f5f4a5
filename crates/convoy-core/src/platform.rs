use crate::error::{ConvoyError, Result};
use crate::manifest::UnitManifest;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// ObservedState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub address: String,
    pub port: u16,
}

/// Snapshot of a unit's live state as reported by the orchestration
/// platform. Fetched fresh per reconciliation tick, never mutated in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedState {
    pub image_tag: Option<String>,
    pub ready_replicas: u32,
    pub endpoints: Vec<Endpoint>,
}

impl ObservedState {
    /// True when the observed artifact reference and replica readiness
    /// match the desired manifest.
    pub fn matches(&self, desired: &UnitManifest) -> bool {
        self.image_tag.as_deref() == Some(desired.image.tag.as_str())
            && self.ready_replicas >= desired.replica_count
    }
}

// ---------------------------------------------------------------------------
// OrchestrationPlatform
// ---------------------------------------------------------------------------

/// The orchestration platform collaborator: accept a manifest, report
/// status. Apply must be idempotent — the same manifest applied twice is a
/// no-op.
pub trait OrchestrationPlatform: Send + Sync {
    fn apply(&self, unit: &str, manifest: &UnitManifest) -> Result<()>;
    fn status(&self, unit: &str) -> Result<ObservedState>;
}

// ---------------------------------------------------------------------------
// SimPlatform
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct UnitSim {
    manifest: UnitManifest,
    applied_at_tick: u64,
}

#[derive(Debug, Default)]
struct SimState {
    units: HashMap<String, UnitSim>,
    stalled: HashSet<String>,
    reject_applies: bool,
    apply_log: Vec<(String, String)>,
}

/// In-process platform simulator with tick-based time: an applied manifest
/// becomes ready `readiness_delay` ticks after apply, with one endpoint per
/// replica assigned deterministically from (unit, tag). Supports apply
/// rejection and per-unit stalls so the degraded paths are reachable in
/// tests without real clocks.
#[derive(Debug)]
pub struct SimPlatform {
    state: Mutex<SimState>,
    clock: AtomicU64,
    generation: AtomicU64,
    readiness_delay: u64,
    auto_advance: std::sync::atomic::AtomicBool,
}

impl Default for SimPlatform {
    fn default() -> Self {
        Self::new(2)
    }
}

impl SimPlatform {
    pub fn new(readiness_delay: u64) -> Self {
        Self {
            state: Mutex::new(SimState::default()),
            clock: AtomicU64::new(0),
            generation: AtomicU64::new(0),
            readiness_delay,
            auto_advance: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Advance the clock one tick per status poll, for callers (like the
    /// CLI loop) that have no other notion of simulated time.
    pub fn set_auto_advance(&self, enabled: bool) {
        self.auto_advance.store(enabled, Ordering::SeqCst);
    }

    /// Tags applied for `unit`, in order, counting state-changing applies
    /// only. Lets tests assert a stale revision is never applied after a
    /// newer one is known.
    pub fn applied_tags(&self, unit: &str) -> Vec<String> {
        let state = self.state.lock().expect("sim lock poisoned");
        state
            .apply_log
            .iter()
            .filter(|(u, _)| u == unit)
            .map(|(_, tag)| tag.clone())
            .collect()
    }

    /// Advance simulated time.
    pub fn advance(&self, ticks: u64) {
        self.clock.fetch_add(ticks, Ordering::SeqCst);
    }

    pub fn now(&self) -> u64 {
        self.clock.load(Ordering::SeqCst)
    }

    /// Counts state-changing applies only; unchanged re-applies leave it
    /// alone, which is how tests observe idempotence.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Make every subsequent apply fail (or succeed again).
    pub fn set_reject_applies(&self, reject: bool) {
        self.state.lock().expect("sim lock poisoned").reject_applies = reject;
    }

    /// Stall a unit: applies are accepted but replicas never become ready.
    pub fn set_stalled(&self, unit: &str, stalled: bool) {
        let mut state = self.state.lock().expect("sim lock poisoned");
        if stalled {
            state.stalled.insert(unit.to_string());
        } else {
            state.stalled.remove(unit);
        }
    }

    fn endpoints_for(unit: &str, manifest: &UnitManifest) -> Vec<Endpoint> {
        let seed: u32 = unit
            .bytes()
            .chain(manifest.image.tag.bytes())
            .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
        (0..manifest.replica_count)
            .map(|i| Endpoint {
                address: format!("10.{}.{}.{}", 1 + seed % 200, seed / 200 % 250, 10 + i),
                port: manifest.service.port,
            })
            .collect()
    }
}

impl OrchestrationPlatform for SimPlatform {
    fn apply(&self, unit: &str, manifest: &UnitManifest) -> Result<()> {
        let now = self.now();
        let mut state = self.state.lock().expect("sim lock poisoned");
        if state.reject_applies {
            return Err(ConvoyError::ApplyRejected {
                unit: unit.to_string(),
                reason: "platform refused manifest".to_string(),
            });
        }
        match state.units.get(unit) {
            Some(existing) if existing.manifest == *manifest => Ok(()),
            _ => {
                state.units.insert(
                    unit.to_string(),
                    UnitSim {
                        manifest: manifest.clone(),
                        applied_at_tick: now,
                    },
                );
                state
                    .apply_log
                    .push((unit.to_string(), manifest.image.tag.clone()));
                self.generation.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    fn status(&self, unit: &str) -> Result<ObservedState> {
        if self.auto_advance.load(Ordering::SeqCst) {
            self.advance(1);
        }
        let now = self.now();
        let state = self.state.lock().expect("sim lock poisoned");
        let Some(sim) = state.units.get(unit) else {
            // Nothing applied yet: empty observation, not an error.
            return Ok(ObservedState::default());
        };
        let ready = !state.stalled.contains(unit)
            && now >= sim.applied_at_tick + self.readiness_delay;
        let (ready_replicas, endpoints) = if ready {
            (
                sim.manifest.replica_count,
                Self::endpoints_for(unit, &sim.manifest),
            )
        } else {
            (0, Vec::new())
        };
        Ok(ObservedState {
            image_tag: Some(sim.manifest.image.tag.clone()),
            ready_replicas,
            endpoints,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
