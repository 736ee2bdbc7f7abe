//! Per-step driver: halo sync, sentinel fills, upsweep, traversal,
//! reductions, diagnostics, and the timestep hand-off.
//!
//! The orchestrator owns the call sequence; it never owns particle data
//! (the domain does) and nothing it builds outlives the step except the
//! [`Timestep`] record handed to the external integrator.

use crate::config::SimulationConfig;
use crate::domain::Domain;
use crate::error::{Result, StepError};
use crate::physics::backend::GravityBackend;
use crate::physics::particles::ParticleSet;
use crate::physics::traverse::InteractionStats;
use crate::reduce::Collective;
use crate::timestep::{RungScheduler, Timestep, compute_min_timestep};
use std::time::{Duration, Instant};
use tracing::debug;

/// Wall-clock accounting for the named phases of one step. Durations are
/// only meaningful after a collective barrier, so a straggler's delay lands
/// in the phase that caused it.
#[derive(Debug, Default)]
pub struct PhaseTimer {
    mark: Option<Instant>,
    phases: Vec<(&'static str, Duration)>,
}

impl PhaseTimer {
    pub fn start(&mut self) {
        self.phases.clear();
        self.mark = Some(Instant::now());
    }

    pub fn phase(&mut self, name: &'static str) {
        let now = Instant::now();
        if let Some(mark) = self.mark.replace(now) {
            let elapsed = now - mark;
            debug!(phase = name, micros = elapsed.as_micros() as u64, "phase complete");
            self.phases.push((name, elapsed));
        }
    }

    pub fn phases(&self) -> &[(&'static str, Duration)] {
        &self.phases
    }
}

/// Interaction diagnostics in the exact wire format of the per-step report.
/// Totals are normalized per owned particle with truncating integer
/// division; maxima are raw.
pub fn interaction_report(stats: &InteractionStats, owned: u64, max_p2p_global: u64) -> String {
    format!(
        "numP2P {} maxP2P {} numM2P {} maxM2P {} maxP2Pglobal {}",
        stats.num_p2p / owned,
        stats.max_p2p,
        stats.num_m2p / owned,
        stats.max_m2p,
        max_p2p_global
    )
}

/// Everything a step produces besides the mutated particle scratch fields.
#[derive(Debug, Clone)]
pub struct StepReport {
    /// Globally reduced potential energy.
    pub e_grav: f64,
    /// This partition's interaction counters.
    pub stats: InteractionStats,
    /// Cross-partition maximum of `max_p2p`, the load-imbalance signal.
    pub max_p2p_global: u64,
    pub timestep: Timestep,
    pub phases: Vec<(&'static str, Duration)>,
}

pub struct StepOrchestrator {
    backend: Box<dyn GravityBackend>,
    collective: Box<dyn Collective>,
    scheduler: RungScheduler,
    timer: PhaseTimer,
    config: SimulationConfig,
}

impl StepOrchestrator {
    pub fn new(
        backend: Box<dyn GravityBackend>,
        collective: Box<dyn Collective>,
        config: SimulationConfig,
    ) -> Self {
        Self {
            backend,
            collective,
            scheduler: RungScheduler::new(config.timestep.fast_fraction),
            timer: PhaseTimer::default(),
            config,
        }
    }

    /// Run one full step. All partitions must call this the same number of
    /// times with the same backend flavor; the collective call sequence
    /// inside is fixed and mismatches deadlock the run.
    pub fn step(
        &mut self,
        domain: &mut dyn Domain,
        particles: &mut ParticleSet,
    ) -> Result<StepReport> {
        self.timer.start();

        domain.sync_gravity(particles)?;
        self.timer.phase("domain_sync");

        let n = domain.n_particles_with_halos();
        let first = domain.start_index();
        let last = domain.end_index();
        if first >= last {
            return Err(StepError::EmptyPartition);
        }

        particles.resize(n);

        // Halo slots outside the owned range take the first owned
        // particle's mass, so degenerate or unfilled slots cannot zero out
        // aggregate moments during the upsweep.
        let sentinel_mass = particles.m[first];
        particles.m[..first].fill(sentinel_mass);
        particles.m[last..n].fill(sentinel_mass);

        particles.zero_scratch(first..last);

        self.backend.upsweep(particles)?;
        self.collective.barrier();
        self.timer.phase("upsweep");

        self.backend.traverse(particles, domain)?;
        let e_grav = self.collective.reduce_sum(particles.e_grav);
        particles.e_grav = e_grav;
        self.timer.phase("gravity");

        let stats = self.backend.read_stats();
        let max_p2p_global = self.collective.reduce_max_u64(stats.max_p2p);

        if domain.start_index() == 0 {
            let owned = (last - first) as u64;
            println!("{}", interaction_report(&stats, owned, max_p2p_global));
        }

        // The energy sum is the canary for a malformed tree: every
        // partition sees the same reduced value, so all abort together.
        if !e_grav.is_finite() {
            return Err(StepError::CorruptForces);
        }

        let groups = domain.group_view();
        let group_dt = self
            .backend
            .group_timesteps(particles, groups, &self.config.timestep);
        let timestep = match group_dt {
            Some(mut group_dt) => {
                let mut group_indices = vec![0u32; group_dt.len()];
                self.scheduler.compute_rung_timestep(
                    &mut group_dt,
                    &mut group_indices,
                    self.collective.as_ref(),
                )
            }
            None => compute_min_timestep(
                self.config.timestep.fallback_dt,
                groups.num_groups(),
                self.collective.as_ref(),
            ),
        };
        self.timer.phase("timestep");

        Ok(StepReport {
            e_grav,
            stats,
            max_p2p_global,
            timestep,
            phases: self.timer.phases().to_vec(),
        })
    }
}
