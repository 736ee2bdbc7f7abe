//! Runtime-selected execution strategies for tree build and traversal.
//!
//! The reference design branches at compile time between a host and an
//! accelerator kernel; here that becomes a strategy object chosen once at
//! startup and resolved by name through [`BackendRegistry`]. Both backends
//! honor the same `upsweep` / `traverse` / `read_stats` contract and are
//! functionally equivalent; they differ in how the per-group batches
//! execute, and in that only the fine-grained (parallel) backend evaluates
//! per-group timestep criteria.

use crate::config::{GravityConfig, TimestepConfig};
use crate::domain::{Domain, GroupView};
use crate::error::{Result, StepError};
use crate::physics::particles::ParticleSet;
use crate::physics::traverse::{InteractionStats, RangeForces, TraversalParams, traverse_range};
use crate::physics::tree::MultipoleTree;
use crate::timestep::{group_acc_timestep, group_divv_timestep};
use rayon::prelude::*;
use std::collections::HashMap;

pub trait GravityBackend: Send {
    fn name(&self) -> &'static str;

    /// Rebuild the multipole hierarchy for this step's snapshot.
    fn upsweep(&mut self, particles: &ParticleSet) -> Result<()>;

    /// Evaluate gravity for the owned range, accumulating accelerations,
    /// potentials, and interaction counters into the snapshot. Valid only
    /// after `upsweep` in the same step; halo freshness is the caller's
    /// responsibility.
    fn traverse(&mut self, particles: &mut ParticleSet, domain: &dyn Domain) -> Result<()>;

    /// Counters accumulated by the most recent `traverse`.
    fn read_stats(&self) -> InteractionStats;

    /// Per-group dt estimates, or `None` when this execution path does not
    /// support fine-grained per-group evaluation.
    fn group_timesteps(
        &self,
        particles: &ParticleSet,
        groups: &GroupView,
        config: &TimestepConfig,
    ) -> Option<Vec<f32>>;
}

fn scatter_forces(
    forces: Vec<RangeForces>,
    particles: &mut ParticleSet,
    domain: &dyn Domain,
) -> InteractionStats {
    let mut stats = InteractionStats::default();
    for range in &forces {
        range.scatter(particles);
        stats = stats.combine(range.stats);
    }

    let first = domain.start_index();
    let last = domain.end_index();
    particles.e_grav = particles.pot[first..last].iter().sum();

    stats
}

/// Single-threaded batch execution; the coarse timestep path.
pub struct SerialBackend {
    tree: MultipoleTree,
    params: TraversalParams,
    stats: InteractionStats,
    swept: bool,
}

impl SerialBackend {
    pub fn new(config: &GravityConfig) -> Self {
        Self {
            tree: MultipoleTree::new().with_leaf_threshold(config.leaf_threshold),
            params: TraversalParams {
                g: config.constant,
                theta: config.theta,
                softening: config.softening,
            },
            stats: InteractionStats::default(),
            swept: false,
        }
    }
}

impl GravityBackend for SerialBackend {
    fn name(&self) -> &'static str {
        "serial"
    }

    fn upsweep(&mut self, particles: &ParticleSet) -> Result<()> {
        self.tree.upsweep(particles);
        self.swept = true;
        Ok(())
    }

    fn traverse(&mut self, particles: &mut ParticleSet, domain: &dyn Domain) -> Result<()> {
        if !self.swept {
            return Err(StepError::TraverseBeforeUpsweep);
        }
        self.swept = false;

        let forces: Vec<RangeForces> = domain
            .group_view()
            .ranges()
            .into_iter()
            .map(|range| traverse_range(&self.tree, particles, range, &self.params))
            .collect();

        self.stats = scatter_forces(forces, particles, domain);
        Ok(())
    }

    fn read_stats(&self) -> InteractionStats {
        self.stats
    }

    fn group_timesteps(
        &self,
        _particles: &ParticleSet,
        _groups: &GroupView,
        _config: &TimestepConfig,
    ) -> Option<Vec<f32>> {
        None
    }
}

/// Data-parallel batch execution over spatial groups; each group writes its
/// own disjoint output slots, so lanes never race. This is the fine-grained
/// path that also evaluates per-group timestep criteria.
pub struct ParallelBackend {
    tree: MultipoleTree,
    params: TraversalParams,
    stats: InteractionStats,
    swept: bool,
}

impl ParallelBackend {
    pub fn new(config: &GravityConfig) -> Self {
        Self {
            tree: MultipoleTree::new().with_leaf_threshold(config.leaf_threshold),
            params: TraversalParams {
                g: config.constant,
                theta: config.theta,
                softening: config.softening,
            },
            stats: InteractionStats::default(),
            swept: false,
        }
    }
}

impl GravityBackend for ParallelBackend {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn upsweep(&mut self, particles: &ParticleSet) -> Result<()> {
        self.tree.upsweep(particles);
        self.swept = true;
        Ok(())
    }

    fn traverse(&mut self, particles: &mut ParticleSet, domain: &dyn Domain) -> Result<()> {
        if !self.swept {
            return Err(StepError::TraverseBeforeUpsweep);
        }
        self.swept = false;

        let tree = &self.tree;
        let params = &self.params;
        let snapshot: &ParticleSet = particles;
        let forces: Vec<RangeForces> = domain
            .group_view()
            .ranges()
            .into_par_iter()
            .map(|range| traverse_range(tree, snapshot, range, params))
            .collect();

        self.stats = scatter_forces(forces, particles, domain);
        Ok(())
    }

    fn read_stats(&self) -> InteractionStats {
        self.stats
    }

    fn group_timesteps(
        &self,
        particles: &ParticleSet,
        groups: &GroupView,
        config: &TimestepConfig,
    ) -> Option<Vec<f32>> {
        let mut group_dt = vec![config.max_dt; groups.num_groups()];

        group_divv_timestep(config.k_rho, groups, &particles.divv, &mut group_dt);

        let acc_coeff = (f64::from(config.eta_acc) * self.params.softening.sqrt()) as f32;
        group_acc_timestep(
            acc_coeff,
            groups,
            &particles.ax,
            &particles.ay,
            &particles.az,
            &mut group_dt,
        );

        Some(group_dt)
    }
}

/// Name-to-factory table for backend selection at startup.
pub struct BackendRegistry {
    backends: HashMap<String, fn(&GravityConfig) -> Box<dyn GravityBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    pub fn with_standard_backends(mut self) -> Self {
        self.register("serial", |config| Box::new(SerialBackend::new(config)));
        self.register("cpu", |config| Box::new(SerialBackend::new(config)));
        self.register("parallel", |config| Box::new(ParallelBackend::new(config)));
        self.register("rayon", |config| Box::new(ParallelBackend::new(config)));
        self
    }

    pub fn register(
        &mut self,
        name: &str,
        factory: fn(&GravityConfig) -> Box<dyn GravityBackend>,
    ) {
        self.backends.insert(name.to_string(), factory);
    }

    pub fn create(&self, name: &str, config: &GravityConfig) -> Result<Box<dyn GravityBackend>> {
        self.backends
            .get(name)
            .map(|factory| factory(config))
            .ok_or_else(|| StepError::UnknownBackend(name.to_string()))
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new().with_standard_backends()
    }
}
