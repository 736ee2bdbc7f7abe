//! Starsweep prelude module
//!
//! Re-exports the most commonly used types and traits across the crate to
//! reduce import boilerplate.

// External crate re-exports
pub use rand::Rng;

// Internal re-exports - Config
pub use crate::config::SimulationConfig;

// Internal re-exports - Errors
pub use crate::error::{Result, StepError};

// Internal re-exports - Domain seam
pub use crate::domain::{Domain, GroupView, LocalDomain};

// Internal re-exports - Physics
pub use crate::physics::backend::{BackendRegistry, GravityBackend};
pub use crate::physics::math::{Scalar, SharedRng, Vector};
pub use crate::physics::particles::ParticleSet;
pub use crate::physics::traverse::InteractionStats;
pub use crate::physics::tree::MultipoleTree;

// Internal re-exports - Collectives and scheduling
pub use crate::orchestrator::{StepOrchestrator, StepReport};
pub use crate::reduce::{Collective, LocalCollective, ThreadCollective};
pub use crate::timestep::{MAX_NUM_RUNGS, RungScheduler, Timestep};
