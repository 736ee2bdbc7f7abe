//! Starsweep library
//!
//! Force-evaluation and adaptive block-timestep core of a distributed
//! particle simulation engine: a tree-based gravity solver with multipole
//! far fields, collective reductions across cooperating partitions, and a
//! rung scheduler that bins spatial groups into power-of-two timesteps.

pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod orchestrator;
pub mod physics;
pub mod prelude;
pub mod reduce;
pub mod timestep;
