//! Headless driver: build a random self-gravitating cluster, run the step
//! pipeline, and report energies, interaction diagnostics, and rung
//! assignments.

use clap::Parser;
use starsweep::cli::Args;
use starsweep::domain::LocalDomain;
use starsweep::orchestrator::StepOrchestrator;
use starsweep::physics::backend::BackendRegistry;
use starsweep::physics::particles::random_cluster;
use starsweep::reduce::LocalCollective;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> starsweep::error::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = args.resolve_config();

    let seed = config.simulation.seed.unwrap_or_else(rand::random);
    info!(
        particles = config.simulation.body_count,
        steps = config.simulation.steps,
        backend = %config.simulation.backend,
        seed,
        "starting run"
    );

    let mut particles = random_cluster(
        config.simulation.body_count,
        seed,
        config.simulation.cluster_radius,
    );
    let mut domain = LocalDomain::new(config.simulation.body_count, config.simulation.group_size);

    let registry = BackendRegistry::default();
    let backend = registry.create(&config.simulation.backend, &config.gravity)?;
    let mut orchestrator =
        StepOrchestrator::new(backend, Box::new(LocalCollective), config.clone());

    for step in 0..config.simulation.steps {
        let report = orchestrator.step(&mut domain, &mut particles)?;

        let total_micros: u64 = report
            .phases
            .iter()
            .map(|(_, duration)| duration.as_micros() as u64)
            .sum();
        info!(
            step,
            e_grav = report.e_grav,
            num_rungs = report.timestep.num_rungs,
            min_dt = report.timestep.min_dt,
            micros = total_micros,
            "step complete"
        );
    }

    Ok(())
}
