//! Command line interface for the Starsweep driver

use clap::Parser;

use crate::config::SimulationConfig;

/// Starsweep - distributed tree-gravity and block-timestep core
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file (TOML format)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<String>,

    /// Number of particles to simulate (overrides config file)
    #[arg(short = 'n', long, value_name = "COUNT")]
    pub particles: Option<usize>,

    /// Number of steps to run (overrides config file)
    #[arg(long, value_name = "COUNT")]
    pub steps: Option<usize>,

    /// Execution backend (serial, parallel)
    #[arg(short = 'b', long, value_name = "NAME")]
    pub backend: Option<String>,

    /// Barnes-Hut opening angle (overrides config file)
    #[arg(long, value_name = "VALUE")]
    pub theta: Option<f64>,

    /// Random seed for particle generation
    #[arg(short = 's', long, value_name = "SEED")]
    pub seed: Option<u64>,
}

impl Args {
    /// Resolve the effective configuration: file (or defaults), then
    /// command-line overrides.
    pub fn resolve_config(&self) -> SimulationConfig {
        let mut config = match &self.config {
            Some(path) => SimulationConfig::load_or_default(path),
            None => SimulationConfig::default(),
        };

        if let Some(particles) = self.particles {
            config.simulation.body_count = particles;
        }
        if let Some(steps) = self.steps {
            config.simulation.steps = steps;
        }
        if let Some(backend) = &self.backend {
            config.simulation.backend = backend.clone();
        }
        if let Some(theta) = self.theta {
            config.gravity.theta = theta;
        }
        if let Some(seed) = self.seed {
            config.simulation.seed = Some(seed);
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_config_values() {
        let args = Args {
            config: None,
            particles: Some(42),
            steps: Some(3),
            backend: Some("serial".to_string()),
            theta: Some(0.8),
            seed: Some(7),
        };

        let config = args.resolve_config();
        assert_eq!(config.simulation.body_count, 42);
        assert_eq!(config.simulation.steps, 3);
        assert_eq!(config.simulation.backend, "serial");
        assert_eq!(config.gravity.theta, 0.8);
        assert_eq!(config.simulation.seed, Some(7));
    }

    #[test]
    fn absent_overrides_keep_defaults() {
        let args = Args {
            config: None,
            particles: None,
            steps: None,
            backend: None,
            theta: None,
            seed: None,
        };

        let config = args.resolve_config();
        assert_eq!(config.simulation.backend, "parallel");
    }
}
