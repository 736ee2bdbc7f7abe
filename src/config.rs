use crate::physics::math::Scalar;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct SimulationConfig {
    pub simulation: RunConfig,
    pub gravity: GravityConfig,
    pub timestep: TimestepConfig,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RunConfig {
    pub body_count: usize,
    pub steps: usize,
    pub seed: Option<u64>,
    pub backend: String,
    /// Particles per spatial group.
    pub group_size: usize,
    pub cluster_radius: Scalar,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            body_count: 1000,
            steps: 10,
            seed: None,
            backend: "parallel".to_string(),
            group_size: 64,
            cluster_radius: 100.0,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GravityConfig {
    pub constant: Scalar,
    /// Barnes-Hut opening angle.
    pub theta: Scalar,
    /// Plummer softening length.
    pub softening: Scalar,
    /// Maximum particles per tree leaf.
    pub leaf_threshold: usize,
}

impl Default for GravityConfig {
    fn default() -> Self {
        Self {
            constant: 1.0,
            theta: 0.5,
            softening: 0.05,
            leaf_threshold: 4,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TimestepConfig {
    /// Kernel-dependent coefficient of the divergence-limited criterion.
    pub k_rho: f32,
    /// Coefficient of the acceleration-limited criterion.
    pub eta_acc: f32,
    /// Fraction of groups counted as "fastest" when picking the upper
    /// timestep bound.
    pub fast_fraction: f32,
    /// Upper bound seeding the per-group estimates.
    pub max_dt: f32,
    /// External global estimate used on the coarse path.
    pub fallback_dt: f32,
}

impl Default for TimestepConfig {
    fn default() -> Self {
        Self {
            k_rho: 0.06,
            eta_acc: 0.2,
            fast_fraction: 0.4,
            max_dt: 0.1,
            fallback_dt: 0.01,
        }
    }
}

impl SimulationConfig {
    /// Load configuration from a file, falling back to defaults if the file
    /// doesn't exist.
    pub fn load_or_default(path: &str) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    warn!("Failed to parse config file {}: {}. Using defaults.", path, e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("Config file {} not found. Using defaults.", path);
                Self::default()
            }
        }
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &str) -> crate::error::Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            crate::error::StepError::Config(format!("serialize failed: {e}"))
        })?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
