//! Structure-of-arrays particle snapshot shared with the domain collaborator.
//!
//! Conserved fields (positions, smoothing length, mass, velocity divergence)
//! carry values between iterations and are refreshed by the halo exchange.
//! Dependent fields (accelerations, potential) are scratch space, zeroed over
//! the owned range at the start of every step.

use crate::physics::math::{Scalar, SharedRng, Vector, random_unit_vector};
use rand::Rng;

#[derive(Debug, Default, Clone)]
pub struct ParticleSet {
    pub x: Vec<Scalar>,
    pub y: Vec<Scalar>,
    pub z: Vec<Scalar>,
    pub h: Vec<Scalar>,
    pub m: Vec<Scalar>,
    /// Velocity divergence, filled by the external hydro pass.
    pub divv: Vec<Scalar>,
    pub ax: Vec<Scalar>,
    pub ay: Vec<Scalar>,
    pub az: Vec<Scalar>,
    /// Per-particle gravitational potential energy contribution.
    pub pot: Vec<Scalar>,
    /// Partition total potential energy, summed over the owned range after
    /// traversal and globally reduced by the orchestrator.
    pub e_grav: Scalar,
}

impl ParticleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        let mut set = Self::default();
        set.reserve(n);
        set
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn reserve(&mut self, additional: usize) {
        self.x.reserve(additional);
        self.y.reserve(additional);
        self.z.reserve(additional);
        self.h.reserve(additional);
        self.m.reserve(additional);
        self.divv.reserve(additional);
        self.ax.reserve(additional);
        self.ay.reserve(additional);
        self.az.reserve(additional);
        self.pot.reserve(additional);
    }

    pub fn push(&mut self, position: Vector, h: Scalar, m: Scalar) {
        self.x.push(position.x);
        self.y.push(position.y);
        self.z.push(position.z);
        self.h.push(h);
        self.m.push(m);
        self.divv.push(0.0);
        self.ax.push(0.0);
        self.ay.push(0.0);
        self.az.push(0.0);
        self.pot.push(0.0);
    }

    /// Grow or shrink every field to `n` entries, the halo-inclusive size for
    /// the current step. New slots are zero-filled and then overwritten by
    /// the halo exchange and sentinel fills.
    pub fn resize(&mut self, n: usize) {
        self.x.resize(n, 0.0);
        self.y.resize(n, 0.0);
        self.z.resize(n, 0.0);
        self.h.resize(n, 0.0);
        self.m.resize(n, 0.0);
        self.divv.resize(n, 0.0);
        self.ax.resize(n, 0.0);
        self.ay.resize(n, 0.0);
        self.az.resize(n, 0.0);
        self.pot.resize(n, 0.0);
    }

    #[inline]
    pub fn position(&self, i: usize) -> Vector {
        Vector::new(self.x[i], self.y[i], self.z[i])
    }

    #[inline]
    pub fn acceleration(&self, i: usize) -> Vector {
        Vector::new(self.ax[i], self.ay[i], self.az[i])
    }

    /// Zero the dependent scratch fields over `range` before traversal.
    pub fn zero_scratch(&mut self, range: std::ops::Range<usize>) {
        self.ax[range.clone()].fill(0.0);
        self.ay[range.clone()].fill(0.0);
        self.az[range.clone()].fill(0.0);
        self.pot[range].fill(0.0);
        self.e_grav = 0.0;
    }
}

/// Deterministic spherical cluster used by the driver, tests, and benches.
///
/// Positions are uniform in a ball of the given radius, masses uniform in
/// [1, 100), smoothing lengths proportional to the mean interparticle
/// spacing.
pub fn random_cluster(count: usize, seed: u64, radius: Scalar) -> ParticleSet {
    let mut rng = SharedRng::from_seed(seed);
    let mut particles = ParticleSet::with_capacity(count);

    let spacing = radius / libm::cbrt(count.max(1) as Scalar);

    for _ in 0..count {
        let r = radius * libm::cbrt(rng.random_range(0.0..1.0));
        let position = random_unit_vector(&mut rng) * r;
        let mass = rng.random_range(1.0..100.0);
        particles.push(position, 2.0 * spacing, mass);
    }

    particles
}
