//! Accuracy and conservation properties of the multipole gravity solver.

use approx::assert_relative_eq;
use starsweep::config::GravityConfig;
use starsweep::physics::backend::ParallelBackend;
use starsweep::physics::particles::random_cluster;
use starsweep::physics::traverse::{TraversalParams, direct_acceleration};
use starsweep::prelude::*;

#[test]
fn fully_opened_traversal_matches_brute_force() {
    let mut particles = random_cluster(100, 42, 100.0);
    let reference = particles.clone();

    // theta = 0 never accepts a far-field node, so the traversal reduces to
    // the exact O(N^2) pairwise sum.
    let config = GravityConfig {
        theta: 0.0,
        ..GravityConfig::default()
    };
    let params = TraversalParams {
        g: config.constant,
        theta: config.theta,
        softening: config.softening,
    };

    let domain = LocalDomain::new(100, 16);
    let mut backend = ParallelBackend::new(&config);
    backend.upsweep(&particles).unwrap();
    backend.traverse(&mut particles, &domain).unwrap();

    let mut direct_energy = 0.0;
    for i in 0..reference.len() {
        let (acc, phi) = direct_acceleration(&reference, i, &params);
        assert_relative_eq!(particles.ax[i], acc.x, epsilon = 1e-9, max_relative = 1e-10);
        assert_relative_eq!(particles.ay[i], acc.y, epsilon = 1e-9, max_relative = 1e-10);
        assert_relative_eq!(particles.az[i], acc.z, epsilon = 1e-9, max_relative = 1e-10);
        direct_energy += 0.5 * reference.m[i] * phi;
    }

    assert_relative_eq!(particles.e_grav, direct_energy, max_relative = 1e-10);
    assert!(particles.e_grav < 0.0);

    // Nothing but near-field work happened.
    assert_eq!(backend.read_stats().num_m2p, 0);
}

#[test]
fn default_opening_angle_stays_within_tolerance() {
    let mut particles = random_cluster(500, 7, 200.0);
    let reference = particles.clone();

    let config = GravityConfig::default();
    let params = TraversalParams {
        g: config.constant,
        theta: config.theta,
        softening: config.softening,
    };

    let domain = LocalDomain::new(500, 64);
    let mut backend = ParallelBackend::new(&config);
    backend.upsweep(&particles).unwrap();
    backend.traverse(&mut particles, &domain).unwrap();

    for i in (0..reference.len()).step_by(23) {
        let (acc, _) = direct_acceleration(&reference, i, &params);
        let approximate = particles.acceleration(i);
        let err = (approximate - acc).length() / acc.length().max(1e-12);
        assert!(err < 1e-2, "relative force error {err} at particle {i}");
    }

    assert!(backend.read_stats().num_m2p > 0);
}

#[test]
fn tree_nodes_conserve_mass_over_covered_ranges() {
    let particles = random_cluster(400, 13, 150.0);
    let mut tree = MultipoleTree::new();
    tree.upsweep(&particles);

    let total: Scalar = particles.m.iter().sum();
    assert_relative_eq!(tree.root().unwrap().mass, total, max_relative = 1e-12);

    for node in tree.nodes() {
        let covered: Scalar = tree.order()[node.range()]
            .iter()
            .map(|&i| particles.m[i as usize])
            .sum();
        assert_relative_eq!(node.mass, covered, max_relative = 1e-12);
    }
}

#[test]
fn distant_cluster_collapses_to_few_multipole_terms() {
    // A compact far-away clump seen from a probe cluster: the walk should
    // accept it high up the tree, and the quadrupole-corrected far field
    // should stay close to the direct sum.
    let mut particles = random_cluster(200, 3, 10.0);
    let clump = random_cluster(200, 4, 10.0);
    for i in 0..clump.len() {
        particles.push(
            clump.position(i) + Vector::new(500.0, 0.0, 0.0),
            clump.h[i],
            clump.m[i],
        );
    }

    let config = GravityConfig::default();
    let params = TraversalParams {
        g: config.constant,
        theta: config.theta,
        softening: config.softening,
    };

    let mut tree = MultipoleTree::new();
    tree.upsweep(&particles);

    for i in (0..200).step_by(41) {
        let (acc, phi, _, m2p) =
            starsweep::physics::traverse::accelerate_particle(&tree, &particles, i, &params);
        let (direct_acc, direct_phi) = direct_acceleration(&particles, i, &params);

        assert!(m2p > 0, "far clump should be accepted as multipoles");
        let err = (acc - direct_acc).length() / direct_acc.length().max(1e-12);
        assert!(err < 1e-2, "far-field error {err} too large");
        assert_relative_eq!(phi, direct_phi, max_relative = 1e-2);
    }
}
