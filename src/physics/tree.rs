//! Hierarchical multipole structure for far-field gravity.
//!
//! The tree is a flat arena of [`MultipoleNode`] records linked by integer
//! child indices, plus a permutation (`order`) mapping tree order back to
//! snapshot indices. Each node covers a contiguous range of the permuted
//! ordering, children exactly partition their parent's range, and every
//! particle lands in exactly one leaf. The whole structure is rebuilt from
//! scratch each step and discarded afterwards; nothing in it is
//! pointer-linked, so it can be relocated or copied wholesale.
//!
//! `upsweep` aggregates bottom-up: leaves reduce their particle range
//! directly, internal nodes combine mass, center-of-mass, and traceless
//! quadrupole moments from their children via the parallel-axis shift,
//! never rescanning raw particles.

use crate::physics::aabb3d::Aabb3d;
use crate::physics::math::{Scalar, Vector};
use crate::physics::particles::ParticleSet;

const PADDING_FACTOR: Scalar = 0.1;
const DEFAULT_LEAF_THRESHOLD: usize = 4;

/// Coincident-particle pileups bottom out as oversized leaves at this depth.
const MAX_DEPTH: usize = 32;

/// Traceless second-moment tensor, `Q = Σ m (3 d dᵀ − |d|² I)`.
///
/// Six independent components; the diagonal sums to zero by construction.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Quadrupole {
    pub xx: Scalar,
    pub xy: Scalar,
    pub xz: Scalar,
    pub yy: Scalar,
    pub yz: Scalar,
    pub zz: Scalar,
}

impl Quadrupole {
    pub const ZERO: Quadrupole = Quadrupole {
        xx: 0.0,
        xy: 0.0,
        xz: 0.0,
        yy: 0.0,
        yz: 0.0,
        zz: 0.0,
    };

    /// Accumulate the moment of a point mass `m` displaced by `d` from the
    /// expansion center. The same term performs the parallel-axis shift when
    /// `d` is a child's center-of-mass offset.
    pub fn add_point(&mut self, d: Vector, m: Scalar) {
        let d2 = d.length_squared();
        self.xx += m * (3.0 * d.x * d.x - d2);
        self.xy += m * 3.0 * d.x * d.y;
        self.xz += m * 3.0 * d.x * d.z;
        self.yy += m * (3.0 * d.y * d.y - d2);
        self.yz += m * 3.0 * d.y * d.z;
        self.zz += m * (3.0 * d.z * d.z - d2);
    }

    pub fn add(&mut self, other: &Quadrupole) {
        self.xx += other.xx;
        self.xy += other.xy;
        self.xz += other.xz;
        self.yy += other.yy;
        self.yz += other.yz;
        self.zz += other.zz;
    }

    /// Matrix-vector product `Q·v`.
    #[inline]
    pub fn mv(&self, v: Vector) -> Vector {
        Vector::new(
            self.xx * v.x + self.xy * v.y + self.xz * v.z,
            self.xy * v.x + self.yy * v.y + self.yz * v.z,
            self.xz * v.x + self.yz * v.y + self.zz * v.z,
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MultipoleNode {
    pub bounds: Aabb3d,
    pub mass: Scalar,
    pub com: Vector,
    pub quad: Quadrupole,
    /// Covered range `[start, end)` in tree order.
    pub start: u32,
    pub end: u32,
    /// Arena indices of the children; [`MultipoleNode::NO_CHILD`] marks an
    /// empty octant. A node with no children at all is a leaf.
    pub children: [i32; 8],
}

impl MultipoleNode {
    pub const NO_CHILD: i32 = -1;

    pub fn is_leaf(&self) -> bool {
        self.children.iter().all(|&c| c < 0)
    }

    pub fn range(&self) -> std::ops::Range<usize> {
        self.start as usize..self.end as usize
    }
}

#[derive(Debug)]
pub struct MultipoleTree {
    nodes: Vec<MultipoleNode>,
    order: Vec<u32>,
    leaf_threshold: usize,
}

impl MultipoleTree {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            order: Vec::new(),
            leaf_threshold: DEFAULT_LEAF_THRESHOLD,
        }
    }

    pub fn with_leaf_threshold(mut self, leaf_threshold: usize) -> Self {
        self.leaf_threshold = leaf_threshold.max(1);
        self
    }

    /// Flat node arena; index 0 is the root when the tree is non-empty.
    pub fn nodes(&self) -> &[MultipoleNode] {
        &self.nodes
    }

    /// Permutation from tree order to snapshot indices.
    pub fn order(&self) -> &[u32] {
        &self.order
    }

    pub fn root(&self) -> Option<&MultipoleNode> {
        self.nodes.first()
    }

    /// Rebuild the hierarchy over the full snapshot (owned plus halo).
    ///
    /// No cross-partition communication happens here; the halo must already
    /// be materialized by the domain exchange.
    pub fn upsweep(&mut self, particles: &ParticleSet) {
        let n = particles.len();
        self.nodes.clear();
        self.order.clear();
        self.order.extend(0..n as u32);

        let positions = (0..n).map(|i| particles.position(i));
        let Some(bounds) = Aabb3d::enclosing(positions, PADDING_FACTOR) else {
            return;
        };

        self.nodes.reserve(2 * n / self.leaf_threshold + 1);
        self.build_node(bounds, 0, n, 0, particles);
    }

    fn build_node(
        &mut self,
        bounds: Aabb3d,
        start: usize,
        end: usize,
        depth: usize,
        particles: &ParticleSet,
    ) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(MultipoleNode {
            bounds,
            mass: 0.0,
            com: bounds.center(),
            quad: Quadrupole::ZERO,
            start: start as u32,
            end: end as u32,
            children: [MultipoleNode::NO_CHILD; 8],
        });

        if end - start <= self.leaf_threshold || depth >= MAX_DEPTH {
            let (mass, com, quad) = leaf_moments(&self.order[start..end], particles, bounds);
            let node = &mut self.nodes[idx];
            node.mass = mass;
            node.com = com;
            node.quad = quad;
            return idx;
        }

        let center = bounds.center();
        let octants = bounds.octants();

        let mut counts = [0usize; 8];
        for &i in &self.order[start..end] {
            counts[octant_index(particles.position(i as usize), center)] += 1;
        }

        let mut buckets: [Vec<u32>; 8] = std::array::from_fn(|k| Vec::with_capacity(counts[k]));
        for &i in &self.order[start..end] {
            buckets[octant_index(particles.position(i as usize), center)].push(i);
        }

        let mut children = [MultipoleNode::NO_CHILD; 8];
        let mut cursor = start;
        for (k, bucket) in buckets.into_iter().enumerate() {
            if bucket.is_empty() {
                continue;
            }
            let sub_start = cursor;
            let sub_end = cursor + bucket.len();
            self.order[sub_start..sub_end].copy_from_slice(&bucket);
            cursor = sub_end;
            children[k] = self.build_node(octants[k], sub_start, sub_end, depth + 1, particles) as i32;
        }

        // Aggregate from children only, never by rescanning particles.
        let mut mass = 0.0;
        let mut weighted = Vector::ZERO;
        for &c in &children {
            if c >= 0 {
                let child = &self.nodes[c as usize];
                mass += child.mass;
                weighted += child.com * child.mass;
            }
        }
        let com = if mass > 0.0 { weighted / mass } else { center };

        let mut quad = Quadrupole::ZERO;
        for &c in &children {
            if c >= 0 {
                let child = self.nodes[c as usize];
                quad.add(&child.quad);
                quad.add_point(child.com - com, child.mass);
            }
        }

        let node = &mut self.nodes[idx];
        node.mass = mass;
        node.com = com;
        node.quad = quad;
        node.children = children;
        idx
    }
}

#[inline]
fn octant_index(position: Vector, center: Vector) -> usize {
    ((position.x > center.x) as usize)
        | (((position.y > center.y) as usize) << 1)
        | (((position.z > center.z) as usize) << 2)
}

fn leaf_moments(order: &[u32], particles: &ParticleSet, bounds: Aabb3d) -> (Scalar, Vector, Quadrupole) {
    let mut mass = 0.0;
    let mut weighted = Vector::ZERO;
    for &i in order {
        let m = particles.m[i as usize];
        mass += m;
        weighted += particles.position(i as usize) * m;
    }
    let com = if mass > 0.0 {
        weighted / mass
    } else {
        bounds.center()
    };

    let mut quad = Quadrupole::ZERO;
    for &i in order {
        quad.add_point(particles.position(i as usize) - com, particles.m[i as usize]);
    }

    (mass, com, quad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::particles::random_cluster;
    use approx::assert_relative_eq;

    #[test]
    fn upsweep_conserves_mass_at_every_node() {
        let particles = random_cluster(300, 42, 500.0);
        let mut tree = MultipoleTree::new();
        tree.upsweep(&particles);

        for node in tree.nodes() {
            let covered: Scalar = tree.order()[node.range()]
                .iter()
                .map(|&i| particles.m[i as usize])
                .sum();
            assert_relative_eq!(node.mass, covered, max_relative = 1e-12);
        }
    }

    #[test]
    fn children_partition_parent_range_exactly() {
        let particles = random_cluster(200, 7, 100.0);
        let mut tree = MultipoleTree::new();
        tree.upsweep(&particles);

        for node in tree.nodes() {
            if node.is_leaf() {
                continue;
            }
            let mut cursor = node.start;
            for &c in &node.children {
                if c >= 0 {
                    let child = &tree.nodes()[c as usize];
                    assert_eq!(child.start, cursor);
                    cursor = child.end;
                }
            }
            assert_eq!(cursor, node.end);
        }
    }

    #[test]
    fn every_particle_belongs_to_exactly_one_leaf() {
        let particles = random_cluster(150, 3, 50.0);
        let mut tree = MultipoleTree::new();
        tree.upsweep(&particles);

        let mut seen = vec![0u32; particles.len()];
        for node in tree.nodes() {
            if node.is_leaf() {
                for &i in &tree.order()[node.range()] {
                    seen[i as usize] += 1;
                }
            }
        }
        assert!(seen.iter().all(|&count| count == 1));
    }

    #[test]
    fn internal_moments_match_direct_aggregation() {
        let particles = random_cluster(120, 11, 200.0);
        let mut tree = MultipoleTree::new();
        tree.upsweep(&particles);

        let root = *tree.root().unwrap();
        let (mass, com, quad) = leaf_moments(tree.order(), &particles, root.bounds);

        assert_relative_eq!(root.mass, mass, max_relative = 1e-12);
        assert_relative_eq!(root.com.x, com.x, epsilon = 1e-9, max_relative = 1e-9);
        assert_relative_eq!(root.com.y, com.y, epsilon = 1e-9, max_relative = 1e-9);
        assert_relative_eq!(root.com.z, com.z, epsilon = 1e-9, max_relative = 1e-9);
        assert_relative_eq!(root.quad.xx, quad.xx, epsilon = 1e-3, max_relative = 1e-6);
        assert_relative_eq!(root.quad.yz, quad.yz, epsilon = 1e-3, max_relative = 1e-6);
        assert_relative_eq!(root.quad.zz, quad.zz, epsilon = 1e-3, max_relative = 1e-6);
    }

    #[test]
    fn quadrupole_stays_traceless() {
        let particles = random_cluster(80, 23, 300.0);
        let mut tree = MultipoleTree::new();
        tree.upsweep(&particles);

        for node in tree.nodes() {
            let trace = node.quad.xx + node.quad.yy + node.quad.zz;
            let scale = node.quad.xx.abs() + node.quad.yy.abs() + node.quad.zz.abs();
            assert!(trace.abs() <= 1e-9 * scale.max(1.0));
        }
    }

    #[test]
    fn empty_snapshot_builds_empty_tree() {
        let particles = ParticleSet::new();
        let mut tree = MultipoleTree::new();
        tree.upsweep(&particles);

        assert!(tree.root().is_none());
        assert!(tree.order().is_empty());
    }

    #[test]
    fn coincident_particles_terminate() {
        let mut particles = ParticleSet::new();
        for _ in 0..64 {
            particles.push(Vector::new(1.0, 2.0, 3.0), 0.1, 1.0);
        }
        let mut tree = MultipoleTree::new();
        tree.upsweep(&particles);

        let root = tree.root().unwrap();
        assert_relative_eq!(root.mass, 64.0, max_relative = 1e-12);
    }
}
