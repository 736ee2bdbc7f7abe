//! Seam to the external domain-decomposition collaborator.
//!
//! Partitioning particles across compute units and materializing halo
//! copies is not this crate's job. The [`Domain`] trait is the contract the
//! orchestrator drives each step; [`LocalDomain`] is the trivial
//! single-partition implementation used by the driver and tests. Multi-rank
//! deployments plug in their own exchange behind the same trait.

use crate::error::Result;
use crate::physics::particles::ParticleSet;

/// Contiguous, non-overlapping ranges of local particle indices sharing
/// spatial locality. Groups are the unit of traversal parallelism and of
/// timestep-rung assignment. Produced by the domain; read-only here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupView {
    /// Range boundaries over local indices: group `g` covers
    /// `starts[g]..starts[g + 1]`. Always `num_groups + 1` entries, with
    /// `starts[0]` the first owned index.
    starts: Vec<u32>,
}

impl GroupView {
    /// Split `[first, last)` into fixed-size chunks. The final group
    /// absorbs the remainder.
    pub fn fixed_size(first: usize, last: usize, group_size: usize) -> Self {
        let group_size = group_size.max(1);
        let mut starts = Vec::with_capacity((last - first) / group_size + 2);
        let mut cursor = first;
        starts.push(cursor as u32);
        while cursor < last {
            cursor = (cursor + group_size).min(last);
            starts.push(cursor as u32);
        }
        Self { starts }
    }

    pub fn from_starts(starts: Vec<u32>) -> Self {
        debug_assert!(starts.windows(2).all(|w| w[0] <= w[1]));
        Self { starts }
    }

    pub fn num_groups(&self) -> usize {
        self.starts.len().saturating_sub(1)
    }

    pub fn first_body(&self) -> usize {
        self.starts.first().copied().unwrap_or(0) as usize
    }

    pub fn last_body(&self) -> usize {
        self.starts.last().copied().unwrap_or(0) as usize
    }

    pub fn range(&self, group: usize) -> std::ops::Range<usize> {
        self.starts[group] as usize..self.starts[group + 1] as usize
    }

    pub fn ranges(&self) -> Vec<std::ops::Range<usize>> {
        (0..self.num_groups()).map(|g| self.range(g)).collect()
    }
}

/// External collaborator owning particle distribution and halo exchange.
///
/// `sync_gravity` is a synchronous, blocking exchange: on return, positions,
/// smoothing lengths, masses, and the dependent scratch fields of every halo
/// slot are current for this step. The orchestrator calls it exactly once
/// per step and never proceeds without it.
pub trait Domain {
    /// Local array length including halo padding.
    fn n_particles_with_halos(&self) -> usize;

    /// First locally-owned index; halo slots live below it.
    fn start_index(&self) -> usize;

    /// One past the last locally-owned index; halo slots live above it.
    fn end_index(&self) -> usize;

    /// Spatial grouping of the owned range.
    fn group_view(&self) -> &GroupView;

    /// Refresh halo particles (blocking).
    fn sync_gravity(&mut self, particles: &mut ParticleSet) -> Result<()>;
}

/// Whole particle set owned by one partition; no halo, fixed-size grouping.
#[derive(Debug)]
pub struct LocalDomain {
    n: usize,
    groups: GroupView,
}

impl LocalDomain {
    pub fn new(n: usize, group_size: usize) -> Self {
        Self {
            n,
            groups: GroupView::fixed_size(0, n, group_size),
        }
    }
}

impl Domain for LocalDomain {
    fn n_particles_with_halos(&self) -> usize {
        self.n
    }

    fn start_index(&self) -> usize {
        0
    }

    fn end_index(&self) -> usize {
        self.n
    }

    fn group_view(&self) -> &GroupView {
        &self.groups
    }

    fn sync_gravity(&mut self, particles: &mut ParticleSet) -> Result<()> {
        // Single partition: every particle is local, nothing to exchange.
        particles.resize(self.n);
        Ok(())
    }
}
