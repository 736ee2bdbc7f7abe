//! Adaptive block time-stepping: per-group dt criteria, the stable dt sort,
//! and globally synchronized rung assignment.
//!
//! Each spatial group gets an integer rung `r`, meaning it advances with
//! timestep `2^r * min_dt` where `min_dt` is the global minimum. Because the
//! per-group dt array is sorted ascending, the groups belonging to one rung
//! form a contiguous index range; `rung_ranges` records those boundaries.
//!
//! The fine-grained criteria (divergence- and acceleration-limited) are only
//! evaluated on the execution path that supports per-group estimation; the
//! coarse path falls back to a single externally supplied global estimate
//! via [`compute_min_timestep`].

use crate::domain::GroupView;
use crate::physics::math::Scalar;
use crate::reduce::Collective;

pub const MAX_NUM_RUNGS: usize = 4;

/// Block-timestep record handed to the external integrator, which owns
/// `substep` and `dt_drift` across the sub-cycles of one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timestep {
    /// Global minimum group timestep.
    pub min_dt: f32,
    /// Number of active rungs, always in `[1, MAX_NUM_RUNGS]`.
    pub num_rungs: usize,
    /// Position within the rung cycle; zero at creation.
    pub substep: usize,
    /// `rung_ranges[r]..rung_ranges[r + 1]` indexes the sorted groups on
    /// rung `r`. Non-decreasing, `rung_ranges[0] == 0`, and every entry from
    /// `num_rungs` on equals the group count.
    pub rung_ranges: [u32; MAX_NUM_RUNGS + 1],
    /// Per-rung accumulated drift; zero at creation.
    pub dt_drift: [f32; MAX_NUM_RUNGS],
}

impl Timestep {
    pub fn single_rung(min_dt: f32, num_groups: u32) -> Self {
        let mut rung_ranges = [num_groups; MAX_NUM_RUNGS + 1];
        rung_ranges[0] = 0;
        Self {
            min_dt,
            num_rungs: 1,
            substep: 0,
            rung_ranges,
            dt_drift: [0.0; MAX_NUM_RUNGS],
        }
    }
}

/// Reusable key/value buffer for [`sort_group_dt`], holding one
/// `(f32, u32)` pair per group. Kept across calls so steady-state steps
/// sort without reallocating.
#[derive(Debug, Default)]
pub struct SortScratch {
    pairs: Vec<(f32, u32)>,
}

/// Stable ascending sort of `group_dt`, writing the permutation back to
/// original group identity into `group_indices`.
pub fn sort_group_dt(group_dt: &mut [f32], group_indices: &mut [u32], scratch: &mut SortScratch) {
    debug_assert_eq!(group_dt.len(), group_indices.len());

    scratch.pairs.clear();
    scratch
        .pairs
        .extend(group_dt.iter().enumerate().map(|(i, &dt)| (dt, i as u32)));
    scratch.pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    for (k, &(dt, index)) in scratch.pairs.iter().enumerate() {
        group_dt[k] = dt;
        group_indices[k] = index;
    }
}

/// Local minimum timestep and the timestep at the boundary of the
/// fastest-moving fraction of groups. Requires a non-empty sorted input;
/// the boundary index is clamped to `[0, len - 1]`.
pub fn timestep_range(sorted_dt: &[f32], fast_fraction: f32) -> [f32; 2] {
    let n = sorted_dt.len();
    let boundary = ((fast_fraction * n as f32) as usize).min(n - 1);
    [sorted_dt[0], sorted_dt[boundary]]
}

/// Divergence-limited dt per group: `dt = k_rho / |div v|`, minimized over
/// the group's particles. Only ever tightens the incoming bound.
pub fn group_divv_timestep(k_rho: f32, groups: &GroupView, divv: &[Scalar], group_dt: &mut [f32]) {
    for g in 0..groups.num_groups() {
        let mut dt = group_dt[g];
        for i in groups.range(g) {
            let div = divv[i].abs();
            if div > 0.0 {
                dt = dt.min((f64::from(k_rho) / div) as f32);
            }
        }
        group_dt[g] = dt;
    }
}

/// Acceleration-limited dt per group: `dt = coeff / sqrt(|a|)` with
/// `coeff = eta_acc * sqrt(softening)`, minimized over the group's
/// particles. Only ever tightens the incoming bound.
pub fn group_acc_timestep(
    coeff: f32,
    groups: &GroupView,
    ax: &[Scalar],
    ay: &[Scalar],
    az: &[Scalar],
    group_dt: &mut [f32],
) {
    for g in 0..groups.num_groups() {
        let mut dt = group_dt[g];
        for i in groups.range(g) {
            let a = (ax[i] * ax[i] + ay[i] * ay[i] + az[i] * az[i]).sqrt();
            if a > 0.0 {
                dt = dt.min((f64::from(coeff) / a.sqrt()) as f32);
            }
        }
        group_dt[g] = dt;
    }
}

/// Coarse-path timestep: globally min-reduce a single external estimate and
/// put every group on one rung.
pub fn compute_min_timestep(
    local_estimate: f32,
    num_groups: usize,
    collective: &dyn Collective,
) -> Timestep {
    let mut bounds = [local_estimate];
    collective.reduce_min(&mut bounds);
    Timestep::single_rung(bounds[0], num_groups as u32)
}

/// Sorts local group timesteps and bins them into globally consistent rungs.
#[derive(Debug)]
pub struct RungScheduler {
    fast_fraction: f32,
    scratch: SortScratch,
}

impl RungScheduler {
    pub fn new(fast_fraction: f32) -> Self {
        Self {
            fast_fraction,
            scratch: SortScratch::default(),
        }
    }

    /// Fine-grained path. Sorts `group_dt` ascending (recording the
    /// permutation in `group_indices`), min-reduces the local
    /// `(min, fast-fraction boundary)` bounds across partitions, derives the
    /// globally consistent rung count, and bins this partition's sorted dt
    /// array into `rung_ranges` by lower-bound search on `2^r * min_dt`.
    ///
    /// A partition with zero groups skips all local arithmetic but still
    /// joins the reduction with identity bounds; the returned record is then
    /// the trivial single-rung state unless other partitions report real
    /// bounds.
    pub fn compute_rung_timestep(
        &mut self,
        group_dt: &mut [f32],
        group_indices: &mut [u32],
        collective: &dyn Collective,
    ) -> Timestep {
        let num_groups = group_dt.len();

        let mut bounds = [f32::MAX, f32::MAX];
        if num_groups > 0 {
            sort_group_dt(group_dt, group_indices, &mut self.scratch);
            bounds = timestep_range(group_dt, self.fast_fraction);
        }
        collective.reduce_min(&mut bounds);
        let [min_dt, bound] = bounds;

        // num_rungs comes from global bounds only, so every partition agrees
        // on it regardless of its local group count. Uniform dt gives
        // bound == min_dt and exactly one rung, with no log of a degenerate
        // ratio.
        let mut num_rungs = 1;
        if min_dt > 0.0 && min_dt < f32::MAX && bound > min_dt {
            num_rungs = (libm::log2f(bound / min_dt) as i32 + 1)
                .clamp(1, MAX_NUM_RUNGS as i32) as usize;
        }

        let mut rung_ranges = [0u32; MAX_NUM_RUNGS + 1];
        for entry in rung_ranges.iter_mut().skip(1) {
            *entry = num_groups as u32;
        }
        for rung in 1..num_rungs {
            let max_dt_rung = (1u32 << rung) as f32 * min_dt;
            rung_ranges[rung] = group_dt.partition_point(|&dt| dt < max_dt_rung) as u32;
        }

        Timestep {
            min_dt,
            num_rungs,
            substep: 0,
            rung_ranges,
            dt_drift: [0.0; MAX_NUM_RUNGS],
        }
    }
}
