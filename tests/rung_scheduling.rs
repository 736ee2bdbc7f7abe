//! Multi-partition rung scheduling through the thread-backed collective.

use starsweep::prelude::*;
use starsweep::timestep::compute_min_timestep;
use std::thread;

fn schedule_on_partitions(dt_sets: Vec<Vec<f32>>, fast_fraction: f32) -> Vec<Timestep> {
    let handles = ThreadCollective::split(dt_sets.len());

    thread::scope(|scope| {
        let joins: Vec<_> = dt_sets
            .into_iter()
            .zip(handles)
            .map(|(mut dt, collective)| {
                scope.spawn(move || {
                    let mut indices = vec![0u32; dt.len()];
                    let mut scheduler = RungScheduler::new(fast_fraction);
                    scheduler.compute_rung_timestep(&mut dt, &mut indices, &collective)
                })
            })
            .collect();
        joins.into_iter().map(|j| j.join().unwrap()).collect()
    })
}

#[test]
fn three_partition_scenario_min_reduces_bounds() {
    // Local (min, bound) pairs with fast_fraction 0.4 over 3 groups each:
    // [1,2,4] -> (1,2); [1,1,8] -> (1,1); [2,2,2] -> (2,2).
    // Global bounds are (1, 1), so every partition agrees on a single rung.
    let timesteps = schedule_on_partitions(
        vec![
            vec![1.0, 2.0, 4.0],
            vec![1.0, 1.0, 8.0],
            vec![2.0, 2.0, 2.0],
        ],
        0.4,
    );

    for ts in &timesteps {
        assert_eq!(ts.min_dt, 1.0);
        assert_eq!(ts.num_rungs, 1);
        assert_eq!(ts.rung_ranges, [0, 3, 3, 3, 3]);
        assert_eq!(ts.substep, 0);
        assert!(ts.dt_drift.iter().all(|&d| d == 0.0));
    }
}

#[test]
fn partitions_bin_their_own_sorted_arrays_against_global_bounds() {
    // Bounds at index 1 of each sorted array: (1,2), (1,8), (2,4).
    // Global (1,2) gives two rungs; each partition bins its local sorted
    // dt array against the shared 2 * min_dt boundary.
    let timesteps = schedule_on_partitions(
        vec![
            vec![4.0, 1.0, 2.0],
            vec![8.0, 8.0, 1.0],
            vec![4.0, 2.0, 4.0],
        ],
        0.4,
    );

    for ts in &timesteps {
        assert_eq!(ts.min_dt, 1.0);
        assert_eq!(ts.num_rungs, 2);
    }

    // sorted: [1,2,4] -> one group below dt = 2
    assert_eq!(timesteps[0].rung_ranges, [0, 1, 3, 3, 3]);
    // sorted: [1,8,8] -> one group below dt = 2
    assert_eq!(timesteps[1].rung_ranges, [0, 1, 3, 3, 3]);
    // sorted: [2,4,4] -> nothing below dt = 2
    assert_eq!(timesteps[2].rung_ranges, [0, 0, 3, 3, 3]);
}

#[test]
fn empty_partition_joins_the_reduction_without_arithmetic() {
    let timesteps = schedule_on_partitions(
        vec![vec![0.5, 1.0, 2.0, 4.0], vec![], vec![1.0, 1.0]],
        0.4,
    );

    // All partitions agree on global bounds (0.5, 1.0) -> two rungs.
    for ts in &timesteps {
        assert_eq!(ts.min_dt, 0.5);
        assert_eq!(ts.num_rungs, 2);
    }

    // The empty partition reports a trivial local binning.
    assert_eq!(timesteps[1].rung_ranges, [0, 0, 0, 0, 0]);
    // sorted: [0.5,1,2,4] -> one group below dt = 1.0
    assert_eq!(timesteps[0].rung_ranges, [0, 1, 4, 4, 4]);
    assert_eq!(timesteps[2].rung_ranges, [0, 0, 2, 2, 2]);
}

#[test]
fn rung_ranges_stay_monotonic_for_random_partitions() {
    let mut rng = SharedRng::from_seed(31);
    let dt_sets: Vec<Vec<f32>> = (0..4)
        .map(|_| {
            let n = rng.random_range(1..64usize);
            (0..n).map(|_| rng.random_range(0.01..10.0f32)).collect()
        })
        .collect();
    let sizes: Vec<usize> = dt_sets.iter().map(Vec::len).collect();

    let timesteps = schedule_on_partitions(dt_sets, 0.4);

    let num_rungs = timesteps[0].num_rungs;
    for (ts, n) in timesteps.iter().zip(sizes) {
        assert_eq!(ts.num_rungs, num_rungs, "rung count must be global");
        assert_eq!(ts.rung_ranges[0], 0);
        assert!(ts.rung_ranges.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(ts.rung_ranges[ts.num_rungs], n as u32);
        assert_eq!(ts.rung_ranges[MAX_NUM_RUNGS], n as u32);
    }
}

#[test]
fn global_energy_reduction_sums_partition_contributions() {
    for partitions in 1..=5usize {
        let handles = ThreadCollective::split(partitions);

        let totals: Vec<f64> = thread::scope(|scope| {
            let joins: Vec<_> = handles
                .into_iter()
                .map(|collective| {
                    scope.spawn(move || {
                        let local_energy = -1.5 * (collective.rank() + 1) as f64;
                        collective.reduce_sum(local_energy)
                    })
                })
                .collect();
            joins.into_iter().map(|j| j.join().unwrap()).collect()
        });

        let expected: f64 = (1..=partitions).map(|r| -1.5 * r as f64).sum();
        for total in totals {
            assert!((total - expected).abs() < 1e-12);
        }
    }
}

#[test]
fn coarse_path_min_reduces_external_estimates() {
    let handles = ThreadCollective::split(3);

    let timesteps: Vec<Timestep> = thread::scope(|scope| {
        let joins: Vec<_> = handles
            .into_iter()
            .map(|collective| {
                scope.spawn(move || {
                    let estimate = [0.04f32, 0.01, 0.02][collective.rank()];
                    compute_min_timestep(estimate, 5, &collective)
                })
            })
            .collect();
        joins.into_iter().map(|j| j.join().unwrap()).collect()
    });

    for ts in timesteps {
        assert_eq!(ts.min_dt, 0.01);
        assert_eq!(ts.num_rungs, 1);
        assert_eq!(ts.rung_ranges[1], 5);
    }
}
