//! Collective reductions across cooperating partitions.
//!
//! Every reduction is a synchronous barrier: a calling partition blocks
//! until all partitions have issued the matching call. Partitions must make
//! the same sequence of collective calls each step; a mismatched call count
//! deadlocks the run. That is the accepted fail-stop contract, not a bug to
//! defend against — there is no cancellation, timeout, or partial result.
//!
//! [`LocalCollective`] is the identity implementation for single-partition
//! runs. [`ThreadCollective`] coordinates in-process partitions (one per
//! thread) through shared slot storage and a [`std::sync::Barrier`]; an
//! MPI-style transport would implement the same trait out of process.

use std::sync::{Arc, Barrier, Mutex};

pub trait Collective: Send + Sync {
    fn rank(&self) -> usize;

    fn num_partitions(&self) -> usize;

    /// Sum a scalar across all partitions. The coordinating partition
    /// (rank 0) is the consumer for reporting; every rank receives the
    /// result so call sequences stay symmetric.
    fn reduce_sum(&self, value: f64) -> f64;

    /// Elementwise minimum across all partitions, in place.
    fn reduce_min(&self, values: &mut [f32]);

    /// Maximum of a counter across all partitions.
    fn reduce_max_u64(&self, value: u64) -> u64;

    /// Full synchronization barrier. Required between the upsweep/traverse
    /// phase and any duration measurement, so per-phase timings reflect the
    /// slowest partition rather than a straggler's local clock.
    fn barrier(&self);
}

/// Identity collective for a single partition.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalCollective;

impl Collective for LocalCollective {
    fn rank(&self) -> usize {
        0
    }

    fn num_partitions(&self) -> usize {
        1
    }

    fn reduce_sum(&self, value: f64) -> f64 {
        value
    }

    fn reduce_min(&self, _values: &mut [f32]) {}

    fn reduce_max_u64(&self, value: u64) -> u64 {
        value
    }

    fn barrier(&self) {}
}

struct Slots {
    barrier: Barrier,
    floats: Mutex<Vec<Vec<f64>>>,
    counters: Mutex<Vec<u64>>,
}

/// Handle to an in-process collective shared by `num_partitions` threads.
///
/// Reductions run in two phases: publish the local contribution, barrier,
/// combine every partition's slot, barrier again. The trailing barrier
/// makes slot storage safe to reuse on the very next call.
pub struct ThreadCollective {
    rank: usize,
    size: usize,
    shared: Arc<Slots>,
}

impl ThreadCollective {
    /// Create one handle per partition; hand each to its thread.
    pub fn split(num_partitions: usize) -> Vec<ThreadCollective> {
        let shared = Arc::new(Slots {
            barrier: Barrier::new(num_partitions),
            floats: Mutex::new(vec![Vec::new(); num_partitions]),
            counters: Mutex::new(vec![0; num_partitions]),
        });

        (0..num_partitions)
            .map(|rank| ThreadCollective {
                rank,
                size: num_partitions,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

impl Collective for ThreadCollective {
    fn rank(&self) -> usize {
        self.rank
    }

    fn num_partitions(&self) -> usize {
        self.size
    }

    fn reduce_sum(&self, value: f64) -> f64 {
        {
            let mut rows = self.shared.floats.lock().unwrap();
            rows[self.rank].clear();
            rows[self.rank].push(value);
        }
        self.shared.barrier.wait();

        let total = {
            let rows = self.shared.floats.lock().unwrap();
            rows.iter().map(|row| row[0]).sum()
        };
        self.shared.barrier.wait();
        total
    }

    fn reduce_min(&self, values: &mut [f32]) {
        {
            let mut rows = self.shared.floats.lock().unwrap();
            rows[self.rank].clear();
            rows[self.rank].extend(values.iter().map(|&v| v as f64));
        }
        self.shared.barrier.wait();

        {
            let rows = self.shared.floats.lock().unwrap();
            for (k, v) in values.iter_mut().enumerate() {
                let min = rows
                    .iter()
                    .map(|row| row[k])
                    .fold(f64::INFINITY, f64::min);
                *v = min as f32;
            }
        }
        self.shared.barrier.wait();
    }

    fn reduce_max_u64(&self, value: u64) -> u64 {
        {
            let mut slots = self.shared.counters.lock().unwrap();
            slots[self.rank] = value;
        }
        self.shared.barrier.wait();

        let max = {
            let slots = self.shared.counters.lock().unwrap();
            slots.iter().copied().max().unwrap_or(0)
        };
        self.shared.barrier.wait();
        max
    }

    fn barrier(&self) {
        self.shared.barrier.wait();
    }
}
