//! Observability for a ring tree.
//!
//! Mirrors the metrics split used across the library: *recording* happens
//! inline in ring operations against a [`TreeStats`] observer owned by the
//! tree (never process-global, so independent trees coexist), while
//! *consumption* goes through plain snapshot structs.
//!
//! ## Key Components
//!
//! - [`TreeStats`]: atomic counters for nodes, keys, remapped keys, and
//!   gossip deliveries, plus the per-epoch remap log.
//! - [`TimingObserver`] / [`OpTimes`]: optional operation-latency callback
//!   and a ready-made recorder with mean/variance/stddev reporting.
//! - [`LoadSummary`], [`RingLoadReport`], [`HierarchyReport`]: load and
//!   shape statistics computed from tree snapshots.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

// ---------------------------------------------------------------------------
// Counters and remap epochs
// ---------------------------------------------------------------------------

/// Point-in-time view of the tree-wide counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub nodes: usize,
    pub keys: usize,
    pub remapped: usize,
    pub gossip_messages: usize,
}

/// One closed remap epoch: how many keys actually moved during a structural
/// event versus the consistent-hashing expectation (`keys / nodes`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemapEpoch {
    pub actual: usize,
    pub expected: usize,
}

/// Aggregated remap behavior over all closed epochs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemapStats {
    pub total_remapped: usize,
    /// Mean keys moved per epoch that moved anything.
    pub mean_per_epoch: f64,
    /// Ratio of actual moves to the consistent-hashing expectation.
    pub actual_to_expected: f64,
}

/// Shared observer updated by every ring in one tree.
#[derive(Debug, Default)]
pub struct TreeStats {
    nodes: AtomicUsize,
    keys: AtomicUsize,
    remapped_total: AtomicUsize,
    epoch_remapped: AtomicUsize,
    gossips: AtomicUsize,
    epochs: Mutex<Vec<RemapEpoch>>,
}

impl TreeStats {
    pub(crate) fn node_added(&self) {
        self.nodes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn node_removed(&self) {
        self.nodes.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn key_added(&self) {
        self.keys.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn key_removed(&self) {
        self.keys.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn key_remapped(&self) {
        self.remapped_total.fetch_add(1, Ordering::Relaxed);
        self.epoch_remapped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn gossip_delivered(&self) {
        self.gossips.fetch_add(1, Ordering::Relaxed);
    }

    /// Closes the current remap epoch after a structural event.
    pub(crate) fn end_remap_epoch(&self) {
        let actual = self.epoch_remapped.swap(0, Ordering::Relaxed);
        let nodes = self.nodes.load(Ordering::Relaxed).max(1);
        let expected = self.keys.load(Ordering::Relaxed) / nodes;
        self.epochs.lock().push(RemapEpoch { actual, expected });
    }

    pub fn counters(&self) -> CounterSnapshot {
        CounterSnapshot {
            nodes: self.nodes.load(Ordering::Relaxed),
            keys: self.keys.load(Ordering::Relaxed),
            remapped: self.remapped_total.load(Ordering::Relaxed),
            gossip_messages: self.gossips.load(Ordering::Relaxed),
        }
    }

    /// Aggregates the remap log; epochs that moved nothing are skipped.
    pub fn remap_stats(&self) -> RemapStats {
        let epochs = self.epochs.lock();
        let mut total = 0usize;
        let mut expected = 0usize;
        let mut counted = 0usize;
        for epoch in epochs.iter() {
            if epoch.actual == 0 {
                continue;
            }
            total += epoch.actual;
            expected += epoch.expected;
            counted += 1;
        }
        RemapStats {
            total_remapped: total,
            mean_per_epoch: if counted == 0 {
                0.0
            } else {
                total as f64 / counted as f64
            },
            actual_to_expected: if expected == 0 {
                0.0
            } else {
                total as f64 / expected as f64
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Operation timing
// ---------------------------------------------------------------------------

/// Ring operations that report latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    InsertNode,
    RemoveNode,
    InsertKey,
    RemoveKey,
    Lookup,
    Split,
    Collapse,
}

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::InsertNode => "insert_node",
            Op::RemoveNode => "remove_node",
            Op::InsertKey => "insert_key",
            Op::RemoveKey => "remove_key",
            Op::Lookup => "lookup",
            Op::Split => "split",
            Op::Collapse => "collapse",
        }
    }
}

/// Callback invoked with the latency of each completed operation.
pub trait TimingObserver: Send + Sync {
    fn record(&self, op: Op, elapsed: Duration);
}

/// Latency distribution for one operation kind, in microseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OpTimeStats {
    pub count: usize,
    pub mean: f64,
    pub variance: f64,
    pub stddev: f64,
}

/// A [`TimingObserver`] that keeps every sample and reports distributions.
#[derive(Debug, Default)]
pub struct OpTimes {
    samples: Mutex<FxHashMap<Op, Vec<Duration>>>,
}

impl OpTimes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> FxHashMap<Op, OpTimeStats> {
        let samples = self.samples.lock();
        samples
            .iter()
            .filter(|(_, times)| !times.is_empty())
            .map(|(&op, times)| {
                let micros: Vec<f64> = times.iter().map(|t| t.as_nanos() as f64 / 1000.0).collect();
                let (mean, variance, stddev) = distribution(&micros);
                (
                    op,
                    OpTimeStats {
                        count: micros.len(),
                        mean,
                        variance,
                        stddev,
                    },
                )
            })
            .collect()
    }
}

impl TimingObserver for OpTimes {
    fn record(&self, op: Op, elapsed: Duration) {
        self.samples.lock().entry(op).or_default().push(elapsed);
    }
}

// ---------------------------------------------------------------------------
// Load and shape reports
// ---------------------------------------------------------------------------

/// Node loads across the whole tree with distribution statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadSummary {
    pub loads: Vec<usize>,
    pub mean: f64,
    pub variance: f64,
    pub stddev: f64,
}

/// Per-ring load report; sub-ring totals count as a single load entry in
/// their parent's report.
#[derive(Debug, Clone, PartialEq)]
pub struct RingLoadReport {
    pub id: String,
    pub level: u32,
    pub loads: Vec<usize>,
    pub total: usize,
    pub mean: f64,
    pub variance: f64,
    pub stddev: f64,
}

/// Node and ring counts on one level of the hierarchy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LevelReport {
    pub level: u32,
    pub nodes: usize,
    pub rings: usize,
}

/// Shape of the whole hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HierarchyReport {
    pub depth: u32,
    pub levels: Vec<LevelReport>,
    pub nodes: usize,
    pub keys: usize,
}

/// Mean, variance, and standard deviation of a sample.
pub(crate) fn distribution(values: &[f64]) -> (f64, f64, f64) {
    let n = values.len();
    if n == 0 {
        return (0.0, 0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n as f64;
    (mean, variance, variance.sqrt())
}

pub(crate) fn load_distribution(loads: &[usize]) -> (f64, f64, f64) {
    let values: Vec<f64> = loads.iter().map(|&l| l as f64).collect();
    distribution(&values)
}
