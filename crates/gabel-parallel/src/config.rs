//! Coordinator configuration.
//!
//! Everything a run needs travels in one explicit struct; forked children
//! read their copy once after the fork and act on it.

use std::path::PathBuf;

use gabel_core::{AxisOrder, PartitionSpec};

/// Upper bound on the worker count; larger requests are clamped.
pub const MAX_WORKERS: u32 = 1024;

/// Which first-move filter the workers run with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterSpec {
    /// No first-move filtering.
    #[default]
    Off,
    /// Fixed residue class of first-move offsets.
    Static {
        /// Residue kept by this run's workers.
        index: u32,
        /// Number of partitions.
        total: u32,
    },
    /// Rotating assignment through the shared work queue; the
    /// coordinator creates the queue before forking.
    Queue,
}

/// Configuration for one coordinator (or probe phase) run.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Number of workers to fork. 0 disables parallel solving.
    pub workers: u32,
    /// Axis order used when enumerating combos.
    pub axis_order: AxisOrder,
    /// Partition applied to every worker; `None` gives worker `i` the
    /// strided slice `Range(i - 1, workers, MAX_COMBOS)`.
    pub partition: Option<PartitionSpec>,
    /// First-move filter mode for the workers.
    pub first_move_filter: FilterSpec,
    /// Stop the run once this many solution lines were printed.
    pub max_solutions_per_phase: Option<u32>,
    /// Print aggregated depth rows as progress arrives.
    pub show_progress: bool,
    /// Where the shared queue file lives; defaults to the system temp
    /// directory.
    pub queue_path: Option<PathBuf>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfig {
            workers: 0,
            axis_order: AxisOrder::default(),
            partition: None,
            first_move_filter: FilterSpec::Off,
            max_solutions_per_phase: None,
            show_progress: false,
            queue_path: None,
        }
    }
}
