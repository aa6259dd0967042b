//! The seam between coordination and the actual search engine.

use std::io;
use std::time::Instant;

use gabel_core::{AxisOrder, FirstMoveFilter, PartitionSpec};
use gabel_proto::StructuredOut;

/// The pluggable search engine run inside each worker.
///
/// `solve` is called exactly once per worker process (and once for an
/// inline single-process run). Implementations emit their results
/// through [`WorkerContext::out`] and report only I/O failures; search
/// outcomes travel over the protocol.
pub trait Solver {
    /// Solve the slice of the combo space described by `ctx`.
    fn solve(&self, ctx: &mut WorkerContext) -> io::Result<()>;
}

/// Per-worker solving environment.
///
/// In a forked worker, `out` writes to stderr, which the fork wired to
/// the coordinator pipe; in an inline run it is plain stderr, enabled
/// only in worker mode.
#[derive(Debug)]
pub struct WorkerContext {
    /// 1-based worker number; 0 for an inline run.
    pub worker_number: u32,
    /// The slice of the combo space this worker owns.
    pub partition: PartitionSpec,
    /// Axis order for enumerating the slice.
    pub axis_order: AxisOrder,
    /// First-move filter to consult at the forward-solve root.
    pub filter: FirstMoveFilter,
    /// Protocol emitter.
    pub out: StructuredOut<io::Stderr>,
    start: Instant,
}

impl WorkerContext {
    /// Build a context; `structured` enables protocol output.
    pub fn new(
        worker_number: u32,
        partition: PartitionSpec,
        axis_order: AxisOrder,
        filter: FirstMoveFilter,
        structured: bool,
    ) -> WorkerContext {
        WorkerContext {
            worker_number,
            partition,
            axis_order,
            filter,
            out: StructuredOut::stderr(structured),
            start: Instant::now(),
        }
    }

    /// Seconds since this worker started solving.
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}
