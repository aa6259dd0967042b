//! Fork-based parallel solving coordination.

use crate::config::CoordinatorConfig;
use crate::error::ParallelError;
use crate::solver::Solver;

/// How a coordinator invocation was handled.
#[derive(Debug)]
pub enum RunOutcome {
    /// The parent forked workers and aggregated their output; the caller
    /// must not solve again.
    HandledByWorkers(RunSummary),
    /// Parallel execution is disabled or unavailable; the caller should
    /// solve inline instead.
    RunInline,
}

/// Result of a completed parent-side run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Workers asked for (after clamping).
    pub workers_requested: u32,
    /// Workers that actually forked.
    pub workers_started: u32,
    /// Solution lines printed on the aggregated stream.
    pub solutions_found: u32,
    /// Final `(next_index, total)` of the shared queue in queue mode.
    pub queue_state: Option<(u32, u32)>,
}

/// Forks workers over the combo space and multiplexes their output into
/// a single aggregated stream.
pub struct Coordinator {
    config: CoordinatorConfig,
}

impl Coordinator {
    /// A coordinator for `config`. Nothing happens until [`run`](Self::run).
    pub fn new(config: CoordinatorConfig) -> Coordinator {
        Coordinator { config }
    }

    /// Fork, supervise, and drain one set of workers.
    ///
    /// In each forked child this call configures a [`WorkerContext`]
    /// (worker `i` defaults to the strided slice `Range(i-1, K)`), runs
    /// the solver, and exits the process — it only returns in the parent.
    /// On interrupt the same signal is propagated to every child, the
    /// pipes are drained, and the signal is re-raised with its default
    /// disposition.
    ///
    /// [`WorkerContext`]: crate::WorkerContext
    #[cfg(unix)]
    pub fn run<S: Solver>(&self, solver: &S) -> Result<RunOutcome, ParallelError> {
        use std::io;
        use std::time::Instant;

        use crate::config::MAX_WORKERS;
        use crate::phase::{Phase, SuperviseExit};
        use crate::sys;

        if self.config.workers == 0 {
            return Ok(RunOutcome::RunInline);
        }
        let requested = self.config.workers.min(MAX_WORKERS);

        sys::clear_pending_interrupt();
        sys::install_interrupt_handlers();

        let start = Instant::now();
        eprint!(
            "\nUsing {requested} parallel workers (partition order: {})\n",
            self.config.axis_order
        );

        let mut phase = Phase::new(&self.config, self.config.axis_order, requested, start);
        phase.fork_workers(solver);
        if phase.started() == 0 {
            phase.cleanup_queue();
            return Err(ParallelError::NoWorkers { requested });
        }

        let mut stdout = io::stdout();
        match phase.supervise(None, &mut stdout)? {
            SuperviseExit::Interrupted(signal) => {
                phase.kill_live(signal);
                phase.reap(&mut stdout, true)?;
                phase.cleanup_queue();
                sys::reraise_default(signal);
            }
            // No deadline in a normal run; every other exit proceeds to
            // the final reap and drain.
            SuperviseExit::AllFinished | SuperviseExit::CapReached | SuperviseExit::Deadline => {
                phase.reap(&mut stdout, true)?;
            }
        }

        let queue_state = phase.queue_state();
        phase.cleanup_queue();

        Ok(RunOutcome::HandledByWorkers(RunSummary {
            workers_requested: requested,
            workers_started: phase.started(),
            solutions_found: phase.solutions_found(),
            queue_state,
        }))
    }

    /// Without process forking there is nothing to coordinate; the caller
    /// solves inline.
    #[cfg(not(unix))]
    pub fn run<S: Solver>(&self, _solver: &S) -> Result<RunOutcome, ParallelError> {
        if self.config.workers > 0 {
            tracing::warn!("parallel solving is not supported on this platform");
        }
        Ok(RunOutcome::RunInline)
    }
}
