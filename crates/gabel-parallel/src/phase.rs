//! One fork-supervise-drain cycle over a set of workers.
//!
//! A normal parallel run is a single phase; the probe driver runs one
//! phase per axis order with a wall-clock deadline on top. The phase owns
//! the worker records and the aggregated output state; the child side of
//! every fork diverges into the solver and never returns.

use std::io::{self, Write};
use std::os::fd::{OwnedFd, RawFd};
use std::path::PathBuf;
use std::process;
use std::time::{Duration, Instant};

use tracing::warn;

use gabel_core::{FirstMoveFilter, PartitionSpec, SharedQueue, AxisOrder, MAX_COMBOS};

use crate::aggregate::{LineAction, OutputAggregator};
use crate::config::{CoordinatorConfig, FilterSpec};
use crate::error::ParallelError;
use crate::solver::{Solver, WorkerContext};
use crate::sys;
use crate::worker::WorkerRecord;

/// Bytes read from a worker pipe per readiness wakeup.
const READ_CHUNK: usize = 4096;
/// Interval between stderr status snapshots.
const STATUS_INTERVAL: Duration = Duration::from_secs(10);
/// Workers at or below this count are listed individually in a snapshot.
const STATUS_LIST_LIMIT: usize = 16;

/// Why the supervise loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SuperviseExit {
    /// Every worker pipe has closed.
    AllFinished,
    /// The solution cap was reached; workers were terminated and marked.
    CapReached,
    /// The phase deadline expired with workers still live.
    Deadline,
    /// An interrupt signal arrived; payload is the signal number.
    Interrupted(i32),
}

pub(crate) struct Phase<'a> {
    config: &'a CoordinatorConfig,
    axis_order: AxisOrder,
    requested: u32,
    start: Instant,
    last_status: Instant,
    workers: Vec<WorkerRecord>,
    active: usize,
    completed: usize,
    started: u32,
    suppress_notices: bool,
    agg: OutputAggregator,
    queue: Option<SharedQueue>,
    queue_path: Option<PathBuf>,
}

impl<'a> Phase<'a> {
    /// Set up a phase (no forks yet). Creates the shared queue when the
    /// filter runs in queue mode; a failed queue setup only disables the
    /// filter.
    pub(crate) fn new(
        config: &'a CoordinatorConfig,
        axis_order: AxisOrder,
        requested: u32,
        start: Instant,
    ) -> Phase<'a> {
        let (queue, queue_path) = match config.first_move_filter {
            FilterSpec::Queue => {
                let path = config.queue_path.clone().unwrap_or_else(|| {
                    std::env::temp_dir().join(format!("gabel-queue-{}", process::id()))
                });
                match SharedQueue::create(&path, requested) {
                    Ok(queue) => (Some(queue), Some(path)),
                    Err(error) => {
                        warn!(%error, path = %path.display(), "work queue setup failed, filter disabled");
                        (None, None)
                    }
                }
            }
            _ => (None, None),
        };

        Phase {
            config,
            axis_order,
            requested,
            start,
            last_status: start,
            workers: Vec::with_capacity(requested as usize),
            active: 0,
            completed: 0,
            started: 0,
            suppress_notices: false,
            agg: OutputAggregator::new(start, config.show_progress, config.max_solutions_per_phase),
            queue,
            queue_path,
        }
    }

    /// Fork one worker per slot. The child side configures its context
    /// and diverges into the solver; failures skip the slot.
    pub(crate) fn fork_workers<S: Solver>(&mut self, solver: &S) {
        for slot in 1..=self.requested {
            let (read_fd, write_fd) = match sys::pipe() {
                Ok(pair) => pair,
                Err(error) => {
                    warn!(%error, slot, "pipe failed, skipping worker slot");
                    continue;
                }
            };
            match sys::fork() {
                Err(error) => {
                    warn!(%error, slot, "fork failed, skipping worker slot");
                }
                Ok(sys::Fork::Child) => {
                    drop(read_fd);
                    self.run_worker(solver, slot, write_fd);
                }
                Ok(sys::Fork::Parent(pid)) => {
                    drop(write_fd);
                    let record = WorkerRecord::new(pid, read_fd, slot);
                    if let Some(fd) = record.fd()
                        && let Err(error) = sys::set_nonblocking(fd, true)
                    {
                        warn!(%error, slot, "could not make worker pipe non-blocking");
                    }
                    self.workers.push(record);
                }
            }
        }

        self.started = self.workers.len() as u32;
        self.active = self.workers.len();
        if self.started < self.requested {
            eprintln!(
                "Warning: only {} of {} workers started (fork/pipe limit?)",
                self.started, self.requested
            );
        }
    }

    /// Child side of a fork: wire stdio to the pipe, build the context,
    /// run the solver, exit.
    fn run_worker<S: Solver>(&mut self, solver: &S, slot: u32, write_fd: OwnedFd) -> ! {
        if let Err(error) = sys::redirect_stdio(&write_fd) {
            eprintln!("worker {slot}: stdio redirect failed: {error}");
            process::exit(1);
        }
        drop(write_fd);
        sys::reset_interrupt_handlers();

        let partition = self.config.partition.unwrap_or(PartitionSpec::Range {
            start: slot - 1,
            stride: self.requested,
            max: MAX_COMBOS,
        });
        let filter = match self.config.first_move_filter {
            FilterSpec::Off => FirstMoveFilter::off(),
            FilterSpec::Static { index, total } => {
                FirstMoveFilter::fixed(index, total).unwrap_or_else(|_| FirstMoveFilter::off())
            }
            // This child's copy of the inherited descriptor.
            FilterSpec::Queue => match self.queue.take() {
                Some(queue) => FirstMoveFilter::queue(queue),
                None => FirstMoveFilter::off(),
            },
        };

        let mut ctx = WorkerContext::new(slot, partition, self.axis_order, filter, true);
        let code = match solver.solve(&mut ctx) {
            Ok(()) => 0,
            Err(error) => {
                eprintln!("worker {slot} failed: {error}");
                1
            }
        };
        process::exit(code);
    }

    /// Multiplex the worker pipes until every pipe closes, the deadline
    /// expires, the solution cap fires, or an interrupt arrives.
    pub(crate) fn supervise(
        &mut self,
        deadline: Option<Instant>,
        out: &mut impl Write,
    ) -> Result<SuperviseExit, ParallelError> {
        let mut buf = [0u8; READ_CHUNK];

        while self.active > 0 {
            if let Some(signal) = sys::pending_interrupt() {
                return Ok(SuperviseExit::Interrupted(signal));
            }
            if let Some(deadline) = deadline
                && Instant::now() >= deadline
            {
                return Ok(SuperviseExit::Deadline);
            }

            let live: Vec<RawFd> = self
                .workers
                .iter()
                .filter(|w| !w.finished)
                .filter_map(|w| w.fd())
                .collect();
            let ready = sys::wait_readable(&live, Duration::from_secs(1))?;

            if self.last_status.elapsed() >= STATUS_INTERVAL {
                self.print_status();
                self.last_status = Instant::now();
            }

            if ready.is_empty() {
                continue;
            }

            for idx in 0..self.workers.len() {
                if self.workers[idx].finished {
                    continue;
                }
                let Some(fd) = self.workers[idx].fd() else {
                    continue;
                };
                if !ready.contains(&fd) {
                    continue;
                }
                if self.service_pipe(idx, &mut buf, out)? == LineAction::CapReached {
                    self.kill_all_mark_finished();
                    return Ok(SuperviseExit::CapReached);
                }
            }
        }

        Ok(SuperviseExit::AllFinished)
    }

    /// Read one chunk from worker `idx` and route its completed lines.
    fn service_pipe(
        &mut self,
        idx: usize,
        buf: &mut [u8],
        out: &mut impl Write,
    ) -> Result<LineAction, ParallelError> {
        let Some(fd) = self.workers[idx].fd() else {
            return Ok(LineAction::Continue);
        };
        match sys::read_fd(fd, buf) {
            Ok(0) => {
                self.finish_worker(idx, out)?;
                Ok(LineAction::Continue)
            }
            Ok(n) => {
                let mut lines = Vec::new();
                self.workers[idx]
                    .framer
                    .feed(&buf[..n], |line| lines.push(line.to_owned()));
                for line in &lines {
                    if self.agg.handle_line(&mut self.workers, idx, line, out)?
                        == LineAction::CapReached
                    {
                        // Anything still buffered dies with the workers.
                        return Ok(LineAction::CapReached);
                    }
                }
                Ok(LineAction::Continue)
            }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(LineAction::Continue),
            Err(_) => {
                self.finish_worker(idx, out)?;
                Ok(LineAction::Continue)
            }
        }
    }

    /// Mark worker `idx` done: flush its partial line once, close the
    /// pipe, and report the completion.
    fn finish_worker(&mut self, idx: usize, out: &mut impl Write) -> io::Result<()> {
        self.workers[idx].finished = true;
        if let Some(line) = self.workers[idx].framer.take_partial() {
            self.agg.handle_line(&mut self.workers, idx, &line, out)?;
        }
        self.workers[idx].pipe = None;
        self.active -= 1;
        self.completed += 1;

        if !self.suppress_notices {
            let elapsed = self.start.elapsed().as_secs_f64();
            eprint!(
                "\n[{elapsed:.0}s: Worker {}/{} finished. Still running ({}): ",
                self.workers[idx].worker_number, self.requested, self.active
            );
            for worker in &self.workers {
                if !worker.finished {
                    eprint!("{} ", worker.worker_number);
                }
            }
            eprint!("]");
            self.last_status = Instant::now();
        }
        Ok(())
    }

    fn print_status(&self) {
        let elapsed = self.start.elapsed().as_secs_f64();
        eprint!(
            "\n[{elapsed:.0}s: {}/{} workers running",
            self.active, self.requested
        );
        if self.active <= STATUS_LIST_LIMIT {
            eprintln!("]");
            for worker in &self.workers {
                if worker.finished {
                    continue;
                }
                if worker.current_combo.is_empty() {
                    eprintln!("  W{}: (starting)", worker.worker_number);
                } else {
                    eprintln!("  W{}: {}", worker.worker_number, worker.current_combo);
                }
            }
        } else {
            eprint!("]");
        }
    }

    /// Terminate every live worker and mark it finished (cap or deadline).
    pub(crate) fn kill_all_mark_finished(&mut self) {
        for worker in &mut self.workers {
            if worker.pid > 0 && !worker.finished {
                sys::kill(worker.pid, libc::SIGTERM);
                worker.finished = true;
            }
        }
    }

    /// Propagate `signal` to every live worker without marking it, so the
    /// final drain still collects its residue.
    pub(crate) fn kill_live(&mut self, signal: i32) {
        for worker in &self.workers {
            if worker.pid > 0 && !worker.finished {
                sys::kill(worker.pid, signal);
            }
        }
    }

    /// Reap every child; when `drain` is set, switch surviving pipes to
    /// blocking and pull any residue through the normal line routing.
    pub(crate) fn reap(&mut self, out: &mut impl Write, drain: bool) -> Result<(), ParallelError> {
        self.suppress_notices = true;
        let mut buf = [0u8; READ_CHUNK];
        for idx in 0..self.workers.len() {
            if self.workers[idx].pid > 0 {
                sys::wait_child(self.workers[idx].pid);
            }
            if self.workers[idx].pipe.is_none() {
                continue;
            }
            if drain && !self.workers[idx].finished {
                if let Some(fd) = self.workers[idx].fd()
                    && let Err(error) = sys::set_nonblocking(fd, false)
                {
                    warn!(%error, "could not switch pipe to blocking for drain");
                }
                while !self.workers[idx].finished {
                    // The cap no longer matters; the workers are gone.
                    self.service_pipe(idx, &mut buf, out)?;
                }
            }
            self.workers[idx].pipe = None;
        }
        Ok(())
    }

    /// `(label, last_depth)` for every live worker that announced a combo.
    pub(crate) fn live_combo_reports(&self) -> impl Iterator<Item = (&str, u32)> {
        self.workers
            .iter()
            .filter(|w| !w.finished && !w.current_combo.is_empty())
            .map(|w| (w.current_combo.as_str(), w.last_depth))
    }

    /// Workers whose pipe closed on its own (not via a coordinator kill).
    pub(crate) fn completed(&self) -> usize {
        self.completed
    }

    /// Workers successfully forked.
    pub(crate) fn started(&self) -> u32 {
        self.started
    }

    /// Solution lines observed so far.
    pub(crate) fn solutions_found(&self) -> u32 {
        self.agg.solutions_found()
    }

    /// Final queue record, when queue mode ran.
    pub(crate) fn queue_state(&mut self) -> Option<(u32, u32)> {
        let queue = self.queue.as_mut()?;
        match queue.read_record() {
            Ok(state) => Some(state),
            Err(error) => {
                warn!(%error, "could not read final queue state");
                None
            }
        }
    }

    /// Drop the queue handle and remove its file.
    pub(crate) fn cleanup_queue(&mut self) {
        self.queue = None;
        if let Some(path) = self.queue_path.take() {
            let _ = std::fs::remove_file(&path);
        }
    }
}
