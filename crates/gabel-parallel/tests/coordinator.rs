//! End-to-end coordinator runs with real forked workers.
//!
//! Each test plugs a small closure-style solver into the coordinator;
//! the solver runs in forked children and talks back over the protocol.

#![cfg(unix)]

use std::io;

use gabel_core::MAX_COMBOS;
use gabel_parallel::{
    Coordinator, CoordinatorConfig, FilterSpec, RunOutcome, Solver, WorkerContext,
};

/// Emits a fixed number of solutions, each a one-line text body.
struct FixedSolutions {
    count: u32,
}

impl Solver for FixedSolutions {
    fn solve(&self, ctx: &mut WorkerContext) -> io::Result<()> {
        ctx.out.solving()?;
        for n in 1..=self.count {
            ctx.out.solution_start()?;
            ctx.out.text(&format!("  1.Kc2 Rd{n}"))?;
            ctx.out.solution_end()?;
        }
        ctx.out.finished()?;
        Ok(())
    }
}

/// Emits one solution per owned combo from a fixed target set.
struct PerComboSolutions {
    targets: &'static [u32],
}

impl Solver for PerComboSolutions {
    fn solve(&self, ctx: &mut WorkerContext) -> io::Result<()> {
        ctx.out.solving()?;
        for &combo in self.targets {
            if ctx.partition.contains(combo) {
                ctx.out.solution_start()?;
                ctx.out.text(&format!("  1.Kc2 combo{combo}"))?;
                ctx.out.solution_end()?;
            }
        }
        ctx.out.finished()?;
        Ok(())
    }
}

/// Passes the first-move filter hook exactly once, then exits.
struct HookOnce;

impl Solver for HookOnce {
    fn solve(&self, ctx: &mut WorkerContext) -> io::Result<()> {
        ctx.out.solving()?;
        let mut moves: Vec<u32> = (0..8).collect();
        ctx.filter.on_node(true, &mut moves);
        if let Some((index, _total)) = ctx.filter.queue_claim() {
            ctx.out.solution_start()?;
            ctx.out.text(&format!("  1.W{index}"))?;
            ctx.out.solution_end()?;
        }
        ctx.out.finished()?;
        Ok(())
    }
}

fn config(workers: u32) -> CoordinatorConfig {
    CoordinatorConfig {
        workers,
        ..CoordinatorConfig::default()
    }
}

fn summary(outcome: RunOutcome) -> gabel_parallel::RunSummary {
    match outcome {
        RunOutcome::HandledByWorkers(summary) => summary,
        RunOutcome::RunInline => panic!("expected the parent to handle the run"),
    }
}

#[test]
fn zero_workers_runs_inline() {
    let outcome = Coordinator::new(config(0))
        .run(&FixedSolutions { count: 1 })
        .unwrap();
    assert!(matches!(outcome, RunOutcome::RunInline));
}

#[test]
fn single_worker_reports_three_solutions() {
    let outcome = Coordinator::new(config(1))
        .run(&FixedSolutions { count: 3 })
        .unwrap();
    let summary = summary(outcome);
    assert_eq!(summary.workers_requested, 1);
    assert_eq!(summary.workers_started, 1);
    assert_eq!(summary.solutions_found, 3);
    assert_eq!(summary.queue_state, None);
}

#[test]
fn two_way_split_finds_each_solution_exactly_once() {
    // Targets span both residue classes mod 2; the default per-worker
    // strided partition must yield the union with no duplicates.
    let targets: &[u32] = &[0, 1, 2, 7, 100, 61_439];
    assert!(targets.iter().all(|&c| c < MAX_COMBOS));

    let outcome = Coordinator::new(config(2))
        .run(&PerComboSolutions { targets })
        .unwrap();
    let summary = summary(outcome);
    assert_eq!(summary.workers_started, 2);
    assert_eq!(
        summary.solutions_found,
        targets.len() as u32,
        "every target combo must be solved by exactly one worker"
    );
}

#[test]
fn solution_cap_stops_the_run_at_the_cap() {
    let mut cfg = config(4);
    cfg.max_solutions_per_phase = Some(5);

    // 4 workers × 10 solutions on offer; only the cap may be printed.
    let outcome = Coordinator::new(cfg)
        .run(&FixedSolutions { count: 10 })
        .unwrap();
    let summary = summary(outcome);
    assert_eq!(summary.workers_started, 4);
    assert_eq!(
        summary.solutions_found, 5,
        "counting must stop once the cap is processed"
    );
}

#[test]
fn queue_mode_hands_out_all_indices() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(4);
    cfg.first_move_filter = FilterSpec::Queue;
    cfg.queue_path = Some(dir.path().join("queue"));

    let outcome = Coordinator::new(cfg).run(&HookOnce).unwrap();
    let summary = summary(outcome);
    assert_eq!(summary.workers_started, 4);
    assert_eq!(
        summary.queue_state,
        Some((4, 4)),
        "all four workers must have claimed an index"
    );
    assert_eq!(
        summary.solutions_found, 4,
        "each worker reports its claim as a solution line"
    );
}

#[test]
fn worker_error_is_treated_as_completion() {
    struct Failing;
    impl Solver for Failing {
        fn solve(&self, ctx: &mut WorkerContext) -> io::Result<()> {
            ctx.out.solving()?;
            Err(io::Error::other("engine exploded"))
        }
    }

    let outcome = Coordinator::new(config(2)).run(&Failing).unwrap();
    let summary = summary(outcome);
    assert_eq!(summary.workers_started, 2);
    assert_eq!(summary.solutions_found, 0);
}
