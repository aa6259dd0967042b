use anyhow::Result;
use tracing::{info, warn};

use gabel_core::{FirstMoveFilter, PartitionSpec};
use gabel_parallel::{
    Coordinator, CoordinatorConfig, FilterSpec, ProbeDriver, ProbeOutcome, RunOutcome, Solver,
    WorkerContext,
};

mod cli;
mod script;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = cli::parse(&args);

    let workload = match &options.input {
        Some(path) => script::Script::load(path)?,
        None => script::Script::default(),
    };

    let config = CoordinatorConfig {
        workers: options.workers,
        axis_order: options.axis_order,
        partition: options.partition,
        first_move_filter: options.filter,
        max_solutions_per_phase: workload.max_solutions,
        show_progress: workload.show_progress,
        queue_path: None,
    };
    let solver = script::ScriptSolver::new(workload);

    if options.rebalance.is_some() {
        warn!("rebalance mode is reserved and not implemented; running normally");
    }

    if let Some(timeout) = options.probe {
        if let ProbeOutcome::HandledByWorkers(summary) =
            ProbeDriver::new(config.clone(), timeout).run(&solver)?
        {
            info!(
                phases = summary.phases_run,
                heavy_combos = summary.registry.len(),
                "probe complete"
            );
            return Ok(());
        }
    } else if let RunOutcome::HandledByWorkers(summary) =
        Coordinator::new(config.clone()).run(&solver)?
    {
        info!(
            workers = summary.workers_started,
            solutions = summary.solutions_found,
            "parallel solving complete"
        );
        return Ok(());
    }

    solve_inline(&options, &config, &solver)
}

/// Single-process fallback: no coordinator, no forks. Structured output
/// is only on in worker mode, where an external coordinator reads it.
fn solve_inline(options: &cli::Cli, config: &CoordinatorConfig, solver: &impl Solver) -> Result<()> {
    let partition = config.partition.unwrap_or(PartitionSpec::ALL);
    let filter = match config.first_move_filter {
        FilterSpec::Static { index, total } => {
            FirstMoveFilter::fixed(index, total).unwrap_or_else(|_| FirstMoveFilter::off())
        }
        // Queue mode needs a coordinator-created queue; stand-alone runs
        // have none to claim from.
        FilterSpec::Off | FilterSpec::Queue => FirstMoveFilter::off(),
    };

    let mut ctx = WorkerContext::new(
        0,
        partition,
        config.axis_order,
        filter,
        options.worker_mode,
    );
    solver.solve(&mut ctx)?;
    Ok(())
}
