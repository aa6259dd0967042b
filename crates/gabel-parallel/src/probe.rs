//! Probe driver — discover which combos are heavy.
//!
//! A probe run repeats the parallel phase once per axis order with a
//! wall-clock budget. Workers still running when a phase's deadline
//! expires are assumed stuck on an expensive combo; their last announced
//! combo labels are collected into a bounded registry and the run ends
//! with a ranked summary.

use std::time::Duration;

use crate::config::CoordinatorConfig;
use crate::decode_depth;
use crate::error::ParallelError;
use crate::solver::Solver;

/// One combo observed to outlive a phase deadline.
#[derive(Debug, Clone)]
pub struct HeavyCombo {
    /// Worker-announced label; starts with the decimal combo number.
    pub label: String,
    /// How many phases saw this combo still running at the deadline.
    pub seen_count: u32,
    /// Deepest encoded depth any stuck worker had reached on it.
    pub max_depth: u32,
}

/// Bounded registry of heavy combos, deduplicated by combo number.
#[derive(Debug, Default)]
pub struct HeavyComboRegistry {
    entries: Vec<HeavyCombo>,
}

impl HeavyComboRegistry {
    /// Maximum number of distinct combos kept; overflow is dropped.
    pub const CAPACITY: usize = 256;

    /// An empty registry.
    pub fn new() -> HeavyComboRegistry {
        HeavyComboRegistry::default()
    }

    /// Record a heavy observation.
    ///
    /// Entries are keyed by the decimal number leading the label: an
    /// existing entry gets its count bumped and its depth maxed, a new
    /// combo is appended while capacity lasts, and the rest is dropped.
    pub fn record(&mut self, label: &str, depth: u32) {
        let combo = leading_number(label);
        for entry in &mut self.entries {
            if leading_number(&entry.label) == combo {
                entry.seen_count += 1;
                entry.max_depth = entry.max_depth.max(depth);
                return;
            }
        }
        if self.entries.len() < HeavyComboRegistry::CAPACITY {
            self.entries.push(HeavyCombo {
                label: label.to_string(),
                seen_count: 1,
                max_depth: depth,
            });
        }
    }

    /// Number of distinct heavy combos recorded.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[HeavyCombo] {
        &self.entries
    }

    /// Entries sorted by descending seen count.
    pub fn ranked(&self) -> Vec<&HeavyCombo> {
        let mut ranked: Vec<&HeavyCombo> = self.entries.iter().collect();
        ranked.sort_by(|a, b| b.seen_count.cmp(&a.seen_count));
        ranked
    }
}

/// Parse the decimal number a combo label starts with.
fn leading_number(label: &str) -> u32 {
    let mut number: u32 = 0;
    for byte in label.bytes() {
        if byte.is_ascii_digit() {
            number = number.wrapping_mul(10).wrapping_add(u32::from(byte - b'0'));
        } else {
            break;
        }
    }
    number
}

/// How a probe invocation was handled.
#[derive(Debug)]
pub enum ProbeOutcome {
    /// The parent ran the probe phases; payload is the result.
    HandledByWorkers(ProbeSummary),
    /// Probing is disabled or unavailable; the caller should solve inline.
    RunInline,
}

/// Result of a completed probe run.
#[derive(Debug)]
pub struct ProbeSummary {
    /// Phases that ran to their deadline or completion.
    pub phases_run: u32,
    /// Heavy combos collected across all phases.
    pub registry: HeavyComboRegistry,
}

/// Cycles the parallel phase across the six axis orders.
pub struct ProbeDriver {
    config: CoordinatorConfig,
    timeout: Duration,
}

impl ProbeDriver {
    /// A driver enforcing `timeout_secs` of wall clock per axis order.
    pub fn new(config: CoordinatorConfig, timeout_secs: u32) -> ProbeDriver {
        ProbeDriver {
            config,
            timeout: Duration::from_secs(u64::from(timeout_secs)),
        }
    }

    /// Run one phase per axis order, harvesting heavy combos at each
    /// deadline, then emit the ranked summary on stderr.
    ///
    /// Forked children diverge into the solver exactly as in a normal
    /// coordinator run; this only returns in the parent.
    #[cfg(unix)]
    pub fn run<S: Solver>(&self, solver: &S) -> Result<ProbeOutcome, ParallelError> {
        use std::io;
        use std::time::Instant;

        use gabel_core::AxisOrder;

        use crate::config::MAX_WORKERS;
        use crate::phase::{Phase, SuperviseExit};
        use crate::sys;

        if self.config.workers == 0 {
            return Ok(ProbeOutcome::RunInline);
        }
        let requested = self.config.workers.min(MAX_WORKERS);
        let timeout_secs = self.timeout.as_secs();

        sys::clear_pending_interrupt();
        sys::install_interrupt_handlers();

        eprint!("\n=== PROBE MODE ===\n");
        eprint!("Workers: {requested}, Timeout per order: {timeout_secs}s\n\n");

        let mut registry = HeavyComboRegistry::new();
        let mut phases_run = 0;
        let mut stdout = io::stdout();

        for order in AxisOrder::ALL {
            if sys::pending_interrupt().is_some() {
                break;
            }

            eprintln!("  Probing with partition order '{order}' (timeout {timeout_secs}s)...");
            let phase_start = Instant::now();
            let mut phase = Phase::new(&self.config, order, requested, phase_start);
            phase.fork_workers(solver);

            // A phase with zero forks is still timed and declared
            // finished; supervise returns immediately with nothing live.
            let deadline = phase_start + self.timeout;
            match phase.supervise(Some(deadline), &mut stdout)? {
                SuperviseExit::Deadline => {
                    for (label, depth) in phase.live_combo_reports() {
                        registry.record(label, depth);
                    }
                    phase.kill_all_mark_finished();
                }
                SuperviseExit::Interrupted(signal) => {
                    phase.kill_live(signal);
                    phase.reap(&mut stdout, true)?;
                    phase.cleanup_queue();
                    print_summary(&registry);
                    sys::reraise_default(signal);
                }
                SuperviseExit::AllFinished | SuperviseExit::CapReached => {}
            }

            phase.reap(&mut stdout, false)?;
            phase.cleanup_queue();

            let elapsed = phase_start.elapsed().as_secs_f64();
            eprintln!(
                "    Completed: {} workers, Still running at timeout: {} ({elapsed:.1}s)",
                phase.completed(),
                phase.started() as usize - phase.completed(),
            );
            phases_run += 1;
        }

        print_summary(&registry);

        Ok(ProbeOutcome::HandledByWorkers(ProbeSummary {
            phases_run,
            registry,
        }))
    }

    /// Without process forking there is nothing to probe.
    #[cfg(not(unix))]
    pub fn run<S: Solver>(&self, _solver: &S) -> Result<ProbeOutcome, ParallelError> {
        if self.config.workers > 0 {
            tracing::warn!("probe mode is not supported on this platform");
        }
        Ok(ProbeOutcome::RunInline)
    }
}

/// Ranked heavy-combo summary on stderr.
#[cfg(unix)]
fn print_summary(registry: &HeavyComboRegistry) {
    eprint!("\n=== PROBE SUMMARY ===\n");
    eprintln!("Total combos: {}", gabel_core::MAX_COMBOS);
    eprint!("Heavy combos identified: {}\n\n", registry.len());

    if registry.is_empty() {
        eprintln!("(No heavy combos found - all work completed quickly)");
    } else {
        for entry in registry.ranked() {
            let (m, k) = decode_depth(entry.max_depth);
            eprintln!(
                "HEAVY {} (seen {} times, max depth {m}+{k})",
                entry.label, entry.seen_count
            );
        }
    }
    eprintln!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode_depth;

    const LABEL: &str = "23802 king=c8 checker=Pd6 checksq=d7";

    #[test]
    fn first_observation_appends() {
        let mut registry = HeavyComboRegistry::new();
        registry.record(LABEL, encode_depth(2, 3));
        assert_eq!(registry.len(), 1);
        let entry = &registry.entries()[0];
        assert_eq!(entry.label, LABEL);
        assert_eq!(entry.seen_count, 1);
        assert_eq!(entry.max_depth, encode_depth(2, 3));
    }

    #[test]
    fn repeat_observation_bumps_count_and_depth() {
        let mut registry = HeavyComboRegistry::new();
        registry.record(LABEL, 203);
        // Same combo number, different suffix: still the same entry.
        registry.record("23802 king=c8 checker=Qd6 checksq=d7", 105);
        registry.record(LABEL, 407);
        assert_eq!(registry.len(), 1);
        let entry = &registry.entries()[0];
        assert_eq!(entry.seen_count, 3);
        assert_eq!(entry.max_depth, 407, "depth must only ever grow");
    }

    #[test]
    fn distinct_combo_numbers_get_distinct_entries() {
        let mut registry = HeavyComboRegistry::new();
        registry.record("7 king=a1", 100);
        registry.record("70 king=a2", 100);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn overflow_is_dropped_silently() {
        let mut registry = HeavyComboRegistry::new();
        for combo in 0..HeavyComboRegistry::CAPACITY + 10 {
            registry.record(&format!("{combo} king=a1"), 100);
        }
        assert_eq!(registry.len(), HeavyComboRegistry::CAPACITY);
    }

    #[test]
    fn ranked_sorts_by_descending_seen_count() {
        let mut registry = HeavyComboRegistry::new();
        registry.record("1 once", 100);
        registry.record("2 thrice", 100);
        registry.record("2 thrice", 100);
        registry.record("2 thrice", 100);
        registry.record("3 twice", 100);
        registry.record("3 twice", 100);
        let ranked = registry.ranked();
        let counts: Vec<u32> = ranked.iter().map(|e| e.seen_count).collect();
        assert_eq!(counts, vec![3, 2, 1]);
        assert_eq!(ranked[0].label, "2 thrice");
    }

    #[test]
    fn leading_number_stops_at_first_non_digit() {
        assert_eq!(leading_number("23802 king=c8"), 23_802);
        assert_eq!(leading_number("42"), 42);
        assert_eq!(leading_number("king=c8"), 0);
        assert_eq!(leading_number(""), 0);
    }
}
