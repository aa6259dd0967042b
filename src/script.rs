//! Scripted stand-in solver.
//!
//! The real search engine is an external collaborator; this solver
//! replays a small directive script so the coordinator, probe driver,
//! and protocol can be driven end to end. It walks every combo in the
//! worker's partition in linear order, announces each one, honors the
//! first-move filter at the forward-solve root, and emits the scripted
//! solutions and delays.
//!
//! Directives, one per line (`#` starts a comment, malformed lines are
//! skipped):
//!
//! ```text
//! moves 12              # size of the root move list at the filter hook
//! solve 23802  1.Sb5 Ka8  # emit this solution when combo 23802 is owned
//! slow 23802 5000       # sleep 5000 ms when visiting combo 23802
//! progress 1 1 100      # emit one progress marker per visited combo
//! max-solutions 5       # solution cap for the whole run
//! show-progress         # print aggregated depth rows
//! ```

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use tracing::warn;

use gabel_core::AxisOrder;
use gabel_parallel::{Solver, WorkerContext};

/// A parsed workload script.
#[derive(Debug, Clone)]
pub struct Script {
    /// Size of the generated root move list.
    pub first_moves: u32,
    /// `(combo, solution text)` pairs.
    pub solutions: Vec<(u32, String)>,
    /// `(combo, milliseconds)` sleeps.
    pub delays: Vec<(u32, u64)>,
    /// Progress markers, consumed one per visited combo.
    pub progress: Vec<(u32, u32, u64)>,
    /// Solution cap for the run.
    pub max_solutions: Option<u32>,
    /// Whether the coordinator prints aggregated depth rows.
    pub show_progress: bool,
}

impl Default for Script {
    fn default() -> Self {
        Script {
            first_moves: 8,
            solutions: Vec::new(),
            delays: Vec::new(),
            progress: Vec::new(),
            max_solutions: None,
            show_progress: false,
        }
    }
}

impl Script {
    /// Read a script file.
    pub fn load(path: &Path) -> io::Result<Script> {
        Ok(Script::parse(&fs::read_to_string(path)?))
    }

    /// Parse script text, skipping comments and malformed lines.
    pub fn parse(text: &str) -> Script {
        let mut script = Script::default();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut tokens = line.split_whitespace();
            let directive = tokens.next().unwrap_or_default();
            let parsed = match directive {
                "moves" => parse1(tokens.next()).map(|n| script.first_moves = n),
                "solve" => {
                    parse1(tokens.next()).map(|combo| {
                        let text = tokens.collect::<Vec<_>>().join(" ");
                        script.solutions.push((combo, text));
                    })
                }
                "slow" => match (parse1(tokens.next()), parse1(tokens.next())) {
                    (Some(combo), Some(millis)) => {
                        script.delays.push((combo, millis));
                        Some(())
                    }
                    _ => None,
                },
                "progress" => match (
                    parse1(tokens.next()),
                    parse1(tokens.next()),
                    parse1(tokens.next()),
                ) {
                    (Some(m), Some(k), Some(positions)) => {
                        script.progress.push((m, k, positions));
                        Some(())
                    }
                    _ => None,
                },
                "max-solutions" => parse1(tokens.next()).map(|n| script.max_solutions = Some(n)),
                "show-progress" => {
                    script.show_progress = true;
                    Some(())
                }
                _ => None,
            };
            if parsed.is_none() {
                warn!(line, "skipping malformed script line");
            }
        }

        script
    }
}

fn parse1<T: std::str::FromStr>(token: Option<&str>) -> Option<T> {
    token?.parse().ok()
}

/// Runs a [`Script`] as the worker's solve function.
#[derive(Debug)]
pub struct ScriptSolver {
    script: Script,
}

impl ScriptSolver {
    /// Solver replaying `script`.
    pub fn new(script: Script) -> ScriptSolver {
        ScriptSolver { script }
    }
}

impl Solver for ScriptSolver {
    fn solve(&self, ctx: &mut WorkerContext) -> io::Result<()> {
        ctx.out.solving()?;

        let mut emitted = 0u32;
        let mut progress = self.script.progress.iter();

        for combo in ctx.partition.combos() {
            ctx.out.combo(&combo_label(combo, ctx.axis_order))?;

            // Forward-solve root: generate the move list and let the
            // filter thin it out. An emptied list means every first move
            // of this combo belongs to some other worker.
            let mut moves: Vec<u32> = (0..self.script.first_moves).collect();
            ctx.filter.on_node(true, &mut moves);
            if moves.is_empty() {
                continue;
            }

            if let Some(&(_, millis)) = self.script.delays.iter().find(|(c, _)| *c == combo) {
                std::thread::sleep(Duration::from_millis(millis));
            }

            if let Some((_, text)) = self.script.solutions.iter().find(|(c, _)| *c == combo) {
                ctx.out.solution_start()?;
                ctx.out.text(text)?;
                ctx.out.solution_end()?;
                emitted += 1;
                if let Some(cap) = self.script.max_solutions
                    && emitted >= cap
                {
                    ctx.out.time(ctx.elapsed_secs())?;
                    ctx.out.partial()?;
                    return Ok(());
                }
            }

            if let Some(&(m, k, positions)) = progress.next() {
                ctx.out.progress(m, k, positions)?;
            }
        }

        ctx.out.time(ctx.elapsed_secs())?;
        ctx.out.finished()?;
        Ok(())
    }
}

/// Human-readable combo label: the combo number first, then its axes.
fn combo_label(combo: u32, order: AxisOrder) -> String {
    let parts = order.project(combo);
    format!(
        "{combo} king={} checker={} checksq={}",
        square_name(parts.king),
        parts.checker + 1,
        square_name(parts.check_square)
    )
}

fn square_name(index: u32) -> String {
    let file = (b'a' + (index % 8) as u8) as char;
    let rank = index / 8 + 1;
    format!("{file}{rank}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_script() {
        let script = Script::parse(
            "# workload\n\
             moves 12\n\
             solve 7  1.Kc2 Rd8\n\
             slow 7 250\n\
             progress 1 1 100\n\
             max-solutions 3\n\
             show-progress\n",
        );
        assert_eq!(script.first_moves, 12);
        assert_eq!(script.solutions, vec![(7, "1.Kc2 Rd8".to_string())]);
        assert_eq!(script.delays, vec![(7, 250)]);
        assert_eq!(script.progress, vec![(1, 1, 100)]);
        assert_eq!(script.max_solutions, Some(3));
        assert!(script.show_progress);
    }

    #[test]
    fn comments_and_blanks_are_skipped() {
        let script = Script::parse("# nothing\n\n   \n");
        assert_eq!(script.solutions.len(), 0);
        assert_eq!(script.first_moves, 8, "defaults survive an empty script");
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let script = Script::parse(
            "moves twelve\n\
             solve\n\
             slow 7\n\
             progress 1 1\n\
             nonsense 4\n\
             moves 10\n",
        );
        assert_eq!(script.first_moves, 10, "later valid lines still apply");
        assert!(script.solutions.is_empty());
        assert!(script.delays.is_empty());
        assert!(script.progress.is_empty());
    }

    #[test]
    fn combo_label_leads_with_the_number() {
        let label = combo_label(0, AxisOrder::KPC);
        assert_eq!(label, "0 king=a1 checker=1 checksq=a1");
        let label = combo_label(63, AxisOrder::KPC);
        assert_eq!(label, "63 king=h8 checker=1 checksq=a1");
    }
}
