//! Routing of worker lines and aggregation of progress across workers.
//!
//! One aggregator serves a whole coordinator run. Protocol lines update
//! the owning worker's record; plain lines are relayed to stdout after
//! noise filtering. The aggregated depth cursor only advances once every
//! live worker has crossed the candidate depth, so the printed rows form
//! a strictly increasing sequence of depths with space-wide position
//! totals.

use std::io::{self, Write};
use std::time::Instant;

use tracing::trace;

use gabel_proto::{parse_line, LineKind, Message};

use crate::worker::WorkerRecord;
use crate::{decode_depth, encode_depth, MAX_DEPTH_TRACKED};

/// What the supervise loop must do after a routed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineAction {
    /// Nothing; keep going.
    Continue,
    /// The solution cap was just reached; terminate the workers.
    CapReached,
}

/// Routes framed lines and owns the run-wide aggregation state.
#[derive(Debug)]
pub struct OutputAggregator {
    start: Instant,
    show_progress: bool,
    max_solutions: Option<u32>,
    last_printed_depth: u32,
    solutions_found: u32,
}

impl OutputAggregator {
    /// Aggregator for a run that began at `start`.
    ///
    /// The depth cursor starts at `1+0` so the first printable row is `1+1`.
    pub fn new(start: Instant, show_progress: bool, max_solutions: Option<u32>) -> Self {
        OutputAggregator {
            start,
            show_progress,
            max_solutions,
            last_printed_depth: encode_depth(1, 0),
            solutions_found: 0,
        }
    }

    /// Number of solution lines observed so far.
    pub fn solutions_found(&self) -> u32 {
        self.solutions_found
    }

    /// Route one complete line from worker `idx`.
    ///
    /// `out` receives everything destined for the aggregated stdout
    /// stream; status chatter stays on the coordinator's stderr.
    pub fn handle_line(
        &mut self,
        workers: &mut [WorkerRecord],
        idx: usize,
        line: &str,
        out: &mut impl Write,
    ) -> io::Result<LineAction> {
        match parse_line(line) {
            LineKind::Protocol(Message::Progress { m, k, positions }) => {
                self.handle_progress(workers, idx, m, k, positions, out)?;
            }
            LineKind::Protocol(Message::Text(text)) => {
                return self.handle_text(&text, out);
            }
            LineKind::Protocol(Message::Combo(label)) => {
                workers[idx].set_current_combo(&label);
            }
            LineKind::Protocol(Message::Debug(text)) => {
                trace!(worker = workers[idx].worker_number, text = %text, "worker debug");
            }
            // Lifecycle is tracked by pipe close; envelopes and the
            // remaining tags carry nothing the aggregate needs.
            LineKind::Protocol(_) | LineKind::Unrecognized => {}
            LineKind::Plain(text) => {
                self.handle_plain(text, out)?;
            }
        }
        Ok(LineAction::Continue)
    }

    fn handle_progress(
        &mut self,
        workers: &mut [WorkerRecord],
        idx: usize,
        m: u32,
        k: u32,
        positions: u64,
        out: &mut impl Write,
    ) -> io::Result<()> {
        let depth = encode_depth(m, k);
        if depth >= MAX_DEPTH_TRACKED {
            return Ok(());
        }
        workers[idx].note_progress(depth, positions);

        if !self.show_progress || depth <= self.last_printed_depth {
            return Ok(());
        }

        // The cursor may only advance to the slowest live worker.
        let mut min_depth = depth;
        for worker in workers.iter() {
            if !worker.finished && worker.last_depth < min_depth {
                min_depth = worker.last_depth;
            }
        }

        while self.last_printed_depth < min_depth {
            let d = self.last_printed_depth + 1;
            let total: u64 = workers.iter().map(|w| w.positions_at(d)).sum();
            let (dm, dk) = decode_depth(d);
            let elapsed = self.start.elapsed().as_secs_f64();
            write!(
                out,
                "\n{total} potential positions in {dm}+{dk}  (Time = {elapsed:.3} s)"
            )?;
            out.flush()?;
            self.last_printed_depth = d;
        }
        Ok(())
    }

    fn handle_text(&mut self, text: &str, out: &mut impl Write) -> io::Result<LineAction> {
        if text.trim().is_empty() {
            return Ok(LineAction::Continue);
        }
        write!(out, "\n{text}")?;
        out.flush()?;

        // A solution line opens with its move number: a digit then a dot.
        let bytes = text.trim_start().as_bytes();
        if bytes.len() >= 2 && (b'1'..=b'9').contains(&bytes[0]) && bytes[1] == b'.' {
            self.solutions_found += 1;
            if let Some(cap) = self.max_solutions
                && self.solutions_found >= cap
            {
                return Ok(LineAction::CapReached);
            }
        }
        Ok(LineAction::Continue)
    }

    fn handle_plain(&mut self, text: &str, out: &mut impl Write) -> io::Result<()> {
        // Stipulation echo and completion chatter from the solver are
        // noise on the aggregated stream.
        if text.starts_with("ser-") || text.starts_with("  ser-") {
            return Ok(());
        }
        if text.trim().is_empty() {
            return Ok(());
        }
        if text.starts_with("solution finished") {
            return Ok(());
        }
        writeln!(out, "{text}")?;
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workers(n: u32) -> Vec<WorkerRecord> {
        (1..=n)
            .map(|i| {
                let (read, _write) = crate::sys::pipe().unwrap();
                WorkerRecord::new(0, read, i)
            })
            .collect()
    }

    fn route(
        agg: &mut OutputAggregator,
        team: &mut [WorkerRecord],
        idx: usize,
        line: &str,
    ) -> (LineAction, String) {
        let mut sink = Vec::new();
        let action = agg.handle_line(team, idx, line, &mut sink).unwrap();
        (action, String::from_utf8(sink).unwrap())
    }

    #[test]
    fn text_line_prints_payload_only() {
        let mut agg = OutputAggregator::new(Instant::now(), false, None);
        let mut team = workers(1);
        let (_, output) = route(&mut agg, &mut team, 0, "garbage@@TEXT:hello");
        assert_eq!(output, "\nhello");
    }

    #[test]
    fn whitespace_text_is_dropped() {
        let mut agg = OutputAggregator::new(Instant::now(), false, None);
        let mut team = workers(1);
        let (_, output) = route(&mut agg, &mut team, 0, "@@TEXT:   ");
        assert!(output.is_empty());
    }

    #[test]
    fn solution_lines_are_counted() {
        let mut agg = OutputAggregator::new(Instant::now(), false, None);
        let mut team = workers(1);
        route(&mut agg, &mut team, 0, "@@TEXT:  1.Kc2 Rd8");
        route(&mut agg, &mut team, 0, "@@TEXT:  2.Qe5 ...");
        route(&mut agg, &mut team, 0, "@@TEXT:continuation text");
        assert_eq!(agg.solutions_found(), 2);
    }

    #[test]
    fn cap_reached_reports_action() {
        let mut agg = OutputAggregator::new(Instant::now(), false, Some(2));
        let mut team = workers(1);
        let (first, _) = route(&mut agg, &mut team, 0, "@@TEXT: 1.a4");
        assert_eq!(first, LineAction::Continue);
        let (second, _) = route(&mut agg, &mut team, 0, "@@TEXT: 1.b4");
        assert_eq!(second, LineAction::CapReached);
    }

    #[test]
    fn combo_updates_worker_record() {
        let mut agg = OutputAggregator::new(Instant::now(), false, None);
        let mut team = workers(2);
        route(&mut agg, &mut team, 1, "@@COMBO:42 king=c8 checker=Pd6 checksq=d7");
        assert_eq!(team[1].current_combo, "42 king=c8 checker=Pd6 checksq=d7");
        assert!(team[0].current_combo.is_empty());
    }

    #[test]
    fn plain_noise_is_filtered() {
        let mut agg = OutputAggregator::new(Instant::now(), false, None);
        let mut team = workers(1);
        for noise in ["ser-h#2", "  ser-h#2", "   ", "solution finished. Time = 1.2 s"] {
            let (_, output) = route(&mut agg, &mut team, 0, noise);
            assert!(output.is_empty(), "{noise:?} should be dropped");
        }
        let (_, output) = route(&mut agg, &mut team, 0, "a real line");
        assert_eq!(output, "a real line\n");
    }

    #[test]
    fn unknown_and_debug_tags_are_dropped() {
        let mut agg = OutputAggregator::new(Instant::now(), false, None);
        let mut team = workers(1);
        let (_, output) = route(&mut agg, &mut team, 0, "@@DEBUG:internal state");
        assert!(output.is_empty());
        let (_, output) = route(&mut agg, &mut team, 0, "@@WHATEVER:1");
        assert!(output.is_empty());
    }

    #[test]
    fn depth_rows_wait_for_slowest_worker() {
        let mut agg = OutputAggregator::new(Instant::now(), true, None);
        let mut team = workers(2);

        // Worker 0 races ahead; nothing prints until worker 1 reports.
        let (_, output) = route(&mut agg, &mut team, 0, "@@PROGRESS:1+1:100");
        assert!(output.is_empty(), "lone worker at 1+1 must not advance the cursor");
        let (_, output) = route(&mut agg, &mut team, 0, "@@PROGRESS:1+2:250");
        assert!(output.is_empty());

        // Worker 1 reaches 1+1: exactly the 1+1 row appears, summed.
        let (_, output) = route(&mut agg, &mut team, 1, "@@PROGRESS:1+1:50");
        assert!(output.contains("150 potential positions in 1+1"), "got {output:?}");
        assert!(!output.contains("1+2"));

        // Worker 1 reaches 1+2: the 1+2 row follows.
        let (_, output) = route(&mut agg, &mut team, 1, "@@PROGRESS:1+2:70");
        assert!(output.contains("320 potential positions in 1+2"), "got {output:?}");
    }

    #[test]
    fn depth_rows_never_regress() {
        let mut agg = OutputAggregator::new(Instant::now(), true, None);
        let mut team = workers(1);
        let (_, output) = route(&mut agg, &mut team, 0, "@@PROGRESS:1+3:10");
        assert!(output.contains("1+1") && output.contains("1+2") && output.contains("1+3"));
        // A stale lower report must not reprint anything.
        let (_, output) = route(&mut agg, &mut team, 0, "@@PROGRESS:1+2:999");
        assert!(output.is_empty());
    }

    #[test]
    fn finished_workers_do_not_hold_back_the_cursor() {
        let mut agg = OutputAggregator::new(Instant::now(), true, None);
        let mut team = workers(2);
        team[1].finished = true;
        let (_, output) = route(&mut agg, &mut team, 0, "@@PROGRESS:1+1:42");
        assert!(output.contains("42 potential positions in 1+1"));
    }

    #[test]
    fn progress_without_display_is_still_recorded() {
        let mut agg = OutputAggregator::new(Instant::now(), false, None);
        let mut team = workers(1);
        let (_, output) = route(&mut agg, &mut team, 0, "@@PROGRESS:2+5:77");
        assert!(output.is_empty());
        assert_eq!(team[0].last_depth, encode_depth(2, 5));
        assert_eq!(team[0].positions_at(encode_depth(2, 5)), 77);
    }
}
