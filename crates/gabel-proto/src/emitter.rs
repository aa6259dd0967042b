//! Worker-side protocol emitter.

use std::io::{self, Write};

use crate::message::Message;

/// Longest combo label carried on the wire, in bytes.
pub const MAX_COMBO_LABEL: usize = 63;

/// Emits protocol lines on behalf of a worker.
///
/// Wraps the worker's stderr (or any writer in tests) together with the
/// structured-output mode flag: when disabled, every emission is a no-op,
/// so call sites never need to check the mode themselves.
#[derive(Debug)]
pub struct StructuredOut<W: Write> {
    out: W,
    enabled: bool,
}

impl StructuredOut<io::Stderr> {
    /// Emitter bound to this process's stderr.
    pub fn stderr(enabled: bool) -> StructuredOut<io::Stderr> {
        StructuredOut::new(io::stderr(), enabled)
    }
}

impl<W: Write> StructuredOut<W> {
    /// Wrap `out`; emissions are no-ops unless `enabled`.
    pub fn new(out: W, enabled: bool) -> StructuredOut<W> {
        StructuredOut { out, enabled }
    }

    /// Whether structured output is active.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Announce the start of solving.
    pub fn solving(&mut self) -> io::Result<()> {
        self.emit(&Message::Solving)
    }

    /// Announce normal completion.
    pub fn finished(&mut self) -> io::Result<()> {
        self.emit(&Message::Finished)
    }

    /// Announce an early stop (solution cap and the like).
    pub fn partial(&mut self) -> io::Result<()> {
        self.emit(&Message::Partial)
    }

    /// Open a solution envelope.
    pub fn solution_start(&mut self) -> io::Result<()> {
        self.emit(&Message::SolutionStart)
    }

    /// Close a solution envelope.
    pub fn solution_end(&mut self) -> io::Result<()> {
        self.emit(&Message::SolutionEnd)
    }

    /// Emit one rendered text line.
    pub fn text(&mut self, line: &str) -> io::Result<()> {
        self.emit(&Message::Text(line.to_string()))
    }

    /// Emit the elapsed solving time.
    pub fn time(&mut self, seconds: f64) -> io::Result<()> {
        self.emit(&Message::Time(seconds))
    }

    /// Emit a liveness heartbeat.
    pub fn heartbeat(&mut self, seconds: u64) -> io::Result<()> {
        self.emit(&Message::Heartbeat(seconds))
    }

    /// Emit a depth progress marker.
    pub fn progress(&mut self, m: u32, k: u32, positions: u64) -> io::Result<()> {
        self.emit(&Message::Progress { m, k, positions })
    }

    /// Emit the label of the combo now being solved.
    ///
    /// Labels are truncated to [`MAX_COMBO_LABEL`] bytes.
    pub fn combo(&mut self, label: &str) -> io::Result<()> {
        let mut cut = label.len().min(MAX_COMBO_LABEL);
        while !label.is_char_boundary(cut) {
            cut -= 1;
        }
        self.emit(&Message::Combo(label[..cut].to_string()))
    }

    /// Open a problem envelope (1-based index).
    pub fn problem_start(&mut self, index: u32) -> io::Result<()> {
        self.emit(&Message::ProblemStart(index))
    }

    /// Close a problem envelope (1-based index).
    pub fn problem_end(&mut self, index: u32) -> io::Result<()> {
        self.emit(&Message::ProblemEnd(index))
    }

    /// Emit diagnostic text.
    pub fn debug(&mut self, text: &str) -> io::Result<()> {
        self.emit(&Message::Debug(text.to_string()))
    }

    fn emit(&mut self, message: &Message) -> io::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        writeln!(self.out, "{message}")?;
        self.out.flush()
    }
}
