//! First-move filter — restricts the root move list of the forward solve.
//!
//! The filter hook is invoked on every node visit; it acts only at ply 1
//! of the forward solve, where it re-packs the generated move list in
//! place. Static mode keeps a fixed residue class of move offsets. Queue
//! mode claims a worker index from the [`SharedQueue`](crate::SharedQueue)
//! on first use and then rotates the assignment on every target visit, so
//! expensive first moves spread across workers over time.

use tracing::debug;

use crate::error::CoreError;
use crate::queue::SharedQueue;

/// The filtering discipline applied at the forward-solve root.
#[derive(Debug)]
enum Mode {
    /// Pass-through.
    Off,
    /// Keep move offsets where `offset % total == index`.
    Static { index: u32, total: u32 },
    /// Claim an index from the shared queue, then rotate per target.
    Queue {
        queue: SharedQueue,
        /// `(my_index, total)` once claimed.
        claim: Option<(u32, u32)>,
        /// Set after a queue I/O failure; the filter stays pass-through.
        degraded: bool,
    },
}

/// Stateful first-move filter, owned by one worker process.
#[derive(Debug)]
pub struct FirstMoveFilter {
    mode: Mode,
    target_count: u64,
    total_first_moves: Option<u32>,
}

impl FirstMoveFilter {
    /// Pass-through filter. Target visits are still counted.
    pub fn off() -> FirstMoveFilter {
        FirstMoveFilter::with_mode(Mode::Off)
    }

    /// Static partition: keep move offsets where `offset % total == index`.
    pub fn fixed(index: u32, total: u32) -> Result<FirstMoveFilter, CoreError> {
        if total == 0 {
            return Ok(FirstMoveFilter::off());
        }
        if index >= total {
            return Err(CoreError::IndexOutOfRange { index, total });
        }
        Ok(FirstMoveFilter::with_mode(Mode::Static { index, total }))
    }

    /// Rotating assignment driven by the shared work queue.
    pub fn queue(queue: SharedQueue) -> FirstMoveFilter {
        FirstMoveFilter::with_mode(Mode::Queue {
            queue,
            claim: None,
            degraded: false,
        })
    }

    fn with_mode(mode: Mode) -> FirstMoveFilter {
        FirstMoveFilter {
            mode,
            target_count: 0,
            total_first_moves: None,
        }
    }

    /// Number of forward-solve root visits seen so far.
    pub fn target_count(&self) -> u64 {
        self.target_count
    }

    /// Size of the first root move list seen, once known.
    pub fn total_first_moves(&self) -> Option<u32> {
        self.total_first_moves
    }

    /// The claimed queue slot `(my_index, total)`, if queue mode has one.
    pub fn queue_claim(&self) -> Option<(u32, u32)> {
        match self.mode {
            Mode::Queue { claim, .. } => claim,
            _ => None,
        }
    }

    /// Filter hook, called on every node visit.
    ///
    /// Acts only when `at_forward_root` is set; elsewhere it is a
    /// pass-through. Root visits are counted in every mode because the
    /// queue rotation depends on the count. The move list is compacted in
    /// place from the left; relative order of kept moves is preserved.
    pub fn on_node<T>(&mut self, at_forward_root: bool, moves: &mut Vec<T>) {
        if !at_forward_root {
            return;
        }

        self.target_count += 1;
        if self.total_first_moves.is_none() {
            self.total_first_moves = Some(moves.len() as u32);
        }

        match &mut self.mode {
            Mode::Off => {}
            Mode::Static { index, total } => {
                let (index, total) = (*index, *total);
                retain_offsets(moves, |offset| offset % total == index);
            }
            Mode::Queue {
                queue,
                claim,
                degraded,
            } => {
                if *degraded {
                    return;
                }
                if claim.is_none() {
                    match queue.claim() {
                        Ok((index, total)) if total > 0 => {
                            debug!(index, total, "claimed work-queue slot");
                            *claim = Some((index, total));
                        }
                        Ok((index, total)) => {
                            debug!(index, total, "work queue has no workers, filter disabled");
                            *degraded = true;
                            return;
                        }
                        Err(error) => {
                            debug!(%error, "work-queue claim failed, filter disabled");
                            *degraded = true;
                            return;
                        }
                    }
                }
                if let Some((my_index, total)) = *claim {
                    let rotation = (self.target_count % u64::from(total)) as u32;
                    retain_offsets(moves, |offset| (offset + rotation) % total == my_index);
                }
            }
        }
    }
}

/// Keep moves whose offset satisfies `keep`, compacting from the left.
fn retain_offsets<T>(moves: &mut Vec<T>, keep: impl Fn(u32) -> bool) {
    let mut write = 0;
    for offset in 0..moves.len() {
        if keep(offset as u32) {
            moves.swap(write, offset);
            write += 1;
        }
    }
    moves.truncate(write);
}
