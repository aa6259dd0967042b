//! Coordinator-side bookkeeping for one forked worker.

use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use gabel_proto::{LineFramer, MAX_COMBO_LABEL};

use crate::MAX_DEPTH_TRACKED;

/// Everything the coordinator tracks about one forked worker.
///
/// Owned by the parent; dropped after the child is reaped and its pipe
/// drained.
#[derive(Debug)]
pub struct WorkerRecord {
    pub(crate) pid: libc::pid_t,
    pub(crate) pipe: Option<OwnedFd>,
    pub(crate) framer: LineFramer,
    /// 1-based worker number (its fork slot).
    pub worker_number: u32,
    /// Set on pipe EOF, read error, or a coordinator-side kill.
    pub finished: bool,
    /// Highest encoded depth this worker has reported.
    pub last_depth: u32,
    /// Label of the combo the worker last announced.
    pub current_combo: String,
    positions_at_depth: Vec<u64>,
}

impl WorkerRecord {
    /// Record for a freshly forked worker.
    pub fn new(pid: libc::pid_t, pipe: OwnedFd, worker_number: u32) -> WorkerRecord {
        WorkerRecord {
            pid,
            pipe: Some(pipe),
            framer: LineFramer::new(),
            worker_number,
            finished: false,
            last_depth: 0,
            current_combo: String::new(),
            positions_at_depth: vec![0; MAX_DEPTH_TRACKED as usize],
        }
    }

    /// The read end of this worker's pipe, while it is open.
    pub fn fd(&self) -> Option<RawFd> {
        self.pipe.as_ref().map(|fd| fd.as_raw_fd())
    }

    /// Store a progress report.
    pub fn note_progress(&mut self, depth: u32, positions: u64) {
        if depth < MAX_DEPTH_TRACKED {
            self.positions_at_depth[depth as usize] = positions;
            self.last_depth = depth;
        }
    }

    /// Positions this worker reported at an encoded depth.
    pub fn positions_at(&self, depth: u32) -> u64 {
        self.positions_at_depth
            .get(depth as usize)
            .copied()
            .unwrap_or(0)
    }

    /// Remember the combo the worker announced, capped at the label limit.
    pub fn set_current_combo(&mut self, label: &str) {
        let mut cut = label.len().min(MAX_COMBO_LABEL);
        while !label.is_char_boundary(cut) {
            cut -= 1;
        }
        self.current_combo.clear();
        self.current_combo.push_str(&label[..cut]);
    }
}
