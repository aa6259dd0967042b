//! Error types for partition and filter configuration.

use crate::combo::MAX_COMBOS;

/// Errors from configuring partitions, axis orders, or the first-move filter.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The axis-order tag is not a 3-letter permutation of `{k, p, c}`.
    #[error("axis order must be a 3-letter permutation of 'k', 'p', 'c': \"{tag}\"")]
    InvalidAxisOrder {
        /// The tag that failed to parse.
        tag: String,
    },

    /// A partition index is not below its total.
    #[error("partition index {index} out of range for total {total}")]
    IndexOutOfRange {
        /// The offending index.
        index: u32,
        /// The partition count.
        total: u32,
    },

    /// A partition total or range bound exceeds the combo space.
    #[error("partition bound {total} exceeds combo space {MAX_COMBOS}")]
    TotalTooLarge {
        /// The offending bound.
        total: u32,
    },

    /// A strided range was given a stride of zero.
    #[error("partition stride must be non-zero")]
    ZeroStride,

    /// A strided range starts at or beyond its upper bound.
    #[error("range start {start} is not below max {max}")]
    EmptyRange {
        /// The range start.
        start: u32,
        /// The exclusive upper bound.
        max: u32,
    },

    /// A single-combo spec names a combo outside the combo space.
    #[error("combo {combo} outside combo space {MAX_COMBOS}")]
    ComboOutOfRange {
        /// The offending combo index.
        combo: u32,
    },

    /// An I/O error against the shared work queue.
    #[error("work queue I/O: {source}")]
    QueueIo {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}
