//! Core types for partitioning the combo search space across workers.

mod combo;
mod error;
mod filter;
mod partition;
mod queue;

pub use combo::{
    Axis, AxisOrder, Combo, CHECKER_SLOTS, CHECK_SQUARES, KING_SQUARES, MAX_COMBOS,
};
pub use error::CoreError;
pub use filter::FirstMoveFilter;
pub use partition::PartitionSpec;
pub use queue::SharedQueue;
