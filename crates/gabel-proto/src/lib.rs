//! Line-oriented `@@` control protocol between workers and coordinator.

mod emitter;
mod framing;
mod message;

pub use emitter::{StructuredOut, MAX_COMBO_LABEL};
pub use framing::{LineFramer, MAX_LINE};
pub use message::{parse_line, LineKind, Message, MARKER};
