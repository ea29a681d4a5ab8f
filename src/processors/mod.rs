//! Reference processing steps
//!
//! - **Passthrough**: forwards every input unit unchanged
//! - **SequenceEcho**: validates a counting sequence and echoes the next value,
//!   used for event-channel loopback

mod passthrough;
mod sequence;

pub use passthrough::Passthrough;
pub use sequence::SequenceEcho;
