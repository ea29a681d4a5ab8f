//! Counting-sequence echo
//!
//! Expects the values `seed, seed + 1, seed + 2, ...` in order and answers
//! each with its successor. Routed through an event channel back to its own
//! input, a component running this step keeps a message circulating until
//! its message limit suppresses the next echo.

use crate::runtime::{ProcessingError, Processor};
use tracing::trace;

pub struct SequenceEcho {
    expected: u64,
    echoed: u64,
    stop_after: Option<u64>,
}

impl SequenceEcho {
    /// Start expecting `seed`
    pub fn new(seed: u64) -> Self {
        Self {
            expected: seed,
            echoed: 0,
            stop_after: None,
        }
    }

    /// Report finished once `count` values have been echoed
    pub fn with_stop_after(mut self, count: u64) -> Self {
        self.stop_after = Some(count);
        self
    }

    /// Next value this step will accept
    pub fn expected(&self) -> u64 {
        self.expected
    }

    pub fn echoed(&self) -> u64 {
        self.echoed
    }
}

impl Processor for SequenceEcho {
    type Input = u64;
    type Output = u64;

    fn name(&self) -> &str {
        "sequence_echo"
    }

    fn process(&mut self, input: u64, output: &mut Vec<u64>) -> Result<(), ProcessingError> {
        if input != self.expected {
            return Err(ProcessingError::Malformed(format!(
                "expected {}, got {}",
                self.expected, input
            )));
        }

        let next = input
            .checked_add(1)
            .ok_or_else(|| ProcessingError::Failed("sequence overflow".to_string()))?;
        trace!("sequence_echo: {} -> {}", input, next);
        self.expected = next;
        self.echoed += 1;
        output.push(next);
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.stop_after.is_some_and(|limit| self.echoed >= limit)
    }
}
