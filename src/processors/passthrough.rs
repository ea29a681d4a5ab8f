use crate::runtime::{ProcessingError, Processor};
use std::marker::PhantomData;

/// Forwards each input unit as one output unit
pub struct Passthrough<T> {
    _marker: PhantomData<fn(T) -> T>,
}

impl<T> Passthrough<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for Passthrough<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Processor for Passthrough<T> {
    type Input = T;
    type Output = T;

    fn name(&self) -> &str {
        "passthrough"
    }

    fn process(&mut self, input: T, output: &mut Vec<T>) -> Result<(), ProcessingError> {
        output.push(input);
        Ok(())
    }
}
