//! Processor trait for the pluggable processing step
//!
//! A processor turns one input unit into zero or more output units. The
//! worker loop owns it for the duration of a run and hands it back to the
//! controller on stop, so state carries over a stop/start cycle.

use super::errors::ProcessingError;
use std::marker::PhantomData;

/// The processing step a component applies to each input unit
pub trait Processor: Send + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;

    /// Get a debug name for this processor
    fn name(&self) -> &str;

    /// Process one input unit, pushing any results onto `output`.
    ///
    /// On error, anything already pushed is discarded.
    fn process(
        &mut self,
        input: Self::Input,
        output: &mut Vec<Self::Output>,
    ) -> Result<(), ProcessingError>;

    /// Returning true ends the worker loop after the current iteration
    fn is_finished(&self) -> bool {
        false
    }
}

/// Adapter turning a closure into a [`Processor`]
pub struct FnProcessor<I, O, F> {
    name: String,
    f: F,
    _types: PhantomData<fn(I) -> O>,
}

/// Build a processor from a closure
pub fn from_fn<I, O, F>(name: impl Into<String>, f: F) -> FnProcessor<I, O, F>
where
    F: FnMut(I, &mut Vec<O>) -> Result<(), ProcessingError> + Send + 'static,
{
    FnProcessor {
        name: name.into(),
        f,
        _types: PhantomData,
    }
}

impl<I, O, F> Processor for FnProcessor<I, O, F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: FnMut(I, &mut Vec<O>) -> Result<(), ProcessingError> + Send + 'static,
{
    type Input = I;
    type Output = O;

    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, input: I, output: &mut Vec<O>) -> Result<(), ProcessingError> {
        (self.f)(input, output)
    }
}
