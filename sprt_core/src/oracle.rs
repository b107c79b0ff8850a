use thiserror::Error;

use crate::outcome::Variant;

/// A single measurement that could not be produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct MeasureError {
    message: String,
}

impl MeasureError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for MeasureError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for MeasureError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Produces one scalar metric for a trial. Larger is better.
///
/// The trial index doubles as the seed, so `base` and `new` measured at the same index are
/// comparable. Calls are independent and may run on any worker thread.
pub trait Oracle: Send + Sync {
    fn measure(&self, variant: Variant, index: u64) -> Result<f64, MeasureError>;
}

impl<F> Oracle for F
where
    F: Fn(Variant, u64) -> Result<f64, MeasureError> + Send + Sync,
{
    fn measure(&self, variant: Variant, index: u64) -> Result<f64, MeasureError> {
        self(variant, index)
    }
}
