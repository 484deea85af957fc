//! Fault types raised inside a pipeline.

use std::any::Any;
use thiserror::Error;

/// A type-erased error returned by middleware.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A failure that escaped a middleware during dispatch.
///
/// Middleware fails either by returning an error or by panicking. Both end
/// up here so the safety wrapper and the host can treat them uniformly.
#[derive(Error, Debug)]
pub enum PipelineFault {
    /// A middleware returned an error.
    #[error("middleware returned an error: {0}")]
    Error(#[source] BoxError),

    /// A middleware panicked.
    #[error("middleware panicked: {0}")]
    Panic(String),
}

impl PipelineFault {
    /// Builds a fault from a panic payload caught with `catch_unwind`.
    ///
    /// String payloads (the common `panic!("...")` case) keep their message.
    #[must_use]
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(message) => (*message).to_string(),
                Err(_) => "non-string panic payload".to_string(),
            },
        };
        Self::Panic(message)
    }

    /// Returns true if the fault came from a panic.
    #[must_use]
    pub const fn is_panic(&self) -> bool {
        matches!(self, Self::Panic(_))
    }

    /// Returns the underlying message without the category prefix.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Error(error) => error.to_string(),
            Self::Panic(message) => message.clone(),
        }
    }
}

impl From<BoxError> for PipelineFault {
    fn from(error: BoxError) -> Self {
        Self::Error(error)
    }
}
