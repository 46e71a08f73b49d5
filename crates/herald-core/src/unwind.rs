//! Conversion of caught panics into errors.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;

/// A panic raised by a command or exception handler.
#[derive(Debug, Clone, Error)]
#[error("handler panicked: {message}")]
pub struct HandlerPanic {
    message: String,
}

impl HandlerPanic {
    /// Returns the panic message, or a placeholder for non-text payloads.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Runs `work`, turning a panic into a [`HandlerPanic`].
pub(crate) fn catch<R>(work: impl FnOnce() -> R) -> Result<R, HandlerPanic> {
    panic::catch_unwind(AssertUnwindSafe(work)).map_err(|payload| HandlerPanic {
        message: describe(payload.as_ref()),
    })
}

fn describe(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        return (*text).to_owned();
    }
    payload
        .downcast_ref::<String>()
        .cloned()
        .unwrap_or_else(|| String::from("non-text panic payload"))
}
