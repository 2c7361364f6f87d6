//! Error taxonomy for the instrumentation layer.
//!
//! # Design Decisions
//! - Trace header failures are recovered locally and never reach callers
//! - Agent-originated failures are tagged `Origin::Internal` and never reported
//! - Application failures are reported once and handed back untouched

use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Failure raised by the agent itself.
///
/// Anything whose `source()` chain contains an `InternalError` is treated as
/// agent-originated and is never sent to the error reporter.
#[derive(Debug, Error)]
#[error("APM internal error: {message}")]
pub struct InternalError {
    pub message: String,
}

impl InternalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Where a downstream failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Raised by the agent or its runtime.
    Internal,
    /// Raised by application code.
    Application,
}

impl Origin {
    /// Classify an error by walking its source chain.
    pub fn of(error: &(dyn StdError + 'static)) -> Self {
        let mut current: Option<&(dyn StdError + 'static)> = Some(error);
        while let Some(err) = current {
            if err.is::<InternalError>() {
                return Origin::Internal;
            }
            current = err.source();
        }
        Origin::Application
    }
}

/// Tagged error produced by the downstream call boundary.
///
/// The original error is carried untouched so it can be handed back to the
/// caller exactly as raised.
#[derive(Debug)]
pub struct DownstreamError<E> {
    pub origin: Origin,
    pub source: E,
}

impl<E> DownstreamError<E>
where
    E: StdError + 'static,
{
    /// Wrap an error, deriving its origin from the source chain.
    pub fn new(error: E) -> Self {
        let origin = Origin::of(&error);
        Self {
            origin,
            source: error,
        }
    }
}

impl<E> DownstreamError<E> {
    /// Tag an error explicitly.
    pub fn with_origin(origin: Origin, error: E) -> Self {
        Self {
            origin,
            source: error,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.origin == Origin::Internal
    }

    pub fn into_inner(self) -> E {
        self.source
    }
}

impl<E: fmt::Display> fmt::Display for DownstreamError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.source, f)
    }
}

impl<E: StdError + 'static> StdError for DownstreamError<E> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.source)
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
