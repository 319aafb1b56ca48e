//! Error types for the simulation core

use thiserror::Error;

/// Top-level error type for simulation operations
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Event error: {0}")]
    Event(#[from] EventError),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Invalid time: {0}")]
    InvalidTime(String),
}

/// Errors related to event scheduling
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EventError {
    /// A delay that would place the event before the current time, or that is
    /// not a finite number of seconds.
    #[error("Invalid scheduling delay: {delay}s (delays must be finite and non-negative)")]
    InvalidDelay { delay: f64 },
}
