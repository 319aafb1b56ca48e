//! Structured logging for simulation debugging
//!
//! All crates in the workspace log through `tracing`. This module installs a
//! `tracing-subscriber` registry with an `EnvFilter`, so output can be tuned
//! with `RUST_LOG`:
//!
//! ```bash
//! # Default (info level)
//! cargo run --example satellite_path
//!
//! # Per-packet detail from the network layer only
//! RUST_LOG=satsim_net=trace cargo run --example satellite_path
//! ```
//!
//! ## Log Level Guidelines:
//! - **TRACE**: Individual events and packets
//! - **DEBUG**: Scheduling decisions, topology wiring, trace attach/detach
//! - **INFO**: Run start/end, application lifecycle
//! - **WARN**: Handled but unusual conditions (no route, send failures)
//! - **ERROR**: Trace sinks that failed to persist records

use crate::{EventId, SimTime};
use tracing::{info, Span};
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging for the simulation with sensible defaults (info level).
pub fn init_simulation_logging() {
    init_simulation_logging_with_level("info")
}

/// Initialize logging with a specific level
///
/// # Arguments
/// * `level` - Log level: "trace", "debug", "info", "warn", or "error"
///
/// # Panics
///
/// Panics if a global subscriber is already installed. Use
/// [`try_init_simulation_logging_with_level`] where that can happen, such as
/// in tests.
pub fn init_simulation_logging_with_level(level: &str) {
    if let Err(e) = try_init_simulation_logging_with_level(level) {
        panic!("failed to install simulation logging: {e}");
    }
}

/// Like [`init_simulation_logging_with_level`], but returns an error instead
/// of panicking when a subscriber is already installed.
pub fn try_init_simulation_logging_with_level(
    level: &str,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("{level},satsim_core={level},satsim_net={level},satsim_metrics={level}").into()
    });

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(filter)
        .try_init()?;

    info!("Simulation logging initialized at level: {}", level);
    Ok(())
}

/// Initialize logging with every level enabled and pretty-printed output.
pub fn init_detailed_simulation_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "trace".into());

    let installed = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_file(true)
                .with_line_number(true)
                .pretty(),
        )
        .with(filter)
        .try_init();

    if installed.is_ok() {
        info!("Detailed simulation logging initialized");
    }
}

/// Create a span for tracking simulation execution
pub fn simulation_span(name: &str) -> Span {
    tracing::info_span!("simulation", name = name)
}

/// Create a span for tracking event processing. The scheduler enters it
/// around every event action.
pub fn event_span(event_id: EventId, time: SimTime) -> Span {
    tracing::trace_span!("event", id = %event_id, time = %time)
}

/// Create a span for work done on behalf of one device
pub fn device_span(node: &str, device: &str) -> Span {
    tracing::debug_span!("device", node = node, device = device)
}
