//! Core discrete event simulation engine.
//!
//! This crate provides the clock, the event queue and the run loop that every
//! other satsim crate builds on.
//!
//! # Architecture Overview
//!
//! - [`Simulation`]: the entry point that owns the [`Scheduler`]. Use this to
//!   schedule the initial events and run to a horizon.
//! - [`Scheduler`]: the clock plus the pending-event set. Every event action
//!   receives `&mut Scheduler`, so actions read time and schedule follow-up
//!   events through it.
//!
//! # Basic Usage
//!
//! ```rust
//! use satsim_core::{Simulation, SimTime};
//!
//! let mut simulation = Simulation::default();
//! simulation.schedule(SimTime::from_secs(1), |scheduler| {
//!     assert_eq!(scheduler.time(), SimTime::from_secs(1));
//! });
//! let summary = simulation.run(SimTime::from_secs(20));
//! assert_eq!(summary.events_fired, 1);
//! ```
//!
//! # Time Model
//!
//! All timing uses [`SimTime`], which represents simulation time (not wall-clock time).
//! Events due at the same instant fire in the order they were scheduled, so a
//! run is fully determined by its inputs and seeds.

pub mod dists;
pub mod error;
pub mod execute;
pub mod ids;
pub mod logging;
pub mod scheduler;
pub mod stats;
pub mod time;
pub mod types;

use tracing::{info, instrument};

pub use dists::DurationDistribution;
pub use error::{EventError, SimError};
pub use execute::{Execute, Executor, RunSummary};
pub use ids::derive_seed;
pub use logging::{
    init_detailed_simulation_logging, init_simulation_logging,
    init_simulation_logging_with_level, try_init_simulation_logging_with_level,
};
pub use scheduler::{Action, ClockRef, Scheduler, SchedulerStats};
pub use stats::{DelayHistogram, DelayStats};
pub use time::SimTime;
pub use types::{EventHandle, EventId};

/// Simulation struct that owns the scheduler for one run.
///
/// See the [crate-level documentation](index.html) for more information.
#[derive(Debug, Default)]
pub struct Simulation {
    scheduler: Scheduler,
    seed: u64,
}

impl Simulation {
    /// Creates a simulation whose random streams derive from `seed`.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            scheduler: Scheduler::default(),
            seed,
        }
    }

    /// Run seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Returns the current simulation time.
    #[must_use]
    pub fn time(&self) -> SimTime {
        self.scheduler.time()
    }

    /// Returns a ClockRef for reading the simulation time.
    #[must_use]
    pub fn clock(&self) -> ClockRef {
        self.scheduler.clock()
    }

    /// Shared access to the scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Mutable access to the scheduler, used by topology and application
    /// setup code before the run starts.
    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    /// Schedules `action` to fire after `delay`.
    pub fn schedule<F>(&mut self, delay: SimTime, action: F) -> EventHandle
    where
        F: FnOnce(&mut Scheduler) + 'static,
    {
        self.scheduler.schedule(delay, action)
    }

    /// Cancels a scheduled event; a no-op for fired or unknown handles.
    pub fn cancel(&mut self, handle: EventHandle) -> bool {
        self.scheduler.cancel(handle)
    }

    /// Requests a stop after the events due at the current instant.
    pub fn stop(&mut self) {
        self.scheduler.stop();
    }

    /// Performs one step of the simulation. Returns `true` if there was in fact an event
    /// available to process, and `false` otherwise, which signifies that the simulation
    /// ended.
    pub fn step(&mut self) -> bool {
        self.scheduler.fire_next(None)
    }

    /// Runs the entire simulation.
    ///
    /// The stopping condition and other execution details depend on the executor used.
    /// See [`Execute`] and [`Executor`] for more details.
    #[instrument(skip(self, executor), fields(initial_time = %self.time()))]
    pub fn execute<E: Execute>(&mut self, executor: E) -> RunSummary {
        info!("Starting simulation execution");
        let summary = executor.execute(self);
        info!(
            final_time = %summary.finished_at,
            events_fired = summary.events_fired,
            events_discarded = summary.events_discarded,
            stopped = summary.stopped,
            "Simulation execution completed"
        );
        summary
    }

    /// Runs until the queue is empty, a stop is requested, or the next event
    /// lies beyond `stop_time`. Events due after `stop_time` never fire and
    /// are discarded.
    pub fn run(&mut self, stop_time: SimTime) -> RunSummary {
        self.execute(Executor::timed(stop_time))
    }

    /// Returns the time of the next scheduled event, or None if no events are scheduled.
    pub fn peek_next_event_time(&mut self) -> Option<SimTime> {
        self.scheduler.peek_time()
    }

    /// Check if there are pending events
    #[must_use]
    pub fn has_pending_events(&self) -> bool {
        self.scheduler.pending_events() > 0
    }

    /// Clears all pending events and rewinds the clock to zero so the
    /// simulation can be reused for an independent run.
    pub fn reset(&mut self) {
        self.scheduler.reset();
    }
}
