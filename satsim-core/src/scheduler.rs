use std::cell::Cell;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::rc::Rc;
use tracing::{debug, trace};

use crate::error::EventError;
use crate::logging::event_span;
use crate::types::{EventHandle, EventId};
use crate::SimTime;

/// Callback fired when an event comes due.
///
/// Actions receive the scheduler so they can read the clock and schedule
/// follow-up events; this is the only way simulation state moves forward.
pub type Action = Box<dyn FnOnce(&mut Scheduler)>;

/// Entry stored in the scheduler's priority queue.
///
/// The action itself lives in a side table keyed by event id, so cancelling an
/// event only has to drop the action; the stale heap entry is skipped when it
/// surfaces.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EventEntry {
    time: SimTime,
    id: EventId,
}

impl EventEntry {
    pub(crate) fn time(&self) -> SimTime {
        self.time
    }
}

impl PartialEq for EventEntry {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.id == other.id
    }
}

impl Eq for EventEntry {}

impl PartialOrd for EventEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse the ordering for min-heap behavior in BinaryHeap. Ties on time
        // are broken by id, which is the insertion sequence.
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

type Clock = Rc<Cell<SimTime>>;

/// This struct exposes only immutable access to the simulation clock.
/// The clock itself is owned by the scheduler, while others can obtain `ClockRef`
/// to read the current simulation time.
///
/// # Example
///
/// ```
/// # use satsim_core::Scheduler;
/// let scheduler = Scheduler::default();
/// let clock_ref = scheduler.clock();
/// assert_eq!(clock_ref.time(), scheduler.time());
/// ```
#[derive(Clone)]
pub struct ClockRef {
    clock: Clock,
}

impl From<Clock> for ClockRef {
    fn from(clock: Clock) -> Self {
        Self { clock }
    }
}

impl ClockRef {
    /// Return the current simulation time.
    #[must_use]
    pub fn time(&self) -> SimTime {
        self.clock.get()
    }
}

/// Counters maintained by the scheduler over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub scheduled: u64,
    pub fired: u64,
    pub cancelled: u64,
    pub discarded: u64,
}

/// Scheduler is used to keep the current time and information about the upcoming events.
///
/// See the [crate-level documentation](index.html) for more information.
pub struct Scheduler {
    next_event_id: u64,
    events: BinaryHeap<EventEntry>,
    actions: HashMap<EventId, Action>,
    clock: Clock,
    stop_at: Option<SimTime>,
    stats: SchedulerStats,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            next_event_id: 0,
            events: BinaryHeap::default(),
            actions: HashMap::new(),
            clock: Rc::new(Cell::new(SimTime::default())),
            stop_at: None,
            stats: SchedulerStats::default(),
        }
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("time", &self.time())
            .field("pending", &self.actions.len())
            .field("stop_at", &self.stop_at)
            .field("stats", &self.stats)
            .finish()
    }
}

impl Scheduler {
    /// Schedules `action` to fire at `self.time() + delay`.
    pub fn schedule<F>(&mut self, delay: SimTime, action: F) -> EventHandle
    where
        F: FnOnce(&mut Scheduler) + 'static,
    {
        let time = self.time() + delay;
        self.push(time, Box::new(action))
    }

    /// Schedules `action` to fire at `self.time()`, after every event already
    /// due at this instant.
    pub fn schedule_now<F>(&mut self, action: F) -> EventHandle
    where
        F: FnOnce(&mut Scheduler) + 'static,
    {
        self.schedule(SimTime::zero(), action)
    }

    /// Schedules `action` at an absolute time.
    ///
    /// Fails with [`EventError::InvalidDelay`] if `time` is in the past.
    pub fn schedule_at<F>(&mut self, time: SimTime, action: F) -> Result<EventHandle, EventError>
    where
        F: FnOnce(&mut Scheduler) + 'static,
    {
        let now = self.time();
        if time < now {
            let delay = -(now.saturating_sub(time).as_secs_f64());
            return Err(EventError::InvalidDelay { delay });
        }
        Ok(self.push(time, Box::new(action)))
    }

    /// Schedules `action` after a delay given in fractional seconds, as
    /// supplied by external configuration.
    ///
    /// Fails with [`EventError::InvalidDelay`] if the delay is negative or not
    /// finite.
    pub fn schedule_secs<F>(&mut self, delay: f64, action: F) -> Result<EventHandle, EventError>
    where
        F: FnOnce(&mut Scheduler) + 'static,
    {
        let delay_time =
            SimTime::try_from_secs_f64(delay).map_err(|_| EventError::InvalidDelay { delay })?;
        Ok(self.schedule(delay_time, action))
    }

    fn push(&mut self, time: SimTime, action: Action) -> EventHandle {
        self.next_event_id += 1;
        let id = EventId(self.next_event_id);
        self.events.push(EventEntry { time, id });
        self.actions.insert(id, action);
        self.stats.scheduled += 1;
        trace!(event_id = %id, fire_time = %time, "Event scheduled");
        EventHandle::new(id, time)
    }

    /// Cancels a pending event. Returns `true` if the event was pending.
    ///
    /// Cancelling an event that already fired, was already cancelled, or was
    /// never issued by this scheduler is a no-op.
    pub fn cancel(&mut self, handle: EventHandle) -> bool {
        if self.actions.remove(&handle.id()).is_some() {
            self.stats.cancelled += 1;
            trace!(event_id = %handle.id(), "Event cancelled");
            true
        } else {
            trace!(event_id = %handle.id(), "Cancel of unknown or fired event ignored");
            false
        }
    }

    /// Whether the event behind `handle` is still waiting to fire.
    #[must_use]
    pub fn is_pending(&self, handle: EventHandle) -> bool {
        self.actions.contains_key(&handle.id())
    }

    /// Returns the current simulation time.
    #[must_use]
    pub fn time(&self) -> SimTime {
        self.clock.get()
    }

    /// Returns a structure with immutable access to the simulation time.
    #[must_use]
    pub fn clock(&self) -> ClockRef {
        ClockRef {
            clock: Rc::clone(&self.clock),
        }
    }

    /// Requests the run loop to stop after the events due at the current
    /// instant. Events already scheduled for this instant still fire; later
    /// ones are discarded when the run returns.
    pub fn stop(&mut self) {
        let now = self.time();
        debug!(time = %now, "Stop requested");
        self.stop_at = Some(self.stop_at.map_or(now, |at| at.min(now)));
    }

    /// Time of the stop barrier, if [`Scheduler::stop`] was called.
    #[must_use]
    pub fn stop_requested_at(&self) -> Option<SimTime> {
        self.stop_at
    }

    pub(crate) fn clear_stop(&mut self) {
        self.stop_at = None;
    }

    /// Number of events that are scheduled and not cancelled.
    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.actions.len()
    }

    /// Lifetime counters.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Returns the time of the next live event, dropping cancelled entries
    /// found at the head of the queue.
    pub fn peek_time(&mut self) -> Option<SimTime> {
        while let Some(entry) = self.events.peek() {
            if self.actions.contains_key(&entry.id) {
                return Some(entry.time());
            }
            self.events.pop();
        }
        None
    }

    /// Fires the next event if one is due no later than `horizon` and no stop
    /// barrier precedes it. Returns whether an event fired.
    pub(crate) fn fire_next(&mut self, horizon: Option<SimTime>) -> bool {
        let Some(next) = self.peek_time() else {
            return false;
        };
        if horizon.is_some_and(|h| next > h) || self.stop_at.is_some_and(|at| next > at) {
            return false;
        }
        let Some(entry) = self.events.pop() else {
            return false;
        };
        let Some(action) = self.actions.remove(&entry.id) else {
            return false;
        };
        self.clock.replace(entry.time());
        self.stats.fired += 1;
        let _span = event_span(entry.id, entry.time()).entered();
        trace!("Firing event");
        action(self);
        true
    }

    /// Drops every pending event without firing it and returns how many were
    /// discarded. The clock is left untouched.
    pub fn discard_pending(&mut self) -> usize {
        let discarded = self.actions.len();
        self.actions.clear();
        self.events.clear();
        self.stats.discarded += discarded as u64;
        if discarded > 0 {
            debug!(discarded, time = %self.time(), "Discarded pending events");
        }
        discarded
    }

    /// Returns the scheduler to its initial state: empty queue, clock at zero,
    /// fresh counters. Required before reusing a scheduler for a new run.
    pub fn reset(&mut self) {
        self.actions.clear();
        self.events.clear();
        self.next_event_id = 0;
        self.stop_at = None;
        self.stats = SchedulerStats::default();
        self.clock.set(SimTime::zero());
    }
}
