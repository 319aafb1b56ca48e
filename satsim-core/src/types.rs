//! Core type definitions and newtypes for the simulation framework

use crate::SimTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for events in the simulation.
///
/// Ids are handed out from a per-scheduler counter, so they double as the
/// insertion sequence used to break ties between events due at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Event({})", self.0)
    }
}

/// Handle returned when an event is scheduled; used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventHandle {
    id: EventId,
    time: SimTime,
}

impl EventHandle {
    pub(crate) fn new(id: EventId, time: SimTime) -> Self {
        Self { id, time }
    }

    /// Get the event ID
    pub fn id(&self) -> EventId {
        self.id
    }

    /// Absolute time the event is due to fire.
    pub fn fire_time(&self) -> SimTime {
        self.time
    }
}
