//! Applications and their lifecycle
//!
//! Every application moves `Idle -> Running -> Stopped`. The transitions are
//! scheduled on the event queue by [`install_application`]; internal events
//! of a stopped application check the state and do nothing.

pub mod onoff;
pub mod sink;

pub use onoff::{OnOffApplication, OnOffConfig, OnOffStats};
pub use sink::{PacketSink, SinkConfig, SinkStats};

use crate::error::NetError;
use satsim_core::{Scheduler, SimTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppState {
    Idle,
    Running,
    Stopped,
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AppState::Idle => "idle",
            AppState::Running => "running",
            AppState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Start and stop times of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AppSchedule {
    start: SimTime,
    stop: SimTime,
}

impl AppSchedule {
    /// Fails with [`NetError::InvalidSchedule`] if `start > stop`.
    pub fn new(start: SimTime, stop: SimTime) -> Result<Self, NetError> {
        if start > stop {
            return Err(NetError::InvalidSchedule { start, stop });
        }
        Ok(Self { start, stop })
    }

    pub fn start(&self) -> SimTime {
        self.start
    }

    pub fn stop(&self) -> SimTime {
        self.stop
    }

    /// Whether `time` lies in `[start, stop)`.
    pub fn is_active_at(&self, time: SimTime) -> bool {
        time >= self.start && time < self.stop
    }
}

pub trait Application {
    fn name(&self) -> &str;

    fn schedule(&self) -> AppSchedule;

    fn state(&self) -> AppState;

    /// `Idle -> Running`. A no-op in any other state.
    fn start(self: Rc<Self>, scheduler: &mut Scheduler);

    /// `Idle | Running -> Stopped`. Cancels every pending internal event.
    fn stop(&self, scheduler: &mut Scheduler);
}

/// Schedules the start and stop transitions of `app`.
///
/// Must be called before the clock passes the start time; a start time in
/// the past is rejected.
pub fn install_application<A>(app: &Rc<A>, scheduler: &mut Scheduler) -> Result<(), NetError>
where
    A: Application + 'static,
{
    let schedule = app.schedule();
    let starter = Rc::clone(app);
    scheduler
        .schedule_at(schedule.start(), move |s: &mut Scheduler| starter.start(s))
        .map_err(satsim_core::SimError::from)?;
    let stopper = Rc::clone(app);
    scheduler
        .schedule_at(schedule.stop(), move |s: &mut Scheduler| stopper.stop(s))
        .map_err(satsim_core::SimError::from)?;
    debug!(
        app = app.name(),
        start = %schedule.start(),
        stop = %schedule.stop(),
        "Application installed"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_validation() {
        let ok = AppSchedule::new(SimTime::from_secs(2), SimTime::from_secs(20)).unwrap();
        assert!(ok.is_active_at(SimTime::from_secs(2)));
        assert!(!ok.is_active_at(SimTime::from_secs(20)));
        assert!(AppSchedule::new(SimTime::from_secs(5), SimTime::from_secs(5)).is_ok());

        let err = AppSchedule::new(SimTime::from_secs(21), SimTime::from_secs(20)).unwrap_err();
        assert!(matches!(err, NetError::InvalidSchedule { .. }));
    }
}
