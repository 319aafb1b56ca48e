use crate::{SimTime, Simulation};

/// Simulation execution trait.
pub trait Execute {
    /// Executes the simulation until some stopping condition is reached.
    /// The condition is implementation-specific.
    fn execute(self, sim: &mut Simulation) -> RunSummary;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndCondition {
    Time(SimTime),
    NoEvents,
    Steps(usize),
}

/// Outcome of one call to [`Execute::execute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Clock value when the run began.
    pub started_at: SimTime,
    /// Clock value when the run returned: the time of the last fired event.
    pub finished_at: SimTime,
    /// Events fired during this run.
    pub events_fired: u64,
    /// Events dropped unfired at the horizon or stop barrier.
    pub events_discarded: u64,
    /// Whether the run ended because [`crate::Scheduler::stop`] was called.
    pub stopped: bool,
}

/// Executor is used for simple execution of an entire simulation.
///
/// See the crate level documentation for examples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Executor {
    end_condition: EndCondition,
}

impl Executor {
    /// Simulation will end only once there is no available events in the queue,
    /// or a stop is requested.
    #[must_use]
    pub fn unbound() -> Self {
        Self {
            end_condition: EndCondition::NoEvents,
        }
    }

    /// Simulation will be run no longer than the given time.
    ///
    /// No event due after `time` ever fires: once the next event lies beyond
    /// the horizon, everything still pending is discarded. It may terminate
    /// early if no events are available.
    #[must_use]
    pub fn timed(time: SimTime) -> Self {
        Self {
            end_condition: EndCondition::Time(time),
        }
    }

    /// Simulation will execute exactly this many steps, unless we run out of
    /// events. Pending events are kept so execution can be resumed.
    #[must_use]
    pub fn steps(steps: usize) -> Self {
        Self {
            end_condition: EndCondition::Steps(steps),
        }
    }

    /// Registers a side effect that is called _after_ each simulation step.
    #[must_use]
    pub fn side_effect<F>(self, func: F) -> ExecutorWithSideEffect<F>
    where
        F: Fn(&Simulation),
    {
        ExecutorWithSideEffect {
            end_condition: self.end_condition,
            side_effect: func,
        }
    }
}

impl Execute for Executor {
    fn execute(self, sim: &mut Simulation) -> RunSummary {
        run_with(sim, self.end_condition, |_| {})
    }
}

pub struct ExecutorWithSideEffect<F>
where
    F: Fn(&Simulation),
{
    end_condition: EndCondition,
    side_effect: F,
}

impl<F> Execute for ExecutorWithSideEffect<F>
where
    F: Fn(&Simulation),
{
    fn execute(self, sim: &mut Simulation) -> RunSummary {
        run_with(sim, self.end_condition, self.side_effect)
    }
}

fn run_with<F>(sim: &mut Simulation, end_condition: EndCondition, side_effect: F) -> RunSummary
where
    F: Fn(&Simulation),
{
    let started_at = sim.time();
    let fired_before = sim.scheduler().stats().fired;
    let horizon = match end_condition {
        EndCondition::Time(time) => Some(time),
        EndCondition::NoEvents | EndCondition::Steps(_) => None,
    };
    let step_fn = |sim: &mut Simulation| {
        let result = sim.scheduler_mut().fire_next(horizon);
        if result {
            side_effect(sim);
        }
        result
    };

    match end_condition {
        EndCondition::Time(_) | EndCondition::NoEvents => while step_fn(sim) {},
        EndCondition::Steps(steps) => {
            for _ in 0..steps {
                if !step_fn(sim) {
                    break;
                }
            }
        }
    }

    let stopped = sim.scheduler().stop_requested_at().is_some();
    let events_discarded = match end_condition {
        EndCondition::Time(_) => sim.scheduler_mut().discard_pending() as u64,
        EndCondition::NoEvents if stopped => sim.scheduler_mut().discard_pending() as u64,
        EndCondition::NoEvents | EndCondition::Steps(_) => 0,
    };
    sim.scheduler_mut().clear_stop();

    RunSummary {
        started_at,
        finished_at: sim.time(),
        events_fired: sim.scheduler().stats().fired - fired_before,
        events_discarded,
        stopped,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Scheduler;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Re-schedules itself every 2 seconds until it has run ten times.
    fn tick(counter: Rc<Cell<usize>>) -> impl FnOnce(&mut Scheduler) + 'static {
        move |scheduler: &mut Scheduler| {
            counter.set(counter.get() + 1);
            if counter.get() < 10 {
                let next = tick(Rc::clone(&counter));
                scheduler.schedule(SimTime::from_secs(2), next);
            }
        }
    }

    #[test]
    fn test_create_executor() {
        assert_eq!(
            Executor::unbound(),
            Executor {
                end_condition: EndCondition::NoEvents
            }
        );
        assert_eq!(
            Executor::timed(SimTime::zero()),
            Executor {
                end_condition: EndCondition::Time(SimTime::zero())
            }
        );
        assert_eq!(
            Executor::steps(7),
            Executor {
                end_condition: EndCondition::Steps(7)
            }
        );
    }

    #[test]
    fn test_steps() {
        let mut sim = Simulation::default();
        let counter = Rc::new(Cell::new(0));
        sim.schedule(SimTime::zero(), tick(Rc::clone(&counter)));
        let summary = Executor::steps(10).execute(&mut sim);
        assert_eq!(counter.get(), 10);
        assert_eq!(summary.events_fired, 10);
    }

    #[test]
    fn test_steps_stops_before() {
        let mut sim = Simulation::default();
        let counter = Rc::new(Cell::new(0));
        sim.schedule(SimTime::zero(), tick(Rc::clone(&counter)));
        // After 10 steps there are no events, so it will not execute all 100
        Executor::steps(100).execute(&mut sim);
        assert_eq!(counter.get(), 10);
    }

    #[test]
    fn test_timed() {
        let mut sim = Simulation::default();
        let counter = Rc::new(Cell::new(0));
        sim.schedule(SimTime::zero(), tick(Rc::clone(&counter)));
        let summary = Executor::timed(SimTime::from_secs(6)).execute(&mut sim);
        assert_eq!(counter.get(), 4);
        assert_eq!(sim.time(), SimTime::from_secs(6));
        assert_eq!(summary.events_discarded, 1);
        assert_eq!(sim.scheduler().pending_events(), 0);
    }

    #[test]
    fn test_timed_clock_stops_early() {
        let mut sim = Simulation::default();
        let counter = Rc::new(Cell::new(0));
        sim.schedule(SimTime::zero(), tick(Rc::clone(&counter)));
        Executor::timed(SimTime::from_secs(5)).execute(&mut sim);
        assert_eq!(counter.get(), 3);
        assert_eq!(sim.time(), SimTime::from_secs(4));
    }

    #[test]
    fn test_side_effect_runs_after_each_step() {
        let mut sim = Simulation::default();
        let counter = Rc::new(Cell::new(0));
        let observed = Rc::new(Cell::new(0));
        sim.schedule(SimTime::zero(), tick(Rc::clone(&counter)));
        let seen = Rc::clone(&observed);
        Executor::unbound()
            .side_effect(move |_| seen.set(seen.get() + 1))
            .execute(&mut sim);
        assert_eq!(observed.get(), 10);
    }
}
