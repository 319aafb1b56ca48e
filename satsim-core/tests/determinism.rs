//! Determinism guardrail tests
//!
//! These tests are intended to detect accidental introduction of
//! non-determinism in event execution order for identical simulations.

use satsim_core::{Scheduler, SimTime, Simulation};
use std::cell::RefCell;
use std::rc::Rc;

fn run_same_time_events(event_count: usize) -> Vec<usize> {
    let mut sim = Simulation::default();
    let log = Rc::new(RefCell::new(Vec::new()));

    for i in 0..event_count {
        let log = Rc::clone(&log);
        // Delay is relative to current time (t=0 here), so all events land at the same timestamp.
        sim.schedule(SimTime::zero(), move |_| log.borrow_mut().push(i));
    }

    sim.run(SimTime::from_millis(1));

    let result = log.borrow().clone();
    assert_eq!(result.len(), event_count);
    result
}

#[test]
fn same_time_events_fire_in_scheduling_order() {
    let order = run_same_time_events(200);
    assert_eq!(order, (0..200).collect::<Vec<_>>());

    for _ in 0..50 {
        assert_eq!(run_same_time_events(200), order);
    }
}

fn run_nested_same_time_events(count: usize) -> Vec<String> {
    let mut sim = Simulation::default();
    let log: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));

    for i in 0..count {
        let log = Rc::clone(&log);
        sim.schedule(SimTime::zero(), move |scheduler: &mut Scheduler| {
            log.borrow_mut().push(format!("event-{i}"));

            // Also schedule a follow-up at the same logical time.
            let log = Rc::clone(&log);
            scheduler.schedule_now(move |_| log.borrow_mut().push(format!("follow-{i}")));
        });
    }

    sim.run(SimTime::from_millis(1));

    let result = log.borrow().clone();
    result
}

#[test]
fn same_time_self_scheduling_runs_after_existing_events() {
    let baseline = run_nested_same_time_events(50);
    assert_eq!(baseline.len(), 100);
    // Every pre-scheduled event precedes every follow-up scheduled at the same time.
    assert!(baseline[..50].iter().all(|entry| entry.starts_with("event-")));
    assert_eq!(baseline[50], "follow-0");
    assert_eq!(baseline[99], "follow-49");

    for _ in 0..25 {
        assert_eq!(run_nested_same_time_events(50), baseline);
    }
}
