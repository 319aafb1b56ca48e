//! A `metrics::Recorder` that keeps the counters devices and channels emit.
//!
//! Simulations are single-threaded, so the recorder is installed locally for
//! the duration of a run rather than globally:
//!
//! ```rust
//! # use std::sync::{Arc, Mutex};
//! # use satsim_metrics::{with_counter_recorder, CounterSet};
//! let counters = Arc::new(Mutex::new(CounterSet::default()));
//! with_counter_recorder(&counters, || {
//!     metrics::counter!("satsim_device_tx_packets_total", "device" => "dev-0").increment(3);
//! });
//! let counters = counters.lock().unwrap();
//! assert_eq!(counters.get("satsim_device_tx_packets_total", &[("device", "dev-0")]), Some(3));
//! ```

use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Counter values by name, then by rendered label set (`k=v,k=v`, keys
/// sorted).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CounterSet {
    values: BTreeMap<String, BTreeMap<String, u64>>,
}

fn render_labels<'a>(labels: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    let mut labels: Vec<_> = labels.collect();
    labels.sort_unstable();
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

impl CounterSet {
    pub fn get(&self, name: &str, labels: &[(&str, &str)]) -> Option<u64> {
        self.values
            .get(name)?
            .get(&render_labels(labels.iter().copied()))
            .copied()
    }

    /// Sum over every label set of `name`.
    pub fn total(&self, name: &str) -> u64 {
        self.values
            .get(name)
            .map_or(0, |series| series.values().sum())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(name, labels, value)` in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, u64)> {
        self.values.iter().flat_map(|(name, series)| {
            series
                .iter()
                .map(move |(labels, value)| (name.as_str(), labels.as_str(), *value))
        })
    }

    fn entry(&mut self, name: &str, labels: &str) -> &mut u64 {
        self.values
            .entry(name.to_string())
            .or_default()
            .entry(labels.to_string())
            .or_insert(0)
    }
}

#[derive(Clone)]
pub struct CounterRecorder {
    counters: Arc<Mutex<CounterSet>>,
}

impl CounterRecorder {
    pub fn new(counters: Arc<Mutex<CounterSet>>) -> Self {
        Self { counters }
    }
}

/// Runs `f` with a [`CounterRecorder`] on `counters` installed for the
/// current thread.
pub fn with_counter_recorder<T>(counters: &Arc<Mutex<CounterSet>>, f: impl FnOnce() -> T) -> T {
    let recorder = CounterRecorder::new(Arc::clone(counters));
    metrics::with_local_recorder(&recorder, f)
}

struct CounterHandle {
    counters: Arc<Mutex<CounterSet>>,
    name: String,
    labels: String,
}

impl metrics::CounterFn for CounterHandle {
    fn increment(&self, value: u64) {
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        *counters.entry(&self.name, &self.labels) += value;
    }

    fn absolute(&self, value: u64) {
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        let current = counters.entry(&self.name, &self.labels);
        *current = (*current).max(value);
    }
}

impl Recorder for CounterRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::from_arc(Arc::new(CounterHandle {
            counters: Arc::clone(&self.counters),
            name: key.name().to_string(),
            labels: render_labels(key.labels().map(|l| (l.key(), l.value()))),
        }))
    }

    // Only counters are emitted.
    fn register_gauge(&self, _key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::noop()
    }

    fn register_histogram(&self, _key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::noop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_per_label_set() {
        let counters = Arc::new(Mutex::new(CounterSet::default()));
        with_counter_recorder(&counters, || {
            metrics::counter!("losses_total", "kind" => "relay", "channel" => "ch-1").increment(2);
            metrics::counter!("losses_total", "channel" => "ch-1", "kind" => "relay").increment(1);
            metrics::counter!("losses_total", "channel" => "ch-2", "kind" => "csma").increment(4);
            metrics::gauge!("ignored").set(1.0);
        });

        let counters = counters.lock().unwrap();
        assert_eq!(
            counters.get("losses_total", &[("kind", "relay"), ("channel", "ch-1")]),
            Some(3)
        );
        assert_eq!(counters.total("losses_total"), 7);
        assert_eq!(counters.total("ignored"), 0);
        assert_eq!(counters.iter().count(), 2);
    }

    #[test]
    fn nothing_is_recorded_outside_the_scope() {
        let counters = Arc::new(Mutex::new(CounterSet::default()));
        metrics::counter!("outside_total").increment(1);
        with_counter_recorder(&counters, || {});
        assert!(counters.lock().unwrap().is_empty());
    }
}
