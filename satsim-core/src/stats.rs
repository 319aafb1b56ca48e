//! Delay statistics backed by HdrHistogram
//!
//! Samples are recorded in nanoseconds with three significant figures, so
//! every reported value is within 0.1% of the exact one.

use crate::error::SimError;
use crate::SimTime;
use hdrhistogram::Histogram as HdrHistogram;
use serde::Serialize;
use std::fmt;
use tracing::warn;

/// Largest delay recorded exactly; longer delays are clamped to it.
pub const MAX_TRACKED_DELAY: SimTime = SimTime::from_secs(3600);

const SIGNIFICANT_FIGURES: u8 = 3;

/// Summary of a delay distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DelayStats {
    pub count: u64,
    pub min: SimTime,
    pub max: SimTime,
    pub mean: SimTime,
    pub p50: SimTime,
    pub p95: SimTime,
    pub p99: SimTime,
}

impl fmt::Display for DelayStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "count={}, min={:.3}ms, mean={:.3}ms, p50={:.3}ms, p95={:.3}ms, p99={:.3}ms, max={:.3}ms",
            self.count,
            self.min.as_millis_f64(),
            self.mean.as_millis_f64(),
            self.p50.as_millis_f64(),
            self.p95.as_millis_f64(),
            self.p99.as_millis_f64(),
            self.max.as_millis_f64(),
        )
    }
}

/// One-way delay samples.
#[derive(Debug, Clone)]
pub struct DelayHistogram {
    histogram: HdrHistogram<u64>,
    clamped: u64,
}

impl DelayHistogram {
    pub fn new() -> Result<Self, SimError> {
        let histogram =
            HdrHistogram::new_with_bounds(1, MAX_TRACKED_DELAY.as_nanos(), SIGNIFICANT_FIGURES)
                .map_err(|e| SimError::Configuration(format!("delay histogram: {e}")))?;
        Ok(Self {
            histogram,
            clamped: 0,
        })
    }

    pub fn record(&mut self, delay: SimTime) {
        if let Err(e) = self.histogram.record(delay.as_nanos()) {
            self.clamped += 1;
            self.histogram.saturating_record(delay.as_nanos());
            warn!(delay = %delay, error = %e, "Delay above histogram range, clamped");
        }
    }

    pub fn len(&self) -> u64 {
        self.histogram.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histogram.is_empty()
    }

    /// Samples longer than [`MAX_TRACKED_DELAY`].
    pub fn clamped(&self) -> u64 {
        self.clamped
    }

    /// Forgets every sample, keeping the allocated buckets.
    pub fn reset(&mut self) {
        self.histogram.reset();
        self.clamped = 0;
    }

    /// `None` until a sample has been recorded.
    pub fn stats(&self) -> Option<DelayStats> {
        if self.histogram.is_empty() {
            return None;
        }
        let h = &self.histogram;
        Some(DelayStats {
            count: h.len(),
            min: SimTime::from_nanos(h.min()),
            max: SimTime::from_nanos(h.max()),
            mean: SimTime::from_nanos(h.mean().round() as u64),
            p50: SimTime::from_nanos(h.value_at_quantile(0.5)),
            p95: SimTime::from_nanos(h.value_at_quantile(0.95)),
            p99: SimTime::from_nanos(h.value_at_quantile(0.99)),
        })
    }
}
