//! Simulation time management

use crate::error::SimError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};
use std::str::FromStr;
use std::time::Duration;

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Simulation time with nanosecond precision
///
/// SimTime represents a point in simulation time, stored as nanoseconds since
/// the simulation start. The same type is used for relative delays, which are
/// therefore non-negative by construction. It supports arithmetic operations and
/// conversions to/from standard Duration types.
///
/// Serializes as an integer number of nanoseconds. Deserializes from either an
/// integer or a string with a unit suffix (`"250ms"`, `"0.1ms"`, `"2s"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SimTime(u64);

impl SimTime {
    /// Largest representable time.
    pub const MAX: SimTime = SimTime(u64::MAX);

    /// Create a new SimTime at the simulation start (time zero)
    pub const fn zero() -> Self {
        SimTime(0)
    }

    /// Create a SimTime from nanoseconds
    pub const fn from_nanos(nanos: u64) -> Self {
        SimTime(nanos)
    }

    /// Create a SimTime from microseconds
    pub const fn from_micros(micros: u64) -> Self {
        SimTime(micros * 1_000)
    }

    /// Create a SimTime from milliseconds
    pub const fn from_millis(millis: u64) -> Self {
        SimTime(millis * 1_000_000)
    }

    /// Create a SimTime from seconds
    pub const fn from_secs(secs: u64) -> Self {
        SimTime(secs * 1_000_000_000)
    }

    /// Create a SimTime from a Duration
    pub fn from_duration(duration: Duration) -> Self {
        SimTime(duration.as_nanos().min(u64::MAX as u128) as u64)
    }

    /// Create a SimTime from fractional seconds, rejecting negative,
    /// non-finite and out-of-range inputs.
    pub fn try_from_secs_f64(secs: f64) -> Result<Self, SimError> {
        if !secs.is_finite() {
            return Err(SimError::InvalidTime(format!(
                "SimTime cannot be created from non-finite value: {secs}"
            )));
        }
        if secs < 0.0 {
            return Err(SimError::InvalidTime(format!(
                "SimTime cannot be negative: {secs}"
            )));
        }
        const MAX_SECS: f64 = (u64::MAX as f64) / NANOS_PER_SEC;
        if secs > MAX_SECS {
            return Err(SimError::InvalidTime(format!(
                "SimTime value too large: {secs} seconds (max: {MAX_SECS} seconds)"
            )));
        }
        Ok(SimTime((secs * NANOS_PER_SEC).round() as u64))
    }

    /// Convert SimTime to a Duration
    pub fn as_duration(&self) -> Duration {
        Duration::from_nanos(self.0)
    }

    /// Get the raw nanosecond value
    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    /// Fractional seconds, for reporting.
    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / NANOS_PER_SEC
    }

    /// Fractional milliseconds, for reporting.
    pub fn as_millis_f64(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Calculate the duration since another SimTime
    pub fn duration_since(&self, earlier: SimTime) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }

    /// `self - other`, or `None` if `other` is later.
    pub fn checked_sub(&self, other: SimTime) -> Option<SimTime> {
        self.0.checked_sub(other.0).map(SimTime)
    }

    /// `self - other`, clamped at zero.
    pub fn saturating_sub(&self, other: SimTime) -> SimTime {
        SimTime(self.0.saturating_sub(other.0))
    }

    /// Add a duration to this SimTime
    pub fn add_duration(&self, duration: Duration) -> Self {
        SimTime(self.0.saturating_add(duration.as_nanos().min(u64::MAX as u128) as u64))
    }

    /// Subtract a duration from this SimTime
    pub fn sub_duration(&self, duration: Duration) -> Self {
        SimTime(self.0.saturating_sub(duration.as_nanos().min(u64::MAX as u128) as u64))
    }

    /// Parse a time with a unit suffix: `ns`, `us`, `ms`, `s`, `min`.
    ///
    /// A bare number is read as seconds, the unit ns-3 style attribute strings
    /// default to.
    ///
    /// ```
    /// # use satsim_core::SimTime;
    /// assert_eq!(SimTime::parse("250ms").unwrap(), SimTime::from_millis(250));
    /// assert_eq!(SimTime::parse("0.1ms").unwrap(), SimTime::from_micros(100));
    /// assert_eq!(SimTime::parse("2").unwrap(), SimTime::from_secs(2));
    /// ```
    pub fn parse(text: &str) -> Result<Self, SimError> {
        let text = text.trim();
        let split = text
            .find(|c: char| c.is_ascii_alphabetic() || c == 'µ')
            .unwrap_or(text.len());
        let (number, unit) = text.split_at(split);
        let value: f64 = number.trim().parse().map_err(|_| {
            SimError::InvalidTime(format!("cannot parse time value from {text:?}"))
        })?;
        let scale = match unit.trim() {
            "" | "s" => 1.0,
            "ms" => 1e-3,
            "us" | "µs" => 1e-6,
            "ns" => 1e-9,
            "min" => 60.0,
            other => {
                return Err(SimError::InvalidTime(format!(
                    "unknown time unit {other:?} in {text:?}"
                )))
            }
        };
        Self::try_from_secs_f64(value * scale)
    }
}

impl Add<SimTime> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: SimTime) -> Self::Output {
        SimTime(self.0.saturating_add(rhs.0))
    }
}

impl Add<Duration> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: Duration) -> Self::Output {
        self.add_duration(rhs)
    }
}

impl Sub<Duration> for SimTime {
    type Output = SimTime;

    fn sub(self, rhs: Duration) -> Self::Output {
        self.sub_duration(rhs)
    }
}

impl Sub<SimTime> for SimTime {
    type Output = Duration;

    fn sub(self, rhs: SimTime) -> Self::Output {
        self.duration_since(rhs)
    }
}

impl Mul<u64> for SimTime {
    type Output = SimTime;

    fn mul(self, rhs: u64) -> Self::Output {
        SimTime(self.0.saturating_mul(rhs))
    }
}

impl Default for SimTime {
    fn default() -> Self {
        SimTime::zero()
    }
}

impl From<Duration> for SimTime {
    fn from(duration: Duration) -> Self {
        SimTime::from_duration(duration)
    }
}

impl FromStr for SimTime {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SimTime::parse(s)
    }
}

impl<'de> Deserialize<'de> for SimTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Nanos(u64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Nanos(nanos) => Ok(SimTime(nanos)),
            Repr::Text(text) => SimTime::parse(&text).map_err(serde::de::Error::custom),
        }
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let duration = self.as_duration();
        let secs = duration.as_secs();
        let millis = duration.subsec_millis();
        let micros = duration.subsec_micros() % 1000;
        let nanos = duration.subsec_nanos() % 1000;

        if secs > 0 {
            write!(f, "{secs}.{:06}s", duration.subsec_micros())
        } else if millis > 0 {
            write!(f, "{millis}.{micros:03}ms")
        } else if micros > 0 {
            write!(f, "{micros}.{nanos:03}µs")
        } else {
            write!(f, "{nanos}ns")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simtime_creation() {
        assert_eq!(SimTime::zero().as_nanos(), 0);
        assert_eq!(SimTime::from_nanos(1000).as_nanos(), 1000);
        assert_eq!(SimTime::from_micros(1).as_nanos(), 1_000);
        assert_eq!(SimTime::from_millis(1).as_nanos(), 1_000_000);
        assert_eq!(SimTime::from_secs(1).as_nanos(), 1_000_000_000);
    }

    #[test]
    fn test_simtime_arithmetic() {
        let t1 = SimTime::from_millis(100);
        let t2 = SimTime::from_millis(50);
        let duration = Duration::from_millis(25);

        assert_eq!(t1 + duration, SimTime::from_millis(125));
        assert_eq!(t1 - duration, SimTime::from_millis(75));
        assert_eq!(t1 - t2, Duration::from_millis(50));
        assert_eq!(t2.checked_sub(t1), None);
        assert_eq!(t2.saturating_sub(t1), SimTime::zero());
        assert_eq!(SimTime::MAX + SimTime::from_secs(1), SimTime::MAX);
    }

    #[test]
    fn test_simtime_from_secs_f64() {
        assert_eq!(SimTime::try_from_secs_f64(1.5).unwrap().as_nanos(), 1_500_000_000);
        assert_eq!(SimTime::try_from_secs_f64(0.000001).unwrap().as_nanos(), 1_000);
        assert!(SimTime::try_from_secs_f64(-1.0).is_err());
        assert!(SimTime::try_from_secs_f64(f64::NAN).is_err());
        assert!(SimTime::try_from_secs_f64(f64::INFINITY).is_err());
        assert!(SimTime::try_from_secs_f64(1e12).is_err());
    }

    #[test]
    fn test_simtime_parse() {
        assert_eq!(SimTime::parse("1ms").unwrap(), SimTime::from_millis(1));
        assert_eq!(SimTime::parse("250ms").unwrap(), SimTime::from_millis(250));
        assert_eq!(SimTime::parse("0.1ms").unwrap(), SimTime::from_micros(100));
        assert_eq!(SimTime::parse("0.5").unwrap(), SimTime::from_millis(500));
        assert_eq!(SimTime::parse(" 30s ").unwrap(), SimTime::from_secs(30));
        assert!(SimTime::parse("10 parsecs").is_err());
        assert!(SimTime::parse("-1s").is_err());
        assert!(SimTime::parse("fast").is_err());
    }

    #[test]
    fn test_simtime_serde() {
        let t: SimTime = serde_json::from_str("\"250ms\"").unwrap();
        assert_eq!(t, SimTime::from_millis(250));
        let t: SimTime = serde_json::from_str("1000").unwrap();
        assert_eq!(t, SimTime::from_nanos(1000));
        assert_eq!(serde_json::to_string(&SimTime::from_micros(3)).unwrap(), "3000");
    }

    #[test]
    fn test_simtime_display() {
        assert_eq!(SimTime::from_millis(2001).to_string(), "2.001000s");
        assert_eq!(SimTime::from_micros(1500).to_string(), "1.500ms");
        assert_eq!(SimTime::from_nanos(12).to_string(), "12ns");
    }
}
