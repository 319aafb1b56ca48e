//! Duration distributions for traffic shaping
//!
//! On/off generators draw the length of each ON and OFF period from one of
//! these distributions. They mirror the constant, exponential and uniform
//! random variables commonly used to configure on/off sources.

use crate::error::SimError;
use crate::SimTime;
use rand::Rng;
use rand_distr::{Distribution, Exp, Uniform};
use serde::{Deserialize, Serialize};

/// A distribution over non-negative durations, parameterized in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DurationDistribution {
    /// Always the same value.
    Constant { secs: f64 },
    /// Exponentially distributed with the given mean.
    Exponential { mean_secs: f64 },
    /// Uniform over `[min_secs, max_secs)`.
    Uniform { min_secs: f64, max_secs: f64 },
}

impl DurationDistribution {
    /// A constant duration.
    pub fn constant(time: SimTime) -> Self {
        DurationDistribution::Constant {
            secs: time.as_secs_f64(),
        }
    }

    /// Checks the parameters; called by every consumer at construction.
    pub fn validate(&self) -> Result<(), SimError> {
        let ok = match *self {
            DurationDistribution::Constant { secs } => secs.is_finite() && secs >= 0.0,
            DurationDistribution::Exponential { mean_secs } => {
                mean_secs.is_finite() && mean_secs > 0.0
            }
            DurationDistribution::Uniform { min_secs, max_secs } => {
                min_secs.is_finite() && max_secs.is_finite() && min_secs >= 0.0 && min_secs < max_secs
            }
        };
        if ok {
            Ok(())
        } else {
            Err(SimError::Configuration(format!(
                "invalid duration distribution: {self:?}"
            )))
        }
    }

    /// True if every sample is exactly zero.
    pub fn is_always_zero(&self) -> bool {
        matches!(*self, DurationDistribution::Constant { secs } if secs == 0.0)
    }

    /// Mean of the distribution in seconds.
    pub fn mean_secs(&self) -> f64 {
        match *self {
            DurationDistribution::Constant { secs } => secs,
            DurationDistribution::Exponential { mean_secs } => mean_secs,
            DurationDistribution::Uniform { min_secs, max_secs } => (min_secs + max_secs) / 2.0,
        }
    }

    /// Draws one duration. Parameters must have passed [`Self::validate`];
    /// invalid parameters sample as zero.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> SimTime {
        let secs = match *self {
            DurationDistribution::Constant { secs } => secs,
            DurationDistribution::Exponential { mean_secs } => Exp::new(1.0 / mean_secs)
                .map(|exp| exp.sample(rng))
                .unwrap_or(0.0),
            DurationDistribution::Uniform { min_secs, max_secs } => {
                if min_secs < max_secs {
                    Uniform::new(min_secs, max_secs).sample(rng)
                } else {
                    min_secs
                }
            }
        };
        SimTime::try_from_secs_f64(secs).unwrap_or_default()
    }
}

impl Default for DurationDistribution {
    fn default() -> Self {
        DurationDistribution::Constant { secs: 1.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn constant_samples_exactly() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let dist = DurationDistribution::constant(SimTime::from_millis(1500));
        for _ in 0..10 {
            assert_eq!(dist.sample(&mut rng), SimTime::from_millis(1500));
        }
    }

    #[test]
    fn exponential_mean_is_close() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let dist = DurationDistribution::Exponential { mean_secs: 0.5 };
        let n = 20_000;
        let total: f64 = (0..n).map(|_| dist.sample(&mut rng).as_secs_f64()).sum();
        let mean = total / n as f64;
        assert!((mean - 0.5).abs() < 0.02, "sample mean {mean}");
    }

    #[test]
    fn uniform_stays_in_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let dist = DurationDistribution::Uniform { min_secs: 1.0, max_secs: 2.0 };
        for _ in 0..1000 {
            let t = dist.sample(&mut rng);
            assert!(t >= SimTime::from_secs(1) && t <= SimTime::from_secs(2));
        }
    }

    #[test]
    fn validation() {
        assert!(DurationDistribution::Constant { secs: 0.0 }.validate().is_ok());
        assert!(DurationDistribution::Constant { secs: -1.0 }.validate().is_err());
        assert!(DurationDistribution::Exponential { mean_secs: 0.0 }.validate().is_err());
        assert!(DurationDistribution::Uniform { min_secs: 2.0, max_secs: 1.0 }
            .validate()
            .is_err());
        assert!(DurationDistribution::Constant { secs: 0.0 }.is_always_zero());
    }

    #[test]
    fn serde_tagged_form() {
        let dist: DurationDistribution =
            serde_json::from_str(r#"{"type":"exponential","mean_secs":0.25}"#).unwrap();
        assert_eq!(dist, DurationDistribution::Exponential { mean_secs: 0.25 });
    }
}
