//! Propagation delay models

use crate::error::NetError;
use satsim_core::SimTime;
use serde::{Deserialize, Serialize};

/// Speed of light in vacuum, m/s.
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

fn speed_of_light() -> f64 {
    SPEED_OF_LIGHT
}

/// How long a signal takes to cross a channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropagationDelay {
    /// A configured constant, e.g. `"250ms"` for a geostationary hop.
    Fixed { delay: SimTime },
    /// Distance over signal speed. The speed defaults to the speed of light.
    ConstantSpeed {
        distance_m: f64,
        #[serde(default = "speed_of_light")]
        speed_mps: f64,
    },
}

impl PropagationDelay {
    pub fn fixed(delay: SimTime) -> Self {
        PropagationDelay::Fixed { delay }
    }

    /// Line-of-sight delay over `distance_m` at the speed of light.
    pub fn line_of_sight(distance_m: f64) -> Self {
        PropagationDelay::ConstantSpeed {
            distance_m,
            speed_mps: SPEED_OF_LIGHT,
        }
    }

    pub fn validate(&self) -> Result<(), NetError> {
        match *self {
            PropagationDelay::Fixed { .. } => Ok(()),
            PropagationDelay::ConstantSpeed {
                distance_m,
                speed_mps,
            } => {
                if !(distance_m.is_finite() && distance_m >= 0.0) {
                    return Err(NetError::InvalidConfig(format!(
                        "propagation distance must be finite and non-negative, got {distance_m}"
                    )));
                }
                if !(speed_mps.is_finite() && speed_mps > 0.0) {
                    return Err(NetError::InvalidConfig(format!(
                        "propagation speed must be finite and positive, got {speed_mps}"
                    )));
                }
                SimTime::try_from_secs_f64(distance_m / speed_mps)?;
                Ok(())
            }
        }
    }

    /// The delay. Models that failed [`Self::validate`] yield zero.
    pub fn delay(&self) -> SimTime {
        match *self {
            PropagationDelay::Fixed { delay } => delay,
            PropagationDelay::ConstantSpeed {
                distance_m,
                speed_mps,
            } => SimTime::try_from_secs_f64(distance_m / speed_mps).unwrap_or_default(),
        }
    }
}

impl Default for PropagationDelay {
    fn default() -> Self {
        PropagationDelay::Fixed {
            delay: SimTime::zero(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geostationary_line_of_sight() {
        // Nadir distance to a GEO satellite.
        let hop = PropagationDelay::line_of_sight(35_786_000.0);
        hop.validate().unwrap();
        let ms = hop.delay().as_millis_f64();
        assert!((ms - 119.37).abs() < 0.01, "delay {ms}ms");
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(PropagationDelay::line_of_sight(-1.0).validate().is_err());
        assert!(PropagationDelay::ConstantSpeed { distance_m: 10.0, speed_mps: 0.0 }
            .validate()
            .is_err());
    }

    #[test]
    fn serde_defaults_speed() {
        let p: PropagationDelay =
            serde_json::from_str(r#"{"type":"constant_speed","distance_m":299792458.0}"#).unwrap();
        assert_eq!(p.delay(), SimTime::from_secs(1));
        let p: PropagationDelay = serde_json::from_str(r#"{"type":"fixed","delay":"250ms"}"#).unwrap();
        assert_eq!(p.delay(), SimTime::from_millis(250));
    }
}
