//! Loss models
//!
//! A loss model turns channel parameters into a per-transmission drop
//! probability. The draw itself is made by the channel on its own seeded
//! stream, once per destination.

use super::propagation::SPEED_OF_LIGHT;
use crate::error::NetError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Probability that a transmission does not reach a given receiver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LossModel {
    /// Lossless.
    #[default]
    None,
    /// Every transmission is lost with the same probability.
    Fixed { probability: f64 },
    /// Free-space (Friis) path loss plus a constant extra loss. The received
    /// power is compared to the receiver sensitivity; within roughly
    /// `transition_db` of the threshold the loss probability ramps smoothly
    /// from 0 to 1.
    Attenuation {
        frequency_hz: f64,
        distance_m: f64,
        tx_power_dbm: f64,
        #[serde(default)]
        extra_loss_db: f64,
        sensitivity_dbm: f64,
        #[serde(default = "default_transition_db")]
        transition_db: f64,
    },
}

fn default_transition_db() -> f64 {
    1.0
}

/// Free-space path loss in dB.
pub fn free_space_path_loss_db(frequency_hz: f64, distance_m: f64) -> f64 {
    if distance_m <= 0.0 {
        return 0.0;
    }
    20.0 * (4.0 * PI * distance_m * frequency_hz / SPEED_OF_LIGHT).log10()
}

impl LossModel {
    pub fn fixed(probability: f64) -> Self {
        LossModel::Fixed { probability }
    }

    pub fn validate(&self) -> Result<(), NetError> {
        match *self {
            LossModel::None => Ok(()),
            LossModel::Fixed { probability } => {
                if (0.0..=1.0).contains(&probability) {
                    Ok(())
                } else {
                    Err(NetError::InvalidConfig(format!(
                        "loss probability must be between 0.0 and 1.0, got {probability}"
                    )))
                }
            }
            LossModel::Attenuation {
                frequency_hz,
                distance_m,
                tx_power_dbm,
                extra_loss_db,
                sensitivity_dbm,
                transition_db,
            } => {
                let finite = [
                    frequency_hz,
                    distance_m,
                    tx_power_dbm,
                    extra_loss_db,
                    sensitivity_dbm,
                    transition_db,
                ]
                .iter()
                .all(|v| v.is_finite());
                if !finite || frequency_hz <= 0.0 || distance_m < 0.0 || transition_db <= 0.0 {
                    return Err(NetError::InvalidConfig(format!(
                        "invalid attenuation parameters: {self:?}"
                    )));
                }
                Ok(())
            }
        }
    }

    /// Received power in dBm for attenuation models.
    pub fn received_power_dbm(&self) -> Option<f64> {
        match *self {
            LossModel::Attenuation {
                frequency_hz,
                distance_m,
                tx_power_dbm,
                extra_loss_db,
                ..
            } => Some(
                tx_power_dbm - free_space_path_loss_db(frequency_hz, distance_m) - extra_loss_db,
            ),
            _ => None,
        }
    }

    /// Probability that one transmission is lost.
    pub fn loss_probability(&self) -> f64 {
        match *self {
            LossModel::None => 0.0,
            LossModel::Fixed { probability } => probability,
            LossModel::Attenuation {
                sensitivity_dbm,
                transition_db,
                ..
            } => {
                let rx = self.received_power_dbm().unwrap_or(f64::NEG_INFINITY);
                let margin = (rx - sensitivity_dbm) / transition_db;
                1.0 / (1.0 + margin.exp())
            }
        }
    }

    /// Draws a loss decision. Lossless models consume no randomness.
    pub fn is_lost<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        match self.loss_probability() {
            p if p <= 0.0 => false,
            p if p >= 1.0 => true,
            p => rng.gen::<f64>() < p,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn ku_band(distance_m: f64) -> LossModel {
        LossModel::Attenuation {
            frequency_hz: 14e9,
            distance_m,
            tx_power_dbm: 60.0,
            extra_loss_db: 2.0,
            sensitivity_dbm: -120.0,
            transition_db: 1.0,
        }
    }

    #[test]
    fn friis_matches_reference_value() {
        // 14 GHz over 1 km.
        let fspl = free_space_path_loss_db(14e9, 1_000.0);
        assert!((fspl - 115.37).abs() < 0.01, "fspl {fspl}");
    }

    #[test]
    fn attenuation_ramps_with_distance() {
        let near = ku_band(1_000.0);
        let geo = ku_band(35_786_000.0);
        near.validate().unwrap();
        assert!(near.loss_probability() < 1e-6);
        // 60 - 206.4 - 2 dBm is far below a -120 dBm sensitivity.
        assert!(geo.loss_probability() > 0.999_999);
    }

    #[test]
    fn fixed_probability_draws() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        assert!(!LossModel::None.is_lost(&mut rng));
        assert!(LossModel::fixed(1.0).is_lost(&mut rng));
        let half = LossModel::fixed(0.5);
        let lost = (0..10_000).filter(|_| half.is_lost(&mut rng)).count();
        assert!((4_800..5_200).contains(&lost), "lost {lost}");
    }

    #[test]
    fn validation() {
        assert!(LossModel::fixed(1.5).validate().is_err());
        assert!(LossModel::fixed(-0.1).validate().is_err());
        assert!(ku_band(-5.0).validate().is_err());
        let parsed: LossModel = serde_json::from_str(r#"{"type":"fixed","probability":0.1}"#).unwrap();
        assert_eq!(parsed, LossModel::fixed(0.1));
    }
}
