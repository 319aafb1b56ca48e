//! Link data rates

use crate::error::NetError;
use satsim_core::SimTime;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// A transmission rate in bits per second.
///
/// [`DataRate::UNLIMITED`] models an ideal link whose serialization time is
/// zero. Serializes as an integer number of bits per second; deserializes from
/// an integer or from a string such as `"100Mbps"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DataRate(u64);

impl DataRate {
    /// A link with no serialization delay.
    pub const UNLIMITED: DataRate = DataRate(u64::MAX);

    /// Rate in bits per second. Zero is rejected.
    pub fn from_bps(bps: u64) -> Result<Self, NetError> {
        if bps == 0 {
            return Err(NetError::InvalidConfig(
                "data rate must be positive".to_string(),
            ));
        }
        Ok(DataRate(bps))
    }

    pub const fn kbps(kbps: u64) -> Self {
        DataRate(kbps * 1_000)
    }

    pub const fn mbps(mbps: u64) -> Self {
        DataRate(mbps * 1_000_000)
    }

    pub const fn gbps(gbps: u64) -> Self {
        DataRate(gbps * 1_000_000_000)
    }

    pub const fn bps(&self) -> u64 {
        self.0
    }

    pub fn is_unlimited(&self) -> bool {
        *self == Self::UNLIMITED
    }

    /// Time to clock `bytes` onto the wire, rounded up to whole nanoseconds.
    ///
    /// ```
    /// # use satsim_net::DataRate;
    /// # use satsim_core::SimTime;
    /// assert_eq!(DataRate::mbps(100).transmission_time(1024), SimTime::from_nanos(81_920));
    /// ```
    pub fn transmission_time(&self, bytes: usize) -> SimTime {
        if self.is_unlimited() || self.0 == 0 {
            return SimTime::zero();
        }
        let bits = bytes as u128 * 8;
        let nanos = (bits * NANOS_PER_SEC).div_ceil(self.0 as u128);
        SimTime::from_nanos(nanos.min(u64::MAX as u128) as u64)
    }
}

impl FromStr for DataRate {
    type Err = NetError;

    /// Accepts `bps`, `kbps`, `Mbps` and `Gbps` suffixes (case-insensitive),
    /// an optional `b/s` spelling, or `unlimited`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if text.eq_ignore_ascii_case("unlimited") {
            return Ok(Self::UNLIMITED);
        }
        let split = text
            .find(|c: char| c.is_ascii_alphabetic())
            .unwrap_or(text.len());
        let (number, unit) = text.split_at(split);
        let value: f64 = number
            .trim()
            .parse()
            .map_err(|_| NetError::InvalidConfig(format!("cannot parse data rate {text:?}")))?;
        let unit = unit.trim().to_ascii_lowercase().replace("b/s", "bps");
        let scale = match unit.as_str() {
            "" | "bps" => 1.0,
            "kbps" => 1e3,
            "mbps" => 1e6,
            "gbps" => 1e9,
            other => {
                return Err(NetError::InvalidConfig(format!(
                    "unknown data rate unit {other:?} in {text:?}"
                )))
            }
        };
        let bps = value * scale;
        if !bps.is_finite() || bps < 1.0 || bps >= u64::MAX as f64 {
            return Err(NetError::InvalidConfig(format!(
                "data rate out of range: {text:?}"
            )));
        }
        Self::from_bps(bps.round() as u64)
    }
}

impl<'de> Deserialize<'de> for DataRate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Bps(u64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Bps(bps) => DataRate::from_bps(bps).map_err(serde::de::Error::custom),
            Repr::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

impl fmt::Display for DataRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            u64::MAX => write!(f, "unlimited"),
            bps if bps % 1_000_000_000 == 0 => write!(f, "{}Gbps", bps / 1_000_000_000),
            bps if bps % 1_000_000 == 0 => write!(f, "{}Mbps", bps / 1_000_000),
            bps if bps % 1_000 == 0 => write!(f, "{}kbps", bps / 1_000),
            bps => write!(f, "{bps}bps"),
        }
    }
}
