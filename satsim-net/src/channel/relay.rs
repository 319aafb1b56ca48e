//! Long-delay relay links
//!
//! Models satellite hops and other wireless links whose delay is dominated
//! by propagation. The delay is either configured directly or derived from a
//! distance, and loss is typically an attenuation model.

use super::shared::SharedMedium;
use super::{Channel, ChannelKind, ChannelStats, LossModel, PropagationDelay, TransmitOutcome};
use crate::device::NetDevice;
use crate::error::NetError;
use crate::ids::{ChannelId, DeviceId};
use crate::packet::Packet;
use crate::rate::DataRate;
use satsim_core::{Scheduler, SimTime};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Configuration of a relay link, e.g. `10Mbps` with a fixed `250ms` delay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    pub data_rate: DataRate,
    pub propagation: PropagationDelay,
    #[serde(default)]
    pub loss: LossModel,
    /// Upper bound on the propagation delay. Configurations whose delay
    /// exceeds it are rejected.
    #[serde(default)]
    pub max_delay: Option<SimTime>,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl RelayConfig {
    pub fn new(data_rate: DataRate, propagation: PropagationDelay) -> Self {
        Self {
            data_rate,
            propagation,
            loss: LossModel::None,
            max_delay: None,
            seed: None,
        }
    }

    pub fn with_loss(mut self, loss: LossModel) -> Self {
        self.loss = loss;
        self
    }

    pub fn with_max_delay(mut self, max_delay: SimTime) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    pub fn validate(&self) -> Result<(), NetError> {
        self.propagation.validate()?;
        self.loss.validate()?;
        if let Some(max_delay) = self.max_delay {
            let delay = self.propagation.delay();
            if delay > max_delay {
                return Err(NetError::InvalidConfig(format!(
                    "relay propagation delay {delay} exceeds maximum {max_delay}"
                )));
            }
        }
        Ok(())
    }
}

/// A long-delay channel with any number of endpoints (a ground terminal and
/// a satellite, or several terminals sharing a beam).
#[derive(Debug)]
pub struct RelayChannel {
    medium: SharedMedium,
}

impl RelayChannel {
    pub fn new(id: ChannelId, config: &RelayConfig, seed: u64) -> Result<Self, NetError> {
        config.validate()?;
        Ok(Self {
            medium: SharedMedium::new(
                id,
                ChannelKind::Relay,
                None,
                config.propagation,
                config.loss,
                config.seed.unwrap_or(seed),
            )?,
        })
    }

    pub fn propagation(&self) -> PropagationDelay {
        self.medium.propagation()
    }

    pub fn loss(&self) -> LossModel {
        self.medium.loss()
    }
}

impl Channel for RelayChannel {
    fn id(&self) -> ChannelId {
        self.medium.id()
    }

    fn kind(&self) -> ChannelKind {
        self.medium.kind()
    }

    fn connect(&self, device: &Rc<NetDevice>) -> Result<(), NetError> {
        self.medium.connect(device)
    }

    fn disconnect(&self, device: DeviceId) -> bool {
        self.medium.disconnect(device)
    }

    fn endpoints(&self) -> Vec<DeviceId> {
        self.medium.endpoint_ids()
    }

    fn peer_count(&self, device: DeviceId) -> usize {
        self.medium.peer_count(device)
    }

    fn transmit(
        &self,
        from: &NetDevice,
        packet: &Packet,
        scheduler: &mut Scheduler,
    ) -> Result<TransmitOutcome, NetError> {
        self.medium.transmit(from, packet, scheduler)
    }

    fn stats(&self) -> ChannelStats {
        self.medium.stats()
    }

    fn disconnect_all(&self) {
        self.medium.clear();
    }
}
