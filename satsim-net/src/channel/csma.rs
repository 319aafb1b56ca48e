//! Shared-medium bus

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

/// Configuration of a bus, e.g. `100Mbps` with `1ms` delay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CsmaConfig {
    pub data_rate: DataRate,
    pub delay: SimTime,
    #[serde(default)]
    pub loss: LossModel,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl CsmaConfig {
    pub fn new(data_rate: DataRate, delay: SimTime) -> Self {
        Self {
            data_rate,
            delay,
            loss: LossModel::None,
            seed: None,
        }
    }

    pub fn with_loss(mut self, loss: LossModel) -> Self {
        self.loss = loss;
        self
    }

    pub fn validate(&self) -> Result<(), NetError> {
        self.loss.validate()
    }
}

/// A broadcast medium with any number of endpoints.
///
/// Every transmission reaches every other endpoint with the same delay. There
/// is no carrier sense and no collision model; concurrent senders simply
/// overlap.
#[derive(Debug)]
pub struct CsmaChannel {
    medium: SharedMedium,
}

impl CsmaChannel {
    pub fn new(id: ChannelId, config: &CsmaConfig, seed: u64) -> Result<Self, NetError> {
        config.validate()?;
        Ok(Self {
            medium: SharedMedium::new(
                id,
                ChannelKind::Csma,
                None,
                PropagationDelay::fixed(config.delay),
                config.loss,
                config.seed.unwrap_or(seed),
            )?,
        })
    }

    pub fn delay(&self) -> SimTime {
        self.medium.propagation().delay()
    }
}

impl Channel for CsmaChannel {
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
