//! Channels: the media devices transmit through
//!
//! Every channel computes, for each transmission, the arrival time at each
//! peer (`serialization + propagation`) and an independent loss decision per
//! peer, then schedules a receive on every peer that was not lost. The three
//! variants differ only in how many endpoints they accept and how their
//! propagation delay is configured.

mod shared;
pub mod csma;
pub mod loss;
pub mod point_to_point;
pub mod propagation;
pub mod relay;

pub use csma::{CsmaChannel, CsmaConfig};
pub use loss::{free_space_path_loss_db, LossModel};
pub use point_to_point::{PointToPointChannel, PointToPointConfig};
pub use propagation::{PropagationDelay, SPEED_OF_LIGHT};
pub use relay::{RelayChannel, RelayConfig};

use crate::device::NetDevice;
use crate::error::NetError;
use crate::ids::{ChannelId, DeviceId};
use crate::packet::Packet;
use satsim_core::Scheduler;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// Channel variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    PointToPoint,
    Csma,
    Relay,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelKind::PointToPoint => "point-to-point",
            ChannelKind::Csma => "csma",
            ChannelKind::Relay => "relay",
        };
        f.write_str(name)
    }
}

/// Counters kept by every channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelStats {
    /// Calls to [`Channel::transmit`] that reached at least one peer decision.
    pub transmissions: u64,
    /// Receive events scheduled, one per peer not lost.
    pub deliveries: u64,
    /// Per-peer loss decisions that dropped the packet.
    pub losses: u64,
    /// Bytes put on the medium.
    pub bytes: u64,
}

/// What happened to one transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransmitOutcome {
    pub delivered: usize,
    pub lost: usize,
}

/// A medium connecting device endpoints.
///
/// Channels hold their endpoints weakly; devices hold their channel strongly.
/// Dropping the [`crate::Network`] therefore releases the whole topology.
pub trait Channel: fmt::Debug {
    fn id(&self) -> ChannelId;

    fn kind(&self) -> ChannelKind;

    /// Registers `device` as an endpoint. Called by [`NetDevice::attach`].
    fn connect(&self, device: &Rc<NetDevice>) -> Result<(), NetError>;

    /// Removes an endpoint. Returns `false` if it was not connected.
    fn disconnect(&self, device: DeviceId) -> bool;

    /// Live endpoints in attach order.
    fn endpoints(&self) -> Vec<DeviceId>;

    /// Number of live endpoints other than `device`.
    fn peer_count(&self, device: DeviceId) -> usize;

    /// Puts `packet` on the medium from `from`, scheduling its arrival at each
    /// peer. Fails with [`NetError::DisconnectedChannel`] if there is no peer.
    fn transmit(
        &self,
        from: &NetDevice,
        packet: &Packet,
        scheduler: &mut Scheduler,
    ) -> Result<TransmitOutcome, NetError>;

    fn stats(&self) -> ChannelStats;

    /// Drops every endpoint.
    fn disconnect_all(&self);
}
