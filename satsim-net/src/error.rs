//! Error types for the network layer

use crate::ids::{ChannelId, DeviceId, NodeId};
use satsim_core::{SimError, SimTime};
use thiserror::Error;

/// Errors raised while building or driving a network
#[derive(Debug, Error)]
pub enum NetError {
    #[error("Channel {channel} has no peer to deliver to")]
    DisconnectedChannel { channel: ChannelId },

    #[error("Device {device} is not attached to a channel")]
    NotAttached { device: DeviceId },

    #[error("Channel {channel} is full (capacity: {capacity})")]
    ChannelFull { channel: ChannelId, capacity: usize },

    #[error("Invalid network configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid application schedule: start {start} is after stop {stop}")]
    InvalidSchedule { start: SimTime, stop: SimTime },

    #[error("Node {node} has no route to {destination}")]
    NoRoute { node: NodeId, destination: NodeId },

    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("Unknown device: {0}")]
    UnknownDevice(DeviceId),

    #[error(transparent)]
    Sim(#[from] SimError),
}
