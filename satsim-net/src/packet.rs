//! Immutable packets

use crate::ids::{NodeId, PacketId};
use bytes::Bytes;
use satsim_core::SimTime;
use serde::{Deserialize, Serialize};

/// Metadata carried by every packet. Capture and statistics code inspect
/// only this header, never the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketHeader {
    pub id: PacketId,
    pub source: NodeId,
    pub destination: NodeId,
    pub created_at: SimTime,
    pub size: usize,
}

/// A unit of data moving through the network.
///
/// Packets have no setters: once built they travel unchanged, and cloning one
/// only bumps the reference count of its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    id: PacketId,
    source: NodeId,
    destination: NodeId,
    created_at: SimTime,
    payload: Bytes,
}

impl Packet {
    pub fn new(
        id: PacketId,
        source: NodeId,
        destination: NodeId,
        created_at: SimTime,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            id,
            source,
            destination,
            created_at,
            payload: payload.into(),
        }
    }

    pub fn id(&self) -> PacketId {
        self.id
    }

    pub fn source(&self) -> NodeId {
        self.source
    }

    pub fn destination(&self) -> NodeId {
        self.destination
    }

    pub fn created_at(&self) -> SimTime {
        self.created_at
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }

    pub fn header(&self) -> PacketHeader {
        PacketHeader {
            id: self.id,
            source: self.source,
            destination: self.destination,
            created_at: self.created_at,
            size: self.size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::FlowId;

    #[test]
    fn clones_share_payload() {
        let payload = Bytes::from(vec![7u8; 1024]);
        let packet = Packet::new(
            PacketId::new(FlowId(1), 3),
            NodeId(0),
            NodeId(4),
            SimTime::from_secs(2),
            payload,
        );
        let copy = packet.clone();

        assert_eq!(copy, packet);
        assert_eq!(copy.size(), 1024);
        assert_eq!(copy.payload().as_ptr(), packet.payload().as_ptr());

        let header = packet.header();
        assert_eq!(header.id.to_string(), "flow-1#3");
        assert_eq!(header.destination, NodeId(4));
        assert_eq!(header.created_at, SimTime::from_secs(2));
    }
}
