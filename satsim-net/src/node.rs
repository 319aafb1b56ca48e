//! Nodes: addressable owners of devices
//!
//! A node delivers packets addressed to it to the applications bound on it
//! and forwards everything else along its static routes.

use crate::device::NetDevice;
use crate::error::NetError;
use crate::ids::{DeviceId, NodeId};
use crate::packet::Packet;
use satsim_core::logging::device_span;
use satsim_core::Scheduler;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// Consumer of packets addressed to a node.
pub trait PacketReceiver {
    fn receive(&self, packet: &Packet, scheduler: &mut Scheduler);
}

/// Per-node counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NodeStats {
    /// Packets addressed to this node and handed to its receivers.
    pub delivered: u64,
    /// Packets re-sent towards another node.
    pub forwarded: u64,
    /// Packets with no usable route.
    pub unroutable: u64,
    /// Forwarding attempts the egress device refused.
    pub send_failures: u64,
}

pub struct Node {
    id: NodeId,
    name: String,
    devices: RefCell<Vec<Rc<NetDevice>>>,
    routes: RefCell<HashMap<NodeId, DeviceId>>,
    default_route: Cell<Option<DeviceId>>,
    receivers: RefCell<Vec<Rc<dyn PacketReceiver>>>,
    stats: Cell<NodeStats>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("devices", &self.device_ids())
            .field("routes", &self.routes.borrow())
            .field("default_route", &self.default_route.get())
            .field("receivers", &self.receivers.borrow().len())
            .field("stats", &self.stats.get())
            .finish()
    }
}

impl Node {
    pub fn new(id: NodeId, name: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            id,
            name: name.into(),
            devices: RefCell::new(Vec::new()),
            routes: RefCell::new(HashMap::new()),
            default_route: Cell::new(None),
            receivers: RefCell::new(Vec::new()),
            stats: Cell::new(NodeStats::default()),
        })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> NodeStats {
        self.stats.get()
    }

    /// Registers a device created for this node.
    pub fn add_device(&self, device: Rc<NetDevice>) -> Result<(), NetError> {
        if device.node_id() != self.id {
            return Err(NetError::InvalidConfig(format!(
                "device {} belongs to {}, not {}",
                device.id(),
                device.node_id(),
                self.id
            )));
        }
        self.devices.borrow_mut().push(device);
        Ok(())
    }

    pub fn devices(&self) -> Vec<Rc<NetDevice>> {
        self.devices.borrow().clone()
    }

    pub fn device_ids(&self) -> Vec<DeviceId> {
        self.devices.borrow().iter().map(|d| d.id()).collect()
    }

    pub fn device(&self, id: DeviceId) -> Option<Rc<NetDevice>> {
        self.devices.borrow().iter().find(|d| d.id() == id).cloned()
    }

    /// Routes packets for `destination` out of `device`, which must belong to
    /// this node.
    pub fn add_route(&self, destination: NodeId, device: DeviceId) -> Result<(), NetError> {
        self.own_device(device)?;
        self.routes.borrow_mut().insert(destination, device);
        debug!(node = %self.id, %destination, %device, "Route added");
        Ok(())
    }

    /// Routes packets with no specific route out of `device`.
    pub fn set_default_route(&self, device: DeviceId) -> Result<(), NetError> {
        self.own_device(device)?;
        self.default_route.set(Some(device));
        debug!(node = %self.id, %device, "Default route set");
        Ok(())
    }

    /// The egress device for `destination`, if any.
    pub fn route_for(&self, destination: NodeId) -> Option<DeviceId> {
        self.routes
            .borrow()
            .get(&destination)
            .copied()
            .or(self.default_route.get())
    }

    fn own_device(&self, device: DeviceId) -> Result<Rc<NetDevice>, NetError> {
        self.device(device).ok_or(NetError::UnknownDevice(device))
    }

    /// Binds a receiver for packets addressed to this node. Receivers run in
    /// bind order.
    pub fn bind(&self, receiver: Rc<dyn PacketReceiver>) {
        self.receivers.borrow_mut().push(receiver);
    }

    /// Sends a packet originated on this node along its route.
    pub fn send(&self, packet: Packet, scheduler: &mut Scheduler) -> Result<(), NetError> {
        let destination = packet.destination();
        let device_id = self.route_for(destination).ok_or(NetError::NoRoute {
            node: self.id,
            destination,
        })?;
        let device = self.own_device(device_id)?;
        device.send(packet, scheduler)
    }

    /// Called by a device when `packet` arrives on `ingress`.
    pub(crate) fn receive(&self, packet: Packet, ingress: DeviceId, scheduler: &mut Scheduler) {
        if packet.destination() == self.id {
            self.update_stats(|s| s.delivered += 1);
            trace!(node = %self.id, packet = %packet.id(), "Delivered");
            let receivers: Vec<Rc<dyn PacketReceiver>> = self.receivers.borrow().clone();
            for receiver in receivers {
                receiver.receive(&packet, scheduler);
            }
            return;
        }
        self.forward(packet, ingress, scheduler);
    }

    fn forward(&self, packet: Packet, ingress: DeviceId, scheduler: &mut Scheduler) {
        let _span = device_span(&self.name, &ingress.to_string()).entered();
        let egress = match self.route_for(packet.destination()) {
            Some(egress) if egress != ingress => egress,
            _ => {
                self.update_stats(|s| s.unroutable += 1);
                warn!(
                    node = %self.id,
                    packet = %packet.id(),
                    destination = %packet.destination(),
                    "No route for packet, dropping"
                );
                return;
            }
        };
        let Some(device) = self.device(egress) else {
            self.update_stats(|s| s.unroutable += 1);
            warn!(node = %self.id, device = %egress, "Route points at a missing device");
            return;
        };
        let id = packet.id();
        match device.send(packet, scheduler) {
            Ok(()) => {
                self.update_stats(|s| s.forwarded += 1);
                trace!(node = %self.id, packet = %id, device = %egress, "Forwarded");
            }
            Err(e) => {
                self.update_stats(|s| s.send_failures += 1);
                warn!(node = %self.id, packet = %id, error = %e, "Forwarding failed");
            }
        }
    }

    fn update_stats(&self, f: impl FnOnce(&mut NodeStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }

    /// Releases devices, routes and receivers.
    pub(crate) fn teardown(&self) {
        for device in self.devices.borrow_mut().drain(..) {
            device.detach();
        }
        self.routes.borrow_mut().clear();
        self.default_route.set(None);
        self.receivers.borrow_mut().clear();
    }
}
