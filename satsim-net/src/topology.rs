//! Topology builder
//!
//! [`Network`] owns every node, device and channel of one simulation and
//! hands out ids. Links are built through typed configurations that are
//! validated before anything is wired.

use crate::channel::{
    Channel, CsmaChannel, CsmaConfig, PointToPointChannel, PointToPointConfig, RelayChannel,
    RelayConfig,
};
use crate::device::NetDevice;
use crate::error::NetError;
use crate::ids::{ChannelId, DeviceId, NodeId};
use crate::node::Node;
use crate::rate::DataRate;
use satsim_core::ids::SEED_DOMAIN_CHANNEL;
use satsim_core::derive_seed;
use std::rc::Rc;
use tracing::{debug, info};

/// A channel together with the devices created to attach to it, in the
/// order of the nodes passed to the builder.
#[derive(Debug, Clone)]
pub struct Link {
    pub channel: Rc<dyn Channel>,
    pub devices: Vec<Rc<NetDevice>>,
}

impl Link {
    /// The device created for `node`.
    pub fn device_on(&self, node: NodeId) -> Option<&Rc<NetDevice>> {
        self.devices.iter().find(|d| d.node_id() == node)
    }
}

#[derive(Debug, Default)]
pub struct Network {
    seed: u64,
    nodes: Vec<Rc<Node>>,
    devices: Vec<Rc<NetDevice>>,
    channels: Vec<Rc<dyn Channel>>,
}

impl Network {
    /// Creates an empty network. Channels without an explicit seed derive
    /// their loss stream from `seed` and their id.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn add_node(&mut self, name: impl Into<String>) -> Rc<Node> {
        let node = Node::new(NodeId(self.nodes.len() as u32), name);
        debug!(node = %node.id(), name = node.name(), "Node created");
        self.nodes.push(Rc::clone(&node));
        node
    }

    /// Creates a detached device on `node`.
    pub fn add_device(
        &mut self,
        node: &Rc<Node>,
        data_rate: DataRate,
    ) -> Result<Rc<NetDevice>, NetError> {
        self.node(node.id())?;
        let device = NetDevice::new(DeviceId(self.devices.len() as u32), node, data_rate);
        node.add_device(Rc::clone(&device))?;
        self.devices.push(Rc::clone(&device));
        Ok(device)
    }

    fn next_channel(&self) -> (ChannelId, u64) {
        let id = ChannelId(self.channels.len() as u32);
        (id, derive_seed(self.seed, SEED_DOMAIN_CHANNEL, u64::from(id.0)))
    }

    /// Connects two nodes with a point-to-point link.
    pub fn point_to_point(
        &mut self,
        a: &Rc<Node>,
        b: &Rc<Node>,
        config: &PointToPointConfig,
    ) -> Result<Link, NetError> {
        if a.id() == b.id() {
            return Err(NetError::InvalidConfig(format!(
                "point-to-point link needs two distinct nodes, got {} twice",
                a.id()
            )));
        }
        let (id, seed) = self.next_channel();
        let channel: Rc<dyn Channel> = Rc::new(PointToPointChannel::new(id, config, seed)?);
        self.wire(channel, &[a, b], config.data_rate)
    }

    /// Connects any number of nodes to a shared bus.
    pub fn csma(&mut self, nodes: &[&Rc<Node>], config: &CsmaConfig) -> Result<Link, NetError> {
        let (id, seed) = self.next_channel();
        let channel: Rc<dyn Channel> = Rc::new(CsmaChannel::new(id, config, seed)?);
        self.wire(channel, nodes, config.data_rate)
    }

    /// Connects nodes through a long-delay relay channel.
    pub fn relay(&mut self, nodes: &[&Rc<Node>], config: &RelayConfig) -> Result<Link, NetError> {
        let (id, seed) = self.next_channel();
        let channel: Rc<dyn Channel> = Rc::new(RelayChannel::new(id, config, seed)?);
        self.wire(channel, nodes, config.data_rate)
    }

    fn wire(
        &mut self,
        channel: Rc<dyn Channel>,
        nodes: &[&Rc<Node>],
        data_rate: DataRate,
    ) -> Result<Link, NetError> {
        if nodes.len() < 2 {
            return Err(NetError::InvalidConfig(format!(
                "{} channel needs at least two nodes, got {}",
                channel.kind(),
                nodes.len()
            )));
        }
        for node in nodes {
            self.node(node.id())?;
        }
        let mut devices = Vec::with_capacity(nodes.len());
        for node in nodes {
            let device = self.add_device(node, data_rate)?;
            device.attach(Rc::clone(&channel))?;
            devices.push(device);
        }
        info!(
            channel = %channel.id(),
            kind = %channel.kind(),
            endpoints = devices.len(),
            %data_rate,
            "Link created"
        );
        self.channels.push(Rc::clone(&channel));
        Ok(Link { channel, devices })
    }

    /// Adds a static route on `node` towards `destination` through `device`.
    pub fn add_route(
        &self,
        node: NodeId,
        destination: NodeId,
        device: DeviceId,
    ) -> Result<(), NetError> {
        self.node(destination)?;
        self.node(node)?.add_route(destination, device)
    }

    pub fn set_default_route(&self, node: NodeId, device: DeviceId) -> Result<(), NetError> {
        self.node(node)?.set_default_route(device)
    }

    pub fn node(&self, id: NodeId) -> Result<Rc<Node>, NetError> {
        self.nodes
            .get(id.0 as usize)
            .filter(|n| n.id() == id)
            .cloned()
            .ok_or(NetError::UnknownNode(id))
    }

    pub fn node_by_name(&self, name: &str) -> Option<Rc<Node>> {
        self.nodes.iter().find(|n| n.name() == name).cloned()
    }

    pub fn device(&self, id: DeviceId) -> Result<Rc<NetDevice>, NetError> {
        self.devices
            .get(id.0 as usize)
            .filter(|d| d.id() == id)
            .cloned()
            .ok_or(NetError::UnknownDevice(id))
    }

    pub fn nodes(&self) -> &[Rc<Node>] {
        &self.nodes
    }

    pub fn devices(&self) -> &[Rc<NetDevice>] {
        &self.devices
    }

    pub fn channels(&self) -> &[Rc<dyn Channel>] {
        &self.channels
    }

    /// Detaches every device and forgets the whole topology. Packets still
    /// in flight are dropped when they arrive.
    pub fn teardown(&mut self) {
        for channel in &self.channels {
            channel.disconnect_all();
        }
        for node in &self.nodes {
            node.teardown();
        }
        info!(
            nodes = self.nodes.len(),
            devices = self.devices.len(),
            channels = self.channels.len(),
            "Topology torn down"
        );
        self.channels.clear();
        self.devices.clear();
        self.nodes.clear();
    }
}
