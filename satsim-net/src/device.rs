//! Network devices
//!
//! A [`NetDevice`] belongs to one [`Node`] and attaches to one [`Channel`].
//! It is the only place packets enter and leave the medium, so it is also
//! where the transmit and receive trace points live.

use crate::channel::Channel;
use crate::counters::{
    DEVICE_RX_BYTES, DEVICE_RX_PACKETS, DEVICE_TX_BYTES, DEVICE_TX_ERRORS, DEVICE_TX_PACKETS,
};
use crate::error::NetError;
use crate::ids::{DeviceId, NodeId};
use crate::node::Node;
use crate::packet::Packet;
use crate::rate::DataRate;
use metrics::counter;
use satsim_core::{Scheduler, SimTime};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, trace, warn};

/// Which trace point fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Tx,
    Rx,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Tx => f.write_str("TX"),
            Direction::Rx => f.write_str("RX"),
        }
    }
}

/// Argument passed to trace hooks.
#[derive(Debug, Clone, Copy)]
pub struct DeviceTraceEvent<'a> {
    pub time: SimTime,
    pub node: NodeId,
    pub device: DeviceId,
    pub direction: Direction,
    pub packet: &'a Packet,
}

/// Subscriber to a device trace point.
pub type TraceHook = Rc<dyn Fn(&DeviceTraceEvent<'_>)>;

/// Handle returned by hook registration, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

/// Per-device counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeviceStats {
    pub tx_packets: u64,
    pub tx_bytes: u64,
    pub rx_packets: u64,
    pub rx_bytes: u64,
    /// Packets refused by the channel, plus the packets still queued behind
    /// a refused one.
    pub tx_errors: u64,
}

pub struct NetDevice {
    id: DeviceId,
    node_id: NodeId,
    node: Weak<Node>,
    data_rate: DataRate,
    channel: RefCell<Option<Rc<dyn Channel>>>,
    tx_queue: RefCell<VecDeque<Packet>>,
    draining: Cell<bool>,
    hooks: RefCell<Vec<(HookId, Direction, TraceHook)>>,
    next_hook: Cell<u64>,
    stats: Cell<DeviceStats>,
}

impl fmt::Debug for NetDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetDevice")
            .field("id", &self.id)
            .field("node", &self.node_id)
            .field("data_rate", &self.data_rate)
            .field("channel", &self.channel.borrow().as_ref().map(|c| c.id()))
            .field("queued", &self.tx_queue.borrow().len())
            .field("hooks", &self.hooks.borrow().len())
            .field("stats", &self.stats.get())
            .finish()
    }
}

impl NetDevice {
    /// Creates a detached device owned by `node`. The caller registers it
    /// with the node; [`crate::Network::add_device`] does both.
    pub fn new(id: DeviceId, node: &Rc<Node>, data_rate: DataRate) -> Rc<Self> {
        Rc::new(Self {
            id,
            node_id: node.id(),
            node: Rc::downgrade(node),
            data_rate,
            channel: RefCell::new(None),
            tx_queue: RefCell::new(VecDeque::new()),
            draining: Cell::new(false),
            hooks: RefCell::new(Vec::new()),
            next_hook: Cell::new(0),
            stats: Cell::new(DeviceStats::default()),
        })
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn node(&self) -> Option<Rc<Node>> {
        self.node.upgrade()
    }

    pub fn data_rate(&self) -> DataRate {
        self.data_rate
    }

    pub fn stats(&self) -> DeviceStats {
        self.stats.get()
    }

    pub fn channel(&self) -> Option<Rc<dyn Channel>> {
        self.channel.borrow().clone()
    }

    /// Packets waiting to be handed to the channel.
    pub fn queue_len(&self) -> usize {
        self.tx_queue.borrow().len()
    }

    /// Binds this device to `channel`. A device attaches to exactly one
    /// channel for its lifetime.
    pub fn attach(self: &Rc<Self>, channel: Rc<dyn Channel>) -> Result<(), NetError> {
        if let Some(existing) = self.channel() {
            return Err(NetError::InvalidConfig(format!(
                "device {} is already attached to channel {}",
                self.id,
                existing.id()
            )));
        }
        channel.connect(self)?;
        debug!(device = %self.id, node = %self.node_id, channel = %channel.id(), "Device attached");
        *self.channel.borrow_mut() = Some(channel);
        Ok(())
    }

    /// Unbinds the device from its channel. Returns `false` if it was not
    /// attached.
    pub fn detach(&self) -> bool {
        let Some(channel) = self.channel.borrow_mut().take() else {
            return false;
        };
        channel.disconnect(self.id);
        self.tx_queue.borrow_mut().clear();
        debug!(device = %self.id, channel = %channel.id(), "Device detached");
        true
    }

    /// Subscribes to transmissions. Hooks run in subscription order.
    pub fn on_transmit<F>(&self, hook: F) -> HookId
    where
        F: Fn(&DeviceTraceEvent<'_>) + 'static,
    {
        self.add_hook(Direction::Tx, Rc::new(hook))
    }

    /// Subscribes to receptions. Hooks run in subscription order.
    pub fn on_receive<F>(&self, hook: F) -> HookId
    where
        F: Fn(&DeviceTraceEvent<'_>) + 'static,
    {
        self.add_hook(Direction::Rx, Rc::new(hook))
    }

    pub fn add_hook(&self, direction: Direction, hook: TraceHook) -> HookId {
        let id = HookId(self.next_hook.get());
        self.next_hook.set(id.0 + 1);
        self.hooks.borrow_mut().push((id, direction, hook));
        id
    }

    /// Unsubscribes a hook. Returns `false` for unknown ids.
    pub fn remove_hook(&self, id: HookId) -> bool {
        let mut hooks = self.hooks.borrow_mut();
        let before = hooks.len();
        hooks.retain(|(hook_id, _, _)| *hook_id != id);
        before != hooks.len()
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.borrow().len()
    }

    /// Queues `packet` and hands the queue to the channel at the current
    /// instant. The transmit hooks fire for each packet before this returns.
    ///
    /// Fails with [`NetError::NotAttached`] if the device has no channel and
    /// with [`NetError::DisconnectedChannel`] if the channel has no peer.
    pub fn send(&self, packet: Packet, scheduler: &mut Scheduler) -> Result<(), NetError> {
        let channel = self
            .channel()
            .ok_or(NetError::NotAttached { device: self.id })?;
        if channel.peer_count(self.id) == 0 {
            return Err(NetError::DisconnectedChannel {
                channel: channel.id(),
            });
        }

        self.tx_queue.borrow_mut().push_back(packet);
        // A hook that sends from inside the drain loop only enqueues.
        if self.draining.replace(true) {
            return Ok(());
        }
        let result = self.drain(channel.as_ref(), scheduler);
        self.draining.set(false);
        result
    }

    fn drain(&self, channel: &dyn Channel, scheduler: &mut Scheduler) -> Result<(), NetError> {
        loop {
            let next = self.tx_queue.borrow_mut().pop_front();
            let Some(packet) = next else {
                return Ok(());
            };
            if let Err(e) = channel.transmit(self, &packet, scheduler) {
                // Packets queued behind a refused one would otherwise wait for
                // an unrelated later send.
                let dropped = self.tx_queue.borrow_mut().drain(..).count() as u64;
                let mut stats = self.stats.get();
                stats.tx_errors += 1 + dropped;
                self.stats.set(stats);
                counter!(DEVICE_TX_ERRORS, "device" => self.id.to_string()).increment(1 + dropped);
                warn!(
                    device = %self.id,
                    packet = %packet.id(),
                    dropped,
                    error = %e,
                    "Transmit failed"
                );
                return Err(e);
            }
            let mut stats = self.stats.get();
            stats.tx_packets += 1;
            stats.tx_bytes += packet.size() as u64;
            self.stats.set(stats);
            let label = self.id.to_string();
            counter!(DEVICE_TX_PACKETS, "device" => label.clone()).increment(1);
            counter!(DEVICE_TX_BYTES, "device" => label).increment(packet.size() as u64);
            trace!(device = %self.id, packet = %packet.id(), time = %scheduler.time(), "TX");
            self.fire_hooks(Direction::Tx, &packet, scheduler.time());
        }
    }

    /// Called by the channel when a packet arrives. Fires the receive hooks
    /// and then passes the packet to the owning node.
    pub(crate) fn receive(&self, packet: Packet, scheduler: &mut Scheduler) {
        let mut stats = self.stats.get();
        stats.rx_packets += 1;
        stats.rx_bytes += packet.size() as u64;
        self.stats.set(stats);
        let label = self.id.to_string();
        counter!(DEVICE_RX_PACKETS, "device" => label.clone()).increment(1);
        counter!(DEVICE_RX_BYTES, "device" => label).increment(packet.size() as u64);
        trace!(device = %self.id, packet = %packet.id(), time = %scheduler.time(), "RX");
        self.fire_hooks(Direction::Rx, &packet, scheduler.time());

        if let Some(node) = self.node.upgrade() {
            node.receive(packet, self.id, scheduler);
        }
    }

    fn fire_hooks(&self, direction: Direction, packet: &Packet, time: SimTime) {
        // Snapshot so hooks may subscribe or unsubscribe while running.
        let hooks: Vec<TraceHook> = self
            .hooks
            .borrow()
            .iter()
            .filter(|(_, d, _)| *d == direction)
            .map(|(_, _, hook)| Rc::clone(hook))
            .collect();
        if hooks.is_empty() {
            return;
        }
        let event = DeviceTraceEvent {
            time,
            node: self.node_id,
            device: self.id,
            direction,
            packet,
        };
        for hook in hooks {
            hook(&event);
        }
    }
}
