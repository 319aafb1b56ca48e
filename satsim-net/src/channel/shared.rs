use super::{ChannelKind, ChannelStats, LossModel, PropagationDelay, TransmitOutcome};
use crate::counters::{CHANNEL_DELIVERIES, CHANNEL_LOSSES, CHANNEL_TRANSMISSIONS};
use crate::device::NetDevice;
use crate::error::NetError;
use crate::ids::{ChannelId, DeviceId};
use crate::packet::Packet;
use metrics::counter;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use satsim_core::{Scheduler, SimTime};
use std::cell::{Cell, RefCell};
use std::cmp::max;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, trace};

struct Endpoint {
    id: DeviceId,
    device: Weak<NetDevice>,
}

/// State and delivery logic shared by every channel variant.
pub(crate) struct SharedMedium {
    id: ChannelId,
    kind: ChannelKind,
    capacity: Option<usize>,
    propagation: PropagationDelay,
    loss: LossModel,
    endpoints: RefCell<Vec<Endpoint>>,
    rng: RefCell<ChaCha8Rng>,
    /// When each sender finishes serializing its last packet. A sender's
    /// packets leave in FIFO order, so per-destination arrival order follows
    /// transmission order.
    busy_until: RefCell<HashMap<DeviceId, SimTime>>,
    stats: Cell<ChannelStats>,
}

impl fmt::Debug for SharedMedium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedMedium")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("propagation", &self.propagation)
            .field("loss", &self.loss)
            .field("endpoints", &self.endpoint_ids())
            .field("stats", &self.stats.get())
            .finish()
    }
}

impl SharedMedium {
    pub(crate) fn new(
        id: ChannelId,
        kind: ChannelKind,
        capacity: Option<usize>,
        propagation: PropagationDelay,
        loss: LossModel,
        seed: u64,
    ) -> Result<Self, NetError> {
        propagation.validate()?;
        loss.validate()?;
        Ok(Self {
            id,
            kind,
            capacity,
            propagation,
            loss,
            endpoints: RefCell::new(Vec::new()),
            rng: RefCell::new(ChaCha8Rng::seed_from_u64(seed)),
            busy_until: RefCell::new(HashMap::new()),
            stats: Cell::new(ChannelStats::default()),
        })
    }

    pub(crate) fn id(&self) -> ChannelId {
        self.id
    }

    pub(crate) fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub(crate) fn propagation(&self) -> PropagationDelay {
        self.propagation
    }

    pub(crate) fn loss(&self) -> LossModel {
        self.loss
    }

    pub(crate) fn stats(&self) -> ChannelStats {
        self.stats.get()
    }

    pub(crate) fn connect(&self, device: &Rc<NetDevice>) -> Result<(), NetError> {
        let mut endpoints = self.endpoints.borrow_mut();
        endpoints.retain(|e| e.device.strong_count() > 0);
        if endpoints.iter().any(|e| e.id == device.id()) {
            return Err(NetError::InvalidConfig(format!(
                "device {} is already connected to channel {}",
                device.id(),
                self.id
            )));
        }
        if let Some(capacity) = self.capacity {
            if endpoints.len() >= capacity {
                return Err(NetError::ChannelFull {
                    channel: self.id,
                    capacity,
                });
            }
        }
        endpoints.push(Endpoint {
            id: device.id(),
            device: Rc::downgrade(device),
        });
        debug!(channel = %self.id, kind = %self.kind, device = %device.id(), "Device connected");
        Ok(())
    }

    pub(crate) fn disconnect(&self, device: DeviceId) -> bool {
        let mut endpoints = self.endpoints.borrow_mut();
        let before = endpoints.len();
        endpoints.retain(|e| e.id != device);
        self.busy_until.borrow_mut().remove(&device);
        before != endpoints.len()
    }

    pub(crate) fn endpoint_ids(&self) -> Vec<DeviceId> {
        self.endpoints
            .borrow()
            .iter()
            .filter(|e| e.device.strong_count() > 0)
            .map(|e| e.id)
            .collect()
    }

    pub(crate) fn peer_count(&self, device: DeviceId) -> usize {
        self.endpoints
            .borrow()
            .iter()
            .filter(|e| e.id != device && e.device.strong_count() > 0)
            .count()
    }

    pub(crate) fn transmit(
        &self,
        from: &NetDevice,
        packet: &Packet,
        scheduler: &mut Scheduler,
    ) -> Result<TransmitOutcome, NetError> {
        let peers: Vec<(DeviceId, Weak<NetDevice>)> = self
            .endpoints
            .borrow()
            .iter()
            .filter(|e| e.id != from.id() && e.device.strong_count() > 0)
            .map(|e| (e.id, Weak::clone(&e.device)))
            .collect();
        if peers.is_empty() {
            return Err(NetError::DisconnectedChannel { channel: self.id });
        }

        let now = scheduler.time();
        let tx_end = {
            let mut busy = self.busy_until.borrow_mut();
            let start = max(now, busy.get(&from.id()).copied().unwrap_or(now));
            let end = start + from.data_rate().transmission_time(packet.size());
            busy.insert(from.id(), end);
            end
        };
        let arrival = tx_end + self.propagation.delay();

        let mut outcome = TransmitOutcome {
            delivered: 0,
            lost: 0,
        };
        for (peer_id, peer) in peers {
            if self.loss.is_lost(&mut *self.rng.borrow_mut()) {
                outcome.lost += 1;
                trace!(
                    channel = %self.id,
                    packet = %packet.id(),
                    from = %from.id(),
                    to = %peer_id,
                    "Packet lost on channel"
                );
                continue;
            }
            outcome.delivered += 1;
            let delivered = packet.clone();
            scheduler.schedule(arrival.saturating_sub(now), move |s: &mut Scheduler| {
                if let Some(device) = peer.upgrade() {
                    device.receive(delivered, s);
                }
            });
            trace!(
                channel = %self.id,
                packet = %packet.id(),
                from = %from.id(),
                to = %peer_id,
                arrival = %arrival,
                "Delivery scheduled"
            );
        }

        let mut stats = self.stats.get();
        stats.transmissions += 1;
        stats.deliveries += outcome.delivered as u64;
        stats.losses += outcome.lost as u64;
        stats.bytes += packet.size() as u64;
        self.stats.set(stats);

        let (channel, kind) = (self.id.to_string(), self.kind.to_string());
        counter!(CHANNEL_TRANSMISSIONS, "channel" => channel.clone(), "kind" => kind.clone())
            .increment(1);
        counter!(CHANNEL_DELIVERIES, "channel" => channel.clone(), "kind" => kind.clone())
            .increment(outcome.delivered as u64);
        counter!(CHANNEL_LOSSES, "channel" => channel, "kind" => kind)
            .increment(outcome.lost as u64);
        Ok(outcome)
    }

    /// Drops every endpoint. Used by topology teardown.
    pub(crate) fn clear(&self) {
        self.endpoints.borrow_mut().clear();
        self.busy_until.borrow_mut().clear();
    }
}
