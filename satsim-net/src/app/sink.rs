//! Packet sink

use super::{AppSchedule, AppState, Application};
use crate::error::NetError;
use crate::ids::NodeId;
use crate::node::{Node, PacketReceiver};
use crate::packet::Packet;
use satsim_core::{DelayHistogram, DelayStats, Scheduler, SimTime};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::{info, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkConfig {
    pub start: SimTime,
    pub stop: SimTime,
}

impl SinkConfig {
    pub fn new(start: SimTime, stop: SimTime) -> Self {
        Self { start, stop }
    }
}

/// What the sink consumed while running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SinkStats {
    pub packets: u64,
    pub bytes: u64,
    /// One-way delays (`arrival - created_at`).
    pub delay: Option<DelayStats>,
    pub first_rx: Option<SimTime>,
    pub last_rx: Option<SimTime>,
}

impl SinkStats {
    pub fn mean_delay(&self) -> Option<SimTime> {
        self.delay.map(|d| d.mean)
    }

    pub fn max_delay(&self) -> Option<SimTime> {
        self.delay.map(|d| d.max)
    }

    /// Bits per second between the first and last reception.
    pub fn goodput_bps(&self) -> Option<f64> {
        let (first, last) = (self.first_rx?, self.last_rx?);
        let span = last.saturating_sub(first).as_secs_f64();
        (span > 0.0).then(|| self.bytes as f64 * 8.0 / span)
    }
}

/// Consumes packets addressed to its node and counts them. Packets arriving
/// outside the running window are ignored.
pub struct PacketSink {
    name: String,
    node: NodeId,
    schedule: AppSchedule,
    state: RefCell<(AppState, SinkStats)>,
    delays: RefCell<DelayHistogram>,
}

impl fmt::Debug for PacketSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketSink")
            .field("name", &self.name)
            .field("node", &self.node)
            .field("schedule", &self.schedule)
            .field("state", &self.state.borrow().0)
            .field("stats", &self.stats())
            .finish()
    }
}

impl PacketSink {
    /// Creates a sink and binds it on `node`.
    pub fn install(
        name: impl Into<String>,
        node: &Rc<Node>,
        config: SinkConfig,
    ) -> Result<Rc<Self>, NetError> {
        let sink = Rc::new(Self {
            name: name.into(),
            node: node.id(),
            schedule: AppSchedule::new(config.start, config.stop)?,
            state: RefCell::new((AppState::Idle, SinkStats::default())),
            delays: RefCell::new(DelayHistogram::new()?),
        });
        node.bind(Rc::clone(&sink) as Rc<dyn PacketReceiver>);
        Ok(sink)
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn stats(&self) -> SinkStats {
        SinkStats {
            delay: self.delays.borrow().stats(),
            ..self.state.borrow().1
        }
    }
}

impl PacketReceiver for PacketSink {
    fn receive(&self, packet: &Packet, scheduler: &mut Scheduler) {
        let now = scheduler.time();
        let mut state = self.state.borrow_mut();
        if state.0 != AppState::Running {
            trace!(sink = %self.name, packet = %packet.id(), state = %state.0, "Ignored");
            return;
        }
        let delay = now.saturating_sub(packet.created_at());
        let stats = &mut state.1;
        stats.packets += 1;
        stats.bytes += packet.size() as u64;
        stats.first_rx.get_or_insert(now);
        stats.last_rx = Some(now);
        self.delays.borrow_mut().record(delay);
        trace!(sink = %self.name, packet = %packet.id(), delay = %delay, "Consumed");
    }
}

impl Application for PacketSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn schedule(&self) -> AppSchedule {
        self.schedule
    }

    fn state(&self) -> AppState {
        self.state.borrow().0
    }

    fn start(self: Rc<Self>, scheduler: &mut Scheduler) {
        let mut state = self.state.borrow_mut();
        if state.0 == AppState::Idle {
            state.0 = AppState::Running;
            info!(sink = %self.name, time = %scheduler.time(), "Packet sink started");
        }
    }

    fn stop(&self, scheduler: &mut Scheduler) {
        let mut state = self.state.borrow_mut();
        if state.0 == AppState::Stopped {
            return;
        }
        state.0 = AppState::Stopped;
        info!(
            sink = %self.name,
            time = %scheduler.time(),
            packets = state.1.packets,
            bytes = state.1.bytes,
            "Packet sink stopped"
        );
    }
}
