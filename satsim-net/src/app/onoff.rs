//! On/off traffic generator
//!
//! While ON, packets of `packet_size` bytes leave at `data_rate`, i.e. one
//! every `packet_size * 8 / data_rate`. ON and OFF period lengths are drawn
//! from their distributions at the start of each period. The pacing carries
//! over period boundaries, so with a zero OFF time the output is a constant
//! bit rate stream.

use super::{AppSchedule, AppState, Application};
use crate::device::NetDevice;
use crate::error::NetError;
use crate::ids::{FlowId, NodeId, PacketId};
use crate::packet::Packet;
use crate::rate::DataRate;
use bytes::Bytes;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use satsim_core::ids::SEED_DOMAIN_APPLICATION;
use satsim_core::{derive_seed, DurationDistribution, EventHandle, Scheduler, SimTime};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::cmp::max;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, info, trace, warn};

fn default_packet_size() -> usize {
    512
}

fn default_period() -> DurationDistribution {
    DurationDistribution::Constant { secs: 1.0 }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnOffConfig {
    /// Node the packets are addressed to.
    pub destination: NodeId,
    /// Sending rate while ON.
    pub data_rate: DataRate,
    #[serde(default = "default_packet_size")]
    pub packet_size: usize,
    #[serde(default = "default_period")]
    pub on_time: DurationDistribution,
    #[serde(default = "default_period")]
    pub off_time: DurationDistribution,
    /// Total bytes to send; zero means no limit.
    #[serde(default)]
    pub max_bytes: u64,
    pub start: SimTime,
    pub stop: SimTime,
    #[serde(default)]
    pub flow: FlowId,
    /// Seed for period sampling; derived from the run seed and the flow id
    /// when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl OnOffConfig {
    pub fn new(destination: NodeId, data_rate: DataRate, start: SimTime, stop: SimTime) -> Self {
        Self {
            destination,
            data_rate,
            packet_size: default_packet_size(),
            on_time: default_period(),
            off_time: default_period(),
            max_bytes: 0,
            start,
            stop,
            flow: FlowId::default(),
            seed: None,
        }
    }

    pub fn with_packet_size(mut self, packet_size: usize) -> Self {
        self.packet_size = packet_size;
        self
    }

    pub fn with_periods(mut self, on_time: DurationDistribution, off_time: DurationDistribution) -> Self {
        self.on_time = on_time;
        self.off_time = off_time;
        self
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn with_flow(mut self, flow: FlowId) -> Self {
        self.flow = flow;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<AppSchedule, NetError> {
        let schedule = AppSchedule::new(self.start, self.stop)?;
        if self.packet_size == 0 {
            return Err(NetError::InvalidConfig(
                "on/off packet size must be positive".to_string(),
            ));
        }
        if self.data_rate.is_unlimited() {
            return Err(NetError::InvalidConfig(
                "on/off data rate must be finite".to_string(),
            ));
        }
        self.on_time.validate()?;
        self.off_time.validate()?;
        if self.on_time.is_always_zero() && self.off_time.is_always_zero() {
            return Err(NetError::InvalidConfig(
                "on and off times cannot both be zero".to_string(),
            ));
        }
        Ok(schedule)
    }

    /// Gap between consecutive packets while ON.
    pub fn interval(&self) -> SimTime {
        self.data_rate.transmission_time(self.packet_size)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OnOffStats {
    pub packets_sent: u64,
    pub bytes_sent: u64,
    /// Sends the device refused.
    pub send_failures: u64,
    pub on_periods: u64,
}

struct Runtime {
    state: AppState,
    rng: ChaCha8Rng,
    next_seq: u64,
    last_tx: Option<SimTime>,
    period_end: SimTime,
    pending: Option<EventHandle>,
    stats: OnOffStats,
}

pub struct OnOffApplication {
    name: String,
    device: Rc<NetDevice>,
    config: OnOffConfig,
    schedule: AppSchedule,
    interval: SimTime,
    payload: Bytes,
    runtime: RefCell<Runtime>,
}

impl fmt::Debug for OnOffApplication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let runtime = self.runtime.borrow();
        f.debug_struct("OnOffApplication")
            .field("name", &self.name)
            .field("device", &self.device.id())
            .field("config", &self.config)
            .field("state", &runtime.state)
            .field("stats", &runtime.stats)
            .finish()
    }
}

impl OnOffApplication {
    /// Creates a generator that sends through `device`. Fails on an invalid
    /// configuration, including a start time after the stop time.
    ///
    /// Without an explicit `config.seed`, period sampling is seeded from
    /// `run_seed` and the flow id, so runs with different seeds draw
    /// different ON/OFF schedules.
    pub fn new(
        name: impl Into<String>,
        device: &Rc<NetDevice>,
        config: OnOffConfig,
        run_seed: u64,
    ) -> Result<Rc<Self>, NetError> {
        let schedule = config.validate()?;
        let seed = config.seed.unwrap_or_else(|| {
            derive_seed(run_seed, SEED_DOMAIN_APPLICATION, u64::from(config.flow.0))
        });
        Ok(Rc::new(Self {
            name: name.into(),
            device: Rc::clone(device),
            interval: config.interval(),
            payload: Bytes::from(vec![0u8; config.packet_size]),
            schedule,
            config,
            runtime: RefCell::new(Runtime {
                state: AppState::Idle,
                rng: ChaCha8Rng::seed_from_u64(seed),
                next_seq: 0,
                last_tx: None,
                period_end: SimTime::zero(),
                pending: None,
                stats: OnOffStats::default(),
            }),
        }))
    }

    pub fn config(&self) -> &OnOffConfig {
        &self.config
    }

    pub fn source(&self) -> NodeId {
        self.device.node_id()
    }

    pub fn stats(&self) -> OnOffStats {
        self.runtime.borrow().stats
    }

    fn is_running(&self) -> bool {
        self.runtime.borrow().state == AppState::Running
    }

    fn exhausted(&self) -> bool {
        self.config.max_bytes > 0 && self.runtime.borrow().stats.bytes_sent >= self.config.max_bytes
    }

    fn set_pending(&self, handle: EventHandle) {
        self.runtime.borrow_mut().pending = Some(handle);
    }

    fn begin_on(self: &Rc<Self>, scheduler: &mut Scheduler) {
        if !self.is_running() {
            return;
        }
        let now = scheduler.time();
        {
            let mut runtime = self.runtime.borrow_mut();
            let on = self.config.on_time.sample(&mut runtime.rng);
            runtime.period_end = now + on;
            runtime.stats.on_periods += 1;
            trace!(app = %self.name, until = %runtime.period_end, "ON period");
        }
        self.send_next(scheduler);
    }

    fn begin_off(self: &Rc<Self>, scheduler: &mut Scheduler) {
        if !self.is_running() {
            return;
        }
        let off = {
            let mut runtime = self.runtime.borrow_mut();
            self.config.off_time.sample(&mut runtime.rng)
        };
        trace!(app = %self.name, duration = %off, "OFF period");
        let app = Rc::clone(self);
        let handle = scheduler.schedule(off, move |s: &mut Scheduler| app.begin_on(s));
        self.set_pending(handle);
    }

    fn send_next(self: &Rc<Self>, scheduler: &mut Scheduler) {
        if !self.is_running() || self.exhausted() {
            return;
        }
        let now = scheduler.time();
        let (period_end, due) = {
            let runtime = self.runtime.borrow();
            let due = runtime
                .last_tx
                .map_or(now, |last| max(now, last + self.interval));
            (runtime.period_end, due)
        };

        if due >= period_end {
            let app = Rc::clone(self);
            let handle = scheduler.schedule(period_end.saturating_sub(now), move |s: &mut Scheduler| {
                app.begin_off(s)
            });
            self.set_pending(handle);
            return;
        }
        if due > now {
            let app = Rc::clone(self);
            let handle =
                scheduler.schedule(due.saturating_sub(now), move |s: &mut Scheduler| app.send_next(s));
            self.set_pending(handle);
            return;
        }

        self.send_packet(scheduler);
        if self.exhausted() {
            info!(app = %self.name, bytes = self.config.max_bytes, "Byte limit reached");
            return;
        }
        let next = now + self.interval;
        let app = Rc::clone(self);
        let handle = if next < period_end {
            scheduler.schedule(self.interval, move |s: &mut Scheduler| app.send_next(s))
        } else {
            scheduler.schedule(period_end.saturating_sub(now), move |s: &mut Scheduler| {
                app.begin_off(s)
            })
        };
        self.set_pending(handle);
    }

    fn send_packet(&self, scheduler: &mut Scheduler) {
        let now = scheduler.time();
        let seq = {
            let mut runtime = self.runtime.borrow_mut();
            runtime.last_tx = Some(now);
            runtime.next_seq += 1;
            runtime.next_seq - 1
        };
        let packet = Packet::new(
            PacketId::new(self.config.flow, seq),
            self.device.node_id(),
            self.config.destination,
            now,
            self.payload.clone(),
        );
        let id = packet.id();
        match self.device.send(packet, scheduler) {
            Ok(()) => {
                let mut runtime = self.runtime.borrow_mut();
                runtime.stats.packets_sent += 1;
                runtime.stats.bytes_sent += self.config.packet_size as u64;
            }
            Err(e) => {
                self.runtime.borrow_mut().stats.send_failures += 1;
                warn!(app = %self.name, packet = %id, error = %e, "Send failed");
            }
        }
    }
}

impl Application for OnOffApplication {
    fn name(&self) -> &str {
        &self.name
    }

    fn schedule(&self) -> AppSchedule {
        self.schedule
    }

    fn state(&self) -> AppState {
        self.runtime.borrow().state
    }

    fn start(self: Rc<Self>, scheduler: &mut Scheduler) {
        {
            let mut runtime = self.runtime.borrow_mut();
            if runtime.state != AppState::Idle {
                return;
            }
            runtime.state = AppState::Running;
        }
        info!(
            app = %self.name,
            time = %scheduler.time(),
            rate = %self.config.data_rate,
            packet_size = self.config.packet_size,
            "On/off application started"
        );
        self.begin_on(scheduler);
    }

    fn stop(&self, scheduler: &mut Scheduler) {
        let (pending, stats) = {
            let mut runtime = self.runtime.borrow_mut();
            if runtime.state == AppState::Stopped {
                return;
            }
            runtime.state = AppState::Stopped;
            (runtime.pending.take(), runtime.stats)
        };
        if let Some(handle) = pending {
            scheduler.cancel(handle);
        }
        info!(
            app = %self.name,
            time = %scheduler.time(),
            packets = stats.packets_sent,
            bytes = stats.bytes_sent,
            "On/off application stopped"
        );
        debug!(app = %self.name, failures = stats.send_failures, "Final send statistics");
    }
}
