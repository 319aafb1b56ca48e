//! Network layer of the satsim simulator.
//!
//! Builds on the event queue in `satsim-core` to model packets moving over
//! heterogeneous links:
//!
//! - [`Network`] creates [`Node`]s and wires them with point-to-point, CSMA
//!   bus and long-delay relay channels (see [`channel`]).
//! - [`NetDevice`] queues and transmits packets and exposes transmit and
//!   receive trace hooks.
//! - [`TraceCapture`] merges the hooks of any set of devices into a single
//!   time-ordered record stream.
//! - [`app`] provides the on/off traffic generator and the packet sink, with
//!   start and stop times driven by the event queue.
//! - Devices and channels also report their traffic as `metrics` counters,
//!   named in [`counters`].
//!
//! Everything is single-threaded: topology elements are shared through `Rc`
//! and mutated through `Cell`/`RefCell` from inside event actions.
//!
//! ```rust
//! use satsim_core::{SimTime, Simulation};
//! use satsim_net::{DataRate, FlowId, Network, Packet, PacketId, PointToPointConfig, TraceCapture};
//!
//! let mut sim = Simulation::default();
//! let mut network = Network::new(sim.seed());
//! let a = network.add_node("a");
//! let b = network.add_node("b");
//! let link = network
//!     .point_to_point(&a, &b, &PointToPointConfig::new(DataRate::UNLIMITED, SimTime::from_millis(1)))
//!     .unwrap();
//!
//! let capture = TraceCapture::new();
//! capture.attach_all(network.devices());
//!
//! let device = link.devices[0].clone();
//! sim.schedule(SimTime::from_secs(2), move |s| {
//!     let packet = Packet::new(PacketId::new(FlowId(0), 0), a.id(), b.id(), s.time(), vec![0u8; 1024]);
//!     device.send(packet, s).unwrap();
//! });
//! sim.run(SimTime::from_secs(10));
//!
//! let times: Vec<_> = capture.records().iter().map(|r| r.time).collect();
//! assert_eq!(times, vec![SimTime::from_secs(2), SimTime::from_millis(2001)]);
//! ```

pub mod app;
pub mod channel;
pub mod counters;
pub mod device;
pub mod error;
pub mod ids;
pub mod node;
pub mod packet;
pub mod rate;
pub mod topology;
pub mod trace;

pub use app::{
    install_application, AppSchedule, AppState, Application, OnOffApplication, OnOffConfig,
    OnOffStats, PacketSink, SinkConfig, SinkStats,
};
pub use channel::{
    Channel, ChannelKind, ChannelStats, CsmaChannel, CsmaConfig, LossModel, PointToPointChannel,
    PointToPointConfig, PropagationDelay, RelayChannel, RelayConfig, TransmitOutcome,
};
pub use device::{DeviceStats, DeviceTraceEvent, Direction, HookId, NetDevice, TraceHook};
pub use error::NetError;
pub use ids::{ChannelId, DeviceId, FlowId, NodeId, PacketId};
pub use node::{Node, NodeStats, PacketReceiver};
pub use packet::{Packet, PacketHeader};
pub use rate::DataRate;
pub use topology::{Link, Network};
pub use trace::{TraceCapture, TraceRecord, TraceSink};
