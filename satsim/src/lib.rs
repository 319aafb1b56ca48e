//! # satsim
//!
//! Deterministic discrete-event simulation of heterogeneous network paths:
//! terrestrial links, shared buses and satellite relay hops, driven by on/off
//! traffic and observed through a global packet capture.
//!
//! The workspace is split into three crates, re-exported here:
//!
//! - [`core`]: clock, event queue, executors, logging setup, delay histograms.
//! - [`net`]: packets, channels, devices, nodes, trace capture, applications.
//! - [`metrics`]: flow statistics, results export, pcap and JSON-lines sinks,
//!   traffic counter collection.
//!
//! [`Scenario`] wires the ground user to satellite to gateway path from a
//! [`ScenarioConfig`] and runs it end to end.
//!
//! ```rust
//! use satsim::prelude::*;
//!
//! let mut config = ScenarioConfig::default();
//! config.traffic.stop = SimTime::from_secs(3);
//! config.sink.stop = SimTime::from_secs(4);
//! config.horizon = SimTime::from_secs(4);
//!
//! let report = Scenario::build(config).unwrap().run().unwrap();
//! assert_eq!(report.summary.packets_lost, 0);
//! ```

pub mod scenario;

pub use satsim_core as core;
pub use satsim_metrics as metrics;
pub use satsim_net as net;

pub use scenario::{
    OutputConfig, Scenario, ScenarioConfig, ScenarioError, ScenarioNodes, ScenarioReport,
    TrafficConfig,
};

pub mod prelude {
    //! Commonly used types and traits

    pub use satsim_core::{
        DelayStats, DurationDistribution, Execute, Executor, RunSummary, Scheduler, SimTime,
        Simulation,
    };

    pub use satsim_net::{
        install_application, Application, CsmaConfig, DataRate, FlowId, LossModel, Network,
        NodeId, OnOffApplication, OnOffConfig, Packet, PacketId, PacketSink, PointToPointConfig,
        PropagationDelay, RelayConfig, SinkConfig, TraceCapture,
    };

    pub use satsim_metrics::{
        CounterSet, FlowMonitor, FlowSummary, JsonLinesSink, PcapSink, ResultRow,
    };

    pub use crate::scenario::{Scenario, ScenarioConfig, ScenarioReport};
}
