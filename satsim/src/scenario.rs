//! The ground user to satellite to gateway scenario
//!
//! ```text
//! EndUser1 --csma-- UT --relay-- Satellite --relay-- GW --p2p-- EndUser2
//! ```
//!
//! An on/off client on EndUser1 sends to a sink on EndUser2. Every device is
//! attached to one global capture, which can be streamed to a pcap file and
//! is summarized into per-interval result rows when the run ends.

use satsim_core::logging::simulation_span;
use satsim_core::{DurationDistribution, RunSummary, SimError, SimTime, Simulation};
use satsim_metrics::{
    export_results_csv, export_results_json, export_summary_json, with_counter_recorder,
    CounterSet, FlowMonitor, FlowSummary, JsonLinesSink, MetricsError, PcapSink, ResultRow,
};
use satsim_net::{
    install_application, CsmaConfig, DataRate, DeviceId, FlowId, Link, NetError, Network, Node,
    NodeId, OnOffApplication, OnOffConfig, OnOffStats, PacketSink, PointToPointConfig,
    PropagationDelay, RelayConfig, SinkConfig, SinkStats, TraceCapture, TraceRecord,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::{Arc, Mutex, PoisonError};
use std::{fs, io};
use thiserror::Error;
use tracing::{debug, info};

/// Flow id carried by the client's packets.
pub const CLIENT_FLOW: FlowId = FlowId(1);

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Sim(#[from] SimError),

    #[error(transparent)]
    Net(#[from] NetError),

    #[error(transparent)]
    Metrics(#[from] MetricsError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid scenario file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The on/off client, minus the addressing the scenario fills in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficConfig {
    pub data_rate: DataRate,
    pub packet_size: usize,
    pub on_time: DurationDistribution,
    pub off_time: DurationDistribution,
    /// Zero means no limit.
    pub max_bytes: u64,
    pub start: SimTime,
    pub stop: SimTime,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            data_rate: DataRate::mbps(1),
            packet_size: 1024,
            on_time: DurationDistribution::Constant { secs: 1.0 },
            off_time: DurationDistribution::Constant { secs: 0.0 },
            max_bytes: 0,
            start: SimTime::from_secs(2),
            stop: SimTime::from_secs(20),
        }
    }
}

/// Files written by a run. Every entry is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub pcap: Option<PathBuf>,
    pub trace_json: Option<PathBuf>,
    pub results_csv: Option<PathBuf>,
    pub results_json: Option<PathBuf>,
    pub summary_json: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Seed of every random stream in the run.
    pub seed: u64,
    /// Events due after this time never fire.
    pub horizon: SimTime,
    /// Width of the buckets in the result rows. At most
    /// [`satsim_metrics::MAX_ROWS`] buckets may fit before the horizon.
    pub report_interval: SimTime,
    /// EndUser1 to UT.
    pub access: CsmaConfig,
    /// UT to Satellite.
    pub uplink: RelayConfig,
    /// Satellite to GW.
    pub feeder: RelayConfig,
    /// GW to EndUser2.
    pub terrestrial: PointToPointConfig,
    pub traffic: TrafficConfig,
    pub sink: SinkConfig,
    pub output: OutputConfig,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        let satellite_hop =
            RelayConfig::new(DataRate::mbps(10), PropagationDelay::fixed(SimTime::from_millis(250)))
                .with_max_delay(SimTime::from_millis(500));
        Self {
            seed: 1,
            horizon: SimTime::from_secs(21),
            report_interval: SimTime::from_secs(1),
            access: CsmaConfig::new(DataRate::mbps(100), SimTime::from_millis(1)),
            uplink: satellite_hop,
            feeder: satellite_hop,
            terrestrial: PointToPointConfig::new(DataRate::gbps(1), SimTime::from_micros(100)),
            traffic: TrafficConfig::default(),
            sink: SinkConfig::new(SimTime::from_secs(1), SimTime::from_secs(20)),
            output: OutputConfig::default(),
        }
    }
}

impl ScenarioConfig {
    /// Parses a scenario from JSON. Missing fields take their default values.
    pub fn from_json_str(text: &str) -> Result<Self, ScenarioError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let text = fs::read_to_string(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "Loaded scenario file");
        Self::from_json_str(&text)
    }
}

/// Ids of the five nodes of the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioNodes {
    pub end_user1: NodeId,
    pub ut: NodeId,
    pub satellite: NodeId,
    pub gw: NodeId,
    pub end_user2: NodeId,
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub run: RunSummary,
    pub records: Vec<TraceRecord>,
    pub summary: FlowSummary,
    pub rows: Vec<ResultRow>,
    pub client: OnOffStats,
    pub sink: SinkStats,
    /// Device and channel traffic counters emitted during the run.
    pub counters: CounterSet,
}

/// A wired, ready-to-run scenario.
pub struct Scenario {
    config: ScenarioConfig,
    simulation: Simulation,
    network: Network,
    capture: TraceCapture,
    nodes: ScenarioNodes,
    client: Rc<OnOffApplication>,
    sink: Rc<PacketSink>,
}

impl Scenario {
    /// Builds the topology, installs both applications and opens the
    /// configured capture files.
    pub fn build(config: ScenarioConfig) -> Result<Self, ScenarioError> {
        let _span = simulation_span("scenario").entered();
        let mut simulation = Simulation::with_seed(config.seed);
        let mut network = Network::new(config.seed);

        let end_user1 = network.add_node("EndUser1");
        let ut = network.add_node("UT");
        let satellite = network.add_node("Satellite");
        let gw = network.add_node("GW");
        let end_user2 = network.add_node("EndUser2");

        let access = network.csma(&[&end_user1, &ut], &config.access)?;
        let uplink = network.relay(&[&ut, &satellite], &config.uplink)?;
        let feeder = network.relay(&[&satellite, &gw], &config.feeder)?;
        let terrestrial = network.point_to_point(&gw, &end_user2, &config.terrestrial)?;

        // Towards EndUser2.
        end_user1.set_default_route(port(&access, &end_user1)?)?;
        ut.add_route(end_user2.id(), port(&uplink, &ut)?)?;
        satellite.add_route(end_user2.id(), port(&feeder, &satellite)?)?;
        gw.add_route(end_user2.id(), port(&terrestrial, &gw)?)?;
        // Back towards EndUser1.
        end_user2.set_default_route(port(&terrestrial, &end_user2)?)?;
        gw.add_route(end_user1.id(), port(&feeder, &gw)?)?;
        satellite.add_route(end_user1.id(), port(&uplink, &satellite)?)?;
        ut.add_route(end_user1.id(), port(&access, &ut)?)?;

        let capture = TraceCapture::new();
        let attached = capture.attach_all(network.devices());
        if let Some(path) = &config.output.pcap {
            capture.add_sink(Box::new(PcapSink::create(path)?));
        }
        if let Some(path) = &config.output.trace_json {
            capture.add_sink(Box::new(JsonLinesSink::create(path)?));
        }

        let traffic = &config.traffic;
        let client_config = OnOffConfig::new(
            end_user2.id(),
            traffic.data_rate,
            traffic.start,
            traffic.stop,
        )
        .with_packet_size(traffic.packet_size)
        .with_periods(traffic.on_time, traffic.off_time)
        .with_max_bytes(traffic.max_bytes)
        .with_flow(CLIENT_FLOW);
        let client_device = network.device(port(&access, &end_user1)?)?;
        let client =
            OnOffApplication::new("client", &client_device, client_config, network.seed())?;
        let sink = PacketSink::install("sink", &end_user2, config.sink)?;
        install_application(&client, simulation.scheduler_mut())?;
        install_application(&sink, simulation.scheduler_mut())?;

        info!(
            nodes = network.nodes().len(),
            channels = network.channels().len(),
            traced_devices = attached,
            "Scenario built"
        );

        let nodes = ScenarioNodes {
            end_user1: end_user1.id(),
            ut: ut.id(),
            satellite: satellite.id(),
            gw: gw.id(),
            end_user2: end_user2.id(),
        };
        Ok(Self {
            config,
            simulation,
            network,
            capture,
            nodes,
            client,
            sink,
        })
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn nodes(&self) -> ScenarioNodes {
        self.nodes
    }

    pub fn capture(&self) -> &TraceCapture {
        &self.capture
    }

    /// Runs to the horizon, closes the capture files, computes statistics
    /// and writes the configured result files.
    pub fn run(mut self) -> Result<ScenarioReport, ScenarioError> {
        let _span = simulation_span("scenario").entered();
        let counters = Arc::new(Mutex::new(CounterSet::default()));
        let horizon = self.config.horizon;
        let run = with_counter_recorder(&counters, || self.simulation.run(horizon));
        self.capture.finish()?;

        let records = self.capture.records();
        let mut monitor = FlowMonitor::from_records(&records, self.config.report_interval)?;
        monitor.extend_to(self.config.horizon);
        let summary = monitor.summary_for(CLIENT_FLOW);
        let rows = monitor.rows()?;

        let output = &self.config.output;
        if let Some(path) = &output.results_csv {
            export_results_csv(&rows, path)?;
        }
        if let Some(path) = &output.results_json {
            export_results_json(&rows, path, true)?;
        }
        if let Some(path) = &output.summary_json {
            export_summary_json(&summary, path)?;
        }

        info!(
            sent = summary.packets_sent,
            received = summary.packets_received,
            lost = summary.packets_lost,
            mean_delay_ms = summary.mean_delay().map(|d| d.as_millis_f64()),
            p99_delay_ms = summary.delay.map(|d| d.p99.as_millis_f64()),
            "Scenario finished"
        );
        let counters = counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let report = ScenarioReport {
            run,
            records,
            summary,
            rows,
            client: self.client.stats(),
            sink: self.sink.stats(),
            counters,
        };
        self.network.teardown();
        Ok(report)
    }
}

/// Device `node` uses on `link`.
fn port(link: &Link, node: &Rc<Node>) -> Result<DeviceId, NetError> {
    link.device_on(node.id())
        .map(|device| device.id())
        .ok_or(NetError::UnknownNode(node.id()))
}
