//! Statistics and persistence for satsim runs
//!
//! - [`FlowMonitor`] turns a captured trace into per-packet lifetimes,
//!   whole-flow summaries with delay quantiles and per-interval result rows
//!   (`time, throughput, delay, loss`).
//! - [`recorder`] collects the `metrics` counters devices and channels emit
//!   during a run.
//! - [`export`] writes result rows as CSV or JSON.
//! - [`sink`] provides [`satsim_net::TraceSink`] implementations that stream
//!   the capture to a pcap file or to JSON lines while the simulation runs.

pub mod error;
pub mod export;
pub mod flow;
pub mod recorder;
pub mod sink;

pub use error::MetricsError;
pub use export::{
    export_results_csv, export_results_json, export_summary_json, CsvExporter, JsonExporter,
    ResultsExporter,
};
pub use flow::{FlowMonitor, FlowSummary, PacketLifetime, ResultRow, MAX_ROWS};
pub use recorder::{with_counter_recorder, CounterRecorder, CounterSet};
pub use sink::{JsonLinesSink, PcapSink};
