//! [`TraceSink`](satsim_net::TraceSink) implementations that persist the
//! capture while the simulation runs.

pub mod json_lines;
pub mod pcap;

pub use json_lines::JsonLinesSink;
pub use pcap::PcapSink;
