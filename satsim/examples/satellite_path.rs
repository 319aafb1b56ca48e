//! Runs the ground user to satellite to gateway path and writes
//! `global_capture.pcap` and `results.csv` to the working directory.
//!
//! ```bash
//! cargo run --example satellite_path
//! cargo run --example satellite_path -- scenario.json
//! RUST_LOG=satsim_net=trace cargo run --example satellite_path
//! ```

use satsim::prelude::*;
use satsim::ScenarioError;
use std::path::PathBuf;

fn main() -> Result<(), ScenarioError> {
    satsim::core::init_simulation_logging();

    let mut config = match std::env::args().nth(1) {
        Some(path) => ScenarioConfig::from_json_file(path)?,
        None => ScenarioConfig::default(),
    };
    config
        .output
        .pcap
        .get_or_insert_with(|| PathBuf::from("global_capture.pcap"));
    config
        .output
        .results_csv
        .get_or_insert_with(|| PathBuf::from("results.csv"));

    let report = Scenario::build(config)?.run()?;

    println!("=== Satellite Path ===");
    println!("Events fired:     {}", report.run.events_fired);
    println!("Trace records:    {}", report.records.len());
    println!("Packets sent:     {}", report.summary.packets_sent);
    println!("Packets received: {}", report.summary.packets_received);
    println!("Packets lost:     {}", report.summary.packets_lost);
    if let Some(delay) = report.summary.delay {
        println!("Delay:            {delay}");
    }
    println!("Goodput:          {:.3} Mbps", report.summary.goodput_bps / 1e6);
    println!("Sink received:    {} packets", report.sink.packets);
    println!(
        "Channel losses:   {}",
        report.counters.total(satsim::net::counters::CHANNEL_LOSSES)
    );

    println!();
    println!("{:>6} {:>12} {:>12} {:>8}", "time", "Mbps", "delay ms", "loss %");
    for row in &report.rows {
        println!(
            "{:>6.1} {:>12.6} {:>12.3} {:>8.2}",
            row.time, row.throughput, row.delay, row.loss
        );
    }
    Ok(())
}
