//! End-to-end runs of the ground user to satellite to gateway path.

use satsim::prelude::*;
use satsim::ScenarioError;
use satsim_metrics::MetricsError;
use satsim_net::counters::{
    CHANNEL_DELIVERIES, CHANNEL_LOSSES, DEVICE_RX_PACKETS, DEVICE_TX_ERRORS, DEVICE_TX_PACKETS,
};
use satsim_net::{Direction, NetError};

/// 1024 bytes over csma (100Mbps + 1ms), two relay hops (10Mbps + 250ms
/// each) and the terrestrial link (1Gbps + 0.1ms).
const ONE_WAY_NANOS: u64 = 1_081_920 + 2 * 250_819_200 + 108_192;

/// Delays are kept to three significant figures.
fn near_one_way(delay: SimTime) -> bool {
    delay.as_nanos().abs_diff(ONE_WAY_NANOS) * 1000 <= ONE_WAY_NANOS
}

fn short(stop_secs: u64) -> ScenarioConfig {
    let mut config = ScenarioConfig::default();
    config.traffic.stop = SimTime::from_secs(stop_secs);
    config.sink.stop = SimTime::from_secs(stop_secs + 1);
    config.horizon = SimTime::from_secs(stop_secs + 1);
    config
}

#[test]
fn default_scenario_delivers_every_packet() {
    let report = Scenario::build(ScenarioConfig::default()).unwrap().run().unwrap();

    assert_eq!(report.client.packets_sent, 2198);
    assert_eq!(report.summary.packets_sent, 2198);
    assert_eq!(report.summary.packets_received, 2198);
    assert_eq!(report.summary.packets_lost, 0);
    let delay = report.summary.delay.unwrap();
    assert_eq!(delay.count, 2198);
    for value in [delay.min, delay.mean, delay.p50, delay.p99, delay.max] {
        assert!(near_one_way(value), "delay {value}");
    }

    // Four hops, each one transmission and one reception per packet.
    let counters = &report.counters;
    assert_eq!(counters.total(DEVICE_TX_PACKETS), 2198 * 4);
    assert_eq!(counters.total(DEVICE_RX_PACKETS), 2198 * 4);
    assert_eq!(counters.total(CHANNEL_DELIVERIES), 2198 * 4);
    assert_eq!(counters.total(CHANNEL_LOSSES), 0);
    assert_eq!(counters.total(DEVICE_TX_ERRORS), 0);

    // Eight trace points per packet: TX and RX on each of four hops.
    assert_eq!(report.records.len(), 2198 * 8);
    assert!(report.records.windows(2).all(|w| w[0].time <= w[1].time));

    // The sink stops at 20s, while packets sent after ~19.497s are still
    // in flight.
    assert_eq!(report.sink.packets, 2136);
    assert_eq!(report.sink.bytes, 2136 * 1024);
    assert_eq!(report.run.events_discarded, 0);
}

#[test]
fn rows_cover_the_horizon() {
    let report = Scenario::build(ScenarioConfig::default()).unwrap().run().unwrap();
    assert_eq!(report.rows.len(), 21);
    assert_eq!(report.rows[0].throughput, 0.0);
    assert_eq!(report.rows[1].throughput, 0.0);

    let expected_ms = ONE_WAY_NANOS as f64 / 1e6;
    for row in &report.rows[3..20] {
        assert!((row.throughput - 1.0).abs() < 0.02, "throughput {}", row.throughput);
        assert!((row.delay - expected_ms).abs() <= expected_ms / 1000.0, "delay {}", row.delay);
        assert_eq!(row.loss, 0.0);
    }
}

#[test]
fn packets_hop_through_every_node() {
    let scenario = Scenario::build(short(3)).unwrap();
    let nodes = scenario.nodes();
    let report = scenario.run().unwrap();

    let first: Vec<_> = report
        .records
        .iter()
        .filter(|r| r.packet.id().seq == 0)
        .map(|r| (r.node, r.direction))
        .collect();
    assert_eq!(
        first,
        vec![
            (nodes.end_user1, Direction::Tx),
            (nodes.ut, Direction::Rx),
            (nodes.ut, Direction::Tx),
            (nodes.satellite, Direction::Rx),
            (nodes.satellite, Direction::Tx),
            (nodes.gw, Direction::Rx),
            (nodes.gw, Direction::Tx),
            (nodes.end_user2, Direction::Rx),
        ]
    );
}

#[test]
fn satellite_loss_is_reproducible() {
    let lossy = || {
        let mut config = short(10);
        config.uplink = config.uplink.with_loss(LossModel::fixed(0.2));
        Scenario::build(config).unwrap().run().unwrap()
    };
    let a = lossy();
    let b = lossy();

    let ratio = a.summary.loss_ratio();
    assert!((ratio - 0.2).abs() < 0.05, "loss ratio {ratio}");
    assert_eq!(a.summary, b.summary);
    assert_eq!(a.records, b.records);
    assert_eq!(a.counters, b.counters);
    // Nothing is in flight at the horizon, so every loss is a channel drop.
    assert_eq!(a.counters.total(CHANNEL_LOSSES), a.summary.packets_lost);

    let mut reseeded = short(10);
    reseeded.seed = 99;
    reseeded.uplink = reseeded.uplink.with_loss(LossModel::fixed(0.2));
    let c = Scenario::build(reseeded).unwrap().run().unwrap();
    assert_ne!(a.records, c.records);
}

#[test]
fn outputs_are_written() {
    let dir = std::env::temp_dir();
    let pcap = dir.join("satsim_scenario_capture.pcap");
    let csv = dir.join("satsim_scenario_results.csv");
    let summary = dir.join("satsim_scenario_summary.json");

    let mut config = short(3);
    config.output.pcap = Some(pcap.clone());
    config.output.results_csv = Some(csv.clone());
    config.output.summary_json = Some(summary.clone());
    let report = Scenario::build(config).unwrap().run().unwrap();

    let bytes = std::fs::read(&pcap).unwrap();
    assert_eq!(bytes.len(), 24 + report.records.len() * (16 + 20 + 1024));

    let text = std::fs::read_to_string(&csv).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "time,throughput,delay,loss");
    assert_eq!(lines.len(), report.rows.len() + 1);

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&summary).unwrap()).unwrap();
    assert_eq!(value["packets_sent"], report.summary.packets_sent);

    for path in [pcap, csv, summary] {
        std::fs::remove_file(path).ok();
    }
}

#[test]
fn partial_json_keeps_defaults() {
    let config = ScenarioConfig::from_json_str(
        r#"{
            "seed": 7,
            "horizon": "6s",
            "traffic": { "data_rate": "2Mbps", "stop": "5s" },
            "uplink": {
                "data_rate": "10Mbps",
                "propagation": { "type": "fixed", "delay": "270ms" }
            }
        }"#,
    )
    .unwrap();

    assert_eq!(config.seed, 7);
    assert_eq!(config.horizon, SimTime::from_secs(6));
    assert_eq!(config.traffic.data_rate, DataRate::mbps(2));
    assert_eq!(config.traffic.packet_size, 1024);
    assert_eq!(config.traffic.start, SimTime::from_secs(2));
    assert_eq!(config.traffic.stop, SimTime::from_secs(5));
    assert_eq!(config.uplink.propagation.delay(), SimTime::from_millis(270));
    assert_eq!(config.feeder, ScenarioConfig::default().feeder);
    assert_eq!(config.report_interval, SimTime::from_secs(1));
}

#[test]
fn invalid_scenarios_are_rejected() {
    let mut backwards = ScenarioConfig::default();
    backwards.traffic.start = SimTime::from_secs(10);
    backwards.traffic.stop = SimTime::from_secs(5);
    assert!(matches!(
        Scenario::build(backwards),
        Err(ScenarioError::Net(NetError::InvalidSchedule { .. }))
    ));

    let mut too_far = ScenarioConfig::default();
    too_far.feeder.propagation = PropagationDelay::fixed(SimTime::from_millis(600));
    assert!(matches!(
        Scenario::build(too_far),
        Err(ScenarioError::Net(NetError::InvalidConfig(_)))
    ));

    let mut no_interval = short(3);
    no_interval.report_interval = SimTime::zero();
    let scenario = Scenario::build(no_interval).unwrap();
    assert!(matches!(scenario.run(), Err(ScenarioError::Metrics(_))));

    // A 1ns interval over a 4s horizon would need four billion rows.
    let mut too_fine = short(3);
    too_fine.report_interval = SimTime::from_nanos(1);
    let scenario = Scenario::build(too_fine).unwrap();
    assert!(matches!(
        scenario.run(),
        Err(ScenarioError::Metrics(MetricsError::InvalidInterval(_)))
    ));

    assert!(matches!(
        ScenarioConfig::from_json_str("{ not json"),
        Err(ScenarioError::Parse(_))
    ));
}
