//! Application lifecycle: on/off generator and sink.

use satsim_core::{DurationDistribution, SimTime, Simulation};
use satsim_net::{
    install_application, AppState, Application, DataRate, Direction, FlowId, NetError, Network,
    OnOffApplication, OnOffConfig, PacketSink, PointToPointConfig, SinkConfig, TraceCapture,
};
use std::rc::Rc;

struct Bench {
    sim: Simulation,
    network: Network,
    capture: TraceCapture,
}

fn bench(rate: DataRate) -> Bench {
    let mut network = Network::new(3);
    let client = network.add_node("client");
    let server = network.add_node("server");
    network
        .point_to_point(&client, &server, &PointToPointConfig::new(rate, SimTime::from_millis(1)))
        .unwrap();
    let capture = TraceCapture::new();
    capture.attach_all(network.devices());
    Bench {
        sim: Simulation::default(),
        network,
        capture,
    }
}

fn constant(secs: f64) -> DurationDistribution {
    DurationDistribution::Constant { secs }
}

#[test]
fn constant_bit_rate_stops_at_stop_time() {
    let mut bench = bench(DataRate::mbps(100));
    let client = bench.network.devices()[0].clone();
    let server = bench.network.node_by_name("server").unwrap();

    let config = OnOffConfig::new(
        server.id(),
        DataRate::mbps(1),
        SimTime::from_secs(2),
        SimTime::from_secs(20),
    )
    .with_packet_size(1024)
    .with_periods(constant(1.0), constant(0.0))
    .with_flow(FlowId(1));
    let app = OnOffApplication::new("client", &client, config, bench.network.seed()).unwrap();
    let sink = PacketSink::install(
        "server",
        &server,
        SinkConfig::new(SimTime::from_secs(1), SimTime::from_secs(20)),
    )
    .unwrap();
    install_application(&app, bench.sim.scheduler_mut()).unwrap();
    install_application(&sink, bench.sim.scheduler_mut()).unwrap();

    let summary = bench.sim.run(SimTime::from_secs(30));

    // Everything stops cleanly: nothing left for the horizon to discard.
    assert_eq!(summary.events_discarded, 0);
    assert_eq!(app.state(), AppState::Stopped);
    assert_eq!(sink.state(), AppState::Stopped);

    let tx: Vec<SimTime> = bench
        .capture
        .records()
        .iter()
        .filter(|r| r.direction == Direction::Tx)
        .map(|r| r.time)
        .collect();
    assert_eq!(tx.len(), 2198);
    assert_eq!(tx[0], SimTime::from_secs(2));
    assert!(tx.iter().all(|t| *t < SimTime::from_secs(20)));
    for pair in tx.windows(2) {
        assert_eq!(pair[1] - pair[0], std::time::Duration::from_micros(8192));
    }

    let stats = app.stats();
    assert_eq!(stats.packets_sent, 2198);
    assert_eq!(stats.bytes_sent, 2198 * 1024);

    let received = sink.stats();
    assert_eq!(received.packets, 2198);
    // Every packet sees the same delay; the histogram keeps three
    // significant figures.
    let delay = received.delay.unwrap();
    assert_eq!(delay.count, 2198);
    for value in [delay.min, delay.mean, delay.p50, delay.p99, delay.max] {
        assert!(value.as_nanos().abs_diff(1_081_920) <= 1_082, "delay {value}");
    }
    let goodput = received.goodput_bps().unwrap();
    assert!((goodput - 1e6).abs() / 1e6 < 0.001, "goodput {goodput}");
}

#[test]
fn duty_cycle_stays_silent_while_off() {
    let mut bench = bench(DataRate::UNLIMITED);
    let client = bench.network.devices()[0].clone();
    let server = bench.network.node_by_name("server").unwrap();

    let config = OnOffConfig::new(server.id(), DataRate::mbps(1), SimTime::zero(), SimTime::from_secs(2))
        .with_packet_size(1000)
        .with_periods(constant(0.5), constant(0.5));
    let app = OnOffApplication::new("client", &client, config, bench.network.seed()).unwrap();
    install_application(&app, bench.sim.scheduler_mut()).unwrap();
    bench.sim.run(SimTime::from_secs(5));

    let tx: Vec<SimTime> = bench
        .capture
        .records()
        .iter()
        .filter(|r| r.direction == Direction::Tx)
        .map(|r| r.time)
        .collect();
    assert_eq!(tx.len(), 126);
    for t in &tx {
        let into_second = t.as_nanos() % 1_000_000_000;
        assert!(into_second < 500_000_000, "sent while off at {t}");
    }
    assert_eq!(tx[63], SimTime::from_secs(1));
    assert_eq!(app.stats().on_periods, 2);
}

#[test]
fn byte_limit_caps_output() {
    let mut bench = bench(DataRate::UNLIMITED);
    let client = bench.network.devices()[0].clone();
    let server = bench.network.node_by_name("server").unwrap();

    let config = OnOffConfig::new(server.id(), DataRate::kbps(512), SimTime::zero(), SimTime::from_secs(10))
        .with_packet_size(1024)
        .with_max_bytes(10 * 1024);
    let app = OnOffApplication::new("client", &client, config, bench.network.seed()).unwrap();
    install_application(&app, bench.sim.scheduler_mut()).unwrap();
    bench.sim.run(SimTime::from_secs(10));

    assert_eq!(app.stats().packets_sent, 10);
    assert_eq!(app.stats().bytes_sent, 10 * 1024);
}

#[test]
fn sink_counts_only_while_running() {
    let mut bench = bench(DataRate::UNLIMITED);
    let client = bench.network.devices()[0].clone();
    let server = bench.network.node_by_name("server").unwrap();

    let config = OnOffConfig::new(server.id(), DataRate::mbps(1), SimTime::zero(), SimTime::from_secs(10))
        .with_packet_size(1000)
        .with_periods(constant(100.0), constant(0.0));
    let app = OnOffApplication::new("client", &client, config, bench.network.seed()).unwrap();
    let sink = PacketSink::install(
        "server",
        &server,
        SinkConfig::new(SimTime::from_secs(5), SimTime::from_secs(6)),
    )
    .unwrap();
    install_application(&app, bench.sim.scheduler_mut()).unwrap();
    install_application(&sink, bench.sim.scheduler_mut()).unwrap();
    bench.sim.run(SimTime::from_secs(10));

    // Arrivals at k*8ms + 1ms falling in [5s, 6s).
    assert_eq!(sink.stats().packets, 125);
    assert_eq!(sink.stats().first_rx, Some(SimTime::from_millis(5001)));
    assert_eq!(server.stats().delivered, app.stats().packets_sent);
}

#[test]
fn invalid_configurations_are_rejected_at_construction() {
    let bench = bench(DataRate::UNLIMITED);
    let client = bench.network.devices()[0].clone();
    let server = bench.network.node_by_name("server").unwrap();

    let late = OnOffConfig::new(server.id(), DataRate::mbps(1), SimTime::from_secs(21), SimTime::from_secs(20));
    assert!(matches!(
        OnOffApplication::new("late", &client, late, bench.network.seed()),
        Err(NetError::InvalidSchedule { .. })
    ));

    let never_on = OnOffConfig::new(server.id(), DataRate::mbps(1), SimTime::zero(), SimTime::from_secs(1))
        .with_periods(constant(0.0), constant(0.0));
    assert!(OnOffApplication::new("idle", &client, never_on, bench.network.seed()).is_err());

    let empty = OnOffConfig::new(server.id(), DataRate::mbps(1), SimTime::zero(), SimTime::from_secs(1))
        .with_packet_size(0);
    assert!(OnOffApplication::new("empty", &client, empty, bench.network.seed()).is_err());

    assert!(matches!(
        PacketSink::install("sink", &server, SinkConfig::new(SimTime::from_secs(3), SimTime::from_secs(1))),
        Err(NetError::InvalidSchedule { .. })
    ));
}

#[test]
fn lifecycle_transitions_are_one_way() {
    let mut bench = bench(DataRate::UNLIMITED);
    let server = bench.network.node_by_name("server").unwrap();
    let sink = PacketSink::install("sink", &server, SinkConfig::new(SimTime::zero(), SimTime::from_secs(1))).unwrap();
    assert_eq!(sink.state(), AppState::Idle);

    let scheduler = bench.sim.scheduler_mut();
    Rc::clone(&sink).start(scheduler);
    assert_eq!(sink.state(), AppState::Running);
    sink.stop(scheduler);
    Rc::clone(&sink).start(scheduler);
    assert_eq!(sink.state(), AppState::Stopped);
}

#[test]
fn same_seed_same_run() {
    fn run(seed: u64) -> Vec<SimTime> {
        let mut bench = bench(DataRate::mbps(10));
        let client = bench.network.devices()[0].clone();
        let server = bench.network.node_by_name("server").unwrap();
        let config = OnOffConfig::new(server.id(), DataRate::mbps(1), SimTime::zero(), SimTime::from_secs(5))
            .with_periods(
                DurationDistribution::Exponential { mean_secs: 0.2 },
                DurationDistribution::Exponential { mean_secs: 0.3 },
            )
            .with_seed(seed);
        let app = OnOffApplication::new("client", &client, config, bench.network.seed()).unwrap();
        install_application(&app, bench.sim.scheduler_mut()).unwrap();
        bench.sim.run(SimTime::from_secs(5));
        let times = bench.capture.records().iter().map(|r| r.time).collect();
        times
    }

    assert_eq!(run(17), run(17));
    assert_ne!(run(17), run(18));
}

#[test]
fn short_off_period_keeps_packet_spacing() {
    let mut bench = bench(DataRate::UNLIMITED);
    let client = bench.network.devices()[0].clone();
    let server = bench.network.node_by_name("server").unwrap();

    // 8ms between packets, ON for 10ms, OFF for 1ms.
    let config = OnOffConfig::new(server.id(), DataRate::mbps(1), SimTime::zero(), SimTime::from_millis(50))
        .with_packet_size(1000)
        .with_periods(
            DurationDistribution::constant(SimTime::from_millis(10)),
            DurationDistribution::constant(SimTime::from_millis(1)),
        );
    let app = OnOffApplication::new("client", &client, config, bench.network.seed()).unwrap();
    install_application(&app, bench.sim.scheduler_mut()).unwrap();
    bench.sim.run(SimTime::from_secs(1));

    let tx: Vec<SimTime> = bench
        .capture
        .records()
        .iter()
        .filter(|r| r.direction == Direction::Tx)
        .map(|r| r.time)
        .collect();
    let expected: Vec<SimTime> = [0, 8, 16, 24, 33, 41, 49]
        .into_iter()
        .map(SimTime::from_millis)
        .collect();
    assert_eq!(tx, expected);
    assert_eq!(app.stats().on_periods, 5);
}

#[test]
fn run_seed_drives_default_period_sampling() {
    fn run(run_seed: u64) -> Vec<SimTime> {
        let mut sim = Simulation::default();
        let mut network = Network::new(run_seed);
        let client = network.add_node("client");
        let server = network.add_node("server");
        network
            .point_to_point(
                &client,
                &server,
                &PointToPointConfig::new(DataRate::mbps(10), SimTime::from_millis(1)),
            )
            .unwrap();
        let capture = TraceCapture::new();
        capture.attach_all(network.devices());

        let config = OnOffConfig::new(server.id(), DataRate::mbps(1), SimTime::zero(), SimTime::from_secs(5))
            .with_periods(
                DurationDistribution::Exponential { mean_secs: 0.3 },
                DurationDistribution::Exponential { mean_secs: 0.3 },
            )
            .with_flow(FlowId(1));
        let device = network.devices()[0].clone();
        let app = OnOffApplication::new("client", &device, config, network.seed()).unwrap();
        install_application(&app, sim.scheduler_mut()).unwrap();
        sim.run(SimTime::from_secs(5));
        let times = capture
            .records()
            .iter()
            .filter(|r| r.direction == Direction::Tx)
            .map(|r| r.time)
            .collect();
        times
    }

    assert_eq!(run(1), run(1));
    assert_ne!(run(1), run(999));
}
