//! Flow statistics derived from a captured trace
//!
//! A packet's lifetime runs from its first transmission at the source node
//! to its first reception at the destination node. Packets that never reach
//! the destination, including those still in flight when the trace ends,
//! count as lost. Delays go through [`DelayHistogram`], so summaries carry
//! quantiles as well as the mean.

use crate::error::MetricsError;
use satsim_core::{DelayHistogram, DelayStats, SimTime};
use satsim_net::{Direction, FlowId, NodeId, PacketId, TraceRecord};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Most rows [`FlowMonitor::rows`] will produce. A reporting interval that
/// would need more is rejected.
pub const MAX_ROWS: usize = 100_000;

/// End-to-end history of one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PacketLifetime {
    pub id: PacketId,
    pub source: NodeId,
    pub destination: NodeId,
    pub size: usize,
    pub sent_at: SimTime,
    pub received_at: Option<SimTime>,
}

impl PacketLifetime {
    /// One-way delay, if the packet arrived.
    pub fn delay(&self) -> Option<SimTime> {
        self.received_at.map(|rx| rx.saturating_sub(self.sent_at))
    }
}

/// One reporting interval. Field names match the columns of `results.csv`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResultRow {
    /// End of the interval, seconds.
    pub time: f64,
    /// Bytes received during the interval, Mbit/s.
    pub throughput: f64,
    /// Mean one-way delay of packets received during the interval, ms.
    pub delay: f64,
    /// Share of packets sent during the interval that were lost, percent.
    pub loss: f64,
}

/// Totals over a set of packets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FlowSummary {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub packets_lost: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    /// One-way delays of the received packets.
    pub delay: Option<DelayStats>,
    pub first_tx: Option<SimTime>,
    pub last_rx: Option<SimTime>,
    /// Received bits over the span from first transmission to last
    /// reception, bit/s.
    pub goodput_bps: f64,
}

impl FlowSummary {
    /// Fraction of sent packets that were lost, in `[0, 1]`.
    pub fn loss_ratio(&self) -> f64 {
        if self.packets_sent == 0 {
            0.0
        } else {
            self.packets_lost as f64 / self.packets_sent as f64
        }
    }

    pub fn mean_delay(&self) -> Option<SimTime> {
        self.delay.map(|d| d.mean)
    }

    pub fn max_delay(&self) -> Option<SimTime> {
        self.delay.map(|d| d.max)
    }

    fn from_lifetimes<'a>(
        lifetimes: impl Iterator<Item = &'a PacketLifetime>,
        mut delays: DelayHistogram,
    ) -> Self {
        let mut summary = FlowSummary::default();
        for lifetime in lifetimes {
            summary.packets_sent += 1;
            summary.bytes_sent += lifetime.size as u64;
            summary.first_tx = Some(
                summary
                    .first_tx
                    .map_or(lifetime.sent_at, |t| t.min(lifetime.sent_at)),
            );
            match (lifetime.received_at, lifetime.delay()) {
                (Some(rx), Some(delay)) => {
                    summary.packets_received += 1;
                    summary.bytes_received += lifetime.size as u64;
                    delays.record(delay);
                    summary.last_rx = Some(summary.last_rx.map_or(rx, |t| t.max(rx)));
                }
                _ => summary.packets_lost += 1,
            }
        }
        summary.delay = delays.stats();
        if let (Some(first), Some(last)) = (summary.first_tx, summary.last_rx) {
            let span = last.saturating_sub(first).as_secs_f64();
            if span > 0.0 {
                summary.goodput_bps = summary.bytes_received as f64 * 8.0 / span;
            }
        }
        summary
    }
}

/// Per-packet bookkeeping over a trace.
#[derive(Debug, Clone)]
pub struct FlowMonitor {
    interval: SimTime,
    packets: BTreeMap<PacketId, PacketLifetime>,
    end: SimTime,
    /// Empty histogram cloned for every summary.
    delays: DelayHistogram,
}

impl FlowMonitor {
    /// A monitor that reports in buckets of `interval`.
    pub fn new(interval: SimTime) -> Result<Self, MetricsError> {
        if interval == SimTime::zero() {
            return Err(MetricsError::InvalidInterval(
                "reporting interval must be positive".to_string(),
            ));
        }
        Ok(Self {
            interval,
            packets: BTreeMap::new(),
            end: SimTime::zero(),
            delays: DelayHistogram::new()?,
        })
    }

    /// Builds a monitor from a complete trace.
    pub fn from_records(records: &[TraceRecord], interval: SimTime) -> Result<Self, MetricsError> {
        let mut monitor = Self::new(interval)?;
        for record in records {
            monitor.observe(record);
        }
        debug!(
            records = records.len(),
            packets = monitor.packets.len(),
            "Flow monitor built"
        );
        Ok(monitor)
    }

    /// Feeds one record. Records must arrive in capture order.
    pub fn observe(&mut self, record: &TraceRecord) {
        self.end = self.end.max(record.time);
        let header = record.packet.header();
        match record.direction {
            Direction::Tx if record.node == header.source => {
                self.packets.entry(header.id).or_insert(PacketLifetime {
                    id: header.id,
                    source: header.source,
                    destination: header.destination,
                    size: header.size,
                    sent_at: record.time,
                    received_at: None,
                });
            }
            Direction::Rx if record.node == header.destination => {
                if let Some(lifetime) = self.packets.get_mut(&header.id) {
                    lifetime.received_at.get_or_insert(record.time);
                }
            }
            _ => {}
        }
    }

    /// Extends the reporting window to `time`, e.g. the simulation horizon.
    pub fn extend_to(&mut self, time: SimTime) {
        self.end = self.end.max(time);
    }

    pub fn interval(&self) -> SimTime {
        self.interval
    }

    /// Latest time covered by the report.
    pub fn end(&self) -> SimTime {
        self.end
    }

    pub fn lifetimes(&self) -> impl Iterator<Item = &PacketLifetime> {
        self.packets.values()
    }

    pub fn lifetime(&self, id: PacketId) -> Option<&PacketLifetime> {
        self.packets.get(&id)
    }

    pub fn flows(&self) -> Vec<FlowId> {
        self.packets
            .keys()
            .map(|id| id.flow)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Totals over every packet seen.
    pub fn summary(&self) -> FlowSummary {
        FlowSummary::from_lifetimes(self.packets.values(), self.delays.clone())
    }

    /// Totals over the packets of one flow.
    pub fn summary_for(&self, flow: FlowId) -> FlowSummary {
        FlowSummary::from_lifetimes(
            self.packets.values().filter(|l| l.id.flow == flow),
            self.delays.clone(),
        )
    }

    fn bucket(&self, time: SimTime, buckets: usize) -> usize {
        let index = (time.as_nanos() / self.interval.as_nanos()) as usize;
        index.min(buckets - 1)
    }

    /// One row per interval from time zero to [`Self::end`]. Fails with
    /// [`MetricsError::InvalidInterval`] when that takes more than
    /// [`MAX_ROWS`] rows.
    pub fn rows(&self) -> Result<Vec<ResultRow>, MetricsError> {
        let step = self.interval.as_nanos();
        let buckets = self.end.as_nanos().div_ceil(step).max(1);
        if buckets > MAX_ROWS as u64 {
            return Err(MetricsError::InvalidInterval(format!(
                "{} over {} needs {buckets} rows, limit is {MAX_ROWS}",
                self.interval, self.end
            )));
        }
        let buckets = buckets as usize;

        let mut sent = vec![0u64; buckets];
        let mut lost = vec![0u64; buckets];
        let mut rx_bytes = vec![0u64; buckets];
        let mut arrivals: BTreeMap<usize, Vec<SimTime>> = BTreeMap::new();

        for lifetime in self.packets.values() {
            let b = self.bucket(lifetime.sent_at, buckets);
            sent[b] += 1;
            match (lifetime.received_at, lifetime.delay()) {
                (Some(rx), Some(delay)) => {
                    let r = self.bucket(rx, buckets);
                    rx_bytes[r] += lifetime.size as u64;
                    arrivals.entry(r).or_default().push(delay);
                }
                _ => lost[b] += 1,
            }
        }

        let mut mean_delay = vec![None; buckets];
        let mut histogram = self.delays.clone();
        for (bucket, delays) in &arrivals {
            histogram.reset();
            for delay in delays {
                histogram.record(*delay);
            }
            mean_delay[*bucket] = histogram.stats().map(|d| d.mean);
        }

        let interval_secs = self.interval.as_secs_f64();
        Ok((0..buckets)
            .map(|b| ResultRow {
                time: (b as f64 + 1.0) * interval_secs,
                throughput: rx_bytes[b] as f64 * 8.0 / interval_secs / 1e6,
                delay: mean_delay[b].map_or(0.0, |d: SimTime| d.as_millis_f64()),
                loss: if sent[b] == 0 {
                    0.0
                } else {
                    lost[b] as f64 * 100.0 / sent[b] as f64
                },
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use satsim_net::{DeviceId, Packet};

    fn within_resolution(actual: SimTime, expected: SimTime) -> bool {
        actual.as_nanos().abs_diff(expected.as_nanos()) * 1000 <= expected.as_nanos()
    }

    fn record(seq: u64, time_ms: u64, node: u32, direction: Direction, packet: &Packet) -> TraceRecord {
        TraceRecord {
            seq,
            time: SimTime::from_millis(time_ms),
            node: NodeId(node),
            device: DeviceId(node),
            direction,
            packet: packet.clone(),
        }
    }

    fn packet(seq: u64, created_ms: u64) -> Packet {
        Packet::new(
            PacketId::new(FlowId(1), seq),
            NodeId(0),
            NodeId(2),
            SimTime::from_millis(created_ms),
            vec![0u8; 1000],
        )
    }

    #[test]
    fn lifetimes_ignore_intermediate_hops() {
        let p = packet(0, 100);
        let records = vec![
            record(0, 100, 0, Direction::Tx, &p),
            record(1, 150, 1, Direction::Rx, &p),
            record(2, 150, 1, Direction::Tx, &p),
            record(3, 400, 2, Direction::Rx, &p),
        ];
        let monitor = FlowMonitor::from_records(&records, SimTime::from_secs(1)).unwrap();
        let lifetime = monitor.lifetime(p.id()).unwrap();
        assert_eq!(lifetime.sent_at, SimTime::from_millis(100));
        assert_eq!(lifetime.delay(), Some(SimTime::from_millis(300)));
    }

    #[test]
    fn rows_bucket_throughput_delay_and_loss() {
        let a = packet(0, 100);
        let b = packet(1, 600);
        let c = packet(2, 900);
        let records = vec![
            record(0, 100, 0, Direction::Tx, &a),
            record(1, 600, 0, Direction::Tx, &b),
            record(2, 700, 2, Direction::Rx, &a),
            record(3, 900, 0, Direction::Tx, &c),
            record(4, 1_300, 2, Direction::Rx, &c),
        ];
        let monitor = FlowMonitor::from_records(&records, SimTime::from_secs(1)).unwrap();
        let rows = monitor.rows().unwrap();
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].time, 1.0);
        assert!((rows[0].throughput - 0.008).abs() < 1e-12);
        assert!((rows[0].delay - 600.0).abs() < 0.6);
        assert!((rows[0].loss - 100.0 / 3.0).abs() < 1e-9);

        assert_eq!(rows[1].time, 2.0);
        assert!((rows[1].delay - 400.0).abs() < 0.4);
        assert_eq!(rows[1].loss, 0.0);

        let summary = monitor.summary();
        assert_eq!(summary.packets_sent, 3);
        assert_eq!(summary.packets_lost, 1);
        let delay = summary.delay.unwrap();
        assert_eq!(delay.count, 2);
        assert!(within_resolution(delay.mean, SimTime::from_millis(500)));
        assert!(within_resolution(delay.p50, SimTime::from_millis(400)));
        assert!(within_resolution(delay.max, SimTime::from_millis(600)));
        assert!((summary.goodput_bps - 16_000.0 / 1.2).abs() < 1e-6);
        assert!((summary.loss_ratio() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn row_count_is_capped() {
        let mut monitor = FlowMonitor::new(SimTime::from_nanos(1)).unwrap();
        monitor.extend_to(SimTime::from_secs(21));
        assert!(matches!(monitor.rows(), Err(MetricsError::InvalidInterval(_))));

        let mut monitor = FlowMonitor::new(SimTime::from_millis(1)).unwrap();
        monitor.extend_to(SimTime::from_secs(100));
        assert_eq!(monitor.rows().unwrap().len(), MAX_ROWS);
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(matches!(
            FlowMonitor::new(SimTime::zero()),
            Err(MetricsError::InvalidInterval(_))
        ));
    }
}
