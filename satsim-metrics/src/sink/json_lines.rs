//! One JSON object per captured record

use satsim_core::SimTime;
use satsim_net::{DeviceId, Direction, NodeId, PacketHeader, TraceRecord, TraceSink};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

#[derive(Serialize)]
struct Line {
    seq: u64,
    time: SimTime,
    node: NodeId,
    device: DeviceId,
    direction: Direction,
    packet: PacketHeader,
}

/// Writes each record as a line of JSON: capture sequence, time in
/// nanoseconds, node, device, direction and the packet header.
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl JsonLinesSink<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> TraceSink for JsonLinesSink<W> {
    fn write(&mut self, record: &TraceRecord) -> io::Result<()> {
        let line = Line {
            seq: record.seq,
            time: record.time,
            node: record.node,
            device: record.device,
            direction: record.direction,
            packet: record.packet.header(),
        };
        serde_json::to_writer(&mut self.writer, &line)?;
        self.writer.write_all(b"\n")
    }

    fn finish(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
