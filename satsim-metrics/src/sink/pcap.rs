//! Global pcap capture
//!
//! Simulated packets carry no protocol headers, so each record is written as
//! a synthesized IPv4 header followed by the payload, under link type
//! `LINKTYPE_RAW`. Node `n` appears as address `10.0.0.0 + n + 1`, and the
//! IPv4 identification field carries the low bits of the packet sequence
//! number. Timestamps use nanosecond resolution.

use bytes::{BufMut, BytesMut};
use satsim_net::{NodeId, TraceRecord, TraceSink};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Magic number of a little-endian, nanosecond-resolution capture.
pub const PCAP_MAGIC_NANOS: u32 = 0xa1b2_3c4d;
pub const LINKTYPE_RAW: u32 = 101;
pub const DEFAULT_SNAPLEN: u32 = 65_535;

const IPV4_HEADER_LEN: usize = 20;
/// "Use for experimentation and testing" (RFC 3692).
const IP_PROTO_EXPERIMENTAL: u8 = 253;

/// Streams every captured record into one pcap file.
pub struct PcapSink<W: Write> {
    writer: W,
    snaplen: u32,
    records: u64,
}

impl PcapSink<BufWriter<File>> {
    /// Creates (or truncates) `path` and writes the file header.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "Opened pcap capture");
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write> PcapSink<W> {
    /// Writes the global header to `writer`.
    pub fn new(writer: W) -> io::Result<Self> {
        Self::with_snaplen(writer, DEFAULT_SNAPLEN)
    }

    pub fn with_snaplen(mut writer: W, snaplen: u32) -> io::Result<Self> {
        let mut header = BytesMut::with_capacity(24);
        header.put_u32_le(PCAP_MAGIC_NANOS);
        header.put_u16_le(2);
        header.put_u16_le(4);
        header.put_i32_le(0);
        header.put_u32_le(0);
        header.put_u32_le(snaplen);
        header.put_u32_le(LINKTYPE_RAW);
        writer.write_all(&header)?;
        Ok(Self {
            writer,
            snaplen,
            records: 0,
        })
    }

    /// Records written so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Consumes the sink and returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> TraceSink for PcapSink<W> {
    fn write(&mut self, record: &TraceRecord) -> io::Result<()> {
        let frame = ipv4_frame(record);
        let incl_len = frame.len().min(self.snaplen as usize);
        let nanos = record.time.as_nanos();

        let mut header = BytesMut::with_capacity(16);
        header.put_u32_le((nanos / 1_000_000_000) as u32);
        header.put_u32_le((nanos % 1_000_000_000) as u32);
        header.put_u32_le(incl_len as u32);
        header.put_u32_le(frame.len() as u32);
        self.writer.write_all(&header)?;
        self.writer.write_all(&frame[..incl_len])?;
        self.records += 1;
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        debug!(records = self.records, "Closing pcap capture");
        self.writer.flush()
    }
}

/// Address assigned to a node in the capture.
pub fn node_address(node: NodeId) -> [u8; 4] {
    (0x0a00_0000u32 | (node.0.wrapping_add(1) & 0x00ff_ffff)).to_be_bytes()
}

/// Wraps the packet in an IPv4 header. Payloads that do not fit the 16-bit
/// total length are cut, so the length field always matches the frame.
fn ipv4_frame(record: &TraceRecord) -> BytesMut {
    let packet = &record.packet;
    let payload = &packet.payload()[..packet.size().min(u16::MAX as usize - IPV4_HEADER_LEN)];
    let total = IPV4_HEADER_LEN + payload.len();

    let mut frame = BytesMut::with_capacity(total);
    frame.put_u8(0x45);
    frame.put_u8(0);
    frame.put_u16(total as u16);
    frame.put_u16(packet.id().seq as u16);
    frame.put_u16(0x4000);
    frame.put_u8(64);
    frame.put_u8(IP_PROTO_EXPERIMENTAL);
    frame.put_u16(0);
    frame.put_slice(&node_address(packet.source()));
    frame.put_slice(&node_address(packet.destination()));

    let checksum = ipv4_checksum(&frame[..IPV4_HEADER_LEN]);
    frame[10..12].copy_from_slice(&checksum.to_be_bytes());

    frame.put_slice(payload);
    frame
}

fn ipv4_checksum(header: &[u8]) -> u16 {
    let mut sum: u32 = header
        .chunks(2)
        .map(|pair| u32::from(u16::from_be_bytes([pair[0], *pair.get(1).unwrap_or(&0)])))
        .sum();
    while sum > 0xffff {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}
