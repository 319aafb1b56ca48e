//! Global trace capture
//!
//! [`TraceCapture`] subscribes to the transmit and receive trace points of the
//! devices it is attached to and merges everything into one time-ordered
//! record stream. Because all hooks fire from inside scheduler events, the
//! append order is the firing order: records are sorted by time, and
//! same-time records follow the event queue's tie-break.
//!
//! Records are kept in memory and, optionally, streamed to [`TraceSink`]s
//! (pcap files, JSON lines) as they are captured.

use crate::device::{DeviceTraceEvent, Direction, HookId, NetDevice};
use crate::ids::{DeviceId, NodeId};
use crate::packet::Packet;
use satsim_core::SimTime;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::rc::{Rc, Weak};
use tracing::{debug, error};

/// One captured transmission or reception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRecord {
    /// Capture order, starting at zero.
    pub seq: u64,
    pub time: SimTime,
    pub node: NodeId,
    pub device: DeviceId,
    pub direction: Direction,
    pub packet: Packet,
}

/// Destination for captured records.
pub trait TraceSink {
    fn write(&mut self, record: &TraceRecord) -> io::Result<()>;

    /// Flushes buffered output. Called once by [`TraceCapture::finish`].
    fn finish(&mut self) -> io::Result<()>;
}

#[derive(Default)]
struct CaptureState {
    records: Vec<TraceRecord>,
    sinks: Vec<Box<dyn TraceSink>>,
    next_seq: u64,
    first_error: Option<io::Error>,
}

impl CaptureState {
    fn record(&mut self, event: &DeviceTraceEvent<'_>) {
        let record = TraceRecord {
            seq: self.next_seq,
            time: event.time,
            node: event.node,
            device: event.device,
            direction: event.direction,
            packet: event.packet.clone(),
        };
        self.next_seq += 1;
        for sink in &mut self.sinks {
            if let Err(e) = sink.write(&record) {
                error!(seq = record.seq, error = %e, "Trace sink write failed");
                self.first_error.get_or_insert(e);
            }
        }
        self.records.push(record);
    }
}

struct Attachment {
    device: Weak<NetDevice>,
    tx: HookId,
    rx: HookId,
}

#[derive(Default)]
pub struct TraceCapture {
    state: Rc<RefCell<CaptureState>>,
    attached: RefCell<HashMap<DeviceId, Attachment>>,
}

impl fmt::Debug for TraceCapture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("TraceCapture")
            .field("records", &state.records.len())
            .field("sinks", &state.sinks.len())
            .field("attached", &self.attached.borrow().len())
            .finish()
    }
}

impl TraceCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts capturing `device`. Attaching mid-run captures from that point
    /// on. Returns `false` if the device was already attached.
    pub fn attach(&self, device: &Rc<NetDevice>) -> bool {
        if self.attached.borrow().contains_key(&device.id()) {
            return false;
        }
        let tx = device.on_transmit(self.hook());
        let rx = device.on_receive(self.hook());
        self.attached.borrow_mut().insert(
            device.id(),
            Attachment {
                device: Rc::downgrade(device),
                tx,
                rx,
            },
        );
        debug!(device = %device.id(), "Trace capture attached");
        true
    }

    /// Attaches every device in `devices`.
    pub fn attach_all<'a>(&self, devices: impl IntoIterator<Item = &'a Rc<NetDevice>>) -> usize {
        devices.into_iter().filter(|d| self.attach(d)).count()
    }

    /// Stops capturing `device`. Returns `false` if it was not attached.
    pub fn detach(&self, device: &NetDevice) -> bool {
        let Some(attachment) = self.attached.borrow_mut().remove(&device.id()) else {
            return false;
        };
        if let Some(device) = attachment.device.upgrade() {
            device.remove_hook(attachment.tx);
            device.remove_hook(attachment.rx);
        }
        debug!(device = %device.id(), "Trace capture detached");
        true
    }

    pub fn is_attached(&self, device: DeviceId) -> bool {
        self.attached.borrow().contains_key(&device)
    }

    fn hook(&self) -> impl Fn(&DeviceTraceEvent<'_>) + 'static {
        let state = Rc::downgrade(&self.state);
        move |event: &DeviceTraceEvent<'_>| {
            if let Some(state) = state.upgrade() {
                state.borrow_mut().record(event);
            }
        }
    }

    /// Streams every record captured from now on to `sink`.
    pub fn add_sink(&self, sink: Box<dyn TraceSink>) {
        self.state.borrow_mut().sinks.push(sink);
    }

    /// Snapshot of the records captured so far, in capture order.
    pub fn records(&self) -> Vec<TraceRecord> {
        self.state.borrow().records.clone()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs `f` over the captured records without copying them.
    pub fn with_records<R>(&self, f: impl FnOnce(&[TraceRecord]) -> R) -> R {
        f(&self.state.borrow().records)
    }

    /// Flushes and closes every sink. Returns the first error seen by any
    /// sink during the run or while finishing. Sinks are dropped afterwards;
    /// records stay available.
    pub fn finish(&self) -> io::Result<()> {
        let (sinks, mut first_error) = {
            let mut state = self.state.borrow_mut();
            (std::mem::take(&mut state.sinks), state.first_error.take())
        };
        for mut sink in sinks {
            if let Err(e) = sink.finish() {
                error!(error = %e, "Trace sink finish failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Forgets captured records and sinks so the capture can serve another
    /// run. Device attachments are kept.
    pub fn reset(&self) {
        let mut state = self.state.borrow_mut();
        state.records.clear();
        state.sinks.clear();
        state.next_seq = 0;
        state.first_error = None;
    }
}

impl Drop for TraceCapture {
    fn drop(&mut self) {
        for (_, attachment) in self.attached.get_mut().drain() {
            if let Some(device) = attachment.device.upgrade() {
                device.remove_hook(attachment.tx);
                device.remove_hook(attachment.rx);
            }
        }
    }
}
