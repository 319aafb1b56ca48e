//! Names of the `metrics` counters emitted by devices and channels
//!
//! Devices label their counters with `device`, channels with `channel` and
//! `kind`. The counters go to whichever `metrics` recorder is installed for
//! the current thread; without one they cost a no-op call.

pub const DEVICE_TX_PACKETS: &str = "satsim_device_tx_packets_total";
pub const DEVICE_TX_BYTES: &str = "satsim_device_tx_bytes_total";
pub const DEVICE_RX_PACKETS: &str = "satsim_device_rx_packets_total";
pub const DEVICE_RX_BYTES: &str = "satsim_device_rx_bytes_total";
/// Packets the channel refused, plus queued packets dropped with them.
pub const DEVICE_TX_ERRORS: &str = "satsim_device_tx_errors_total";

pub const CHANNEL_TRANSMISSIONS: &str = "satsim_channel_transmissions_total";
pub const CHANNEL_DELIVERIES: &str = "satsim_channel_deliveries_total";
pub const CHANNEL_LOSSES: &str = "satsim_channel_losses_total";
