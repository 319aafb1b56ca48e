//! Export of per-interval result rows
//!
//! The CSV layout (`time,throughput,delay,loss`) is the one the plotting
//! scripts read. JSON carries the same rows; the flow summary has its own
//! JSON export.

pub mod csv;
pub mod json;

pub use self::csv::CsvExporter;
pub use self::json::{export_summary_json, JsonExporter};

use crate::error::MetricsError;
use crate::flow::ResultRow;
use std::path::Path;

/// Trait for writing result rows to some destination
pub trait ResultsExporter {
    fn export(&self, rows: &[ResultRow]) -> Result<(), MetricsError>;
}

/// Writes `rows` to `path` as CSV.
///
/// # Example
/// ```no_run
/// use satsim_metrics::{export_results_csv, FlowMonitor};
/// use satsim_core::SimTime;
///
/// let monitor = FlowMonitor::new(SimTime::from_secs(1)).unwrap();
/// // ... observe trace records ...
/// export_results_csv(&monitor.rows().unwrap(), "results.csv").unwrap();
/// ```
pub fn export_results_csv(rows: &[ResultRow], path: impl AsRef<Path>) -> Result<(), MetricsError> {
    CsvExporter::new(path.as_ref()).export(rows)
}

/// Writes `rows` to `path` as a JSON array.
pub fn export_results_json(
    rows: &[ResultRow],
    path: impl AsRef<Path>,
    pretty: bool,
) -> Result<(), MetricsError> {
    JsonExporter::new(path.as_ref(), pretty).export(rows)
}
