//! JSON export for result rows and flow summaries

use crate::error::MetricsError;
use crate::export::ResultsExporter;
use crate::flow::{FlowSummary, ResultRow};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct JsonExporter {
    path: PathBuf,
    pretty: bool,
}

impl JsonExporter {
    /// Create a new JSON exporter
    ///
    /// # Arguments
    /// * `path` - Output file path
    /// * `pretty` - Whether to pretty-print the JSON
    pub fn new(path: &Path, pretty: bool) -> Self {
        Self {
            path: path.to_path_buf(),
            pretty,
        }
    }

    fn write<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), MetricsError> {
        let file = File::create(&self.path).map_err(|e| {
            MetricsError::Export(format!("Failed to create {}: {e}", self.path.display()))
        })?;
        let mut writer = BufWriter::new(file);
        if self.pretty {
            serde_json::to_writer_pretty(&mut writer, value)?;
        } else {
            serde_json::to_writer(&mut writer, value)?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl ResultsExporter for JsonExporter {
    fn export(&self, rows: &[ResultRow]) -> Result<(), MetricsError> {
        self.write(rows)
    }
}

/// Writes a flow summary to `path` as a pretty-printed JSON object.
pub fn export_summary_json(summary: &FlowSummary, path: impl AsRef<Path>) -> Result<(), MetricsError> {
    JsonExporter::new(path.as_ref(), true).write(summary)
}
