//! CSV export for result rows

use crate::error::MetricsError;
use crate::export::ResultsExporter;
use crate::flow::ResultRow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const HEADER: &str = "time,throughput,delay,loss";

/// Writes one row per interval.
#[derive(Debug)]
pub struct CsvExporter {
    path: PathBuf,
}

impl CsvExporter {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl ResultsExporter for CsvExporter {
    fn export(&self, rows: &[ResultRow]) -> Result<(), MetricsError> {
        let file = File::create(&self.path).map_err(|e| {
            MetricsError::Export(format!("Failed to create {}: {e}", self.path.display()))
        })?;
        let mut writer = BufWriter::new(file);
        write_rows(&mut writer, rows)?;
        writer.flush()?;
        Ok(())
    }
}

/// Writes the header and `rows` to any writer.
pub fn write_rows<W: Write>(writer: &mut W, rows: &[ResultRow]) -> Result<(), MetricsError> {
    writeln!(writer, "{HEADER}")
        .map_err(|e| MetricsError::Export(format!("Failed to write header: {e}")))?;
    for row in rows {
        writeln!(
            writer,
            "{:.3},{:.6},{:.3},{:.2}",
            row.time, row.throughput, row.delay, row.loss
        )
        .map_err(|e| MetricsError::Export(format!("Failed to write row: {e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_rows() {
        let rows = [
            ResultRow {
                time: 1.0,
                throughput: 0.9,
                delay: 251.08192,
                loss: 0.0,
            },
            ResultRow {
                time: 2.0,
                throughput: 1.0,
                delay: 0.0,
                loss: 12.5,
            },
        ];
        let mut out = Vec::new();
        write_rows(&mut out, &rows).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "time,throughput,delay,loss\n1.000,0.900000,251.082,0.00\n2.000,1.000000,0.000,12.50\n"
        );
    }

    #[test]
    fn test_csv_export() {
        let path = std::env::temp_dir().join("satsim_test_results.csv");
        CsvExporter::new(&path).export(&[]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "time,throughput,delay,loss\n");
        std::fs::remove_file(&path).ok();
    }
}
