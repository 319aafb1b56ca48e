//! Error types for statistics and export

use satsim_core::SimError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Invalid reporting interval: {0}")]
    InvalidInterval(String),

    #[error(transparent)]
    Sim(#[from] SimError),
}
