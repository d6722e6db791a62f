use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("invalid metric name {0:?}")]
    InvalidName(String),
}
