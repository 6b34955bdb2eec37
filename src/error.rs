//! Error types for the timegrid booking engine.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Main error type for timegrid operations.
#[derive(Error, Debug)]
pub enum TimegridError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Scheduling error: {0}")]
    Scheduling(#[from] SchedulingError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration-related errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Scheduling-domain errors.
///
/// `Conflict` is definitive: the caller is expected to recompute
/// availability rather than retry the same interval.
#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Unknown reservation: {0}")]
    UnknownReservation(String),

    #[error("Unknown break: {0}")]
    UnknownBreak(String),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Interval [{start}, {end}) overlaps an existing booking")]
    Conflict {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Storage-related errors for the embedded store.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Result type alias for timegrid operations.
pub type Result<T> = std::result::Result<T, TimegridError>;
