//! Error types for a trajectory load

use std::path::PathBuf;
use thiserror::Error;
use traj::config::ConfigError;
use traj::layout::LayoutError;
use traj_shm::ShmError;

/// Errors that end a load
#[derive(Error, Debug)]
pub enum LoadError {
    /// Trajectory file could not be opened
    #[error("Could not open file {}: {source}", path.display())]
    Open {
        /// File path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// CSV read failure (I/O error mid-file)
    #[error("CSV read error: {0}")]
    Csv(#[from] csv::Error),

    /// Segment or slot failure
    #[error(transparent)]
    Shm(#[from] ShmError),

    /// Invalid layout parameters
    #[error(transparent)]
    Layout(#[from] LayoutError),

    /// Non-numeric token (strict policy)
    #[error("Line {line}, field {field}: not a number: {token:?}")]
    Parse {
        /// 1-based line number
        line: u64,
        /// 1-based field index
        field: usize,
        /// Offending token
        token: String,
    },

    /// Row with fewer fields than the packing needs (strict policy)
    #[error("Line {line}: expected {expected} fields, found {found}")]
    ShortRow {
        /// 1-based line number
        line: u64,
        /// Fields the packing needs
        expected: usize,
        /// Fields present
        found: usize,
    },

    /// More rows than the slot holds (strict policy)
    #[error("File exceeds slot capacity of {capacity} rows ({dropped} rows dropped)")]
    CapacityExceeded {
        /// Rows per slot
        capacity: usize,
        /// Rows past capacity
        dropped: usize,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Unknown packing profile number
    #[error("Invalid profile {0} (0 = PVT, 1 = position)")]
    InvalidProfile(u8),
}

/// Result type for load operations
pub type LoadResult<T> = Result<T, LoadError>;
