//! Loader configuration.
//!
//! ```toml
//! [shared]
//! log_level = "info"
//! service_name = "traj-loader"
//!
//! [segment]
//! path = "/dev/shm/traj_ushm"
//! base_offset = 4000
//! num_axes = 8
//! capacity = 1000
//! buffer_count = 3
//!
//! [decode]
//! policy = "zero_fallback"
//! skip_header = true
//! ```
//!
//! Every section is optional; missing keys take the built-in defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use traj::config::{ConfigError, ConfigLoader, SharedConfig};
use traj::consts::{
    DEFAULT_BASE_OFFSET, DEFAULT_BUFFER_COUNT, DEFAULT_CAPACITY, DEFAULT_CONFIG_PATH,
    DEFAULT_NUM_AXES, DEFAULT_SEGMENT_PATH,
};
use traj::layout::LayoutParams;

/// How anomalies in the CSV are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodePolicy {
    /// Non-numeric tokens become zero, short rows are partially written,
    /// rows past capacity are dropped. All of it is counted and logged.
    #[default]
    ZeroFallback,
    /// Any of the above ends the load with an error.
    Strict,
}

/// `[segment]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Segment file.
    pub path: PathBuf,
    /// Byte offset of buffer 0.
    pub base_offset: usize,
    /// Axes per row.
    pub num_axes: usize,
    /// Rows per buffer slot.
    pub capacity: usize,
    /// Buffer slots in the segment.
    pub buffer_count: usize,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_SEGMENT_PATH),
            base_offset: DEFAULT_BASE_OFFSET,
            num_axes: DEFAULT_NUM_AXES,
            capacity: DEFAULT_CAPACITY,
            buffer_count: DEFAULT_BUFFER_COUNT,
        }
    }
}

impl SegmentConfig {
    /// Layout parameters of the segment.
    pub fn layout(&self) -> LayoutParams {
        LayoutParams {
            num_axes: self.num_axes,
            capacity: self.capacity,
            buffer_count: self.buffer_count,
            base_offset: self.base_offset,
        }
    }
}

/// `[decode]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Anomaly policy.
    pub policy: DecodePolicy,
    /// Discard the first line of the file.
    pub skip_header: bool,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            policy: DecodePolicy::ZeroFallback,
            skip_header: true,
        }
    }
}

impl DecodeConfig {
    /// Whether the strict policy is selected.
    pub fn is_strict(&self) -> bool {
        self.policy == DecodePolicy::Strict
    }
}

/// Complete loader configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Logging and service name.
    #[serde(default)]
    pub shared: SharedConfig,
    /// Segment location and layout.
    #[serde(default)]
    pub segment: SegmentConfig,
    /// Decode policy.
    #[serde(default)]
    pub decode: DecodeConfig,
}

impl LoaderConfig {
    /// Validate all sections.
    ///
    /// # Errors
    ///
    /// `ConfigError::ValidationError` naming the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        if self.segment.path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "segment.path cannot be empty".to_string(),
            ));
        }
        self.segment
            .layout()
            .validate()
            .map_err(|e| ConfigError::ValidationError(format!("segment: {e}")))
    }

    /// Load from `path`, or from the default location when it exists.
    ///
    /// An explicit path must exist. Without one, a missing default file
    /// yields the built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match Self::source(path) {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// File [`load_or_default`](Self::load_or_default) reads, if any.
    pub fn source(path: Option<&Path>) -> Option<&Path> {
        match path {
            Some(path) => Some(path),
            None => Some(Path::new(DEFAULT_CONFIG_PATH)).filter(|p| p.exists()),
        }
    }
}
