//! Prelude module for common re-exports.
//!
//! ```rust
//! use traj_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{MAX_AXES, MAX_BUFFERS};

// ─── Layout ─────────────────────────────────────────────────────────
pub use crate::layout::{ChannelMap, LayoutError, LayoutParams, Packing};
