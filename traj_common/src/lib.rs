//! Trajectory loader common library
//!
//! Shared constants, configuration loading and the trajectory buffer layout
//! for every crate in the workspace.
//!
//! # Module Structure
//!
//! - [`consts`] - Numeric limits and layout defaults
//! - [`config`] - Configuration loading traits and types
//! - [`layout`] - Packing modes and the buffer address calculator
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use traj_common::layout::{LayoutParams, Packing};
//!
//! let layout = LayoutParams::default();
//! let map = layout.channels(0, Packing::Pvt).unwrap();
//! assert_eq!(map.time_offset(0).unwrap(), layout.base_offset);
//! ```

pub mod config;
pub mod consts;
pub mod layout;
pub mod prelude;
