//! # Trajectory Loader Library
//!
//! Reads comma-separated motion profiles and writes them into one buffer
//! slot of the shared trajectory segment, then publishes the slot's fill
//! count for the real-time consumer.
//!
//! ## Packing modes
//!
//! 1. **PVT**: `time, user, pos_1..pos_N, vel_1..vel_N` per row
//! 2. **Position**: `user, pos_1..pos_N` per row, point-wise layout
//!
//! ## Decode policy
//!
//! The default policy keeps going on bad input: non-numeric tokens decode to
//! zero, short rows are partially written and rows past the slot capacity
//! are dropped. Every such event is counted in the [`LoadSummary`]. The
//! strict policy turns each of them into a [`LoadError`].
//!
//! ```rust
//! use traj_loader::{BufferLoader, DecodeConfig};
//! use traj_shm::{LayoutParams, Packing, TrajectoryReader, TrajectorySegment};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let layout = LayoutParams { num_axes: 2, ..LayoutParams::default() };
//! let mut segment = TrajectorySegment::anonymous(layout)?;
//! let csv = "time,user,p1,p2,v1,v2\n0,1,10.0,20.0,0.5,0.5\n";
//! let summary = BufferLoader::new(&mut segment, DecodeConfig::default())
//!     .load_reader(csv.as_bytes(), Packing::Pvt, 0)?;
//! assert_eq!(summary.rows_written, 1);
//! assert_eq!(TrajectoryReader::new(&segment).fill_count(0)?, 1);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod decode;
pub mod error;
pub mod loader;
pub mod numeric;

pub use config::{DecodeConfig, DecodePolicy, LoaderConfig, SegmentConfig};
pub use decode::{LineDecoder, PositionDecoder, PvtDecoder, RowDecoder, RowReport};
pub use error::{LoadError, LoadResult};
pub use loader::{open_source, BufferLoader, LoadPhase, LoadSummary};
