//! # Trajectory shared memory segment
//!
//! Fixed-layout, memory-mapped buffer slots filled by the CSV loader and
//! consumed by a real-time motion loop in another process.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────────────────┐    ┌─────────────────┐
//! │   Loader        │    │  Segment file            │    │   RT loop       │
//! │                 │    │                          │    │                 │
//! │ SlotWriter      ├───►│ [Header | A | B | C ...] ├───►│ TrajectoryReader│
//! │                 │    │ fill_count per slot      │    │                 │
//! └─────────────────┘    └──────────────────────────┘    └─────────────────┘
//! ```
//!
//! ## Ordering contract
//!
//! The writer stores every row cell before the slot's fill count (release);
//! the reader loads the fill count (acquire) before touching rows. A reload
//! first withdraws the count, so stale counts never cover rows being
//! rewritten.
//!
//! ```rust
//! use traj_shm::{LayoutParams, Packing, SlotWriter, TrajectoryReader, TrajectoryRow, TrajectorySegment};
//!
//! # fn main() -> Result<(), traj_shm::ShmError> {
//! let mut segment = TrajectorySegment::anonymous(LayoutParams::default())?;
//! {
//!     let mut writer = SlotWriter::acquire(&mut segment, 0, Packing::Position)?;
//!     writer.invalidate()?;
//!     writer.write_row(0, &TrajectoryRow::from_parts(None, Some(1), &[0.0; 8], &[]))?;
//!     writer.publish(1)?;
//! }
//! let reader = TrajectoryReader::new(&segment);
//! assert_eq!(reader.fill_count(0)?, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Thread Safety
//!
//! - **SlotWriter**: one per slot, enforced across processes by the slot guard
//! - **TrajectoryReader**: any number, never blocks the writer

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod header;
pub mod platform;
pub mod reader;
pub mod row;
pub mod segment;
pub mod writer;

pub use error::{ShmError, ShmResult};
pub use header::{HEADER_SIZE, SegmentHeader, SlotState, TRAJ_SHM_MAGIC};
pub use reader::{SlotSnapshot, TrajectoryReader};
pub use row::{AxisCells, TrajectoryRow};
pub use segment::TrajectorySegment;
pub use writer::SlotWriter;

pub use traj::layout::{ChannelMap, LayoutParams, Packing};
