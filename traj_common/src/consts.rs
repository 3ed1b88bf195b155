//! System-wide constants for the trajectory loader workspace.
//!
//! Single source of truth for numeric limits and layout defaults.
//! Imported by all crates.

/// Maximum number of axes a row can carry.
pub const MAX_AXES: usize = 64;

/// Maximum number of buffer slots in one segment.
pub const MAX_BUFFERS: usize = 8;

/// Default number of axes per row.
pub const DEFAULT_NUM_AXES: usize = 8;

/// Default rows per buffer slot.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Default number of buffer slots (A, B, C).
pub const DEFAULT_BUFFER_COUNT: usize = 3;

/// Default byte offset of buffer 0 inside the segment.
pub const DEFAULT_BASE_OFFSET: usize = 4000;

/// Default segment file path.
pub const DEFAULT_SEGMENT_PATH: &str = "/dev/shm/traj_ushm";

/// Default loader configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/traj_loader.toml";

/// Size of an integer cell (time, user) in bytes.
pub const INT_CELL_SIZE: usize = core::mem::size_of::<i32>();

/// Size of a floating-point cell (position, velocity) in bytes.
pub const FLOAT_CELL_SIZE: usize = core::mem::size_of::<f64>();

/// Integer cells at the head of every row (time, user).
pub const INT_CELLS_PER_ROW: usize = 2;

/// Page granularity used when sizing a segment file.
pub const PAGE_SIZE: usize = 4096;

/// Cache line size; the segment header is aligned to it.
pub const CACHE_LINE_SIZE: usize = 64;
