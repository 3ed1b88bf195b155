//! Error types for trajectory segment operations

use std::path::PathBuf;
use thiserror::Error;
use traj::layout::LayoutError;

/// Errors that can occur while mapping, writing or reading a segment
#[derive(Error, Debug)]
pub enum ShmError {
    /// Segment file already exists
    #[error("Segment already exists: {}", path.display())]
    AlreadyExists {
        /// Segment path
        path: PathBuf,
    },

    /// Segment file not found
    #[error("Segment not found: {}", path.display())]
    NotFound {
        /// Segment path
        path: PathBuf,
    },

    /// Header magic does not identify a trajectory segment
    #[error("Invalid segment magic: {}", path.display())]
    InvalidMagic {
        /// Segment path
        path: PathBuf,
    },

    /// Segment was created with a different layout
    #[error("Layout mismatch: expected hash {expected:#010x}, segment has {found:#010x}")]
    LayoutMismatch {
        /// Hash of the requested layout
        expected: u32,
        /// Hash stored in the segment header
        found: u32,
    },

    /// Mapped size smaller than the layout requires
    #[error("Invalid segment size: {size} bytes (layout needs {expected})")]
    InvalidSize {
        /// Mapped size in bytes
        size: usize,
        /// Required size in bytes
        expected: usize,
    },

    /// Base offset leaves no room for the segment header
    #[error("Base offset {offset} overlaps the {header}-byte segment header")]
    HeaderOverlap {
        /// Configured base offset
        offset: usize,
        /// Header size
        header: usize,
    },

    /// Memory alignment error
    #[error("Memory alignment error: address {address:#x} not aligned to {alignment}")]
    AlignmentError {
        /// Memory address
        address: usize,
        /// Required alignment
        alignment: usize,
    },

    /// Address calculation failed
    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),

    /// Cell access outside the mapping
    #[error("Access out of bounds: {len} bytes at {offset} (segment {size} bytes)")]
    OutOfBounds {
        /// Byte offset
        offset: usize,
        /// Access width
        len: usize,
        /// Mapped size
        size: usize,
    },

    /// Another live process holds the slot's writer guard
    #[error("Buffer {buffer} is being written by process {pid}")]
    SlotBusy {
        /// Buffer index
        buffer: usize,
        /// Owning process
        pid: u32,
    },

    /// Row is at or beyond the published fill count
    #[error("Row {row} not published (fill count {fill_count})")]
    RowNotPublished {
        /// Requested row
        row: usize,
        /// Published fill count
        fill_count: usize,
    },

    /// Slot is being reloaded
    #[error("Buffer {buffer} is being reloaded")]
    LoadInProgress {
        /// Buffer index
        buffer: usize,
    },

    /// Slot changed underneath a multi-row read
    #[error("Version conflict detected - retry recommended")]
    VersionConflict,

    /// IO error
    #[error("IO error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },
}

/// Result type for segment operations
pub type ShmResult<T> = Result<T, ShmError>;
