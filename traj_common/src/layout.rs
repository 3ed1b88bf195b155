//! Trajectory buffer layout and address calculation.
//!
//! A segment holds `buffer_count` disjoint buffer slots starting at
//! `base_offset`. Every slot holds `capacity` rows; a row is an integer head
//! (`time: i32`, `user: i32`) followed by `f64` cells whose count depends on
//! the [`Packing`]:
//!
//! ```text
//! PVT      | time | user | pos[0..N] | vel[0..N] |   row stride = 8 + 16·N
//! Position | ---- | user | pos[0..N] |               row stride = 8 +  8·N
//! ```
//!
//! The integer and float channels are two views over the same bytes with
//! different element sizes, so every channel exposes both an element index
//! (in units of its own cell size) and a byte offset.

use crate::consts::{
    FLOAT_CELL_SIZE, INT_CELL_SIZE, INT_CELLS_PER_ROW, MAX_AXES, MAX_BUFFERS,
};
use serde::{Deserialize, Serialize};
use static_assertions::const_assert_eq;
use std::fmt;
use std::ops::Range;
use thiserror::Error;

/// Upper bound on the bytes a layout may address (1 GiB).
pub const LAYOUT_MAX_BYTES: usize = 1 << 30;

const_assert_eq!(INT_CELLS_PER_ROW * INT_CELL_SIZE, FLOAT_CELL_SIZE);

/// Layout errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// Axis count is zero or above [`MAX_AXES`].
    #[error("invalid axis count {num_axes} (must be 1..={max})")]
    AxisCount {
        /// Requested axis count.
        num_axes: usize,
        /// Upper bound.
        max: usize,
    },

    /// Capacity is zero.
    #[error("buffer capacity must be at least one row")]
    ZeroCapacity,

    /// Buffer count is zero or above [`MAX_BUFFERS`].
    #[error("invalid buffer count {count} (must be 1..={max})")]
    BufferCount {
        /// Requested buffer count.
        count: usize,
        /// Upper bound.
        max: usize,
    },

    /// Base offset does not sit on a float cell boundary.
    #[error("base offset {offset} is not aligned to {align} bytes")]
    MisalignedBase {
        /// Requested offset.
        offset: usize,
        /// Required alignment.
        align: usize,
    },

    /// Layout would address more than [`LAYOUT_MAX_BYTES`].
    #[error("layout too large: exceeds {max} bytes")]
    TooLarge {
        /// Upper bound.
        max: usize,
    },

    /// Buffer index outside the configured slots.
    #[error("buffer index {buffer} out of range (buffer count {count})")]
    BufferOutOfRange {
        /// Requested buffer.
        buffer: usize,
        /// Configured count.
        count: usize,
    },

    /// Row index at or beyond capacity.
    #[error("row {row} out of range (capacity {capacity})")]
    RowOutOfRange {
        /// Requested row.
        row: usize,
        /// Rows per buffer.
        capacity: usize,
    },

    /// Axis index at or beyond the configured axis count.
    #[error("axis {axis} out of range ({num_axes} axes)")]
    AxisOutOfRange {
        /// Requested axis.
        axis: usize,
        /// Configured axis count.
        num_axes: usize,
    },

    /// The channel is not part of rows in this packing.
    #[error("{packing} rows carry no {channel} channel")]
    ChannelAbsent {
        /// Channel name.
        channel: &'static str,
        /// Active packing.
        packing: Packing,
    },
}

/// Row packing mode, selected once per load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Packing {
    /// Time, user, per-axis position and per-axis velocity.
    Pvt = 0,
    /// User and per-axis position, packed point-wise.
    Position = 1,
}

impl Packing {
    /// Convert from the raw profile selector. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Pvt),
            1 => Some(Self::Position),
            _ => None,
        }
    }

    /// Whether rows carry a time cell.
    #[inline]
    pub const fn has_time(self) -> bool {
        matches!(self, Self::Pvt)
    }

    /// Whether rows carry velocity cells.
    #[inline]
    pub const fn has_velocities(self) -> bool {
        matches!(self, Self::Pvt)
    }

    /// Float cells per axis in one row.
    #[inline]
    pub const fn float_cells_per_axis(self) -> usize {
        match self {
            Self::Pvt => 2,
            Self::Position => 1,
        }
    }

    /// CSV fields a complete row carries.
    #[inline]
    pub const fn fields_per_row(self, num_axes: usize) -> usize {
        match self {
            Self::Pvt => 2 + 2 * num_axes,
            Self::Position => 1 + num_axes,
        }
    }
}

impl fmt::Display for Packing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pvt => f.write_str("PVT"),
            Self::Position => f.write_str("position"),
        }
    }
}

/// Layout parameters shared by the loader and the real-time reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutParams {
    /// Axes per row.
    pub num_axes: usize,
    /// Rows per buffer slot.
    pub capacity: usize,
    /// Number of buffer slots.
    pub buffer_count: usize,
    /// Byte offset of buffer 0 from the segment start.
    pub base_offset: usize,
}

impl Default for LayoutParams {
    fn default() -> Self {
        use crate::consts::{
            DEFAULT_BASE_OFFSET, DEFAULT_BUFFER_COUNT, DEFAULT_CAPACITY, DEFAULT_NUM_AXES,
        };
        Self {
            num_axes: DEFAULT_NUM_AXES,
            capacity: DEFAULT_CAPACITY,
            buffer_count: DEFAULT_BUFFER_COUNT,
            base_offset: DEFAULT_BASE_OFFSET,
        }
    }
}

impl LayoutParams {
    /// Check bounds, alignment and total size.
    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.num_axes == 0 || self.num_axes > MAX_AXES {
            return Err(LayoutError::AxisCount {
                num_axes: self.num_axes,
                max: MAX_AXES,
            });
        }
        if self.capacity == 0 {
            return Err(LayoutError::ZeroCapacity);
        }
        if self.buffer_count == 0 || self.buffer_count > MAX_BUFFERS {
            return Err(LayoutError::BufferCount {
                count: self.buffer_count,
                max: MAX_BUFFERS,
            });
        }
        if self.base_offset % FLOAT_CELL_SIZE != 0 {
            return Err(LayoutError::MisalignedBase {
                offset: self.base_offset,
                align: FLOAT_CELL_SIZE,
            });
        }
        let end = self
            .capacity
            .checked_mul(self.row_stride(Packing::Pvt))
            .and_then(|stride| stride.checked_mul(self.buffer_count))
            .and_then(|bytes| bytes.checked_add(self.base_offset));
        match end {
            Some(end) if end <= LAYOUT_MAX_BYTES => Ok(()),
            _ => Err(LayoutError::TooLarge {
                max: LAYOUT_MAX_BYTES,
            }),
        }
    }

    /// Bytes from one row to the next.
    #[inline]
    pub const fn row_stride(&self, packing: Packing) -> usize {
        INT_CELLS_PER_ROW * INT_CELL_SIZE
            + packing.float_cells_per_axis() * self.num_axes * FLOAT_CELL_SIZE
    }

    /// Bytes from one buffer slot to the next.
    ///
    /// Sized for the wider PVT packing whatever a slot holds, so slots keep
    /// fixed bases when neighbours are loaded with different packings.
    #[inline]
    pub const fn buffer_stride(&self) -> usize {
        self.capacity * self.row_stride(Packing::Pvt)
    }

    /// End of the addressable trajectory area.
    #[inline]
    pub const fn data_end(&self) -> usize {
        self.base_offset + self.buffer_count * self.buffer_stride()
    }

    /// Byte range of a buffer slot's rows under `packing`.
    pub fn region(&self, buffer: usize, packing: Packing) -> Result<Range<usize>, LayoutError> {
        self.check_buffer(buffer)?;
        let start = self.base_offset + buffer * self.buffer_stride();
        Ok(start..start + self.capacity * self.row_stride(packing))
    }

    /// Channel bases and strides of a buffer slot.
    pub fn channels(&self, buffer: usize, packing: Packing) -> Result<ChannelMap, LayoutError> {
        let region = self.region(buffer, packing)?;
        let row_stride = self.row_stride(packing);
        Ok(ChannelMap {
            packing,
            num_axes: self.num_axes,
            capacity: self.capacity,
            region_start: region.start,
            row_stride,
            int_base: region.start / INT_CELL_SIZE,
            float_base: (region.start / INT_CELL_SIZE + INT_CELLS_PER_ROW)
                / (FLOAT_CELL_SIZE / INT_CELL_SIZE),
            int_stride: row_stride / INT_CELL_SIZE,
            float_stride: row_stride / FLOAT_CELL_SIZE,
        })
    }

    /// Hash identifying the layout; readers refuse segments that disagree.
    pub const fn layout_hash(&self) -> u32 {
        let mut h = 0x811C_9DC5u32;
        h = (h ^ self.num_axes as u32).wrapping_mul(0x0100_0193);
        h = (h ^ self.capacity as u32).wrapping_mul(0x0100_0193);
        h = (h ^ self.buffer_count as u32).wrapping_mul(0x0100_0193);
        h = (h ^ self.base_offset as u32).wrapping_mul(0x0100_0193);
        h
    }

    fn check_buffer(&self, buffer: usize) -> Result<(), LayoutError> {
        if buffer >= self.buffer_count {
            return Err(LayoutError::BufferOutOfRange {
                buffer,
                count: self.buffer_count,
            });
        }
        Ok(())
    }
}

/// Resolved addresses for one buffer slot under one packing.
///
/// Element indices are counted from the segment start in units of the
/// channel's own cell size (4 bytes for the integer channel, 8 bytes for the
/// float channel). Strides advance a channel by one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMap {
    packing: Packing,
    num_axes: usize,
    capacity: usize,
    region_start: usize,
    row_stride: usize,
    int_base: usize,
    float_base: usize,
    int_stride: usize,
    float_stride: usize,
}

impl ChannelMap {
    /// Packing this map was computed for.
    pub const fn packing(&self) -> Packing {
        self.packing
    }

    /// Axes per row.
    pub const fn num_axes(&self) -> usize {
        self.num_axes
    }

    /// Rows in the slot.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Byte range covered by the slot.
    pub const fn region(&self) -> Range<usize> {
        self.region_start..self.region_start + self.capacity * self.row_stride
    }

    /// Bytes per row.
    pub const fn row_stride(&self) -> usize {
        self.row_stride
    }

    /// Integer channel base (element index of row 0's time cell).
    pub const fn int_base(&self) -> usize {
        self.int_base
    }

    /// Integer channel stride in 4-byte elements.
    pub const fn int_stride(&self) -> usize {
        self.int_stride
    }

    /// Float channel stride in 8-byte elements.
    pub const fn float_stride(&self) -> usize {
        self.float_stride
    }

    /// Element index of row 0's position cell for `axis`.
    pub fn position_channel(&self, axis: usize) -> Result<usize, LayoutError> {
        self.check_axis(axis)?;
        Ok(self.float_base + axis)
    }

    /// Element index of row 0's velocity cell for `axis`.
    pub fn velocity_channel(&self, axis: usize) -> Result<usize, LayoutError> {
        self.require(self.packing.has_velocities(), "velocity")?;
        self.check_axis(axis)?;
        Ok(self.float_base + self.num_axes + axis)
    }

    /// Byte offset of the time cell of `row`.
    pub fn time_offset(&self, row: usize) -> Result<usize, LayoutError> {
        self.require(self.packing.has_time(), "time")?;
        self.check_row(row)?;
        Ok((self.int_base + row * self.int_stride) * INT_CELL_SIZE)
    }

    /// Byte offset of the user cell of `row`.
    pub fn user_offset(&self, row: usize) -> Result<usize, LayoutError> {
        self.check_row(row)?;
        Ok((self.int_base + 1 + row * self.int_stride) * INT_CELL_SIZE)
    }

    /// Byte offset of the position cell of `row` and `axis`.
    pub fn position_offset(&self, row: usize, axis: usize) -> Result<usize, LayoutError> {
        let channel = self.position_channel(axis)?;
        self.check_row(row)?;
        Ok((channel + row * self.float_stride) * FLOAT_CELL_SIZE)
    }

    /// Byte offset of the velocity cell of `row` and `axis`.
    pub fn velocity_offset(&self, row: usize, axis: usize) -> Result<usize, LayoutError> {
        let channel = self.velocity_channel(axis)?;
        self.check_row(row)?;
        Ok((channel + row * self.float_stride) * FLOAT_CELL_SIZE)
    }

    fn require(&self, present: bool, channel: &'static str) -> Result<(), LayoutError> {
        if present {
            Ok(())
        } else {
            Err(LayoutError::ChannelAbsent {
                channel,
                packing: self.packing,
            })
        }
    }

    fn check_row(&self, row: usize) -> Result<(), LayoutError> {
        if row >= self.capacity {
            return Err(LayoutError::RowOutOfRange {
                row,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    fn check_axis(&self, axis: usize) -> Result<(), LayoutError> {
        if axis >= self.num_axes {
            return Err(LayoutError::AxisOutOfRange {
                axis,
                num_axes: self.num_axes,
            });
        }
        Ok(())
    }
}
