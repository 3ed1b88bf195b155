//! Segment header and per-slot publication state.
//!
//! The header sits at offset 0, below the trajectory area. Each buffer slot
//! owns one cache line of atomics:
//!
//! ```text
//! fill_count  rows the consumer may read (release store, acquire load)
//! packing     packing tag the rows were written with
//! writer_pid  slot guard, 0 = free
//! generation  odd = reload in progress, even = stable
//! ```

use static_assertions::const_assert_eq;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use traj::consts::{CACHE_LINE_SIZE, DEFAULT_BASE_OFFSET, MAX_BUFFERS};
use traj::layout::{LayoutParams, Packing};

/// Magic bytes identifying a trajectory segment: `"TRAJSHM\0"`.
pub const TRAJ_SHM_MAGIC: [u8; 8] = *b"TRAJSHM\0";

/// Packing tag of a slot that was never loaded.
pub const PACKING_NONE: u32 = u32::MAX;

/// Publication state of one buffer slot (one cache line).
#[repr(C, align(64))]
pub struct SlotState {
    /// Number of valid rows.
    pub fill_count: AtomicU32,
    /// [`Packing`] discriminant of the published rows, or [`PACKING_NONE`].
    pub packing: AtomicU32,
    /// PID of the loader currently writing the slot, 0 when free.
    pub writer_pid: AtomicU32,
    _reserved: u32,
    /// Reload counter: odd while rows are being rewritten.
    pub generation: AtomicU64,
    _padding: [u8; 40],
}

const_assert_eq!(core::mem::size_of::<SlotState>(), CACHE_LINE_SIZE);

impl SlotState {
    fn new() -> Self {
        Self {
            fill_count: AtomicU32::new(0),
            packing: AtomicU32::new(PACKING_NONE),
            writer_pid: AtomicU32::new(0),
            _reserved: 0,
            generation: AtomicU64::new(0),
            _padding: [0; 40],
        }
    }

    /// Packing of the published rows.
    pub fn packing(&self) -> Option<Packing> {
        u8::try_from(self.packing.load(Ordering::Acquire))
            .ok()
            .and_then(Packing::from_u8)
    }
}

/// Segment header, 64-byte aligned.
#[repr(C, align(64))]
pub struct SegmentHeader {
    /// Magic bytes: must be [`TRAJ_SHM_MAGIC`].
    pub magic: [u8; 8],
    /// [`LayoutParams::layout_hash`] of the creating layout.
    pub layout_hash: u32,
    /// Axes per row.
    pub num_axes: u32,
    /// Rows per buffer.
    pub capacity: u32,
    /// Number of buffer slots.
    pub buffer_count: u32,
    /// Byte offset of buffer 0.
    pub base_offset: u64,
    _padding: [u8; 32],
    /// Per-slot publication state.
    pub slots: [SlotState; MAX_BUFFERS],
}

const_assert_eq!(
    core::mem::size_of::<SegmentHeader>(),
    CACHE_LINE_SIZE * (1 + MAX_BUFFERS)
);
const_assert_eq!(core::mem::align_of::<SegmentHeader>(), CACHE_LINE_SIZE);
static_assertions::const_assert!(core::mem::size_of::<SegmentHeader>() <= DEFAULT_BASE_OFFSET);

/// Size of the header in bytes.
pub const HEADER_SIZE: usize = core::mem::size_of::<SegmentHeader>();

impl SegmentHeader {
    /// Fresh header describing `layout`.
    pub fn new(layout: &LayoutParams) -> Self {
        Self {
            magic: TRAJ_SHM_MAGIC,
            layout_hash: layout.layout_hash(),
            num_axes: layout.num_axes as u32,
            capacity: layout.capacity as u32,
            buffer_count: layout.buffer_count as u32,
            base_offset: layout.base_offset as u64,
            _padding: [0; 32],
            slots: std::array::from_fn(|_| SlotState::new()),
        }
    }

    /// Validate the magic bytes.
    #[inline]
    pub fn is_magic_valid(&self) -> bool {
        self.magic == TRAJ_SHM_MAGIC
    }

    /// Layout recorded in the header.
    pub fn layout(&self) -> LayoutParams {
        LayoutParams {
            num_axes: self.num_axes as usize,
            capacity: self.capacity as usize,
            buffer_count: self.buffer_count as usize,
            base_offset: self.base_offset as usize,
        }
    }
}

/// Whether a generation value denotes a stable slot.
#[inline]
pub const fn is_stable(generation: u64) -> bool {
    generation % 2 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_size_and_alignment() {
        assert_eq!(HEADER_SIZE, 64 * (1 + MAX_BUFFERS));
        assert_eq!(core::mem::align_of::<SegmentHeader>(), 64);
    }

    #[test]
    fn new_header_records_layout() {
        let layout = LayoutParams::default();
        let header = SegmentHeader::new(&layout);
        assert!(header.is_magic_valid());
        assert_eq!(header.layout(), layout);
        assert_eq!(header.layout_hash, layout.layout_hash());
        for slot in &header.slots {
            assert_eq!(slot.fill_count.load(Ordering::Relaxed), 0);
            assert_eq!(slot.packing(), None);
            assert!(is_stable(slot.generation.load(Ordering::Relaxed)));
        }
    }

    #[test]
    fn packing_tag_decodes() {
        let header = SegmentHeader::new(&LayoutParams::default());
        header.slots[0]
            .packing
            .store(Packing::Position as u32, Ordering::Release);
        assert_eq!(header.slots[0].packing(), Some(Packing::Position));
    }

    #[test]
    fn generation_parity() {
        assert!(is_stable(0));
        assert!(is_stable(2));
        assert!(!is_stable(1));
        assert!(!is_stable(99));
    }
}
