//! Trajectory segment mapping and bounds-checked cell access

use crate::error::{ShmError, ShmResult};
use crate::header::{HEADER_SIZE, SegmentHeader, SlotState};
use crate::platform::{attach_segment_mmap, create_segment_mmap};
use memmap2::MmapMut;
use std::path::{Path, PathBuf};
use std::sync::atomic::{Ordering, fence};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use traj::consts::{CACHE_LINE_SIZE, FLOAT_CELL_SIZE, INT_CELL_SIZE, PAGE_SIZE};
use traj::layout::{LayoutError, LayoutParams};

/// How long `open_or_create` waits for a peer's header to land.
const ATTACH_SETTLE_TIMEOUT: Duration = Duration::from_millis(500);
const ATTACH_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Memory-mapped trajectory segment
///
/// Owns the mapping; cells are addressed by byte offsets produced by
/// [`traj::layout::ChannelMap`].
pub struct TrajectorySegment {
    path: Option<PathBuf>,
    layout: LayoutParams,
    mmap: MmapMut,
}

impl TrajectorySegment {
    /// Mapped size needed for `layout`, rounded up to a page.
    pub fn required_size(layout: &LayoutParams) -> usize {
        layout.data_end().div_ceil(PAGE_SIZE) * PAGE_SIZE
    }

    /// Create and initialize a new segment file.
    pub fn create(path: &Path, layout: LayoutParams) -> ShmResult<Self> {
        validate_layout(&layout)?;
        let size = Self::required_size(&layout);
        let mmap = create_segment_mmap(path, size)?;
        let segment = Self::initialize(Some(path.to_path_buf()), layout, mmap)?;
        info!(
            "Created trajectory segment {} ({} bytes, {} buffers × {} rows, {} axes)",
            path.display(),
            size,
            layout.buffer_count,
            layout.capacity,
            layout.num_axes
        );
        Ok(segment)
    }

    /// Attach to an existing segment, checking it was created for `layout`.
    pub fn attach(path: &Path, layout: LayoutParams) -> ShmResult<Self> {
        validate_layout(&layout)?;
        let mmap = attach_segment_mmap(path)?;
        validate_memory_alignment(mmap.as_ptr() as usize)?;

        let expected = Self::required_size(&layout);
        if mmap.len() < expected {
            return Err(ShmError::InvalidSize {
                size: mmap.len(),
                expected,
            });
        }

        let segment = Self {
            path: Some(path.to_path_buf()),
            layout,
            mmap,
        };
        let header = segment.header();
        if !header.is_magic_valid() {
            return Err(ShmError::InvalidMagic {
                path: path.to_path_buf(),
            });
        }
        if header.layout_hash != layout.layout_hash() || header.layout() != layout {
            return Err(ShmError::LayoutMismatch {
                expected: layout.layout_hash(),
                found: header.layout_hash,
            });
        }
        debug!("Attached trajectory segment {}", path.display());
        Ok(segment)
    }

    /// Attach when the file exists, create it otherwise.
    pub fn open_or_create(path: &Path, layout: LayoutParams) -> ShmResult<Self> {
        match Self::attach_settled(path, layout) {
            Err(ShmError::NotFound { .. }) => match Self::create(path, layout) {
                // Lost the creation race to another loader
                Err(ShmError::AlreadyExists { .. }) => Self::attach_settled(path, layout),
                other => other,
            },
            other => other,
        }
    }

    /// Attach, polling while the file is still being sized or initialized
    /// by the process that created it.
    fn attach_settled(path: &Path, layout: LayoutParams) -> ShmResult<Self> {
        let deadline = Instant::now() + ATTACH_SETTLE_TIMEOUT;
        loop {
            match Self::attach(path, layout) {
                Err(ShmError::InvalidMagic { .. } | ShmError::InvalidSize { .. })
                    if Instant::now() < deadline =>
                {
                    debug!("Segment {} not initialized yet, retrying", path.display());
                    thread::sleep(ATTACH_POLL_INTERVAL);
                }
                other => return other,
            }
        }
    }

    /// Process-private anonymous segment (tests, dry runs).
    pub fn anonymous(layout: LayoutParams) -> ShmResult<Self> {
        validate_layout(&layout)?;
        let mmap = MmapMut::map_anon(Self::required_size(&layout))?;
        Self::initialize(None, layout, mmap)
    }

    fn initialize(path: Option<PathBuf>, layout: LayoutParams, mut mmap: MmapMut) -> ShmResult<Self> {
        validate_memory_alignment(mmap.as_ptr() as usize)?;
        unsafe {
            std::ptr::write(
                mmap.as_mut_ptr() as *mut SegmentHeader,
                SegmentHeader::new(&layout),
            );
        }

        // Header must be visible before any reader validates it
        fence(Ordering::Release);

        Ok(Self { path, layout, mmap })
    }

    /// Segment file path, `None` for anonymous segments.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Layout the segment was mapped with.
    pub fn layout(&self) -> &LayoutParams {
        &self.layout
    }

    /// Mapped size in bytes.
    pub fn size(&self) -> usize {
        self.mmap.len()
    }

    /// Segment header.
    pub fn header(&self) -> &SegmentHeader {
        unsafe { &*(self.mmap.as_ptr() as *const SegmentHeader) }
    }

    /// Publication state of a buffer slot.
    pub fn slot(&self, buffer: usize) -> ShmResult<&SlotState> {
        if buffer >= self.layout.buffer_count {
            return Err(LayoutError::BufferOutOfRange {
                buffer,
                count: self.layout.buffer_count,
            }
            .into());
        }
        Ok(&self.header().slots[buffer])
    }

    /// Read an integer cell.
    pub fn read_i32(&self, offset: usize) -> ShmResult<i32> {
        let bytes = self.cell(offset, INT_CELL_SIZE)?;
        let mut raw = [0u8; INT_CELL_SIZE];
        raw.copy_from_slice(bytes);
        Ok(i32::from_ne_bytes(raw))
    }

    /// Read a floating-point cell.
    pub fn read_f64(&self, offset: usize) -> ShmResult<f64> {
        let bytes = self.cell(offset, FLOAT_CELL_SIZE)?;
        let mut raw = [0u8; FLOAT_CELL_SIZE];
        raw.copy_from_slice(bytes);
        Ok(f64::from_ne_bytes(raw))
    }

    /// Write an integer cell.
    pub(crate) fn write_i32(&mut self, offset: usize, value: i32) -> ShmResult<()> {
        self.cell_mut(offset, INT_CELL_SIZE)?
            .copy_from_slice(&value.to_ne_bytes());
        Ok(())
    }

    /// Write a floating-point cell.
    pub(crate) fn write_f64(&mut self, offset: usize, value: f64) -> ShmResult<()> {
        self.cell_mut(offset, FLOAT_CELL_SIZE)?
            .copy_from_slice(&value.to_ne_bytes());
        Ok(())
    }

    fn cell(&self, offset: usize, len: usize) -> ShmResult<&[u8]> {
        let size = self.mmap.len();
        self.check_cell(offset, len)?;
        self.mmap
            .get(offset..offset + len)
            .ok_or(ShmError::OutOfBounds { offset, len, size })
    }

    fn cell_mut(&mut self, offset: usize, len: usize) -> ShmResult<&mut [u8]> {
        let size = self.mmap.len();
        self.check_cell(offset, len)?;
        self.mmap
            .get_mut(offset..offset + len)
            .ok_or(ShmError::OutOfBounds { offset, len, size })
    }

    // Cells never overlap the header.
    fn check_cell(&self, offset: usize, len: usize) -> ShmResult<()> {
        if offset < self.layout.base_offset || offset.saturating_add(len) > self.layout.data_end() {
            return Err(ShmError::OutOfBounds {
                offset,
                len,
                size: self.mmap.len(),
            });
        }
        Ok(())
    }
}

/// Validate layout parameters and header room
pub fn validate_layout(layout: &LayoutParams) -> ShmResult<()> {
    layout.validate()?;
    if layout.base_offset < HEADER_SIZE {
        return Err(ShmError::HeaderOverlap {
            offset: layout.base_offset,
            header: HEADER_SIZE,
        });
    }
    Ok(())
}

/// Validate memory alignment
pub fn validate_memory_alignment(address: usize) -> ShmResult<()> {
    if address % CACHE_LINE_SIZE != 0 {
        return Err(ShmError::AlignmentError {
            address,
            alignment: CACHE_LINE_SIZE,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_layout() -> LayoutParams {
        LayoutParams {
            num_axes: 2,
            capacity: 4,
            buffer_count: 2,
            base_offset: 4000,
        }
    }

    #[test]
    fn required_size_is_page_rounded() {
        let layout = small_layout();
        let size = TrajectorySegment::required_size(&layout);
        assert_eq!(size % PAGE_SIZE, 0);
        assert!(size >= layout.data_end());
    }

    #[test]
    fn layout_must_leave_room_for_header() {
        let layout = LayoutParams {
            base_offset: 64,
            ..small_layout()
        };
        assert!(matches!(
            TrajectorySegment::anonymous(layout),
            Err(ShmError::HeaderOverlap { .. })
        ));
    }

    #[test]
    fn cell_roundtrip_and_bounds() {
        let mut segment = TrajectorySegment::anonymous(small_layout()).unwrap();
        segment.write_i32(4000, -7).unwrap();
        segment.write_f64(4008, 12.5).unwrap();
        assert_eq!(segment.read_i32(4000).unwrap(), -7);
        assert_eq!(segment.read_f64(4008).unwrap(), 12.5);

        // Header and tail are off limits.
        assert!(matches!(
            segment.write_i32(0, 1),
            Err(ShmError::OutOfBounds { .. })
        ));
        let end = segment.layout().data_end();
        assert!(matches!(
            segment.read_f64(end - 4),
            Err(ShmError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn file_segment_attach_checks_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traj_seg");
        let layout = small_layout();

        let created = TrajectorySegment::create(&path, layout).unwrap();
        assert_eq!(created.path(), Some(path.as_path()));

        let attached = TrajectorySegment::attach(&path, layout).unwrap();
        assert_eq!(attached.header().layout(), layout);

        let other = LayoutParams {
            num_axes: 3,
            ..layout
        };
        assert!(matches!(
            TrajectorySegment::attach(&path, other),
            Err(ShmError::LayoutMismatch { .. }) | Err(ShmError::InvalidSize { .. })
        ));
    }

    #[test]
    fn open_or_create_reuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traj_seg");
        let layout = small_layout();

        let mut first = TrajectorySegment::open_or_create(&path, layout).unwrap();
        first.write_f64(4008, 3.25).unwrap();

        let second = TrajectorySegment::open_or_create(&path, layout).unwrap();
        assert_eq!(second.read_f64(4008).unwrap(), 3.25);
    }

    #[test]
    fn open_or_create_waits_for_header_written_by_creator() {
        use std::os::unix::fs::FileExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traj_seg");
        let layout = small_layout();

        // Initialized image of the same layout, copied in by the "creator".
        let image_path = dir.path().join("image");
        TrajectorySegment::create(&image_path, layout).unwrap();
        let header = std::fs::read(&image_path).unwrap()[..HEADER_SIZE].to_vec();

        // Created and sized but header not yet written.
        std::fs::write(&path, vec![0u8; TrajectorySegment::required_size(&layout)]).unwrap();
        let target = path.clone();
        let creator = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            let file = std::fs::OpenOptions::new().write(true).open(&target).unwrap();
            file.write_all_at(&header, 0).unwrap();
        });

        let segment = TrajectorySegment::open_or_create(&path, layout).unwrap();
        creator.join().unwrap();
        assert!(segment.header().is_magic_valid());
        assert_eq!(segment.header().layout(), layout);
    }

    #[test]
    fn attach_rejects_foreign_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foreign");
        let layout = small_layout();
        std::fs::write(&path, vec![0u8; TrajectorySegment::required_size(&layout)]).unwrap();
        assert!(matches!(
            TrajectorySegment::attach(&path, layout),
            Err(ShmError::InvalidMagic { .. })
        ));
    }
}
