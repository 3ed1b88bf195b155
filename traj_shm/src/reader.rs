//! Consumer-side read contract
//!
//! The real-time loop loads a slot's fill count with acquire ordering and
//! only then trusts rows below it. [`TrajectoryReader::read_rows`] adds a
//! generation check around the copy so a reload racing the read is reported
//! instead of returning mixed rows.

use crate::error::{ShmError, ShmResult};
use crate::header::is_stable;
use crate::row::TrajectoryRow;
use crate::segment::TrajectorySegment;
use std::sync::atomic::{Ordering, fence};
use traj::layout::Packing;

const MAX_READ_RETRIES: usize = 10;

/// Published state of one buffer slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSnapshot {
    /// Packing of the published rows, `None` if never loaded.
    pub packing: Option<Packing>,
    /// Rows the consumer may read.
    pub fill_count: usize,
    /// Stable generation the snapshot was taken at.
    pub generation: u64,
}

/// Lock-free reader over a mapped segment
pub struct TrajectoryReader<'a> {
    segment: &'a TrajectorySegment,
}

impl<'a> TrajectoryReader<'a> {
    /// Reader over `segment`.
    pub fn new(segment: &'a TrajectorySegment) -> Self {
        Self { segment }
    }

    /// Published row count (acquire).
    pub fn fill_count(&self, buffer: usize) -> ShmResult<usize> {
        Ok(self
            .segment
            .slot(buffer)?
            .fill_count
            .load(Ordering::Acquire) as usize)
    }

    /// Packing, count and generation of a slot.
    ///
    /// Fails with [`ShmError::LoadInProgress`] while a loader holds the slot
    /// invalidated.
    pub fn snapshot(&self, buffer: usize) -> ShmResult<SlotSnapshot> {
        let slot = self.segment.slot(buffer)?;
        let generation = slot.generation.load(Ordering::Acquire);
        if !is_stable(generation) {
            return Err(ShmError::LoadInProgress { buffer });
        }
        Ok(SlotSnapshot {
            packing: slot.packing(),
            fill_count: slot.fill_count.load(Ordering::Acquire) as usize,
            generation,
        })
    }

    /// Read one published row.
    pub fn read_row(&self, buffer: usize, row: usize) -> ShmResult<TrajectoryRow> {
        let fill_count = self.fill_count(buffer)?;
        if row >= fill_count {
            return Err(ShmError::RowNotPublished { row, fill_count });
        }
        let packing = self
            .segment
            .slot(buffer)?
            .packing()
            .ok_or(ShmError::RowNotPublished { row, fill_count: 0 })?;
        self.read_cells(buffer, packing, row)
    }

    /// Copy every published row of a slot, retrying if a reload interleaves.
    pub fn read_rows(&self, buffer: usize) -> ShmResult<Vec<TrajectoryRow>> {
        for _attempt in 0..MAX_READ_RETRIES {
            let before = match self.snapshot(buffer) {
                Ok(snapshot) => snapshot,
                Err(ShmError::LoadInProgress { .. }) => {
                    std::thread::yield_now();
                    continue;
                }
                Err(e) => return Err(e),
            };
            let Some(packing) = before.packing else {
                return Ok(Vec::new());
            };

            let mut rows = Vec::with_capacity(before.fill_count);
            for row in 0..before.fill_count {
                rows.push(self.read_cells(buffer, packing, row)?);
            }

            fence(Ordering::Acquire);

            let after = self.segment.slot(buffer)?.generation.load(Ordering::Acquire);
            if after == before.generation {
                return Ok(rows);
            }
            std::thread::yield_now();
        }
        Err(ShmError::VersionConflict)
    }

    fn read_cells(&self, buffer: usize, packing: Packing, row: usize) -> ShmResult<TrajectoryRow> {
        let map = self.segment.layout().channels(buffer, packing)?;
        let mut out = TrajectoryRow::default();
        if packing.has_time() {
            out.time = Some(self.segment.read_i32(map.time_offset(row)?)?);
        }
        out.user = Some(self.segment.read_i32(map.user_offset(row)?)?);
        for axis in 0..map.num_axes() {
            let _ = out
                .positions
                .push(self.segment.read_f64(map.position_offset(row, axis)?)?);
            if packing.has_velocities() {
                let _ = out
                    .velocities
                    .push(self.segment.read_f64(map.velocity_offset(row, axis)?)?);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::SlotWriter;
    use traj::layout::LayoutParams;

    fn segment() -> TrajectorySegment {
        TrajectorySegment::anonymous(LayoutParams {
            num_axes: 2,
            capacity: 3,
            buffer_count: 2,
            base_offset: 4000,
        })
        .unwrap()
    }

    #[test]
    fn unloaded_slot_reads_empty() {
        let seg = segment();
        let reader = TrajectoryReader::new(&seg);
        assert_eq!(reader.fill_count(0).unwrap(), 0);
        assert!(reader.read_rows(0).unwrap().is_empty());
        assert!(matches!(
            reader.read_row(0, 0),
            Err(ShmError::RowNotPublished { .. })
        ));
    }

    #[test]
    fn rows_beyond_fill_count_are_refused() {
        let mut seg = segment();
        {
            let mut writer = SlotWriter::acquire(&mut seg, 0, Packing::Position).unwrap();
            writer.invalidate().unwrap();
            let row = TrajectoryRow::from_parts(None, Some(4), &[1.5, -2.5], &[]);
            writer.write_row(0, &row).unwrap();
            writer.publish(1).unwrap();
        }
        let reader = TrajectoryReader::new(&seg);
        let row = reader.read_row(0, 0).unwrap();
        assert_eq!(row.time, None);
        assert_eq!(row.user, Some(4));
        assert_eq!(row.positions.as_slice(), &[1.5, -2.5]);
        assert!(row.velocities.is_empty());
        assert!(matches!(
            reader.read_row(0, 1),
            Err(ShmError::RowNotPublished {
                row: 1,
                fill_count: 1
            })
        ));
    }

    #[test]
    fn invalidated_slot_reports_load_in_progress() {
        let mut seg = segment();
        let mut writer = SlotWriter::acquire(&mut seg, 1, Packing::Pvt).unwrap();
        writer.invalidate().unwrap();
        drop(writer);

        let reader = TrajectoryReader::new(&seg);
        assert!(matches!(
            reader.snapshot(1),
            Err(ShmError::LoadInProgress { buffer: 1 })
        ));
        assert!(matches!(
            reader.read_rows(1),
            Err(ShmError::VersionConflict)
        ));
    }
}
