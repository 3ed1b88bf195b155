//! Single-slot writer with exclusive ownership and ordered publication
//!
//! Protocol for one reload of a buffer slot:
//!
//! 1. claim the slot guard (`writer_pid` 0 → own PID)
//! 2. [`SlotWriter::invalidate`]: fill count → 0, generation → odd
//! 3. [`SlotWriter::write_row`] for every decoded row
//! 4. [`SlotWriter::publish`]: packing tag, fill count (release), generation → even
//!
//! The guard is released on drop, whether or not the slot was published.

use crate::error::{ShmError, ShmResult};
use crate::header::{SlotState, is_stable};
use crate::platform::{get_current_pid, is_process_alive};
use crate::row::TrajectoryRow;
use crate::segment::TrajectorySegment;
use std::sync::atomic::{Ordering, fence};
use tracing::{debug, info, warn};
use traj::layout::{ChannelMap, LayoutError, Packing};

/// Exclusive writer for one buffer slot
pub struct SlotWriter<'a> {
    segment: &'a mut TrajectorySegment,
    buffer: usize,
    map: ChannelMap,
    writer_pid: u32,
}

impl<'a> SlotWriter<'a> {
    /// Claim `buffer` for writing rows packed as `packing`.
    ///
    /// Fails with [`ShmError::SlotBusy`] while another live process holds
    /// the slot. A guard left behind by a dead process is reclaimed.
    pub fn acquire(
        segment: &'a mut TrajectorySegment,
        buffer: usize,
        packing: Packing,
    ) -> ShmResult<Self> {
        let map = segment.layout().channels(buffer, packing)?;
        let writer_pid = get_current_pid();
        claim_slot(segment.slot(buffer)?, buffer, writer_pid)?;
        debug!("Buffer {buffer} claimed by pid {writer_pid}");

        Ok(Self {
            segment,
            buffer,
            map,
            writer_pid,
        })
    }

    /// Buffer index being written.
    pub fn buffer(&self) -> usize {
        self.buffer
    }

    /// Channel map of the slot.
    pub fn channels(&self) -> &ChannelMap {
        &self.map
    }

    /// Rows the slot can hold.
    pub fn capacity(&self) -> usize {
        self.map.capacity()
    }

    /// Withdraw the published rows before overwriting them.
    pub fn invalidate(&mut self) -> ShmResult<()> {
        let slot = self.segment.slot(self.buffer)?;
        slot.fill_count.store(0, Ordering::Release);
        let generation = slot.generation.load(Ordering::Acquire);
        if is_stable(generation) {
            slot.generation.store(generation + 1, Ordering::Release);
        }

        // Row writes must not become visible before the withdrawal
        fence(Ordering::Release);
        Ok(())
    }

    /// Write the fields present in `row` at row index `index`.
    pub fn write_row(&mut self, index: usize, row: &TrajectoryRow) -> ShmResult<()> {
        let map = self.map;

        if let Some(time) = row.time {
            let offset = map.time_offset(index)?;
            self.segment.write_i32(offset, time)?;
        }
        if let Some(user) = row.user {
            let offset = map.user_offset(index)?;
            self.segment.write_i32(offset, user)?;
        }
        for (axis, &position) in row.positions.iter().enumerate() {
            let offset = map.position_offset(index, axis)?;
            self.segment.write_f64(offset, position)?;
        }
        for (axis, &velocity) in row.velocities.iter().enumerate() {
            let offset = map.velocity_offset(index, axis)?;
            self.segment.write_f64(offset, velocity)?;
        }
        Ok(())
    }

    /// Publish `fill_count` rows. Must be the last operation on the slot.
    ///
    /// Returns the new (even) generation.
    pub fn publish(self, fill_count: usize) -> ShmResult<u64> {
        if fill_count > self.map.capacity() {
            return Err(LayoutError::RowOutOfRange {
                row: fill_count,
                capacity: self.map.capacity(),
            }
            .into());
        }

        // All row cells before the count
        fence(Ordering::Release);

        let slot = self.segment.slot(self.buffer)?;
        slot.packing
            .store(self.map.packing() as u32, Ordering::Release);
        slot.fill_count.store(fill_count as u32, Ordering::Release);

        let generation = slot.generation.load(Ordering::Acquire);
        let published = if is_stable(generation) {
            generation + 2
        } else {
            generation + 1
        };
        slot.generation.store(published, Ordering::Release);

        info!(
            "Published buffer {}: {} rows ({} packing, generation {})",
            self.buffer,
            fill_count,
            self.map.packing(),
            published
        );
        Ok(published)
    }
}

impl Drop for SlotWriter<'_> {
    fn drop(&mut self) {
        if let Ok(slot) = self.segment.slot(self.buffer) {
            let _ = slot.writer_pid.compare_exchange(
                self.writer_pid,
                0,
                Ordering::Release,
                Ordering::Relaxed,
            );
        }
    }
}

fn claim_slot(slot: &SlotState, buffer: usize, pid: u32) -> ShmResult<()> {
    match slot
        .writer_pid
        .compare_exchange(0, pid, Ordering::AcqRel, Ordering::Acquire)
    {
        Ok(_) => Ok(()),
        Err(owner) if owner != pid && !is_process_alive(owner) => {
            warn!("Reclaiming buffer {buffer} from dead writer pid {owner}");
            slot.writer_pid
                .compare_exchange(owner, pid, Ordering::AcqRel, Ordering::Acquire)
                .map(|_| ())
                .map_err(|pid| ShmError::SlotBusy { buffer, pid })
        }
        Err(owner) => Err(ShmError::SlotBusy { buffer, pid: owner }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use traj::layout::LayoutParams;

    fn segment() -> TrajectorySegment {
        TrajectorySegment::anonymous(LayoutParams {
            num_axes: 2,
            capacity: 4,
            buffer_count: 2,
            base_offset: 4000,
        })
        .unwrap()
    }

    #[test]
    fn publish_sets_count_packing_and_generation() {
        let mut seg = segment();
        {
            let mut writer = SlotWriter::acquire(&mut seg, 1, Packing::Pvt).unwrap();
            writer.invalidate().unwrap();
            let row = TrajectoryRow::from_parts(Some(5), Some(2), &[1.0, 2.0], &[0.1, 0.2]);
            writer.write_row(0, &row).unwrap();
            assert_eq!(writer.publish(1).unwrap(), 2);
        }
        let slot = seg.slot(1).unwrap();
        assert_eq!(slot.fill_count.load(Ordering::Acquire), 1);
        assert_eq!(slot.packing(), Some(Packing::Pvt));
        assert_eq!(slot.writer_pid.load(Ordering::Acquire), 0);
    }

    #[test]
    fn invalidate_withdraws_previous_rows() {
        let mut seg = segment();
        SlotWriter::acquire(&mut seg, 0, Packing::Position)
            .unwrap()
            .publish(3)
            .unwrap();

        let mut writer = SlotWriter::acquire(&mut seg, 0, Packing::Position).unwrap();
        writer.invalidate().unwrap();
        drop(writer);

        let slot = seg.slot(0).unwrap();
        assert_eq!(slot.fill_count.load(Ordering::Acquire), 0);
        assert!(!is_stable(slot.generation.load(Ordering::Acquire)));
    }

    #[test]
    fn abandoned_reload_publishes_even_generation() {
        let mut seg = segment();
        let mut writer = SlotWriter::acquire(&mut seg, 0, Packing::Pvt).unwrap();
        writer.invalidate().unwrap();
        drop(writer);

        let mut writer = SlotWriter::acquire(&mut seg, 0, Packing::Pvt).unwrap();
        writer.invalidate().unwrap();
        let generation = writer.publish(0).unwrap();
        assert!(is_stable(generation));
        assert_eq!(generation, 2);
    }

    #[test]
    fn held_slot_is_busy() {
        let mut seg = segment();
        seg.slot(0)
            .unwrap()
            .writer_pid
            .store(get_current_pid(), Ordering::Release);
        assert!(matches!(
            SlotWriter::acquire(&mut seg, 0, Packing::Pvt),
            Err(ShmError::SlotBusy { buffer: 0, .. })
        ));
    }

    #[test]
    fn dead_owner_is_reclaimed() {
        let mut seg = segment();
        // PID far above any default pid_max.
        seg.slot(0)
            .unwrap()
            .writer_pid
            .store(0x3FFF_FFF0, Ordering::Release);
        assert!(SlotWriter::acquire(&mut seg, 0, Packing::Pvt).is_ok());
    }

    #[test]
    fn out_of_range_buffer_and_count() {
        let mut seg = segment();
        assert!(matches!(
            SlotWriter::acquire(&mut seg, 2, Packing::Pvt),
            Err(ShmError::Layout(LayoutError::BufferOutOfRange { .. }))
        ));
        let writer = SlotWriter::acquire(&mut seg, 0, Packing::Pvt).unwrap();
        assert!(matches!(
            writer.publish(5),
            Err(ShmError::Layout(LayoutError::RowOutOfRange { .. }))
        ));
    }

    #[test]
    fn position_rows_reject_velocities() {
        let mut seg = segment();
        let mut writer = SlotWriter::acquire(&mut seg, 0, Packing::Position).unwrap();
        let row = TrajectoryRow::from_parts(None, Some(1), &[1.0], &[2.0]);
        assert!(matches!(
            writer.write_row(0, &row),
            Err(ShmError::Layout(LayoutError::ChannelAbsent { .. }))
        ));
    }
}
