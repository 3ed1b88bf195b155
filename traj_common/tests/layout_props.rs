//! Property tests for the buffer address calculator.
//!
//! Regions of distinct buffer slots never overlap, whatever packing each
//! slot holds, and every cell of a slot stays inside that slot's region.

use proptest::prelude::*;
use traj_common::prelude::{LayoutParams, MAX_BUFFERS, Packing};

fn packing() -> impl Strategy<Value = Packing> {
    prop_oneof![Just(Packing::Pvt), Just(Packing::Position)]
}

fn layout() -> impl Strategy<Value = LayoutParams> {
    (1usize..=16, 1usize..=64, 1usize..=MAX_BUFFERS, 0usize..1024).prop_map(
        |(num_axes, capacity, buffer_count, base_words)| LayoutParams {
            num_axes,
            capacity,
            buffer_count,
            base_offset: base_words * 8,
        },
    )
}

proptest! {
    #[test]
    fn buffer_regions_are_disjoint(
        layout in layout(),
        packing_a in packing(),
        packing_b in packing(),
    ) {
        prop_assert!(layout.validate().is_ok());
        for i in 0..layout.buffer_count {
            for j in 0..layout.buffer_count {
                if i == j {
                    continue;
                }
                let a = layout.region(i, packing_a).unwrap();
                let b = layout.region(j, packing_b).unwrap();
                prop_assert!(a.end <= b.start || b.end <= a.start);
            }
        }
    }

    #[test]
    fn cells_stay_inside_their_region(
        layout in layout(),
        packing in packing(),
        row_seed in any::<usize>(),
        axis_seed in any::<usize>(),
    ) {
        for buffer in 0..layout.buffer_count {
            let map = layout.channels(buffer, packing).unwrap();
            let region = map.region();
            let row = row_seed % layout.capacity;
            let axis = axis_seed % layout.num_axes;

            let user = map.user_offset(row).unwrap();
            prop_assert!(region.contains(&user) && user + 4 <= region.end);

            let pos = map.position_offset(row, axis).unwrap();
            prop_assert!(region.contains(&pos) && pos + 8 <= region.end);
            prop_assert_eq!(pos % 8, 0);

            if packing.has_velocities() {
                let vel = map.velocity_offset(row, axis).unwrap();
                prop_assert!(region.contains(&vel) && vel + 8 <= region.end);
                prop_assert!(vel > pos);
            }
            prop_assert!(region.end <= layout.data_end());
        }
    }

    #[test]
    fn consecutive_rows_never_share_cells(layout in layout(), packing in packing()) {
        let map = layout.channels(0, packing).unwrap();
        if layout.capacity > 1 {
            let last_axis = layout.num_axes - 1;
            let row0_end = if packing.has_velocities() {
                map.velocity_offset(0, last_axis).unwrap()
            } else {
                map.position_offset(0, last_axis).unwrap()
            } + 8;
            prop_assert_eq!(row0_end, map.user_offset(1).unwrap() - 4);
        }
    }
}
