//! Row value type shared by the loader and the reader

use heapless::Vec;
use traj::consts::MAX_AXES;

/// Per-axis cell storage of one channel.
pub type AxisCells = Vec<f64, MAX_AXES>;

/// One trajectory row.
///
/// Missing fields (`None`, or fewer entries than axes) are not written,
/// leaving whatever the buffer held before.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrajectoryRow {
    /// Time cell (PVT only).
    pub time: Option<i32>,
    /// User command cell.
    pub user: Option<i32>,
    /// Per-axis positions, axis 0 first.
    pub positions: AxisCells,
    /// Per-axis velocities, axis 0 first (PVT only).
    pub velocities: AxisCells,
}

impl TrajectoryRow {
    /// Reset to an empty row without releasing storage.
    pub fn clear(&mut self) {
        self.time = None;
        self.user = None;
        self.positions.clear();
        self.velocities.clear();
    }

    /// Build a row from slices, truncating at [`MAX_AXES`].
    pub fn from_parts(time: Option<i32>, user: Option<i32>, positions: &[f64], velocities: &[f64]) -> Self {
        let mut row = Self {
            time,
            user,
            ..Self::default()
        };
        for &p in positions.iter().take(MAX_AXES) {
            let _ = row.positions.push(p);
        }
        for &v in velocities.iter().take(MAX_AXES) {
            let _ = row.velocities.push(v);
        }
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_parts_and_clear() {
        let mut row = TrajectoryRow::from_parts(Some(10), Some(1), &[1.0, 2.0], &[0.5]);
        assert_eq!(row.time, Some(10));
        assert_eq!(row.positions.as_slice(), &[1.0, 2.0]);
        assert_eq!(row.velocities.as_slice(), &[0.5]);

        row.clear();
        assert_eq!(row, TrajectoryRow::default());
    }

    #[test]
    fn from_parts_caps_axes() {
        let many = [1.0; MAX_AXES + 3];
        let row = TrajectoryRow::from_parts(None, None, &many, &[]);
        assert_eq!(row.positions.len(), MAX_AXES);
    }
}
