//! Line decoders: one CSV record → one [`TrajectoryRow`].
//!
//! Field order per packing:
//!
//! | packing  | fields                                   |
//! |----------|------------------------------------------|
//! | PVT      | `time, user, pos_1..pos_N, vel_1..vel_N` |
//! | Position | `user, pos_1..pos_N`                     |
//!
//! Decoding is best-effort: non-numeric tokens become zero and are counted,
//! missing trailing fields are left out of the row so the slot keeps its
//! previous cell values. Extra fields are ignored.

use crate::numeric::{Lenient, parse_float, parse_int};
use csv::ByteRecord;
use traj::layout::{LayoutParams, Packing};
use traj_shm::{AxisCells, TrajectoryRow};

/// First non-numeric token of a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anomaly {
    /// 1-based field index.
    pub field: usize,
    /// Token text (lossy UTF-8).
    pub token: String,
}

/// Outcome of decoding one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowReport {
    /// Fields the packing expects.
    pub expected_fields: usize,
    /// Fields present in the record (extra fields included).
    pub found_fields: usize,
    /// Tokens that were not fully numeric.
    pub anomalies: usize,
    /// First such token.
    pub first_anomaly: Option<Anomaly>,
}

impl RowReport {
    /// Whether the record was shorter than the packing needs.
    pub fn is_short(&self) -> bool {
        self.found_fields < self.expected_fields
    }

    /// Whether every expected field was present and numeric.
    pub fn is_clean(&self) -> bool {
        !self.is_short() && self.anomalies == 0
    }
}

/// Strategy contract shared by both packings.
pub trait RowDecoder {
    /// Packing produced by this decoder.
    fn packing(&self) -> Packing;

    /// Axes per row.
    fn num_axes(&self) -> usize;

    /// Decode `record` into `row`, replacing its previous content.
    fn decode(&self, record: &ByteRecord, row: &mut TrajectoryRow) -> RowReport;

    /// Fields a complete record carries.
    fn expected_fields(&self) -> usize {
        self.packing().fields_per_row(self.num_axes())
    }

    /// Bytes between consecutive rows in the slot.
    fn stride(&self, layout: &LayoutParams) -> usize {
        layout.row_stride(self.packing())
    }
}

/// Time-position-velocity decoder.
#[derive(Debug, Clone, Copy)]
pub struct PvtDecoder {
    num_axes: usize,
}

impl PvtDecoder {
    /// Decoder for `num_axes` axes.
    pub const fn new(num_axes: usize) -> Self {
        Self { num_axes }
    }
}

impl RowDecoder for PvtDecoder {
    fn packing(&self) -> Packing {
        Packing::Pvt
    }

    fn num_axes(&self) -> usize {
        self.num_axes
    }

    fn decode(&self, record: &ByteRecord, row: &mut TrajectoryRow) -> RowReport {
        let mut fields = FieldCursor::new(record, self.expected_fields());
        row.clear();
        row.time = fields.next_int();
        row.user = fields.next_int();
        fields.fill(&mut row.positions, self.num_axes);
        fields.fill(&mut row.velocities, self.num_axes);
        fields.finish()
    }
}

/// Position-only decoder (point-wise packing).
#[derive(Debug, Clone, Copy)]
pub struct PositionDecoder {
    num_axes: usize,
}

impl PositionDecoder {
    /// Decoder for `num_axes` axes.
    pub const fn new(num_axes: usize) -> Self {
        Self { num_axes }
    }
}

impl RowDecoder for PositionDecoder {
    fn packing(&self) -> Packing {
        Packing::Position
    }

    fn num_axes(&self) -> usize {
        self.num_axes
    }

    fn decode(&self, record: &ByteRecord, row: &mut TrajectoryRow) -> RowReport {
        let mut fields = FieldCursor::new(record, self.expected_fields());
        row.clear();
        row.user = fields.next_int();
        fields.fill(&mut row.positions, self.num_axes);
        fields.finish()
    }
}

/// Decoder selected once per load.
#[derive(Debug, Clone, Copy)]
pub enum LineDecoder {
    /// PVT rows.
    Pvt(PvtDecoder),
    /// Position rows.
    Position(PositionDecoder),
}

impl LineDecoder {
    /// Decoder for `packing` with `num_axes` axes.
    pub const fn new(packing: Packing, num_axes: usize) -> Self {
        match packing {
            Packing::Pvt => Self::Pvt(PvtDecoder::new(num_axes)),
            Packing::Position => Self::Position(PositionDecoder::new(num_axes)),
        }
    }

    fn inner(&self) -> &dyn RowDecoder {
        match self {
            Self::Pvt(d) => d as &dyn RowDecoder,
            Self::Position(d) => d,
        }
    }
}

impl RowDecoder for LineDecoder {
    fn packing(&self) -> Packing {
        self.inner().packing()
    }

    fn num_axes(&self) -> usize {
        self.inner().num_axes()
    }

    fn decode(&self, record: &ByteRecord, row: &mut TrajectoryRow) -> RowReport {
        self.inner().decode(record, row)
    }
}

/// Walks a record field by field, collecting the report.
struct FieldCursor<'r> {
    fields: csv::ByteRecordIter<'r>,
    index: usize,
    report: RowReport,
}

impl<'r> FieldCursor<'r> {
    fn new(record: &'r ByteRecord, expected_fields: usize) -> Self {
        Self {
            fields: record.iter(),
            index: 0,
            report: RowReport {
                expected_fields,
                found_fields: record.len(),
                ..RowReport::default()
            },
        }
    }

    fn next_int(&mut self) -> Option<i32> {
        let token = self.fields.next()?;
        Some(self.note(token, parse_int(token)))
    }

    fn next_float(&mut self) -> Option<f64> {
        let token = self.fields.next()?;
        Some(self.note(token, parse_float(token)))
    }

    fn fill(&mut self, cells: &mut AxisCells, count: usize) {
        for _ in 0..count {
            match self.next_float() {
                Some(value) => {
                    let _ = cells.push(value);
                }
                None => break,
            }
        }
    }

    fn note<T>(&mut self, token: &[u8], parsed: Lenient<T>) -> T {
        self.index += 1;
        if !parsed.clean {
            self.report.anomalies += 1;
            if self.report.first_anomaly.is_none() {
                self.report.first_anomaly = Some(Anomaly {
                    field: self.index,
                    token: String::from_utf8_lossy(token).into_owned(),
                });
            }
        }
        parsed.value
    }

    fn finish(self) -> RowReport {
        self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[&str]) -> ByteRecord {
        ByteRecord::from(fields.to_vec())
    }

    #[test]
    fn pvt_row_decodes_in_field_order() {
        let decoder = PvtDecoder::new(2);
        let mut row = TrajectoryRow::default();
        let report = decoder.decode(&record(&["0", "1", "10.0", "20.0", "0.5", "0.25"]), &mut row);

        assert!(report.is_clean());
        assert_eq!(row.time, Some(0));
        assert_eq!(row.user, Some(1));
        assert_eq!(row.positions.as_slice(), &[10.0, 20.0]);
        assert_eq!(row.velocities.as_slice(), &[0.5, 0.25]);
    }

    #[test]
    fn position_row_has_no_time_or_velocity() {
        let decoder = PositionDecoder::new(3);
        let mut row = TrajectoryRow::default();
        let report = decoder.decode(&record(&["7", "1.5", "2.5", "3.5"]), &mut row);

        assert!(report.is_clean());
        assert_eq!(row.time, None);
        assert_eq!(row.user, Some(7));
        assert_eq!(row.positions.as_slice(), &[1.5, 2.5, 3.5]);
        assert!(row.velocities.is_empty());
    }

    #[test]
    fn non_numeric_token_decodes_to_zero() {
        let decoder = PvtDecoder::new(2);
        let mut row = TrajectoryRow::default();
        let report = decoder.decode(&record(&["0", "1", "abc", "20.0", "x", "0.5"]), &mut row);

        assert_eq!(row.positions.as_slice(), &[0.0, 20.0]);
        assert_eq!(row.velocities.as_slice(), &[0.0, 0.5]);
        assert_eq!(report.anomalies, 2);
        assert_eq!(
            report.first_anomaly,
            Some(Anomaly {
                field: 3,
                token: "abc".to_string()
            })
        );
        assert!(!report.is_short());
    }

    #[test]
    fn short_row_leaves_trailing_fields_out() {
        let decoder = PvtDecoder::new(2);
        let mut row = TrajectoryRow::from_parts(Some(9), Some(9), &[9.0, 9.0], &[9.0, 9.0]);
        let report = decoder.decode(&record(&["5", "2", "1.0"]), &mut row);

        assert!(report.is_short());
        assert_eq!(report.found_fields, 3);
        assert_eq!(report.expected_fields, 6);
        assert_eq!(row.time, Some(5));
        assert_eq!(row.positions.as_slice(), &[1.0]);
        assert!(row.velocities.is_empty());
    }

    #[test]
    fn extra_fields_are_ignored() {
        let decoder = PositionDecoder::new(1);
        let mut row = TrajectoryRow::default();
        let report = decoder.decode(&record(&["1", "2.0", "99", "100"]), &mut row);
        assert!(report.is_clean());
        assert_eq!(row.positions.as_slice(), &[2.0]);
    }

    #[test]
    fn line_decoder_dispatches_and_reports_stride() {
        let layout = LayoutParams {
            num_axes: 2,
            ..LayoutParams::default()
        };
        let pvt = LineDecoder::new(Packing::Pvt, 2);
        let pos = LineDecoder::new(Packing::Position, 2);
        assert_eq!(pvt.packing(), Packing::Pvt);
        assert_eq!(pvt.expected_fields(), 6);
        assert_eq!(pos.expected_fields(), 3);
        assert_eq!(pvt.stride(&layout), 8 + 16 * 2);
        assert_eq!(pos.stride(&layout), 8 + 8 * 2);
    }
}
