//! Buffer loader: CSV source → one buffer slot.
//!
//! A load runs `Open → HeaderSkip → RowLoop → Done`. The slot is withdrawn
//! (fill count 0) before the first row is written and published with the
//! final row count as the very last step.

use crate::config::DecodeConfig;
use crate::decode::{LineDecoder, RowDecoder, RowReport};
use crate::error::{LoadError, LoadResult};
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};
use traj::layout::Packing;
use traj_shm::{SlotWriter, TrajectoryRow, TrajectorySegment};

/// Phase of a running load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    /// Slot claimed and withdrawn.
    Open,
    /// Discarding the header line.
    HeaderSkip,
    /// Decoding and writing rows.
    RowLoop,
    /// Rows written, count published.
    Done,
}

impl fmt::Display for LoadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::HeaderSkip => "header-skip",
            Self::RowLoop => "row-loop",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful load.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadSummary {
    /// Buffer slot written.
    pub buffer: usize,
    /// Packing of the rows.
    pub packing: Packing,
    /// Rows written and published (the fill count).
    pub rows_written: usize,
    /// Rows past capacity that were not written.
    pub rows_dropped: usize,
    /// Rows with fewer fields than the packing needs.
    pub short_rows: usize,
    /// Tokens that were not fully numeric.
    pub anomalies: usize,
    /// Discarded header line, if any.
    pub header: Option<String>,
    /// Slot generation after publish.
    pub generation: u64,
}

/// Loads CSV trajectories into the slots of one segment.
pub struct BufferLoader<'s> {
    segment: &'s mut TrajectorySegment,
    options: DecodeConfig,
}

impl<'s> BufferLoader<'s> {
    /// Loader over `segment` with the given decode options.
    pub fn new(segment: &'s mut TrajectorySegment, options: DecodeConfig) -> Self {
        Self { segment, options }
    }

    /// Decode options in effect.
    pub fn options(&self) -> &DecodeConfig {
        &self.options
    }

    /// Load the file at `path` into `buffer`.
    ///
    /// The file is opened before the slot is touched: a missing file leaves
    /// the previously published rows intact.
    pub fn load_path(
        &mut self,
        path: &Path,
        packing: Packing,
        buffer: usize,
    ) -> LoadResult<LoadSummary> {
        let file = open_source(path)?;
        info!(
            "Loading {} into buffer {buffer} ({packing} packing)",
            path.display()
        );
        self.load_reader(file, packing, buffer)
    }

    /// Load CSV text from `input` into `buffer`.
    ///
    /// On error after the slot was withdrawn, the slot is published empty.
    pub fn load_reader<R: Read>(
        &mut self,
        input: R,
        packing: Packing,
        buffer: usize,
    ) -> LoadResult<LoadSummary> {
        let options = self.options;
        let num_axes = self.segment.layout().num_axes;
        let mut writer = SlotWriter::acquire(&mut *self.segment, buffer, packing)?;
        writer.invalidate()?;

        let mut run = LoadRun::new(LineDecoder::new(packing, num_axes), options);
        match run.fill(&mut writer, input) {
            Ok(()) => {
                let generation = writer.publish(run.rows_written)?;
                run.transition(LoadPhase::Done);
                Ok(run.into_summary(buffer, packing, generation))
            }
            Err(e) => {
                warn!(
                    "Load into buffer {buffer} failed during {}: {e}",
                    run.phase
                );
                writer.publish(0)?;
                Err(e)
            }
        }
    }
}

/// Open a CSV source, mapping failure to [`LoadError::Open`].
pub fn open_source(path: &Path) -> LoadResult<File> {
    File::open(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })
}

/// State of one load.
struct LoadRun {
    decoder: LineDecoder,
    options: DecodeConfig,
    phase: LoadPhase,
    rows_written: usize,
    rows_dropped: usize,
    short_rows: usize,
    anomalies: usize,
    header: Option<String>,
}

impl LoadRun {
    fn new(decoder: LineDecoder, options: DecodeConfig) -> Self {
        Self {
            decoder,
            options,
            phase: LoadPhase::Open,
            rows_written: 0,
            rows_dropped: 0,
            short_rows: 0,
            anomalies: 0,
            header: None,
        }
    }

    fn transition(&mut self, next: LoadPhase) {
        debug!("Load phase {} -> {next}", self.phase);
        self.phase = next;
    }

    fn fill<R: Read>(&mut self, writer: &mut SlotWriter<'_>, input: R) -> LoadResult<()> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            // Quotes are plain bytes; a stray one must not join lines.
            .quoting(false)
            .from_reader(input);
        let mut record = csv::ByteRecord::new();

        if self.options.skip_header {
            self.transition(LoadPhase::HeaderSkip);
            if csv.read_byte_record(&mut record)? {
                let header = record
                    .iter()
                    .map(String::from_utf8_lossy)
                    .collect::<Vec<_>>()
                    .join(",");
                debug!("Discarded header: {header}");
                self.header = Some(header);
            }
        }

        self.transition(LoadPhase::RowLoop);
        let capacity = writer.capacity();
        let mut row = TrajectoryRow::default();
        while self.rows_written < capacity && csv.read_byte_record(&mut record)? {
            let line = record.position().map_or(0, |p| p.line());
            let report = self.decoder.decode(&record, &mut row);
            self.check(line, &report)?;
            writer.write_row(self.rows_written, &row)?;
            self.rows_written += 1;
            debug!("Row {} written from line {line}", self.rows_written - 1);
        }

        if self.rows_written == capacity {
            while csv.read_byte_record(&mut record)? {
                self.rows_dropped += 1;
            }
        }
        if self.rows_dropped > 0 {
            if self.options.is_strict() {
                return Err(LoadError::CapacityExceeded {
                    capacity,
                    dropped: self.rows_dropped,
                });
            }
            warn!(
                "Buffer {} full at {capacity} rows, {} rows dropped",
                writer.buffer(),
                self.rows_dropped
            );
        }
        Ok(())
    }

    fn check(&mut self, line: u64, report: &RowReport) -> LoadResult<()> {
        if self.options.is_strict() {
            if let Some(anomaly) = &report.first_anomaly {
                return Err(LoadError::Parse {
                    line,
                    field: anomaly.field,
                    token: anomaly.token.clone(),
                });
            }
            if report.is_short() {
                return Err(LoadError::ShortRow {
                    line,
                    expected: report.expected_fields,
                    found: report.found_fields,
                });
            }
            return Ok(());
        }

        if let Some(anomaly) = &report.first_anomaly {
            warn!(
                "Line {line}: {} non-numeric token(s), first {:?} in field {}, decoded as 0",
                report.anomalies, anomaly.token, anomaly.field
            );
        }
        if report.is_short() {
            warn!(
                "Line {line}: {} of {} fields, remaining cells keep previous values",
                report.found_fields, report.expected_fields
            );
            self.short_rows += 1;
        }
        self.anomalies += report.anomalies;
        Ok(())
    }

    fn into_summary(self, buffer: usize, packing: Packing, generation: u64) -> LoadSummary {
        LoadSummary {
            buffer,
            packing,
            rows_written: self.rows_written,
            rows_dropped: self.rows_dropped,
            short_rows: self.short_rows,
            anomalies: self.anomalies,
            header: self.header,
            generation,
        }
    }
}
