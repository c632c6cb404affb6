//! Redistributes readings a logger flushed under one timestamp onto a uniform grid.

use polars::prelude::*;
use serde::Serialize;
use tiretox_parser::frame::{self, TIMESTAMP};
use tracing::{debug, info, warn};

pub const ORIGINAL_TIMESTAMP: &str = "original_timestamp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StackedRun {
    /// Index of the first row of the run in the input frame.
    pub start_row: usize,
    pub len: usize,
    /// Timestamp preceding the run; `None` when the run opens the file.
    pub gap_start: Option<i64>,
    pub gap_end: i64,
    /// The grid landed exactly on `gap_start`.
    pub fits_gap: bool,
}

impl StackedRun {
    /// Grid timestamp of the `offset`-th row of the run.
    pub fn grid_timestamp(&self, offset: usize, interval_micros: i64) -> i64 {
        let steps_back = (self.len - 1 - offset) as i64;
        self.gap_end - steps_back * interval_micros
    }
}

#[derive(Debug, Clone)]
pub struct DestackOutcome {
    pub original: DataFrame,
    pub corrected: DataFrame,
    pub runs: Vec<StackedRun>,
}

impl DestackOutcome {
    pub fn has_runs(&self) -> bool {
        !self.runs.is_empty()
    }

    pub fn corrected_rows(&self) -> usize {
        self.runs.iter().map(|run| run.len).sum()
    }

    /// Uncorrected and corrected timestamps side by side, followed by the measurements
    /// (values keep their row order, so one copy suffices).
    pub fn comparison(&self) -> PolarsResult<DataFrame> {
        let original_ts = self
            .original
            .column(TIMESTAMP)?
            .as_materialized_series()
            .clone()
            .with_name(ORIGINAL_TIMESTAMP.into());

        let mut columns: Vec<Column> = Vec::with_capacity(self.corrected.width() + 1);
        columns.push(original_ts.into());
        columns.extend(self.corrected.get_columns().iter().cloned());
        DataFrame::new(columns)
    }
}

/// Maximal runs of two or more consecutive rows sharing a timestamp.
pub fn find_stacked_runs(timestamps: &[i64], interval_micros: i64) -> Vec<StackedRun> {
    let mut runs = Vec::new();
    let mut idx = 0;

    while idx < timestamps.len() {
        let gap_end = timestamps[idx];
        let mut end = idx + 1;
        while end < timestamps.len() && timestamps[end] == gap_end {
            end += 1;
        }

        let len = end - idx;
        if len > 1 {
            let gap_start = idx.checked_sub(1).map(|prev| timestamps[prev]);
            let fits_gap = gap_start
                .map(|start| gap_end - len as i64 * interval_micros == start)
                .unwrap_or(false);
            runs.push(StackedRun {
                start_row: idx,
                len,
                gap_start,
                gap_end,
                fits_gap,
            });
        }
        idx = end;
    }

    runs
}

/// Reassigns every stacked run onto a grid of `interval_micros` steps ending at the
/// duplicated timestamp. Row order and values are untouched.
pub fn destack(df: &DataFrame, interval_micros: i64) -> PolarsResult<DestackOutcome> {
    let mut timestamps = frame::timestamps(df)?;
    let runs = find_stacked_runs(&timestamps, interval_micros);

    for run in &runs {
        for offset in 0..run.len {
            timestamps[run.start_row + offset] = run.grid_timestamp(offset, interval_micros);
        }
        if run.fits_gap {
            debug!(
                start_row = run.start_row,
                len = run.len,
                "Redistributed stacked run"
            );
        } else {
            warn!(
                start_row = run.start_row,
                len = run.len,
                gap_start = ?run.gap_start.and_then(frame::naive_from_micros),
                gap_end = ?frame::naive_from_micros(run.gap_end),
                "Stacked run does not fill its gap; grid is approximate"
            );
        }
    }

    let mut corrected = df.clone();
    if !runs.is_empty() {
        let ts_series = Series::new(TIMESTAMP.into(), timestamps)
            .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?;
        corrected.with_column(ts_series)?;
        info!(runs = runs.len(), "De-stacked duplicate timestamps");
    }

    Ok(DestackOutcome {
        original: df.clone(),
        corrected,
        runs,
    })
}
