//! Salt-wave selection on EC series: time-window subsets, the two-click selection
//! session and output file naming.

use std::path::Path;

use chrono::NaiveDate;
use polars::prelude::*;
use serde::Serialize;
use tiretox_parser::frame;

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SaltwaveSelection {
    pub start: i64,
    pub end: i64,
    pub dump: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    Idle,
    OnePointSelected(i64),
}

/// Click-to-select state. Clicks snap to the nearest series timestamp; every second
/// click closes a window and numbers it with the next dump.
#[derive(Debug, Clone)]
pub struct SelectionSession {
    timestamps: Vec<i64>,
    state: SelectionState,
    next_dump: u32,
}

impl SelectionSession {
    pub fn new(mut timestamps: Vec<i64>, initial_dump: u32) -> Self {
        timestamps.sort_unstable();
        timestamps.dedup();
        Self {
            timestamps,
            state: SelectionState::Idle,
            next_dump: initial_dump,
        }
    }

    pub fn from_frame(df: &DataFrame, initial_dump: u32) -> PolarsResult<Self> {
        Ok(Self::new(frame::timestamps(df)?, initial_dump))
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    pub fn next_dump(&self) -> u32 {
        self.next_dump
    }

    pub fn reset(&mut self) {
        self.state = SelectionState::Idle;
    }

    pub fn snap(&self, ts: i64) -> Option<i64> {
        let idx = self.timestamps.partition_point(|t| *t < ts);
        let before = idx.checked_sub(1).map(|i| self.timestamps[i]);
        let after = self.timestamps.get(idx).copied();
        match (before, after) {
            (Some(b), Some(a)) => Some(if ts - b <= a - ts { b } else { a }),
            (b, a) => b.or(a),
        }
    }

    pub fn click(&mut self, ts: i64) -> Result<Option<SaltwaveSelection>> {
        let snapped = self
            .snap(ts)
            .ok_or_else(|| PipelineError::Selection("series has no timestamps".to_string()))?;

        match self.state {
            SelectionState::Idle => {
                self.state = SelectionState::OnePointSelected(snapped);
                Ok(None)
            }
            SelectionState::OnePointSelected(first) => {
                let selection = SaltwaveSelection {
                    start: first.min(snapped),
                    end: first.max(snapped),
                    dump: self.next_dump,
                };
                self.next_dump += 1;
                self.state = SelectionState::Idle;
                Ok(Some(selection))
            }
        }
    }
}

/// Rows with `start <= timestamp <= end`; the endpoints may come in either order.
pub fn subset(df: &DataFrame, start: i64, end: i64) -> PolarsResult<DataFrame> {
    let (lo, hi) = if start <= end { (start, end) } else { (end, start) };
    let timestamps = frame::timestamps(df)?;
    let keep: Vec<usize> = timestamps
        .iter()
        .enumerate()
        .filter(|(_, ts)| (lo..=hi).contains(*ts))
        .map(|(idx, _)| idx)
        .collect();

    let mut columns = Vec::new();
    for name in frame::measurement_columns(df) {
        let values = frame::values(df, &name)?;
        columns.push((name, keep.iter().map(|idx| values[*idx]).collect()));
    }
    frame::from_columns(keep.iter().map(|idx| timestamps[*idx]).collect(), columns)
}

/// Identifies where an EC series came from, for output naming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaltwaveLabel {
    pub station: String,
    pub date: NaiveDate,
    pub location: String,
    pub sensor: String,
}

impl SaltwaveLabel {
    pub fn is_baseline(&self) -> bool {
        self.location.to_ascii_lowercase().starts_with("baseline")
    }

    /// `{station}_{yyyymmdd}_dump{n}_{location}_{sensor}.xlsx`
    pub fn dump_file_name(&self, dump: u32) -> String {
        format!(
            "{}_{}_dump{}_{}_{}.xlsx",
            self.station,
            self.date.format("%Y%m%d"),
            dump,
            self.location,
            self.sensor
        )
    }

    /// `{station}_{yyyymmdd}_{location}_{sensor}.xlsx`
    pub fn baseline_file_name(&self) -> String {
        format!(
            "{}_{}_{}_{}.xlsx",
            self.station,
            self.date.format("%Y%m%d"),
            self.location,
            self.sensor
        )
    }
}

/// Detected sensor name if the parser found one, else `AT` plus the three characters
/// following the first `AT` in the file name.
pub fn resolve_sensor_name(detected: Option<&str>, path: &Path) -> Result<String> {
    if let Some(name) = detected.map(str::trim).filter(|name| !name.is_empty()) {
        return Ok(name.to_string());
    }
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    stem.find("AT")
        .and_then(|pos| stem.get(pos..pos + 5))
        .map(str::to_string)
        .ok_or_else(|| {
            PipelineError::Selection(format!(
                "no sensor name detected and none found in file name '{stem}'"
            ))
        })
}

/// Date of the first reading, used when no date is given.
pub fn series_date(df: &DataFrame) -> Result<NaiveDate> {
    frame::timestamps(df)?
        .first()
        .and_then(|ts| frame::naive_from_micros(*ts))
        .map(|dt| dt.date())
        .ok_or_else(|| PipelineError::Selection("series is empty".to_string()))
}
