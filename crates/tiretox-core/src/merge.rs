//! Folding incremental uploads into a master series.
//!
//! `merge` keeps only the rows of the upload whose timestamps the master lacks, then
//! [`finalize`]s the union: duplicate timestamps are averaged over their non-null values,
//! rows with an out-of-range water level lose every field, and rows come out sorted.
//! Averaging runs before fencing, so a fill value sharing a timestamp with a real
//! reading is averaged into it.

use std::collections::{BTreeMap, HashSet};

use polars::prelude::*;
use serde::Serialize;
use tiretox_parser::frame::{self, FrameColumns, StageColumn};

use crate::config::FenceConfig;

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub df: DataFrame,
    pub stats: MergeStats,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    /// Upload rows whose timestamp was not yet in the master.
    pub new_rows: usize,
    pub averaged_timestamps: usize,
    pub fenced_rows: usize,
}

pub fn merge(existing: &DataFrame, new: &DataFrame, fence: &FenceConfig) -> PolarsResult<MergeOutcome> {
    let existing_keys: HashSet<i64> = frame::timestamps(existing)?.into_iter().collect();
    let delta: Vec<usize> = frame::timestamps(new)?
        .iter()
        .enumerate()
        .filter(|(_, ts)| !existing_keys.contains(ts))
        .map(|(idx, _)| idx)
        .collect();

    let mut names = frame::measurement_columns(existing);
    for name in frame::measurement_columns(new) {
        if !names.contains(&name) {
            names.push(name);
        }
    }

    let mut groups = TimestampGroups::new(names);
    groups.extend(existing, None)?;
    groups.extend(new, Some(&delta))?;

    let (df, mut stats) = groups.finish(fence)?;
    stats.new_rows = delta.len();
    Ok(MergeOutcome { df, stats })
}

/// Average duplicates, fence, sort. `new_rows` is always zero.
pub fn finalize(df: &DataFrame, fence: &FenceConfig) -> PolarsResult<MergeOutcome> {
    let mut groups = TimestampGroups::new(frame::measurement_columns(df));
    groups.extend(df, None)?;
    let (df, stats) = groups.finish(fence)?;
    Ok(MergeOutcome { df, stats })
}

#[derive(Debug, Clone)]
struct RowSums {
    rows: usize,
    sums: Vec<f64>,
    counts: Vec<usize>,
}

struct TimestampGroups {
    names: Vec<String>,
    groups: BTreeMap<i64, RowSums>,
}

impl TimestampGroups {
    fn new(names: Vec<String>) -> Self {
        Self {
            names,
            groups: BTreeMap::new(),
        }
    }

    /// Adds the rows of `df` listed in `rows` (all rows when `None`). Columns `df` lacks
    /// contribute nothing.
    fn extend(&mut self, df: &DataFrame, rows: Option<&[usize]>) -> PolarsResult<()> {
        let timestamps = frame::timestamps(df)?;
        let columns = self
            .names
            .iter()
            .map(|name| frame::values_or_null(df, name))
            .collect::<PolarsResult<Vec<_>>>()?;

        let width = self.names.len();
        let mut add = |idx: usize| {
            let entry = self.groups.entry(timestamps[idx]).or_insert_with(|| RowSums {
                rows: 0,
                sums: vec![0.0; width],
                counts: vec![0; width],
            });
            entry.rows += 1;
            for (col, values) in columns.iter().enumerate() {
                if let Some(value) = values[idx] {
                    entry.sums[col] += value;
                    entry.counts[col] += 1;
                }
            }
        };

        match rows {
            Some(rows) => rows.iter().copied().for_each(&mut add),
            None => (0..timestamps.len()).for_each(&mut add),
        }
        Ok(())
    }

    fn finish(self, fence: &FenceConfig) -> PolarsResult<(DataFrame, MergeStats)> {
        let level_col = self
            .names
            .iter()
            .position(|name| name == StageColumn::WaterLevel.canonical_name());

        let mut stats = MergeStats::default();
        let mut out = FrameColumns::new(&self.names);
        let mut row: Vec<Option<f64>> = vec![None; self.names.len()];

        for (ts, group) in self.groups {
            if group.rows > 1 {
                stats.averaged_timestamps += 1;
            }
            for (col, value) in row.iter_mut().enumerate() {
                *value = (group.counts[col] > 0).then(|| group.sums[col] / group.counts[col] as f64);
            }

            let fenced = level_col
                .and_then(|col| row[col])
                .is_some_and(|level| !fence.contains(level));
            if fenced {
                row.iter_mut().for_each(|value| *value = None);
                stats.fenced_rows += 1;
            }
            out.push_row(ts, &row);
        }

        Ok((out.build()?, stats))
    }
}
