//! Nearest-time join of absolute pressure against a barometric series.

use polars::prelude::*;
use tiretox_parser::frame::{self, StageColumn};
use tracing::warn;

/// Barometric samples sorted by timestamp, one per timestamp. Rows without a pressure
/// reading are not indexed.
#[derive(Debug, Clone, Default)]
pub struct BarometricIndex {
    samples: Vec<(i64, f64)>,
    duplicates: usize,
}

impl BarometricIndex {
    pub fn from_samples(mut samples: Vec<(i64, f64)>) -> Self {
        // Stable sort: the first occurrence of a duplicated timestamp is kept.
        samples.sort_by_key(|(ts, _)| *ts);
        let before = samples.len();
        samples.dedup_by_key(|(ts, _)| *ts);
        let duplicates = before - samples.len();
        if duplicates > 0 {
            warn!(duplicates, "Barometric series has duplicate timestamps; first kept");
        }
        Self {
            samples,
            duplicates,
        }
    }

    pub fn from_frame(df: &DataFrame) -> PolarsResult<Self> {
        let timestamps = frame::timestamps(df)?;
        let pressure =
            frame::values_or_null(df, StageColumn::BarometricPressure.canonical_name())?;
        let samples = timestamps
            .into_iter()
            .zip(pressure)
            .filter_map(|(ts, value)| value.map(|v| (ts, v)))
            .collect();
        Ok(Self::from_samples(samples))
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Closest sample to `ts`; an exact tie goes to the earlier sample.
    pub fn nearest(&self, ts: i64) -> Option<(i64, f64)> {
        let idx = self.samples.partition_point(|(sample_ts, _)| *sample_ts < ts);
        let before = idx.checked_sub(1).and_then(|i| self.samples.get(i));
        let after = self.samples.get(idx);

        match (before, after) {
            (Some(b), Some(a)) => {
                if ts - b.0 <= a.0 - ts {
                    Some(*b)
                } else {
                    Some(*a)
                }
            }
            (Some(b), None) => Some(*b),
            (None, Some(a)) => Some(*a),
            (None, None) => None,
        }
    }

    /// Pressure of the nearest sample if it lies within `tolerance_micros` (inclusive).
    pub fn lookup(&self, ts: i64, tolerance_micros: i64) -> Option<f64> {
        self.nearest(ts)
            .filter(|(sample_ts, _)| (sample_ts - ts).abs() <= tolerance_micros)
            .map(|(_, pressure)| pressure)
    }
}

#[derive(Debug, Clone)]
pub struct CorrectionOutcome {
    pub df: DataFrame,
    pub matched: usize,
    pub unmatched: usize,
}

/// Fills missing differential pressure as `absolute - barometric` for rows with an
/// absolute-pressure reading. Existing differential pressure is never overwritten.
pub fn correct(
    df: &DataFrame,
    index: &BarometricIndex,
    tolerance_micros: i64,
) -> PolarsResult<CorrectionOutcome> {
    let dp_name = StageColumn::DifferentialPressure.canonical_name();
    let timestamps = frame::timestamps(df)?;
    let absolute = frame::values_or_null(df, StageColumn::AbsolutePressure.canonical_name())?;
    let mut differential = frame::values_or_null(df, dp_name)?;

    let mut matched = 0;
    let mut unmatched = 0;

    for (idx, ts) in timestamps.iter().enumerate() {
        if differential[idx].is_some() {
            continue;
        }
        let Some(abs_pressure) = absolute[idx] else {
            continue;
        };

        match index.lookup(*ts, tolerance_micros) {
            Some(baro) => {
                differential[idx] = Some(abs_pressure - baro);
                matched += 1;
            }
            None => unmatched += 1,
        }
    }

    let mut corrected = df.clone();
    corrected.with_column(Series::new(dp_name.into(), differential))?;

    Ok(CorrectionOutcome {
        df: corrected,
        matched,
        unmatched,
    })
}
