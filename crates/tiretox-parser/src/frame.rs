//! Canonical series schema: a `timestamp` column (naive, microseconds) followed by
//! nullable `f64` measurement columns.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

pub const TIMESTAMP: &str = "timestamp";
pub const TIMESTAMP_DISPLAY: &str = "Datetime";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    Stage,
    SaltTracer,
}

impl SeriesKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeriesKind::Stage => "stage",
            SeriesKind::SaltTracer => "salt_tracer",
        }
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        match self {
            SeriesKind::Stage => StageColumn::ALL.iter().map(|c| c.canonical_name()).collect(),
            SeriesKind::SaltTracer => EcColumn::ALL.iter().map(|c| c.canonical_name()).collect(),
        }
    }
}

impl fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageColumn {
    DifferentialPressure,
    AbsolutePressure,
    Temperature,
    WaterLevel,
    BarometricPressure,
}

impl StageColumn {
    /// Output order of the master file.
    pub const ALL: [StageColumn; 5] = [
        StageColumn::DifferentialPressure,
        StageColumn::AbsolutePressure,
        StageColumn::Temperature,
        StageColumn::WaterLevel,
        StageColumn::BarometricPressure,
    ];

    pub fn canonical_name(&self) -> &'static str {
        match self {
            StageColumn::DifferentialPressure => "differential_pressure_kpa",
            StageColumn::AbsolutePressure => "absolute_pressure_kpa",
            StageColumn::Temperature => "temperature_c",
            StageColumn::WaterLevel => "water_level_m",
            StageColumn::BarometricPressure => "barometric_pressure_kpa",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            StageColumn::DifferentialPressure => "Differential Pressure (kPa)",
            StageColumn::AbsolutePressure => "Absolute Pressure (kPa)",
            StageColumn::Temperature => "Temperature (°C)",
            StageColumn::WaterLevel => "Water Level (m)",
            StageColumn::BarometricPressure => "Barometric Pressure (kPa)",
        }
    }

    pub fn decimals(&self) -> usize {
        match self {
            StageColumn::DifferentialPressure
            | StageColumn::AbsolutePressure
            | StageColumn::BarometricPressure => 3,
            StageColumn::Temperature => 2,
            StageColumn::WaterLevel => 5,
        }
    }

    /// Accepts display headers, canonical names, and the mis-encoded degree sign some
    /// older master files carry (`Temperature (Â°C)`).
    pub fn from_header(header: &str) -> Option<Self> {
        let trimmed = header.trim();
        Self::ALL.into_iter().find(|column| {
            trimmed == column.display_name()
                || trimmed.eq_ignore_ascii_case(column.canonical_name())
                || (*column == StageColumn::Temperature && trimmed.starts_with("Temperature ("))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EcColumn {
    Ec,
    Temperature,
    EcCompensated,
}

impl EcColumn {
    pub const ALL: [EcColumn; 3] = [EcColumn::Ec, EcColumn::Temperature, EcColumn::EcCompensated];

    pub fn canonical_name(&self) -> &'static str {
        match self {
            EcColumn::Ec => "ec_us_cm",
            EcColumn::Temperature => "temperature_c",
            EcColumn::EcCompensated => "ec_t_us_cm",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            EcColumn::Ec => "EC",
            EcColumn::Temperature => "Temp",
            EcColumn::EcCompensated => "EC.T",
        }
    }

    pub fn from_header(header: &str) -> Option<Self> {
        let trimmed = header.trim();
        Self::ALL.into_iter().find(|column| {
            trimmed == column.display_name() || trimmed.eq_ignore_ascii_case(column.canonical_name())
        })
    }
}

/// Display header for a canonical column name; unknown names are returned unchanged.
pub fn display_name(kind: SeriesKind, name: &str) -> String {
    let known = match kind {
        SeriesKind::Stage => StageColumn::ALL
            .into_iter()
            .find(|c| c.canonical_name() == name)
            .map(|c| c.display_name()),
        SeriesKind::SaltTracer => EcColumn::ALL
            .into_iter()
            .find(|c| c.canonical_name() == name)
            .map(|c| c.display_name()),
    };
    known.map(str::to_string).unwrap_or_else(|| name.to_string())
}

/// Canonical column name for a header read back from an output file.
pub fn canonical_name(kind: SeriesKind, header: &str) -> String {
    let known = match kind {
        SeriesKind::Stage => StageColumn::from_header(header).map(|c| c.canonical_name()),
        SeriesKind::SaltTracer => EcColumn::from_header(header).map(|c| c.canonical_name()),
    };
    known
        .map(str::to_string)
        .unwrap_or_else(|| sanitize_column_name(header))
}

/// Number of decimals the output file shows for a column.
pub fn column_decimals(name: &str) -> Option<usize> {
    StageColumn::ALL
        .into_iter()
        .find(|c| c.canonical_name() == name)
        .map(|c| c.decimals())
        .or_else(|| {
            EcColumn::ALL
                .into_iter()
                .find(|c| c.canonical_name() == name)
                .map(|_| 2)
        })
}

/// `EC.T Max(uS/cm)` -> `ec_t_max_us_cm`
pub fn sanitize_column_name(header: &str) -> String {
    let mut out = String::with_capacity(header.len());
    for ch in header.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

/// Column-wise accumulator for one series, in the spirit of a row-at-a-time parser.
#[derive(Debug, Clone)]
pub struct FrameColumns {
    pub timestamp: Vec<i64>,
    names: Vec<String>,
    values: Vec<Vec<Option<f64>>>,
}

impl FrameColumns {
    pub fn new<S: AsRef<str>>(names: &[S]) -> Self {
        Self {
            timestamp: Vec::new(),
            names: names.iter().map(|n| n.as_ref().to_string()).collect(),
            values: vec![Vec::new(); names.len()],
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.timestamp.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamp.is_empty()
    }

    /// Appends one row; `row` is indexed like [`FrameColumns::names`].
    pub fn push_row(&mut self, timestamp: i64, row: &[Option<f64>]) {
        self.timestamp.push(timestamp);
        for (idx, column) in self.values.iter_mut().enumerate() {
            column.push(row.get(idx).copied().flatten());
        }
    }

    pub fn build(self) -> PolarsResult<DataFrame> {
        let columns = self.names.into_iter().zip(self.values).collect();
        from_columns(self.timestamp, columns)
    }
}

pub fn from_columns(
    timestamps: Vec<i64>,
    columns: Vec<(String, Vec<Option<f64>>)>,
) -> PolarsResult<DataFrame> {
    let ts_series = Series::new(TIMESTAMP.into(), timestamps)
        .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?;

    let mut cols: Vec<Column> = Vec::with_capacity(columns.len() + 1);
    cols.push(ts_series.into());
    for (name, values) in columns {
        cols.push(Series::new(name.as_str().into(), values).into());
    }
    DataFrame::new(cols)
}

pub fn empty_frame<S: AsRef<str>>(names: &[S]) -> PolarsResult<DataFrame> {
    FrameColumns::new(names).build()
}

pub fn timestamps(df: &DataFrame) -> PolarsResult<Vec<i64>> {
    let ts = df.column(TIMESTAMP)?.datetime()?;
    let mut out = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let value = ts.get(idx).ok_or_else(|| {
            PolarsError::ComputeError(format!("timestamp missing at row {idx}").into())
        })?;
        out.push(value);
    }
    Ok(out)
}

pub fn values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let column = df.column(name)?.f64()?;
    Ok((0..df.height()).map(|idx| column.get(idx)).collect())
}

/// Like [`values`], but a missing column reads as all nulls.
pub fn values_or_null(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    if has_column(df, name) {
        values(df, name)
    } else {
        Ok(vec![None; df.height()])
    }
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

pub fn measurement_columns(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .filter(|name| name.as_str() != TIMESTAMP)
        .map(|name| name.to_string())
        .collect()
}

pub fn naive_to_micros(value: NaiveDateTime) -> i64 {
    value.and_utc().timestamp_micros()
}

pub fn naive_from_micros(value: i64) -> Option<NaiveDateTime> {
    DateTime::<Utc>::from_timestamp_micros(value).map(|dt| dt.naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_columns_build_with_nulls() {
        let mut columns = FrameColumns::new(&["a", "b"]);
        columns.push_row(1_000_000, &[Some(1.0), None]);
        columns.push_row(2_000_000, &[Some(2.0)]);
        let df = columns.build().expect("frame");

        assert_eq!(df.height(), 2);
        assert_eq!(timestamps(&df).unwrap(), vec![1_000_000, 2_000_000]);
        assert_eq!(values(&df, "b").unwrap(), vec![None, None]);
        assert_eq!(values_or_null(&df, "missing").unwrap(), vec![None, None]);
        assert_eq!(measurement_columns(&df), vec!["a", "b"]);
    }

    #[test]
    fn headers_map_to_canonical_names() {
        assert_eq!(
            canonical_name(SeriesKind::Stage, "Temperature (Â°C)"),
            "temperature_c"
        );
        assert_eq!(
            canonical_name(SeriesKind::Stage, "Water Level (m)"),
            "water_level_m"
        );
        assert_eq!(sanitize_column_name("EC.T Max(uS/cm)"), "ec_t_max_us_cm");
        assert_eq!(column_decimals("water_level_m"), Some(5));
        assert_eq!(display_name(SeriesKind::SaltTracer, "ec_t_us_cm"), "EC.T");
    }
}
