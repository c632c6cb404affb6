//! Calibration-factor sheets: EC.T readings taken while known volumes of a primary salt
//! solution are added to a fixed water volume.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use polars::prelude::*;
use rust_xlsxwriter::{Format, FormatAlign, Workbook};
use serde::Serialize;
use tiretox_parser::frame::{self, EcColumn};
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::master::{save_workbook, SHEET_NAME};

/// Water volume in the calibration vessel after each addition, in ml.
pub const VOLUMES_ML: [f64; 6] = [3000.0, 3000.2, 3000.4, 3000.6, 3000.8, 3001.0];
/// Cumulative primary solution added before each reading, in ml.
pub const ADDED_ML: [f64; 6] = [0.0, 0.2, 0.4, 0.6, 0.8, 1.0];
pub const DEFAULT_PRIMARY_SOLUTION_G_M3: f64 = 30_000.0;

const TABLE_ROW: u32 = 7;
const TABLE_HEADER: [&str; 3] = ["Vol. [ml]", "Vol. salt solution added [ml]", "EC [uS/cm]"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CalibrationSetting {
    Field,
    Lab,
}

impl fmt::Display for CalibrationSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CalibrationSetting::Field => "Field",
            CalibrationSetting::Lab => "Lab",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationHeader {
    pub field_sampling_date: NaiveDate,
    pub calibration_date: Option<NaiveDate>,
    pub site: String,
    pub sensor: String,
    pub setting: CalibrationSetting,
    pub primary_solution_g_m3: f64,
}

impl CalibrationHeader {
    /// `{site}_{yyyymmdd}_{sensor}_CFvals.xlsx`, dated by the field sampling date.
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}_CFvals.xlsx",
            self.site,
            self.field_sampling_date.format("%Y%m%d"),
            self.sensor
        )
    }

    fn rows(&self) -> [(&'static str, String); 6] {
        [
            (
                "Field Sampling Date",
                self.field_sampling_date.format("%Y-%m-%d").to_string(),
            ),
            (
                "Calibration Date",
                self.calibration_date
                    .map(|date| date.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "N/A".to_string()),
            ),
            ("Site", self.site.clone()),
            ("Sensor", self.sensor.clone()),
            ("Lab/Field", self.setting.to_string()),
            (
                "Primary solution [g/m3]",
                self.primary_solution_g_m3.to_string(),
            ),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibrationPoint {
    pub volume_ml: f64,
    pub added_ml: f64,
    pub ec_us_cm: Option<f64>,
}

/// Pairs each standard volume with the EC.T reading at the matching row of `df`.
/// Exactly one row index per volume step; a null reading stays empty in the sheet.
pub fn pick_points(df: &DataFrame, rows: &[usize]) -> Result<Vec<CalibrationPoint>> {
    if rows.len() != VOLUMES_ML.len() {
        return Err(PipelineError::Selection(format!(
            "calibration needs {} row indices, got {}",
            VOLUMES_ML.len(),
            rows.len()
        )));
    }
    let readings = frame::values(df, EcColumn::EcCompensated.canonical_name())?;

    rows.iter()
        .zip(VOLUMES_ML.iter().zip(ADDED_ML))
        .map(|(&row, (&volume_ml, added_ml))| {
            let reading = readings.get(row).ok_or_else(|| {
                PipelineError::Selection(format!(
                    "row {row} is outside the series (0..{})",
                    readings.len()
                ))
            })?;
            Ok(CalibrationPoint {
                volume_ml,
                added_ml,
                ec_us_cm: *reading,
            })
        })
        .collect()
}

/// Header block in A1:B6 with bold right-aligned keys, then the point table from row 8.
pub fn build_cf_workbook(
    header: &CalibrationHeader,
    points: &[CalibrationPoint],
) -> Result<Workbook> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    let key_format = Format::new().set_bold().set_align(FormatAlign::Right);
    let value_format = Format::new().set_align(FormatAlign::Right);
    let table_header_format = Format::new().set_bold();

    for (row, (key, value)) in header.rows().iter().enumerate() {
        worksheet.write_string_with_format(row as u32, 0, *key, &key_format)?;
        worksheet.write_string_with_format(row as u32, 1, value, &value_format)?;
    }

    for (col, title) in TABLE_HEADER.iter().enumerate() {
        worksheet.write_string_with_format(
            TABLE_ROW,
            col as u16,
            *title,
            &table_header_format,
        )?;
    }
    for (idx, point) in points.iter().enumerate() {
        let row = TABLE_ROW + 1 + idx as u32;
        worksheet.write_number(row, 0, point.volume_ml)?;
        worksheet.write_number(row, 1, point.added_ml)?;
        if let Some(ec) = point.ec_us_cm.filter(|v| v.is_finite()) {
            worksheet.write_number(row, 2, ec)?;
        }
    }

    worksheet.autofit();
    Ok(workbook)
}

/// Writes the calibration sheet into `output_dir` under [`CalibrationHeader::file_name`].
pub fn write_cf(
    header: &CalibrationHeader,
    points: &[CalibrationPoint],
    output_dir: &Path,
) -> Result<PathBuf> {
    let path = output_dir.join(header.file_name());
    let mut workbook = build_cf_workbook(header, points)?;
    save_workbook(&mut workbook, &path)?;
    debug!(path = %path.display(), points = points.len(), "Wrote calibration sheet");
    Ok(path)
}
