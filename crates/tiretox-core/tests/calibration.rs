use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::NaiveDate;
use tiretox_core::cf::{
    pick_points, write_cf, CalibrationHeader, CalibrationSetting, DEFAULT_PRIMARY_SOLUTION_G_M3,
};
use tiretox_core::PipelineError;
use tiretox_parser::{read_sensor_file, Cell, ParseOptions, SeriesKind, Sheet};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(name)
}

fn header() -> CalibrationHeader {
    CalibrationHeader {
        field_sampling_date: NaiveDate::from_ymd_opt(2024, 12, 17).unwrap(),
        calibration_date: NaiveDate::from_ymd_opt(2024, 12, 18),
        site: "QQM".to_string(),
        sensor: "AT512".to_string(),
        setting: CalibrationSetting::Field,
        primary_solution_g_m3: DEFAULT_PRIMARY_SOLUTION_G_M3,
    }
}

#[test]
fn calibration_sheet_pairs_volumes_with_readings() -> Result<()> {
    let parsed = read_sensor_file(
        &fixture("QQM_CH0_AT512_20241217.csv"),
        SeriesKind::SaltTracer,
        &ParseOptions::default(),
    )?;
    let points = pick_points(&parsed.df, &[0, 1, 2, 3, 4, 5])?;
    assert_eq!(points[2].ec_us_cm, Some(571.0));

    let dir = tempfile::tempdir()?;
    let path = write_cf(&header(), &points, dir.path())?;
    assert_eq!(path, dir.path().join("QQM_20241217_AT512_CFvals.xlsx"));

    let sheet = Sheet::from_path(&path)?;
    assert_eq!(sheet.cell(0, 0).as_text(), Some("Field Sampling Date"));
    assert_eq!(sheet.cell(0, 1).as_text(), Some("2024-12-17"));
    assert_eq!(sheet.cell(1, 1).as_text(), Some("2024-12-18"));
    assert_eq!(sheet.cell(3, 1).as_text(), Some("AT512"));
    assert_eq!(sheet.cell(4, 1).as_text(), Some("Field"));
    assert_eq!(sheet.cell(5, 1).as_text(), Some("30000"));
    assert!(sheet.cell(6, 0).is_empty());

    assert_eq!(sheet.cell(7, 0).as_text(), Some("Vol. [ml]"));
    assert_eq!(sheet.cell(7, 2).as_text(), Some("EC [uS/cm]"));
    assert_eq!(sheet.cell(8, 0), &Cell::Number(3000.0));
    assert_eq!(sheet.cell(8, 2), &Cell::Number(451.0));
    assert_eq!(sheet.cell(13, 0), &Cell::Number(3001.0));
    assert_eq!(sheet.cell(13, 1), &Cell::Number(1.0));
    assert_eq!(sheet.cell(13, 2), &Cell::Number(494.6));
    Ok(())
}

#[test]
fn calibration_rows_must_lie_inside_the_series() -> Result<()> {
    let parsed = read_sensor_file(
        &fixture("QQM_CH0_AT512_20241217.csv"),
        SeriesKind::SaltTracer,
        &ParseOptions::default(),
    )?;
    let err = pick_points(&parsed.df, &[0, 1, 2, 3, 4, 6]).expect_err("row 6 does not exist");
    assert!(matches!(err, PipelineError::Selection(message) if message.contains("row 6")));
    Ok(())
}
