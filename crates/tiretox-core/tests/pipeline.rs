use std::path::{Path, PathBuf};

use anyhow::Result;
use tiretox_core::master::{master_path, read_master};
use tiretox_core::water_level::water_level_m;
use tiretox_core::{process_stage_file, PipelineConfig, PipelineError, RunOptions, RunStage, Warning};
use tiretox_parser::frame;
use tiretox_parser::Layout;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(name)
}

fn config_in(dir: &Path) -> PipelineConfig {
    PipelineConfig {
        master_dir: dir.to_path_buf(),
        ..PipelineConfig::default()
    }
}

fn close(actual: Option<f64>, expected: f64) -> bool {
    actual.is_some_and(|value| (value - expected).abs() < 1e-6)
}

#[test]
fn barometric_site_is_stored_without_correction() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = config_in(dir.path());

    let report = process_stage_file(
        &fixture("cat_beaconsBT_20241029.csv"),
        &config,
        &RunOptions::default(),
    )?;

    assert_eq!(report.site, "cat_beaconsBT");
    assert_eq!(report.layout, Layout::HoboBt);
    assert_eq!(report.new_rows, 3);
    assert_eq!(report.matched + report.unmatched, 0);
    assert!(report.persisted);
    assert!(!report.stages.contains(&RunStage::BarometricCorrect));
    assert_eq!(report.stages.last(), Some(&RunStage::Persisted));
    assert_eq!(report.input_hash.len(), 64);

    let master = read_master(&master_path(&config, "cat_beaconsBT"))?.expect("master written");
    assert_eq!(master.height(), 3);
    assert_eq!(
        frame::measurement_columns(&master),
        vec![
            "differential_pressure_kpa",
            "absolute_pressure_kpa",
            "temperature_c",
            "water_level_m",
            "barometric_pressure_kpa"
        ]
    );
    assert_eq!(
        frame::values(&master, "barometric_pressure_kpa")?,
        vec![Some(101.2), Some(101.21), Some(101.22)]
    );
    Ok(())
}

#[test]
fn non_barometric_site_is_corrected_from_companion_master() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = config_in(dir.path());

    process_stage_file(
        &fixture("cat_beaconsBT_20241029.csv"),
        &config,
        &RunOptions::default(),
    )?;
    let report = process_stage_file(
        &fixture("cat_beacons_20241029.csv"),
        &config,
        &RunOptions::default(),
    )?;

    assert_eq!(report.site, "cat_beacons");
    assert_eq!(report.layout, Layout::HoboNonBt);
    assert_eq!(report.input_rows, 4);
    assert_eq!(report.new_rows, 4);
    assert_eq!(report.averaged_timestamps, 1);
    assert_eq!(report.matched, 2);
    assert_eq!(report.unmatched, 1);
    assert_eq!(report.water_levels_computed, 2);
    assert_eq!(report.total_rows, 3);
    assert!(report
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::MissingBarometricData { unmatched: 1, .. })));
    assert!(report
        .warnings
        .contains(&Warning::AveragedDuplicates { timestamps: 1 }));

    let master = read_master(&master_path(&config, "cat_beacons"))?.expect("master written");
    let dp = frame::values(&master, "differential_pressure_kpa")?;
    let wl = frame::values(&master, "water_level_m")?;
    let ap = frame::values(&master, "absolute_pressure_kpa")?;

    assert!(close(dp[0], 101.612 - 101.2));
    assert!(close(dp[1], 101.71 - 101.21));
    assert_eq!(dp[2], None);
    assert!(close(wl[0], water_level_m(101.612 - 101.2, 20.0, 9.81)));
    assert!(close(wl[1], water_level_m(101.71 - 101.21, 20.0, 9.81)));
    assert_eq!(wl[2], None);
    assert!(close(ap[2], 101.66));
    Ok(())
}

#[test]
fn rerunning_an_upload_adds_nothing() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = config_in(dir.path());
    let input = fixture("cat_beacons_20241029.csv");

    process_stage_file(&fixture("cat_beaconsBT_20241029.csv"), &config, &RunOptions::default())?;
    let first = process_stage_file(&input, &config, &RunOptions::default())?;
    let second = process_stage_file(&input, &config, &RunOptions::default())?;

    assert_eq!(second.new_rows, 0);
    assert_eq!(second.total_rows, first.total_rows);
    assert_eq!(second.matched, 0);
    assert_eq!(second.water_levels_computed, 0);
    assert_eq!(second.input_hash, first.input_hash);
    Ok(())
}

#[test]
fn dry_run_writes_nothing_and_reports_missing_companion() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = config_in(dir.path());

    let report = process_stage_file(
        &fixture("chase_ds_20241029.csv"),
        &config,
        &RunOptions {
            dry_run: true,
            ..RunOptions::default()
        },
    )?;

    assert_eq!(report.site, "chase_ds");
    assert!(!report.persisted);
    assert!(!report.output_path.exists());
    assert_eq!(report.unmatched, 2);
    assert_eq!(
        report.warnings,
        vec![Warning::MissingBarometricData {
            companion: "chase_usBT".to_string(),
            reason: format!("{} not found", master_path(&config, "chase_usBT").display()),
            unmatched: 2,
        }]
    );
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
    Ok(())
}

#[test]
fn site_override_bypasses_detection() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = config_in(dir.path());

    let report = process_stage_file(
        &fixture("chase_ds_20241029.csv"),
        &config,
        &RunOptions {
            site: Some("chase_us".to_string()),
            dry_run: true,
            ..RunOptions::default()
        },
    )?;
    assert_eq!(report.site, "chase_us");
    Ok(())
}

#[test]
fn unknown_site_fails_before_writing() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("mystery_logger.csv");
    std::fs::copy(fixture("chase_ds_20241029.csv"), &input)?;
    let masters = dir.path().join("masters");
    let config = config_in(&masters);

    let err = process_stage_file(&input, &config, &RunOptions::default())
        .expect_err("unknown site must fail");
    assert!(matches!(err, PipelineError::UnknownSite { .. }));
    assert!(!masters.exists());
    Ok(())
}

#[test]
fn unrecognized_layout_fails_before_writing() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("chase_us_notes.csv");
    std::fs::write(&input, "Timestamp,Level\n2024-10-29 13:00:00,1.0\n")?;
    let masters = dir.path().join("masters");
    let config = config_in(&masters);

    let err = process_stage_file(&input, &config, &RunOptions::default())
        .expect_err("layout must be rejected");
    assert!(matches!(
        err,
        PipelineError::Parser(tiretox_parser::ParserError::UnrecognizedFormat { .. })
    ));
    assert!(!masters.exists());
    Ok(())
}
