use polars::prelude::*;
use tiretox_core::config::FenceConfig;
use tiretox_core::merge::{finalize, merge};
use tiretox_parser::frame;

const MINUTE: i64 = 60_000_000;

fn stage(ts: &[i64], dp: &[Option<f64>], wl: &[Option<f64>]) -> DataFrame {
    frame::from_columns(
        ts.to_vec(),
        vec![
            ("differential_pressure_kpa".to_string(), dp.to_vec()),
            ("water_level_m".to_string(), wl.to_vec()),
        ],
    )
    .expect("stage frame")
}

fn assert_strictly_ascending(df: &DataFrame) {
    let ts = frame::timestamps(df).expect("timestamps");
    assert!(ts.windows(2).all(|w| w[0] < w[1]), "timestamps not strictly ascending: {ts:?}");
}

fn master() -> DataFrame {
    stage(
        &[0, MINUTE, 2 * MINUTE],
        &[Some(0.40), Some(0.41), None],
        &[Some(0.041), Some(0.042), None],
    )
}

#[test]
fn merging_nothing_returns_master() -> PolarsResult<()> {
    let master = master();
    let empty = stage(&[], &[], &[]);
    let outcome = merge(&master, &empty, &FenceConfig::default())?;

    assert!(outcome.df.equals_missing(&master));
    assert_eq!(outcome.stats.new_rows, 0);
    assert_eq!(outcome.stats.averaged_timestamps, 0);
    Ok(())
}

#[test]
fn merging_empty_delta_only_resorts() -> PolarsResult<()> {
    let shuffled = stage(
        &[2 * MINUTE, 0, MINUTE],
        &[None, Some(0.40), Some(0.41)],
        &[None, Some(0.041), Some(0.042)],
    );
    let empty = stage(&[], &[], &[]);
    let outcome = merge(&shuffled, &empty, &FenceConfig::default())?;

    assert!(outcome.df.equals_missing(&master()));
    Ok(())
}

#[test]
fn existing_keys_are_not_reingested() -> PolarsResult<()> {
    let upload = stage(
        &[MINUTE, 3 * MINUTE, 4 * MINUTE],
        &[Some(9.9), Some(0.43), Some(0.44)],
        &[None, None, None],
    );
    let outcome = merge(&master(), &upload, &FenceConfig::default())?;

    assert_eq!(outcome.stats.new_rows, 2);
    assert_eq!(outcome.df.height(), 5);
    assert_strictly_ascending(&outcome.df);
    // The master's reading at MINUTE wins over the re-uploaded one.
    assert_eq!(
        frame::values(&outcome.df, "differential_pressure_kpa")?[1],
        Some(0.41)
    );
    Ok(())
}

#[test]
fn reingesting_the_same_upload_is_idempotent() -> PolarsResult<()> {
    let upload = stage(
        &[5 * MINUTE, 3 * MINUTE, 3 * MINUTE, MINUTE],
        &[Some(0.5), Some(0.2), Some(0.4), Some(7.0)],
        &[Some(0.05), None, Some(0.04), None],
    );
    let fence = FenceConfig::default();

    let once = merge(&master(), &upload, &fence)?;
    let twice = merge(&once.df, &upload, &fence)?;

    assert!(twice.df.equals_missing(&once.df));
    assert_eq!(twice.stats.new_rows, 0);
    assert_strictly_ascending(&once.df);
    Ok(())
}

#[test]
fn duplicate_timestamps_average_non_null_values() -> PolarsResult<()> {
    let df = stage(
        &[MINUTE, 0, MINUTE, MINUTE],
        &[Some(1.0), Some(0.5), Some(3.0), None],
        &[None, Some(0.05), Some(0.3), None],
    );
    let outcome = finalize(&df, &FenceConfig::default())?;

    assert_eq!(outcome.df.height(), 2);
    assert_eq!(outcome.stats.averaged_timestamps, 1);
    assert_eq!(
        frame::values(&outcome.df, "differential_pressure_kpa")?,
        vec![Some(0.5), Some(2.0)]
    );
    assert_eq!(
        frame::values(&outcome.df, "water_level_m")?,
        vec![Some(0.05), Some(0.3)]
    );
    Ok(())
}

#[test]
fn fenced_rows_lose_every_field() -> PolarsResult<()> {
    let upload = stage(
        &[3 * MINUTE, 4 * MINUTE, 5 * MINUTE, 6 * MINUTE],
        &[Some(0.5), Some(0.6), Some(0.7), Some(0.8)],
        &[Some(10.5), Some(-250.0), Some(10.0), Some(-200.0)],
    );
    let outcome = merge(&master(), &upload, &FenceConfig::default())?;

    assert_eq!(outcome.stats.fenced_rows, 2);
    assert_eq!(outcome.df.height(), 7);
    let dp = frame::values(&outcome.df, "differential_pressure_kpa")?;
    let wl = frame::values(&outcome.df, "water_level_m")?;
    assert_eq!(&dp[3..], &[None, None, Some(0.7), Some(0.8)]);
    assert_eq!(&wl[3..], &[None, None, Some(10.0), Some(-200.0)]);
    Ok(())
}

#[test]
fn fill_value_is_averaged_before_fencing() -> PolarsResult<()> {
    let df = stage(
        &[0, 0],
        &[Some(0.4), Some(0.4)],
        &[Some(0.04), Some(-9999.0)],
    );
    let outcome = finalize(&df, &FenceConfig::default())?;

    assert_eq!(outcome.stats.averaged_timestamps, 1);
    assert_eq!(outcome.stats.fenced_rows, 1);
    assert_eq!(frame::values(&outcome.df, "differential_pressure_kpa")?, vec![None]);
    Ok(())
}

#[test]
fn upload_columns_extend_master_columns() -> PolarsResult<()> {
    let upload = frame::from_columns(
        vec![10 * MINUTE],
        vec![("temperature_c".to_string(), vec![Some(12.5)])],
    )?;
    let outcome = merge(&master(), &upload, &FenceConfig::default())?;

    assert_eq!(
        frame::measurement_columns(&outcome.df),
        vec!["differential_pressure_kpa", "water_level_m", "temperature_c"]
    );
    assert_eq!(
        frame::values(&outcome.df, "temperature_c")?,
        vec![None, None, None, Some(12.5)]
    );
    Ok(())
}
