use polars::prelude::*;
use tiretox_core::barometric::{correct, BarometricIndex};
use tiretox_core::destack::{destack, ORIGINAL_TIMESTAMP};
use tiretox_core::water_level::{self, STANDARD_GRAVITY};
use tiretox_parser::frame;

const SECOND: i64 = 1_000_000;
const MINUTE: i64 = 60 * SECOND;
const TOLERANCE: i64 = 10 * MINUTE;

fn readings(ts: &[i64], dp: &[Option<f64>], ap: &[Option<f64>]) -> DataFrame {
    frame::from_columns(
        ts.to_vec(),
        vec![
            ("differential_pressure_kpa".to_string(), dp.to_vec()),
            ("absolute_pressure_kpa".to_string(), ap.to_vec()),
        ],
    )
    .expect("readings frame")
}

#[test]
fn tolerance_boundary_is_inclusive() -> PolarsResult<()> {
    let index = BarometricIndex::from_samples(vec![(0, 100.0)]);
    let df = readings(
        &[10 * MINUTE, 10 * MINUTE + SECOND],
        &[None, None],
        &[Some(101.0), Some(101.0)],
    );

    let outcome = correct(&df, &index, TOLERANCE)?;
    assert_eq!(outcome.matched, 1);
    assert_eq!(outcome.unmatched, 1);
    assert_eq!(
        frame::values(&outcome.df, "differential_pressure_kpa")?,
        vec![Some(1.0), None]
    );
    Ok(())
}

#[test]
fn existing_differential_pressure_is_kept() -> PolarsResult<()> {
    let index = BarometricIndex::from_samples(vec![(0, 100.0), (15 * MINUTE, 100.5)]);
    let df = readings(
        &[0, 5 * MINUTE, 14 * MINUTE, 20 * MINUTE],
        &[Some(0.3), None, None, None],
        &[Some(101.0), None, Some(101.5), Some(101.2)],
    );

    let outcome = correct(&df, &index, TOLERANCE)?;
    // Rows with a reading or without absolute pressure are not candidates.
    assert_eq!(outcome.matched, 2);
    assert_eq!(outcome.unmatched, 0);
    let dp = frame::values(&outcome.df, "differential_pressure_kpa")?;
    assert_eq!(dp[0], Some(0.3));
    assert_eq!(dp[1], None);
    assert!((dp[2].unwrap() - 1.0).abs() < 1e-9);
    assert!((dp[3].unwrap() - 0.7).abs() < 1e-9);
    Ok(())
}

#[test]
fn null_barometric_rows_are_not_indexed() -> PolarsResult<()> {
    let baro = frame::from_columns(
        vec![0, 5 * MINUTE],
        vec![(
            "barometric_pressure_kpa".to_string(),
            vec![Some(100.0), None],
        )],
    )?;
    let index = BarometricIndex::from_frame(&baro)?;
    assert_eq!(index.len(), 1);

    let df = readings(&[5 * MINUTE], &[None], &[Some(101.0)]);
    let outcome = correct(&df, &index, TOLERANCE)?;
    assert_eq!(outcome.matched, 1);
    assert_eq!(
        frame::values(&outcome.df, "differential_pressure_kpa")?,
        vec![Some(1.0)]
    );
    Ok(())
}

#[test]
fn empty_barometric_series_leaves_every_candidate_unmatched() -> PolarsResult<()> {
    let df = readings(&[0, MINUTE], &[None, None], &[Some(101.0), Some(101.1)]);
    let outcome = correct(&df, &BarometricIndex::default(), TOLERANCE)?;
    assert_eq!(outcome.matched, 0);
    assert_eq!(outcome.unmatched, 2);
    Ok(())
}

#[test]
fn water_level_fills_only_missing_values() -> PolarsResult<()> {
    let df = frame::from_columns(
        vec![0, MINUTE, 2 * MINUTE, 3 * MINUTE],
        vec![
            (
                "differential_pressure_kpa".to_string(),
                vec![Some(1.0), Some(1.0), None, Some(0.5)],
            ),
            (
                "temperature_c".to_string(),
                vec![Some(20.0), Some(20.0), Some(20.0), None],
            ),
            (
                "water_level_m".to_string(),
                vec![None, Some(0.25), None, None],
            ),
        ],
    )?;

    let outcome = water_level::compute(&df, STANDARD_GRAVITY)?;
    assert_eq!(outcome.computed, 1);
    let level = frame::values(&outcome.df, "water_level_m")?;
    assert!((level[0].unwrap() - 0.10209).abs() < 5e-6);
    assert_eq!(level[1], Some(0.25));
    assert_eq!(level[2], None);
    assert_eq!(level[3], None);
    Ok(())
}

#[test]
fn stacked_run_is_spread_over_the_gap() -> PolarsResult<()> {
    let t = 1_000 * SECOND;
    let df = frame::from_columns(
        vec![t, t + 15 * SECOND, t + 15 * SECOND, t + 15 * SECOND, t + 20 * SECOND],
        vec![(
            "ec_t_us_cm".to_string(),
            vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0)],
        )],
    )?;

    let outcome = destack(&df, 5 * SECOND)?;
    assert_eq!(outcome.runs.len(), 1);
    assert!(outcome.runs[0].fits_gap);
    assert_eq!(
        frame::timestamps(&outcome.corrected)?,
        vec![t, t + 5 * SECOND, t + 10 * SECOND, t + 15 * SECOND, t + 20 * SECOND]
    );
    assert_eq!(
        frame::values(&outcome.corrected, "ec_t_us_cm")?,
        vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0)]
    );
    assert!(outcome.original.equals_missing(&df));

    let comparison = outcome.comparison()?;
    assert_eq!(
        comparison.get_column_names(),
        vec![ORIGINAL_TIMESTAMP, "timestamp", "ec_t_us_cm"]
    );
    Ok(())
}

#[test]
fn short_gap_is_accepted_as_approximate() -> PolarsResult<()> {
    let t = 1_000 * SECOND;
    let df = frame::from_columns(
        vec![t, t + 7 * SECOND, t + 7 * SECOND, t + 7 * SECOND],
        vec![("ec_us_cm".to_string(), vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)])],
    )?;

    let outcome = destack(&df, 5 * SECOND)?;
    assert!(!outcome.runs[0].fits_gap);
    assert_eq!(
        frame::timestamps(&outcome.corrected)?,
        vec![t, t - 3 * SECOND, t + 2 * SECOND, t + 7 * SECOND]
    );
    Ok(())
}

#[test]
fn unstacked_series_is_unchanged() -> PolarsResult<()> {
    let df = readings(&[0, MINUTE], &[Some(0.1), Some(0.2)], &[None, None]);
    let outcome = destack(&df, 5 * SECOND)?;
    assert!(!outcome.has_runs());
    assert!(outcome.corrected.equals_missing(&df));
    Ok(())
}
