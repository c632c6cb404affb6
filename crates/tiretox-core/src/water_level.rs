use polars::prelude::*;
use tiretox_parser::frame::{self, StageColumn};

pub const STANDARD_GRAVITY: f64 = 9.81;

/// Freshwater density (kg/m³) from temperature (°C). Linear fit, valid for roughly 0–40 °C.
pub fn water_density(temperature_c: f64) -> f64 {
    999.84 - 0.067 * temperature_c
}

/// Water column height (m) for a differential pressure (kPa).
pub fn water_level_m(differential_pressure_kpa: f64, temperature_c: f64, gravity: f64) -> f64 {
    differential_pressure_kpa * 1000.0 / (water_density(temperature_c) * gravity)
}

#[derive(Debug, Clone)]
pub struct WaterLevelOutcome {
    pub df: DataFrame,
    pub computed: usize,
}

/// Fills missing water levels from differential pressure and temperature. Rows without a
/// temperature stay null; existing water levels are kept.
pub fn compute(df: &DataFrame, gravity: f64) -> PolarsResult<WaterLevelOutcome> {
    let wl_name = StageColumn::WaterLevel.canonical_name();
    let differential = frame::values_or_null(df, StageColumn::DifferentialPressure.canonical_name())?;
    let temperature = frame::values_or_null(df, StageColumn::Temperature.canonical_name())?;
    let mut level = frame::values_or_null(df, wl_name)?;

    let mut computed = 0;
    for idx in 0..df.height() {
        if level[idx].is_some() {
            continue;
        }
        if let (Some(dp), Some(temp)) = (differential[idx], temperature[idx]) {
            level[idx] = Some(water_level_m(dp, temp, gravity));
            computed += 1;
        }
    }

    let mut out = df.clone();
    out.with_column(Series::new(wl_name.into(), level))?;
    Ok(WaterLevelOutcome { df: out, computed })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_kpa_at_twenty_degrees() {
        assert!((water_density(20.0) - 998.5).abs() < 1e-9);
        let level = water_level_m(1.0, 20.0, STANDARD_GRAVITY);
        assert!((level - 0.10209).abs() < 5e-6, "got {level}");
    }
}
