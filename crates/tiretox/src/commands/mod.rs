pub mod ec;
pub mod sites;
pub mod stage;

use std::path::Path;

use anyhow::{Context, Result};
use tiretox_core::destack::destack;
use tiretox_core::master::write_series;
use tiretox_core::PipelineConfig;
use tiretox_parser::{read_sensor_file, ParseOptions, SeriesKind};

/// Shared by `stage destack` and `ec destack`: writes original and corrected timestamps
/// side by side so the correction can be reviewed before it is applied.
pub(crate) fn write_destack_comparison(
    file: &Path,
    output: &Path,
    kind: SeriesKind,
    config: &PipelineConfig,
) -> Result<()> {
    let parsed = read_sensor_file(file, kind, &ParseOptions::default())
        .with_context(|| format!("failed to read {}", file.display()))?;
    let outcome = destack(&parsed.df, config.destack_interval_micros())?;

    if !outcome.has_runs() {
        println!("No stacked timestamps in {}", file.display());
    }
    for run in &outcome.runs {
        println!(
            "  rows {}..{}: {} readings {}",
            run.start_row,
            run.start_row + run.len,
            run.len,
            if run.fits_gap { "spread over gap" } else { "approximate" }
        );
    }

    write_series(&outcome.comparison()?, output, kind)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!(
        "Corrected {} rows; comparison written to {}",
        outcome.corrected_rows(),
        output.display()
    );
    Ok(())
}
