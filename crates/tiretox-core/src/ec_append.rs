use std::path::{Path, PathBuf};

use polars::prelude::*;
use tiretox_parser::frame::{self, SeriesKind};
use tiretox_parser::{parse_ec_sheet, ParseOptions, Sheet};
use tracing::{info, warn};

use crate::config::FenceConfig;
use crate::error::{PipelineError, Result};
use crate::master;
use crate::merge;

#[derive(Debug, Clone)]
pub struct AppendOutcome {
    pub df: DataFrame,
    pub files: Vec<PathBuf>,
    pub averaged_timestamps: usize,
}

/// Concatenates every EC export matching `pattern` into one sorted series. Duplicate
/// timestamps across files are averaged.
pub fn append_ec_files(pattern: &str, options: &ParseOptions) -> Result<AppendOutcome> {
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in glob::glob(pattern)? {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(err) => warn!("Skipping unreadable path: {err}"),
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(PipelineError::Selection(format!(
            "no files match pattern '{pattern}'"
        )));
    }

    let mut names: Vec<String> = Vec::new();
    let mut timestamps: Vec<i64> = Vec::new();
    let mut columns: Vec<Vec<Option<f64>>> = Vec::new();

    for path in &files {
        let df = read_ec_file(path, options)?;
        let height = df.height();
        for name in frame::measurement_columns(&df) {
            if !names.contains(&name) {
                names.push(name);
                columns.push(vec![None; timestamps.len()]);
            }
        }
        for (name, column) in names.iter().zip(columns.iter_mut()) {
            column.extend(frame::values_or_null(&df, name)?);
        }
        timestamps.extend(frame::timestamps(&df)?);
        info!(path = %path.display(), rows = height, "Appended EC file");
    }

    let combined = frame::from_columns(timestamps, names.into_iter().zip(columns).collect())?;

    // EC series carry no water level, so the fence never applies.
    let outcome = merge::finalize(&combined, &FenceConfig::default())?;
    Ok(AppendOutcome {
        df: outcome.df,
        files,
        averaged_timestamps: outcome.stats.averaged_timestamps,
    })
}

fn read_ec_file(path: &Path, options: &ParseOptions) -> Result<DataFrame> {
    let sheet = Sheet::from_path(path)?;
    Ok(parse_ec_sheet(&sheet, options)?.df)
}

pub fn write_appended(outcome: &AppendOutcome, output: &Path) -> Result<()> {
    master::write_series(&outcome.df, output, SeriesKind::SaltTracer)
}
