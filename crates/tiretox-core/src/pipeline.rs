//! Stage-data run: ingest one logger export, fold it into the site master, correct it
//! against the companion barometric master and persist.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use serde::Serialize;
use tiretox_parser::frame::{self, SeriesKind};
use tiretox_parser::sheet::extension_of;
use tiretox_parser::{parse_stage_sheet, Layout, ParseOptions, Sheet};
use tracing::{debug, error, info, warn};

use crate::barometric::{self, BarometricIndex};
use crate::config::{PipelineConfig, SiteConfig};
use crate::destack;
use crate::error::{PipelineError, Result};
use crate::master;
use crate::merge::{self, MergeStats};
use crate::site;
use crate::water_level;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Start,
    Ingest,
    Destack,
    MergePre,
    BarometricCorrect,
    WaterLevel,
    MergePost,
    Persist,
    Persisted,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStage::Start => "start",
            RunStage::Ingest => "ingest",
            RunStage::Destack => "destack",
            RunStage::MergePre => "merge_pre",
            RunStage::BarometricCorrect => "barometric_correct",
            RunStage::WaterLevel => "water_level",
            RunStage::MergePost => "merge_post",
            RunStage::Persist => "persist",
            RunStage::Persisted => "persisted",
        };
        f.write_str(name)
    }
}

/// Non-fatal conditions collected during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// Rows still lack differential pressure: no companion master, an empty one, or no
    /// sample within tolerance.
    MissingBarometricData {
        companion: String,
        reason: String,
        unmatched: usize,
    },
    DuplicateBarometricTimestamps { companion: String, duplicates: usize },
    ApproximateDestack { runs: usize },
    AveragedDuplicates { timestamps: usize },
    /// Rows whose water level fell outside the fence and were blanked.
    FencedRows { rows: usize },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MissingBarometricData {
                companion,
                reason,
                unmatched,
            } => write!(
                f,
                "missing barometric data from {companion} ({reason}); {unmatched} rows uncorrected"
            ),
            Warning::DuplicateBarometricTimestamps {
                companion,
                duplicates,
            } => write!(f, "{companion} has {duplicates} duplicate timestamps"),
            Warning::ApproximateDestack { runs } => {
                write!(f, "{runs} stacked runs did not fit their gap")
            }
            Warning::AveragedDuplicates { timestamps } => {
                write!(f, "{timestamps} duplicate timestamps averaged")
            }
            Warning::FencedRows { rows } => {
                write!(f, "{rows} rows outside the water-level fence blanked")
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Skip file-name detection and use this site.
    pub site: Option<String>,
    pub destack: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub input: PathBuf,
    pub input_hash: String,
    pub site: String,
    pub layout: Layout,
    pub sensor_name: Option<String>,
    pub input_rows: usize,
    pub destacked_runs: usize,
    pub new_rows: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub water_levels_computed: usize,
    pub averaged_timestamps: usize,
    pub fenced_rows: usize,
    pub total_rows: usize,
    pub output_path: PathBuf,
    pub persisted: bool,
    pub stages: Vec<RunStage>,
    pub warnings: Vec<Warning>,
}

pub fn compute_hash(contents: &[u8]) -> String {
    blake3::hash(contents).to_hex().to_string()
}

struct StageTracker {
    current: RunStage,
    visited: Vec<RunStage>,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            current: RunStage::Start,
            visited: vec![RunStage::Start],
        }
    }

    fn advance(&mut self, next: RunStage) {
        debug!(from = %self.current, to = %next, "Run stage");
        self.current = next;
        self.visited.push(next);
    }
}

/// Runs the full stage pipeline for one file. Format and site errors surface before
/// anything is written; with `dry_run` nothing is written at all.
pub fn process_stage_file(
    path: &Path,
    config: &PipelineConfig,
    options: &RunOptions,
) -> Result<RunReport> {
    let mut tracker = StageTracker::new();
    match run(path, config, options, &mut tracker) {
        Ok(report) => Ok(report),
        Err(err) => {
            error!(stage = %tracker.current, input = %path.display(), "Run failed: {err}");
            Err(err)
        }
    }
}

fn run(
    path: &Path,
    config: &PipelineConfig,
    options: &RunOptions,
    tracker: &mut StageTracker,
) -> Result<RunReport> {
    let bytes = fs::read(path).map_err(|source| PipelineError::io(path, source))?;
    let input_hash = compute_hash(&bytes);

    let site = match &options.site {
        Some(name) => site::site_by_name(config, name)?,
        None => site::detect_site_for_path(config, path)?,
    };
    let companion = site::companion_of(config, site)?;
    info!(site = %site.name, input = %path.display(), hash = %input_hash, "Processing stage file");

    tracker.advance(RunStage::Ingest);
    let sheet = Sheet::from_bytes(&bytes, &extension_of(path))?;
    let parsed = parse_stage_sheet(&sheet, &ParseOptions::default())?;
    let input_rows = parsed.df.height();
    info!(layout = %parsed.metadata.layout, rows = input_rows, "Ingested");

    let mut warnings = Vec::new();
    let mut readings = parsed.df;
    let mut destacked_runs = 0;

    if options.destack {
        tracker.advance(RunStage::Destack);
        let outcome = destack::destack(&readings, config.destack_interval_micros())?;
        destacked_runs = outcome.runs.len();
        let approximate = outcome.runs.iter().filter(|run| !run.fits_gap).count();
        if approximate > 0 {
            warnings.push(Warning::ApproximateDestack { runs: approximate });
        }
        readings = outcome.corrected;
    }

    tracker.advance(RunStage::MergePre);
    let output_path = master::master_path(config, &site.name);
    let existing = match master::read_master(&output_path)? {
        Some(df) => df,
        None => {
            info!(path = %output_path.display(), "No master file yet; starting a new one");
            frame::empty_frame(&SeriesKind::Stage.column_names())?
        }
    };
    let pre = merge::merge(&existing, &readings, &config.fence)?;
    info!(new_rows = pre.stats.new_rows, "Merged upload into master");

    let mut merged = pre.df;
    let mut matched = 0;
    let mut unmatched = 0;
    let mut water_levels_computed = 0;

    if let Some(companion) = companion {
        tracker.advance(RunStage::BarometricCorrect);
        let outcome = correct_against(&merged, companion, config, &mut warnings)?;
        matched = outcome.matched;
        unmatched = outcome.unmatched;
        merged = outcome.df;

        tracker.advance(RunStage::WaterLevel);
        let levels = water_level::compute(&merged, config.gravity)?;
        water_levels_computed = levels.computed;
        merged = levels.df;
        info!(matched, unmatched, water_levels_computed, "Applied barometric correction");
    } else {
        debug!(site = %site.name, "Barometric site; correction skipped");
    }

    tracker.advance(RunStage::MergePost);
    let post = merge::finalize(&merged, &config.fence)?;
    let stats = MergeStats {
        new_rows: pre.stats.new_rows,
        averaged_timestamps: pre.stats.averaged_timestamps + post.stats.averaged_timestamps,
        fenced_rows: pre.stats.fenced_rows + post.stats.fenced_rows,
    };
    let merged = post.df;

    if stats.averaged_timestamps > 0 {
        warnings.push(Warning::AveragedDuplicates {
            timestamps: stats.averaged_timestamps,
        });
    }
    if stats.fenced_rows > 0 {
        warnings.push(Warning::FencedRows {
            rows: stats.fenced_rows,
        });
    }

    for warning in &warnings {
        warn!(site = %site.name, "{warning}");
    }

    let persisted = if options.dry_run {
        info!(path = %output_path.display(), "Dry run; master not written");
        false
    } else {
        tracker.advance(RunStage::Persist);
        master::write_series(&merged, &output_path, SeriesKind::Stage)?;
        tracker.advance(RunStage::Persisted);
        info!(path = %output_path.display(), rows = merged.height(), "Master written");
        true
    };

    Ok(RunReport {
        input: path.to_path_buf(),
        input_hash,
        site: site.name.clone(),
        layout: parsed.metadata.layout,
        sensor_name: parsed.metadata.sensor_name,
        input_rows,
        destacked_runs,
        new_rows: stats.new_rows,
        matched,
        unmatched,
        water_levels_computed,
        averaged_timestamps: stats.averaged_timestamps,
        fenced_rows: stats.fenced_rows,
        total_rows: merged.height(),
        output_path,
        persisted,
        stages: tracker.visited.clone(),
        warnings,
    })
}

fn correct_against(
    df: &DataFrame,
    companion: &SiteConfig,
    config: &PipelineConfig,
    warnings: &mut Vec<Warning>,
) -> Result<barometric::CorrectionOutcome> {
    let companion_path = master::master_path(config, &companion.name);
    let (index, found) = match master::read_master(&companion_path)? {
        Some(baro) => (BarometricIndex::from_frame(&baro)?, true),
        None => (BarometricIndex::default(), false),
    };

    if index.duplicates() > 0 {
        warnings.push(Warning::DuplicateBarometricTimestamps {
            companion: companion.name.clone(),
            duplicates: index.duplicates(),
        });
    }

    let outcome = barometric::correct(df, &index, config.barometric_tolerance_micros())?;
    if outcome.unmatched > 0 || !found {
        let reason = if !found {
            format!("{} not found", companion_path.display())
        } else if index.is_empty() {
            "no barometric readings".to_string()
        } else {
            "no reading within tolerance".to_string()
        };
        warnings.push(Warning::MissingBarometricData {
            companion: companion.name.clone(),
            reason,
            unmatched: outcome.unmatched,
        });
    }
    Ok(outcome)
}
