use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use clap::Args;
use polars::prelude::DataFrame;
use tiretox_core::cf::{
    pick_points, write_cf, CalibrationHeader, CalibrationSetting, DEFAULT_PRIMARY_SOLUTION_G_M3,
};
use tiretox_core::dump_events::{events_within, CsvDumpEvents, DumpEventSource};
use tiretox_core::ec_append::{append_ec_files, write_appended};
use tiretox_core::master::write_series_with_preamble;
use tiretox_core::saltwave::{
    resolve_sensor_name, series_date, subset, SaltwaveLabel, SelectionSession,
};
use tiretox_core::PipelineConfig;
use tiretox_parser::frame::naive_to_micros;
use tiretox_parser::{parse_timestamp_text, read_sensor_file, ParseOptions, SeriesKind};
use tracing::{info, warn};

use super::write_destack_comparison;

#[derive(clap::Subcommand, Debug)]
pub enum EcCommands {
    /// Save one salt-wave subset per --start/--end pair.
    Select(SelectArgs),
    /// Save a whole baseline series under its baseline name.
    Baseline(LabelArgs),
    /// Write stacked and corrected timestamps side by side.
    Destack {
        file: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Write a calibration-factor sheet from six EC.T readings.
    Cf(CfArgs),
    /// Concatenate every export matching a glob into one sorted workbook.
    Append {
        pattern: String,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        include_aggregates: bool,
    },
}

#[derive(Args, Debug)]
pub struct LabelArgs {
    pub file: PathBuf,
    #[arg(long)]
    pub station: String,
    #[arg(long)]
    pub location: String,
    /// Overrides the sensor name found in the file.
    #[arg(long)]
    pub sensor: Option<String>,
    /// YYYYMMDD; defaults to the date of the first reading.
    #[arg(long, value_parser = parse_date)]
    pub date: Option<NaiveDate>,
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,
    /// Keep Min/Max/Avg style columns from offset-header exports.
    #[arg(long)]
    pub include_aggregates: bool,
}

#[derive(Args, Debug)]
pub struct SelectArgs {
    #[command(flatten)]
    pub label: LabelArgs,
    #[arg(long = "start", required = true, value_parser = parse_time)]
    pub starts: Vec<NaiveDateTime>,
    #[arg(long = "end", required = true, value_parser = parse_time)]
    pub ends: Vec<NaiveDateTime>,
    /// Number of the first dump selected.
    #[arg(long, default_value_t = 1)]
    pub dump: u32,
    /// Dump log CSV (`site,dump_time`) used to annotate each window.
    #[arg(long)]
    pub events: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CfArgs {
    pub file: PathBuf,
    #[arg(long)]
    pub site: String,
    /// Overrides the sensor name found in the file.
    #[arg(long)]
    pub sensor: Option<String>,
    /// YYYYMMDD; defaults to the date of the first reading.
    #[arg(long, value_parser = parse_date)]
    pub sampling_date: Option<NaiveDate>,
    /// YYYYMMDD; written as N/A when omitted.
    #[arg(long, value_parser = parse_date)]
    pub calibration_date: Option<NaiveDate>,
    /// Calibrated in the lab rather than in the field.
    #[arg(long)]
    pub lab: bool,
    /// Primary salt solution concentration, g/m3.
    #[arg(long, default_value_t = DEFAULT_PRIMARY_SOLUTION_G_M3)]
    pub primary_solution: f64,
    /// Zero-based data rows holding the reading for each volume step.
    #[arg(long = "rows", value_delimiter = ',', default_values_t = [0usize, 1, 2, 3, 4, 5])]
    pub rows: Vec<usize>,
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,
}

fn parse_time(text: &str) -> std::result::Result<NaiveDateTime, String> {
    parse_timestamp_text(text.trim()).ok_or_else(|| format!("unrecognized timestamp '{text}'"))
}

fn parse_date(text: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(text.trim(), "%Y%m%d")
        .map_err(|err| format!("expected YYYYMMDD, got '{text}': {err}"))
}

pub fn handle_ec_command(command: EcCommands, config: &PipelineConfig) -> Result<()> {
    match command {
        EcCommands::Select(args) => select(args),
        EcCommands::Baseline(args) => baseline(args),
        EcCommands::Destack { file, output } => {
            write_destack_comparison(&file, &output, SeriesKind::SaltTracer, config)
        }
        EcCommands::Cf(args) => calibrate(args),
        EcCommands::Append {
            pattern,
            output,
            include_aggregates,
        } => {
            let outcome = append_ec_files(&pattern, &ParseOptions { include_aggregates })
                .with_context(|| format!("failed to append files matching '{pattern}'"))?;
            write_appended(&outcome, &output)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!(
                "Appended {} files ({} rows, {} averaged timestamps) into {}",
                outcome.files.len(),
                outcome.df.height(),
                outcome.averaged_timestamps,
                output.display()
            );
            Ok(())
        }
    }
}

struct Labelled {
    df: DataFrame,
    label: SaltwaveLabel,
    preamble: Vec<Vec<String>>,
}

fn load_labelled(args: &LabelArgs) -> Result<Labelled> {
    let options = ParseOptions {
        include_aggregates: args.include_aggregates,
    };
    let parsed = read_sensor_file(&args.file, SeriesKind::SaltTracer, &options)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    info!(layout = %parsed.metadata.layout, rows = parsed.df.height(), "Loaded EC series");

    let date = match args.date {
        Some(date) => date,
        None => series_date(&parsed.df)?,
    };
    let sensor = match &args.sensor {
        Some(sensor) => sensor.clone(),
        None => resolve_sensor_name(parsed.metadata.sensor_name.as_deref(), &args.file)?,
    };
    let label = SaltwaveLabel {
        station: args.station.clone(),
        date,
        location: args.location.clone(),
        sensor,
    };
    Ok(Labelled {
        df: parsed.df,
        label,
        preamble: parsed.metadata.preamble,
    })
}

fn select(args: SelectArgs) -> Result<()> {
    if args.starts.len() != args.ends.len() {
        bail!(
            "every --start needs an --end ({} starts, {} ends)",
            args.starts.len(),
            args.ends.len()
        );
    }
    let Labelled {
        df,
        label,
        preamble,
    } = load_labelled(&args.label)?;
    if label.is_baseline() {
        bail!(
            "location '{}' is a baseline; save it with `ec baseline`",
            label.location
        );
    }

    let dump_times = match &args.events {
        Some(path) => Some(
            CsvDumpEvents::from_path(path)
                .with_context(|| format!("failed to read dump log {}", path.display()))?
                .dump_times(&label.station)?,
        ),
        None => None,
    };

    let mut session = SelectionSession::from_frame(&df, args.dump)?;
    for (start, end) in args.starts.iter().zip(&args.ends) {
        session.click(naive_to_micros(*start))?;
        let Some(selection) = session.click(naive_to_micros(*end))? else {
            bail!("selection {start} .. {end} did not close");
        };

        let wave = subset(&df, selection.start, selection.end)?;
        let output = args.label.output_dir.join(label.dump_file_name(selection.dump));
        write_series_with_preamble(&wave, &output, SeriesKind::SaltTracer, &preamble)
            .with_context(|| format!("failed to write {}", output.display()))?;
        println!(
            "dump {}: {} rows -> {}",
            selection.dump,
            wave.height(),
            output.display()
        );

        if let Some(times) = &dump_times {
            let inside = events_within(times, &selection);
            if inside.is_empty() {
                warn!(dump = selection.dump, "No logged salt dump inside the selected window");
            }
            for time in inside {
                println!("  salt dump logged at {time}");
            }
        }
    }
    Ok(())
}

fn baseline(args: LabelArgs) -> Result<()> {
    let Labelled {
        df,
        label,
        preamble,
    } = load_labelled(&args)?;
    if !label.is_baseline() {
        bail!(
            "location '{}' is not a baseline; use `ec select` for salt waves",
            label.location
        );
    }
    let output = args.output_dir.join(label.baseline_file_name());
    save_whole(&df, &output, &preamble)
}

fn save_whole(df: &DataFrame, output: &Path, preamble: &[Vec<String>]) -> Result<()> {
    write_series_with_preamble(df, output, SeriesKind::SaltTracer, preamble)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("baseline: {} rows -> {}", df.height(), output.display());
    Ok(())
}

fn calibrate(args: CfArgs) -> Result<()> {
    let parsed = read_sensor_file(&args.file, SeriesKind::SaltTracer, &ParseOptions::default())
        .with_context(|| format!("failed to read {}", args.file.display()))?;

    let header = CalibrationHeader {
        field_sampling_date: match args.sampling_date {
            Some(date) => date,
            None => series_date(&parsed.df)?,
        },
        calibration_date: args.calibration_date,
        site: args.site,
        sensor: match args.sensor {
            Some(sensor) => sensor,
            None => resolve_sensor_name(parsed.metadata.sensor_name.as_deref(), &args.file)?,
        },
        setting: if args.lab {
            CalibrationSetting::Lab
        } else {
            CalibrationSetting::Field
        },
        primary_solution_g_m3: args.primary_solution,
    };

    let points = pick_points(&parsed.df, &args.rows)?;
    let missing = points.iter().filter(|p| p.ec_us_cm.is_none()).count();
    if missing > 0 {
        warn!(missing, "Calibration rows without an EC.T reading are left empty");
    }
    let output = write_cf(&header, &points, &args.output_dir)
        .with_context(|| format!("failed to write calibration sheet for {}", header.site))?;
    println!("calibration: {} points -> {}", points.len(), output.display());
    Ok(())
}
