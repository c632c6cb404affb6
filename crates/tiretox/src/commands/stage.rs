use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tiretox_core::{process_stage_file, PipelineConfig, RunOptions, RunReport};
use tiretox_parser::SeriesKind;

use super::write_destack_comparison;

#[derive(clap::Subcommand, Debug)]
pub enum StageCommands {
    /// Fold a logger export into its site master, correcting it against the companion
    /// barometric master.
    Process(ProcessArgs),
    /// Write stacked and corrected timestamps side by side without touching any master.
    Destack {
        file: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct ProcessArgs {
    pub file: PathBuf,
    /// Use this site instead of detecting it from the file name.
    #[arg(long)]
    pub site: Option<String>,
    /// Spread stacked timestamps before merging.
    #[arg(long)]
    pub destack: bool,
    /// Run every step but write nothing.
    #[arg(long)]
    pub dry_run: bool,
    #[arg(long)]
    pub master_dir: Option<PathBuf>,
    /// Print the run report as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn handle_stage_command(command: StageCommands, mut config: PipelineConfig) -> Result<()> {
    match command {
        StageCommands::Process(args) => {
            if let Some(dir) = args.master_dir {
                config.master_dir = dir;
            }
            let options = RunOptions {
                site: args.site,
                destack: args.destack,
                dry_run: args.dry_run,
            };
            let report = process_stage_file(&args.file, &config, &options)
                .with_context(|| format!("failed to process {}", args.file.display()))?;

            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
            Ok(())
        }
        StageCommands::Destack { file, output } => {
            write_destack_comparison(&file, &output, SeriesKind::Stage, &config)
        }
    }
}

fn print_report(report: &RunReport) {
    println!("Processed {} ({})", report.input.display(), report.layout);
    println!("  site:                {}", report.site);
    println!("  rows read:           {}", report.input_rows);
    if report.destacked_runs > 0 {
        println!("  stacked runs:        {}", report.destacked_runs);
    }
    println!("  new rows:            {}", report.new_rows);
    println!("  barometric matches:  {}", report.matched);
    println!("  unmatched:           {}", report.unmatched);
    println!("  water levels:        {}", report.water_levels_computed);
    println!("  averaged timestamps: {}", report.averaged_timestamps);
    println!("  fenced rows:         {}", report.fenced_rows);
    println!("  master rows:         {}", report.total_rows);
    for warning in &report.warnings {
        println!("  ⚠️  {warning}");
    }
    if report.persisted {
        println!("✅ Master written to {}", report.output_path.display());
    } else {
        println!("Dry run: {} left unchanged", report.output_path.display());
    }
}
