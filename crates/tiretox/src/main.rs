use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tiretox_core::PipelineConfig;
use tracing_subscriber::EnvFilter;

mod commands;
use commands::ec::{handle_ec_command, EcCommands};
use commands::sites::print_sites;
use commands::stage::{handle_stage_command, StageCommands};

/// Stage and salt-tracer data pipeline for the tire-toxin monitoring sites
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Pipeline configuration (TOML). Falls back to TIRETOX_CONFIG, then the built-in catalog.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Water-level (stage) logger exports.
    Stage {
        #[command(subcommand)]
        command: StageCommands,
    },
    /// Conductivity (salt tracer) exports.
    Ec {
        #[command(subcommand)]
        command: EcCommands,
    },
    /// Print the site catalog.
    Sites,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::resolve(cli.config.as_deref())
        .context("failed to load pipeline configuration")?;

    match cli.command {
        Command::Stage { command } => handle_stage_command(command, config),
        Command::Ec { command } => handle_ec_command(command, &config),
        Command::Sites => {
            print_sites(&config);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn select_accepts_repeated_windows() {
        let cli = Cli::try_parse_from([
            "tiretox",
            "ec",
            "select",
            "QQM_CH0_AT512_20241217.xlsx",
            "--station",
            "QQM",
            "--location",
            "CH0",
            "--start",
            "2024-12-17 10:50:00",
            "--end",
            "2024-12-17 10:55:00",
            "--start",
            "2024-12-17 11:20:00",
            "--end",
            "2024-12-17 11:25:00",
        ])
        .expect("valid command line");

        let Command::Ec {
            command: EcCommands::Select(args),
        } = cli.command
        else {
            panic!("expected ec select");
        };
        assert_eq!(args.starts.len(), 2);
        assert_eq!(args.ends.len(), 2);
        assert_eq!(args.dump, 1);
    }

    #[test]
    fn cf_rows_default_to_first_six() {
        let parse = |extra: &[&str]| {
            let mut argv = vec!["tiretox", "ec", "cf", "cal.csv", "--site", "QQM"];
            argv.extend_from_slice(extra);
            match Cli::try_parse_from(argv).expect("valid command line").command {
                Command::Ec {
                    command: EcCommands::Cf(args),
                } => args,
                _ => panic!("expected ec cf"),
            }
        };

        let defaults = parse(&[]);
        assert_eq!(defaults.rows, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(defaults.primary_solution, 30000.0);
        assert!(!defaults.lab);

        let picked = parse(&["--rows", "2,4,6,8,10,12", "--lab", "--calibration-date", "20241218"]);
        assert_eq!(picked.rows, vec![2, 4, 6, 8, 10, 12]);
        assert!(picked.lab);
        assert!(picked.calibration_date.is_some());
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::try_parse_from(["tiretox", "sites", "--config", "sites.toml"])
            .expect("valid command line");
        assert_eq!(cli.config, Some(PathBuf::from("sites.toml")));
    }

    #[test]
    fn bad_timestamp_is_rejected() {
        let result = Cli::try_parse_from([
            "tiretox", "ec", "select", "f.csv", "--station", "QQM", "--location", "CH0",
            "--start", "noon", "--end", "2024-12-17 10:55:00",
        ]);
        assert!(result.is_err());
    }
}
