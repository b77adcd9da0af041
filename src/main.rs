// SPDX-License-Identifier: PMPL-1.0-or-later

//! syg-rtc-placebo: placebo permutation tests for SYG/RTC firearm laws

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use syg_rtc_placebo::config::{resolve_seed, RunConfig};
use syg_rtc_placebo::inference::infer;
use syg_rtc_placebo::placebo::{observe, run_placebo, CancelFlag, FailurePolicy};
use syg_rtc_placebo::report::{self, PlaceboReport, ReportFormatter};
use tracing::info;

#[derive(Parser)]
#[command(name = "syg-rtc-placebo")]
#[command(version)]
#[command(about = "Placebo permutation tests for Stand-Your-Ground and Right-to-Carry laws")]
#[command(long_about = None)]
struct Cli {
    /// Debug-level logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the specification battery a run config produces
    Specs {
        /// Run config (JSON or YAML)
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
    },

    /// Fit the battery once with the true adoption years
    Observe {
        #[arg(value_name = "CONFIG")]
        config: PathBuf,

        /// Write the observed report to file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Observed pass, placebo iterations and empirical inference
    Run {
        #[arg(value_name = "CONFIG")]
        config: PathBuf,

        /// Number of placebo iterations
        #[arg(short = 'n', long)]
        iterations: Option<u32>,

        /// Base seed
        #[arg(long)]
        seed: Option<u64>,

        /// Drop failing iterations instead of aborting
        #[arg(long)]
        lenient: bool,

        /// Worker threads (0 = all cores)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Append completed iterations to this JSON-lines file
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Write the report to file (.json or .yaml)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Recompute inference from a saved report or checkpoint
    Infer {
        /// Report or `.jsonl` checkpoint holding the placebo draws
        #[arg(value_name = "SIMULATION")]
        simulation: PathBuf,

        /// Report holding the observed table
        #[arg(long)]
        observed: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(default_level))
        .context("building log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;
    let formatter = ReportFormatter::new();

    match cli.command {
        Commands::Specs { config } => {
            let config = RunConfig::load(&config)?;
            let battery = config.battery()?;
            formatter.print_battery(&battery);
        }

        Commands::Observe { config, output } => {
            let config = RunConfig::load(&config)?;
            let inputs = config.build_inputs()?;
            let observed = observe(&inputs, &config.engine)?;
            let report = PlaceboReport::observed_only(observed)?;
            formatter.print(&report);

            if let Some(path) = output {
                report::write_report(&report, &path)?;
                println!("Report saved to: {}", path.display());
            }
        }

        Commands::Run {
            config,
            iterations,
            seed,
            lenient,
            threads,
            checkpoint,
            output,
        } => {
            let mut config = RunConfig::load(&config)?;
            if let Some(iterations) = iterations {
                config.iterations = iterations;
            }
            if let Some(threads) = threads {
                config.threads = threads;
            }
            if lenient {
                config.policy = FailurePolicy::Lenient;
            }
            if checkpoint.is_some() {
                config.checkpoint = checkpoint;
            }
            let seed = resolve_seed(seed.or(config.seed))?;
            info!(seed, "resolved base seed");

            let inputs = config.build_inputs()?;
            let observed = observe(&inputs, &config.engine)?;
            let simulation = run_placebo(
                &inputs,
                &config.engine,
                &config.placebo_config(seed),
                &CancelFlag::new(),
            )?;
            let rows = infer(&observed, &simulation)?;
            let report =
                PlaceboReport::new(observed, simulation, rows, Some(seed), config.policy)?;
            formatter.print(&report);

            if let Some(path) = output {
                report::write_report(&report, &path)?;
                println!("Report saved to: {}", path.display());
            }
        }

        Commands::Infer {
            simulation,
            observed,
            output,
        } => {
            let observed_report = report::load_report(&observed)?;
            let (table, source_seed) = if simulation.extension().is_some_and(|e| e == "jsonl") {
                (report::load_simulation(&simulation)?, None)
            } else {
                let source = report::load_report(&simulation)?;
                (source.simulation, source.seed)
            };
            let rows = infer(&observed_report.observed, &table)?;
            let report = PlaceboReport::new(
                observed_report.observed,
                table,
                rows,
                source_seed,
                observed_report.policy,
            )?;
            formatter.print(&report);

            if let Some(path) = output {
                report::write_report(&report, &path)?;
                println!("Report saved to: {}", path.display());
            }
        }
    }

    Ok(())
}
