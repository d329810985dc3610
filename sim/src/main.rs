//! POTSIM: A command line driver for the pot-size particle filter.
//!
//! This program can operate in three modes:
//!
//! - `run`: Reads observed bids from a CSV file (or every CSV file in a directory), runs the
//!   particle filter over them in order, and writes the estimate sequence and the final particle
//!   snapshot into an output directory.
//! - `generate`: Writes a synthetic, seeded bid sequence around a known pot size to a CSV file.
//! - `init-config`: Writes the default filter configuration to a TOML/JSON/YAML file.
//!
//! Filter parameters are loaded from `--config` when given; individual command-line flags
//! override the values from the file.

mod common;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use common::{
    ensure_parent_dir, get_csv_files, init_logger, validate_input_path, validate_output_path,
};
use log::{error, info, warn};
use std::path::{Path, PathBuf};

use potfilter::config::FilterConfig;
use potfilter::estimate::AveragingStrategy;
use potfilter::filter::ParticleFilter;
use potfilter::resample::ResamplingStrategy;
use potfilter::sim::{BidRecord, FilterResult, ParticleRecord, synthetic_bids};

const LONG_ABOUT: &str = "POTSIM: A command line driver for the pot-size particle filter.

The filter estimates a hidden pot size from a sequence of observed bids, assuming each bid is
the pot size scaled by a known win probability plus Gaussian noise. Bids are processed strictly
in file order; one estimate is produced per bid.

Filter parameters can be loaded from a configuration file (TOML/JSON/YAML) with --config and
overridden by individual flags.";

/// Command line arguments
#[derive(Parser)]
#[command(author, version, about = "A command line driver for the pot-size particle filter.", long_about = LONG_ABOUT)]
struct Cli {
    /// Filter configuration file (TOML/JSON/YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Command to execute
    #[command(subcommand)]
    command: Command,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Log file path (if not specified, logs to stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

/// Top-level commands
#[derive(Subcommand, Clone)]
enum Command {
    #[command(
        name = "run",
        about = "Run the particle filter over observed bids",
        long_about = "Run the particle filter over the bids in a CSV file (one `bid` column) or over every CSV file in a directory. For each input file, `<name>_estimates.csv` and `<name>_particles.csv` are written to the output directory, which is created if needed."
    )]
    Run(RunArgs),
    #[command(
        name = "generate",
        about = "Generate a synthetic bid sequence",
        long_about = "Draw bids from a normal distribution centered on true_pot * win_probability with standard deviation relative_noise * true_pot * win_probability and write them to a CSV file."
    )]
    Generate(GenerateArgs),
    #[command(
        name = "init-config",
        about = "Write the default filter configuration to a file"
    )]
    InitConfig(InitConfigArgs),
}

/// Filter parameter overrides
#[derive(Args, Clone, Debug, Default)]
struct FilterArgs {
    /// Number of particles
    #[arg(long)]
    particles: Option<usize>,

    /// Mean of the prior over the pot size
    #[arg(long)]
    initial_mean: Option<f64>,

    /// Standard deviation of the prior over the pot size
    #[arg(long)]
    initial_std: Option<f64>,

    /// Probability of winning, mapping pot size to expected bid
    #[arg(long)]
    win_probability: Option<f64>,

    /// Process noise standard deviation applied between bids
    #[arg(long)]
    process_noise: Option<f64>,

    /// Measurement noise standard deviation of an observed bid
    #[arg(long)]
    measurement_noise: Option<f64>,

    /// RNG seed for the filter
    #[arg(long)]
    seed: Option<u64>,

    /// Resampling strategy
    #[arg(long, value_enum)]
    resampling: Option<ResamplingStrategy>,

    /// Point estimate strategy
    #[arg(long, value_enum)]
    averaging: Option<AveragingStrategy>,
}

impl FilterArgs {
    fn apply(&self, config: &mut FilterConfig) {
        if let Some(v) = self.particles {
            config.particle_count = v;
        }
        if let Some(v) = self.initial_mean {
            config.initial_estimate_mean = v;
        }
        if let Some(v) = self.initial_std {
            config.initial_estimate_std = v;
        }
        if let Some(v) = self.win_probability {
            config.win_probability = v;
        }
        if let Some(v) = self.process_noise {
            config.process_noise_std = v;
        }
        if let Some(v) = self.measurement_noise {
            config.measurement_noise_std = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = &self.resampling {
            config.resampling_strategy = v.clone();
        }
        if let Some(v) = &self.averaging {
            config.averaging_strategy = v.clone();
        }
    }
}

/// Filter run arguments
#[derive(Args, Clone, Debug)]
struct RunArgs {
    /// Input CSV file or directory of CSV files with a `bid` column
    #[arg(short, long, value_parser)]
    input: PathBuf,

    /// Output directory
    #[arg(short, long, value_parser)]
    output: PathBuf,

    /// Filter parameter overrides
    #[command(flatten)]
    filter: FilterArgs,

    /// On weight collapse, redraw the particles from the prior and retry the bid once instead of aborting
    #[arg(long)]
    reinitialize_on_collapse: bool,
}

/// Synthetic bid generation arguments
#[derive(Args, Clone, Debug)]
struct GenerateArgs {
    /// Output CSV file
    #[arg(short, long, value_parser)]
    output: PathBuf,

    /// True pot size
    #[arg(long, default_value_t = 260_750.0)]
    true_pot: f64,

    /// Win probability used to scale the pot size to a bid
    #[arg(long, default_value_t = 0.05)]
    win_probability: f64,

    /// Bid standard deviation relative to the mean bid
    #[arg(long, default_value_t = 0.1)]
    relative_noise: f64,

    /// Number of bids
    #[arg(long, default_value_t = 64)]
    count: usize,

    /// RNG seed for the bid sequence
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Configuration file creation arguments
#[derive(Args, Clone, Debug)]
struct InitConfigArgs {
    /// Output file; format chosen by extension (.toml/.json/.yaml/.yml)
    #[arg(short, long, value_parser)]
    output: PathBuf,
}

/// Resolve the filter configuration: file (or defaults), then command-line overrides.
fn resolve_config(config_path: Option<&PathBuf>, overrides: &FilterArgs) -> Result<FilterConfig> {
    let mut config = match config_path {
        Some(path) => FilterConfig::from_file(path)
            .with_context(|| format!("Failed to read configuration '{}'", path.display()))?,
        None => FilterConfig::default(),
    };
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}

/// Run the filter over one bid file and return its results.
fn filter_bids(
    config: &FilterConfig,
    bids: &[f64],
    name: &str,
    reinitialize_on_collapse: bool,
) -> Result<(FilterResult, Vec<ParticleRecord>)> {
    let mut pf = ParticleFilter::new(config.clone())?;
    let mut result = FilterResult::new(name);
    for &bid in bids {
        let estimate = match pf.step(bid) {
            Ok(estimate) => estimate,
            Err(e) if e.is_weight_collapse() && reinitialize_on_collapse => {
                warn!("{e}");
                pf.reinitialize()?;
                pf.step(bid)
                    .with_context(|| format!("Bid {bid} collapsed again after reinitialization"))?
            }
            Err(e) => return Err(e.into()),
        };
        result.push(bid, &estimate);
    }
    Ok((result, ParticleRecord::from_set(pf.particles())))
}

fn run_filter_cli(args: &RunArgs, config_path: Option<&PathBuf>) -> Result<()> {
    validate_input_path(&args.input)?;
    validate_output_path(&args.output)?;
    let config = resolve_config(config_path, &args.filter)?;
    info!(
        "Filter configuration: {} particles, prior N({}, {}²), win probability {}, process noise {}, measurement noise {}, seed {}",
        config.particle_count,
        config.initial_estimate_mean,
        config.initial_estimate_std,
        config.win_probability,
        config.process_noise_std,
        config.measurement_noise_std,
        config.seed
    );

    let csv_files = get_csv_files(&args.input)?;
    if csv_files.len() > 1 {
        info!("Processing {} CSV files from directory", csv_files.len());
    }

    for input_file in &csv_files {
        let records = BidRecord::from_csv(input_file)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("Failed to read bids from '{}'", input_file.display()))?;
        let bids = BidRecord::bids(&records);
        info!("Read {} bids from {}", bids.len(), input_file.display());

        let stem = file_stem(input_file);
        let (result, particles) =
            match filter_bids(&config, &bids, &stem, args.reinitialize_on_collapse) {
                Ok(output) => output,
                Err(e) => {
                    error!("Error processing {}: {}", input_file.display(), e);
                    return Err(e);
                }
            };

        let estimates_path = args.output.join(format!("{stem}_estimates.csv"));
        result.to_csv(&estimates_path)?;
        let particles_path = args.output.join(format!("{stem}_particles.csv"));
        ParticleRecord::to_csv(&particles, &particles_path)?;

        match result.final_estimate() {
            Some(estimate) => info!("Final pot size estimate for {stem}: {estimate:.2}"),
            None => warn!("No bids in {}", input_file.display()),
        }
        info!("Results written to {}", estimates_path.display());
    }
    Ok(())
}

fn run_generate(args: &GenerateArgs) -> Result<()> {
    let bids = synthetic_bids(
        args.true_pot,
        args.win_probability,
        args.relative_noise,
        args.count,
        args.seed,
    )?;
    ensure_parent_dir(&args.output)?;
    let records: Vec<BidRecord> = bids.into_iter().map(|bid| BidRecord { bid }).collect();
    BidRecord::to_csv(&records, &args.output)?;
    info!(
        "Wrote {} synthetic bids to {}",
        records.len(),
        args.output.display()
    );
    Ok(())
}

fn run_init_config(args: &InitConfigArgs) -> Result<()> {
    ensure_parent_dir(&args.output)?;
    FilterConfig::default()
        .to_file(&args.output)
        .with_context(|| format!("Failed to write configuration '{}'", args.output.display()))?;
    info!("Configuration written to {}", args.output.display());
    Ok(())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bids".to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(&cli.log_level, cli.log_file.as_ref())?;

    match &cli.command {
        Command::Run(args) => run_filter_cli(args, cli.config.as_ref()),
        Command::Generate(args) => run_generate(args),
        Command::InitConfig(args) => run_init_config(args),
    }
}
