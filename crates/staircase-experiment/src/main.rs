//! Staircase Experiment CLI.
//!
//! Commands:
//! - run: Run an experiment from a configuration file
//! - init: Build a configuration file interactively
//! - check: Validate a configuration file

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use staircase_experiment::builder::build_config;
use staircase_experiment::plot::render_trajectories;
use staircase_experiment::prompt::{Prompter, TerminalJudgments};
use staircase_experiment::results::write_results;
use staircase_kernel::config::ExperimentConfig;
use staircase_kernel::runner::{ExperimentOutcome, ExperimentRunner};
use staircase_kernel::trial::format_value;

#[derive(Parser)]
#[command(name = "staircase-experiment")]
#[command(version)]
#[command(about = "Adaptive staircase experiments for psychophysics")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an experiment
    Run {
        /// Experiment configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Subject identifier (prompted for when omitted)
        #[arg(long)]
        subject: Option<String>,

        /// Random seed, overriding the configuration
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Build a configuration file interactively
    Init {
        /// Where to write the configuration (default: beside the data directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a configuration file
    Check {
        /// Experiment configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so prompts on stdout stay readable
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();

    match cli.command {
        Commands::Run {
            config,
            subject,
            seed,
        } => run(config, subject, seed),
        Commands::Init { output } => init(output),
        Commands::Check { config } => check(config),
    }
}

fn load_config(path: &Path) -> Result<ExperimentConfig> {
    ExperimentConfig::load(path).with_context(|| {
        format!(
            "There was a problem processing the config file {}",
            path.display()
        )
    })
}

fn run(config_path: PathBuf, subject: Option<String>, seed: Option<u64>) -> Result<()> {
    let mut config = load_config(&config_path)?;
    if seed.is_some() {
        config.experiment.seed = seed;
    }

    let stdin = io::stdin();
    let mut prompter = Prompter::new(stdin.lock(), io::stdout());
    let subject = match subject {
        Some(subject) => subject,
        None => match prompter.ask("Please enter a Subject identifier")? {
            Some(subject) if !subject.is_empty() => subject,
            _ => bail!("a subject identifier is required"),
        },
    };

    info!(
        experiment = %config.experiment.name,
        subject = %subject,
        staircases = config.experiment.staircase_count,
        policy = %config.experiment.swap_policy,
        "Loaded configuration"
    );

    let runner = ExperimentRunner::from_config(&config);
    let mut source = TerminalJudgments::new(prompter);
    let report = runner.run(&mut source)?;

    let paths = write_results(&config, &subject, &report)?;
    render_trajectories(&report.staircases, &paths.plot)
        .with_context(|| format!("failed to render {}", paths.plot.display()))?;

    println!("\n=== Experiment Result ===");
    match report.outcome {
        ExperimentOutcome::Completed => println!("All staircases completed"),
        ExperimentOutcome::Cancelled => println!(
            "Stopped early with {} staircase(s) unfinished",
            report.abandoned.len()
        ),
    }
    for staircase in &report.staircases {
        println!(
            "  {}: {} trials, {} reversals, last sample {} {}",
            staircase.name(),
            staircase.trial_count(),
            staircase.reversal_count(),
            format_value(staircase.current_sample()),
            staircase.settings().units
        );
    }
    println!("Results saved to: {}", paths.directory.display());

    Ok(())
}

fn init(output: Option<PathBuf>) -> Result<()> {
    let stdin = io::stdin();
    let mut prompter = Prompter::new(stdin.lock(), io::stdout());
    let Some(built) = build_config(&mut prompter)? else {
        println!("Setup abandoned");
        return Ok(());
    };

    let path = output.unwrap_or(built.default_path);
    built
        .config
        .save(&path)
        .with_context(|| format!("failed to write {}", path.display()))?;

    println!("Configuration saved to: {}", path.display());
    Ok(())
}

fn check(config_path: PathBuf) -> Result<()> {
    let config = load_config(&config_path)?;

    println!("Experiment: {}", config.experiment.name);
    println!("Data path: {}", config.experiment.path.display());
    println!("Swap policy: {}", config.experiment.swap_policy);
    for settings in config.all_staircase_settings() {
        println!(
            "  {}: start {} -> reference {} {} (up {}, down {}, {} correct to step, {} reversals to finish)",
            settings.name,
            format_value(settings.start_value),
            format_value(settings.reference),
            settings.units,
            format_value(settings.step_up),
            format_value(settings.step_down),
            settings.reversals_to_step_change,
            settings.reversals_to_finish
        );
    }

    Ok(())
}
