//! PIM boot orchestration CLI.
//!
//! This binary exposes the configuration-time half of a PIM full-system run. It performs:
//! 1. **Check:** Validate a configuration and its reservations, print the kernel command line.
//! 2. **Dtb:** Generate the augmented device tree and write the flattened blob.
//! 3. **Plan:** Print the resolved boot plan (start mode, reservations, arguments) as JSON.
//! 4. **Dry run:** Drive the orchestrator against a scripted reference processor.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pimsim_core::common::BootError;
use pimsim_core::config::Config;
use pimsim_core::core::{Processor, SwitchableProcessor};
use pimsim_core::sim::{BootPlan, Engine, EngineExit, ExitEvent};

#[derive(Parser, Debug)]
#[command(
    name = "pimsim",
    author,
    version,
    about = "Boot planning for PIM full-system simulation",
    long_about = "Validate PIM memory reservations, generate the augmented device tree, and inspect the boot plan.\n\nWithout --config the built-in reference configuration is used.\n\nExamples:\n  pimsim check\n  pimsim dtb --out system.dtb\n  pimsim --config pim.json plan\n  pimsim dry-run --signals 2"
)]
struct Cli {
    /// JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate the configuration and print the kernel command line.
    Check,

    /// Write the augmented flattened device tree.
    Dtb {
        /// Output path for the blob.
        #[arg(short, long, default_value = "system.dtb")]
        out: PathBuf,
    },

    /// Print the boot plan as JSON.
    Plan,

    /// Run the orchestrator against a reference processor and a scripted signal sequence.
    DryRun {
        /// Number of guest exit signals to deliver.
        #[arg(long, default_value_t = 2)]
        signals: usize,
    },
}

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path).unwrap_or_else(|e| fail(&e.into())),
        None => Config::default(),
    };

    let result = match cli.command {
        Commands::Check => cmd_check(&config),
        Commands::Dtb { out } => cmd_dtb(&config, &out),
        Commands::Plan => cmd_plan(&config),
        Commands::DryRun { signals } => cmd_dry_run(&config, signals),
    };
    if let Err(e) = result {
        fail(&e);
    }
}

fn fail(error: &BootError) -> ! {
    eprintln!("error: {error}");
    process::exit(1);
}

/// Validates the configuration and prints the resulting kernel arguments and reservations.
fn cmd_check(config: &Config) -> Result<(), BootError> {
    let plan = BootPlan::prepare_default(config)?;

    println!("Configuration OK");
    println!(
        "  RAM: {}  cores: {}  switch: {} -> {}",
        plan.policy.ram_window(),
        config.processor.num_cores,
        config.processor.starting_core,
        config.processor.switch_core
    );
    for region in plan.policy.regions() {
        println!(
            "  reserved {:<12} {}  no-map={}  memmap={}",
            region.label,
            region.range(),
            region.no_map,
            region.exclude_in_cmdline
        );
    }
    println!("  bootargs: {}", plan.cmdline.to_bootargs());
    if plan.start.is_resume() {
        println!("  resuming from {}", plan.checkpoint.path.display());
    }
    Ok(())
}

/// Writes the flattened augmented device tree to `out`.
fn cmd_dtb(config: &Config, out: &Path) -> Result<(), BootError> {
    let plan = BootPlan::prepare_default(config)?;
    let _ = plan.write_dtb(out)?;
    Ok(())
}

/// Prints the boot plan as pretty JSON.
fn cmd_plan(config: &Config) -> Result<(), BootError> {
    let plan = BootPlan::prepare_default(config)?;
    println!("{}", plan.to_json()?);
    Ok(())
}

/// Reference engine that replays a fixed list of exits.
#[derive(Debug)]
struct ScriptedEngine {
    processor: SwitchableProcessor,
    script: VecDeque<EngineExit>,
}

impl Engine for ScriptedEngine {
    fn run(&mut self) -> Result<EngineExit, BootError> {
        Ok(self.script.pop_front().unwrap_or(EngineExit::Halted(0)))
    }

    fn processor_mut(&mut self) -> &mut dyn Processor {
        &mut self.processor
    }
}

/// Delivers `signals` guest exits to the orchestrator and reports the outcome.
fn cmd_dry_run(config: &Config, signals: usize) -> Result<(), BootError> {
    let plan = BootPlan::prepare_default(config)?;
    let engine = ScriptedEngine {
        processor: plan.processor(config)?,
        script: std::iter::repeat_n(EngineExit::Signal(ExitEvent::Exit), signals).collect(),
    };

    let mut sim = plan.simulator(config, engine);
    let summary = sim.run()?;
    let engine = sim.into_engine();

    println!("Dry run finished after {} signal(s): {:?}", summary.signals, summary.outcome);
    for core in 0..engine.processor.num_cores() {
        if let (Some(variant), Some(tunables)) =
            (engine.processor.core_variant(core), engine.processor.tunables(core))
        {
            println!(
                "  core {core}: {variant}  fetch_buffer_size={}",
                tunables.fetch_buffer_size
            );
        }
    }
    Ok(())
}
