//! diagnose - machine health diagnostics from the command line

mod logging;
mod render;
mod settings;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

use diagnose_catalog::{long_registry, system_registry};
use diagnose_core::application::{Registry, Scheduler};
use diagnose_core::port::time_provider::SystemTimeProvider;
use diagnose_core::port::{CommandRunner, TimeProvider};
use diagnose_core::VERSION;
use diagnose_infra_system::ShellCommandRunner;
use settings::Settings;

#[derive(Parser)]
#[command(name = "diagnose")]
#[command(about = "Machine health diagnostics", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (TOML)
    #[arg(long, env = "DIAGNOSE_CONFIG")]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run system probes
    Run(RunArgs),

    /// Run stress probes watched by checkers
    Stress(RunArgs),

    /// List every known probe
    List,
}

#[derive(Args)]
struct RunArgs {
    /// Probe names (all when omitted)
    names: Vec<String>,

    /// Run probes one at a time
    #[arg(long)]
    sequential: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    let _guard = logging::init(settings.log_format)?;

    info!(version = VERSION, "diagnose starting");

    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let runner: Arc<dyn CommandRunner> =
        Arc::new(ShellCommandRunner::new(Arc::clone(&time_provider)));

    match cli.command {
        Commands::Run(args) => {
            let registry = system_registry(runner)?;
            run(registry, time_provider, &settings, args).await
        }
        Commands::Stress(args) => {
            let registry =
                long_registry(runner, Arc::clone(&time_provider), settings.poll_interval())?;
            run(registry, time_provider, &settings, args).await
        }
        Commands::List => {
            let system = system_registry(Arc::clone(&runner))?;
            let stress = long_registry(runner, time_provider, settings.poll_interval())?;
            println!("{}", render::probe_table(&system, &stress));
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run(
    registry: Registry,
    time_provider: Arc<dyn TimeProvider>,
    settings: &Settings,
    args: RunArgs,
) -> Result<ExitCode> {
    let scheduler = Scheduler::new(Arc::new(registry), time_provider);
    let report = scheduler
        .run(&args.names, args.sequential || settings.sequential)
        .await?;

    if args.json {
        println!("{}", render::json(&report)?);
    } else {
        println!("{}", render::text(&report));
    }

    Ok(ExitCode::from(render::exit_status(&report)))
}
