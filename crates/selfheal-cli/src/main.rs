//! Selfheal CLI: inspect recovery configuration and replay recovery scenarios
//!
//! ## Usage
//!
//! ```bash
//! selfheal config show                    # Print the resolved configuration
//! selfheal config check heal.yaml         # Validate a configuration file
//! selfheal simulate scenario.yaml         # Replay a scenario
//! selfheal simulate scenario.yaml --format json
//! ```

use clap::Parser;
use selfheal::{HealConfig, RecordingClock, TokioClock};
use selfheal_cli::{
    render_report, simulate, Cli, CliConfig, CliError, CliResult, Commands, ConfigAction,
    ScenarioFile, SimulateArgs, SimulationReport, Verbosity,
};
use std::process::ExitCode;
use tracing::debug;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    config.init_logging();
    debug!(?config, "resolved CLI configuration");

    match cli.command {
        Commands::Config(args) => match args.action {
            ConfigAction::Show => run_config_show(&config),
            ConfigAction::Check { path } => {
                let heal = HealConfig::load(&path)?;
                if !config.verbosity.is_quiet() {
                    println!("{}: valid", path.display());
                }
                debug!(?heal, "configuration accepted");
                Ok(())
            }
        },
        Commands::Simulate(args) => run_simulate(&config, &args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.verbose, cli.quiet))
        .with_color(cli.color.into())
        .with_log_json(cli.log_json)
        .with_config_path(cli.config.clone())
}

fn run_config_show(config: &CliConfig) -> CliResult<()> {
    let heal = config.heal_config()?;
    print!("{}", heal.to_yaml()?);
    Ok(())
}

fn run_simulate(config: &CliConfig, args: &SimulateArgs) -> CliResult<()> {
    let heal = config.heal_config()?;
    let scenario = ScenarioFile::load(&args.scenario)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    let report: SimulationReport = if args.real_time {
        runtime.block_on(simulate(&scenario, heal, TokioClock, |_| 0))?
    } else {
        runtime.block_on(simulate(&scenario, heal, RecordingClock::new(), |clock| {
            clock.elapsed_ms()
        }))?
    };

    if !config.verbosity.is_quiet() {
        print!("{}", render_report(&report, args.format)?);
    }

    match report.error {
        None => Ok(()),
        Some(error) => Err(CliError::scenario(error)),
    }
}
