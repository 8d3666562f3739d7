//! devprov - Main entry point
//!
//! Loads the plan, runs the provisioning workflow once and prints a
//! per-step summary. The exit code reflects whether any step failed.

use devprov::cli::Cli;
use devprov::{Provisioner, ProvisionConfig, RunOptions, SystemEnvironment, SystemHost};
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Exit code for a plan that cannot be loaded or is invalid
const EXIT_CONFIG_ERROR: u8 = 2;

/// Initialize the logger with appropriate settings
fn init_logger(verbosity: u8) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    // RUST_LOG overrides the -v default
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<ProvisionConfig> {
    let config = match ProvisionConfig::locate(cli.config.as_deref()) {
        Some(path) => {
            info!("Loading plan from: {:?}", path);
            ProvisionConfig::load_from_file(&path)?
        }
        None => {
            debug!("No plan file given, using built-in defaults");
            ProvisionConfig::default()
        }
    };
    config.validate()?;
    Ok(config)
}

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_logger(cli.verbose);
    info!("devprov starting up");

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load plan: {:#}", e);
            eprintln!("✗ Invalid plan: {:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    if cli.print_config {
        return match serde_json::to_string_pretty(&config) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("✗ Failed to serialize plan: {}", e);
                ExitCode::from(EXIT_CONFIG_ERROR)
            }
        };
    }

    if cli.dry_run {
        info!("Dry-run mode: nothing will be installed or written to PATH");
    }

    let options = RunOptions {
        dry_run: cli.dry_run,
        force_manual: cli.force_manual || ProvisionConfig::force_manual_from_env(),
        fallback_to_manual: cli.fallback_to_manual || config.fallback_to_manual,
        ..RunOptions::default()
    };
    debug!("Run options: {:?}", options);

    let mut host = SystemHost::new(cli.dry_run);
    let mut env = SystemEnvironment::from_process(cli.dry_run);
    let report = Provisioner::new(&config, &mut host, &mut env, options).run();

    report.print_summary();
    ExitCode::from(report.exit_code())
}
