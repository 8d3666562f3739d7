use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// devprov - one-shot C/C++ workstation setup for Windows
///
/// Run with no arguments to install VS Code, MSYS2 and GCC, register the
/// compiler directory on the user PATH, add the Code Runner extension and
/// patch the editor settings. Anything already present is left alone.
#[derive(Parser, Debug)]
#[command(name = "devprov")]
#[command(about = "Provision a C/C++ development environment (VS Code + MSYS2 GCC)")]
#[command(version)]
pub struct Cli {
    /// Dry-run mode: log what would be installed without changing anything.
    ///
    /// Guards are still evaluated, so the preview reflects what a real run
    /// would skip.
    #[arg(long)]
    pub dry_run: bool,

    /// Plan file overriding the built-in defaults (falls back to DEVPROV_CONFIG)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Download vendor installers even when the package manager is available
    #[arg(long)]
    pub force_manual: bool,

    /// Retry a failed package-manager install with the vendor installer
    #[arg(long)]
    pub fallback_to_manual: bool,

    /// Print the effective plan as JSON and exit
    #[arg(long)]
    pub print_config: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}
