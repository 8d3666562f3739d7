//! Install targets and the generic "ensure installed" routine.
//!
//! Each target is a descriptor: a guard, a list of actions, an optional
//! settle delay and an optional PATH entry contributed once installed.
//! `ensure_installed` drives one target through the install state machine.

use crate::environment::{EnvScope, EnvironmentStore};
use crate::error::Result;
use crate::guard::{Guard, StepOutcome};
use crate::host::{CommandSpec, Host};
use crate::install_state::{InstallState, TargetProgress};
use crate::path_entry::PathEntry;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

/// One mutating step of an install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallAction {
    /// Run a command; non-zero exit fails the target
    Run(CommandSpec),
    /// Fetch an installer to `dest` and run it unattended, waiting for exit
    DownloadAndRun {
        url: String,
        dest: PathBuf,
        args: Vec<String>,
    },
}

impl InstallAction {
    fn execute(&self, host: &mut dyn Host, search_path: &str) -> Result<()> {
        match self {
            Self::Run(cmd) => {
                let output = host.run(cmd, search_path)?;
                cmd.check(&output)
            }
            Self::DownloadAndRun { url, dest, args } => {
                host.download(url, dest)?;
                let installer = CommandSpec::new(dest.to_string_lossy()).args(args.iter().cloned());
                let output = host.run(&installer, search_path)?;
                installer.check(&output)
            }
        }
    }
}

/// Descriptor consumed by `ensure_installed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTarget {
    pub name: String,
    /// When satisfied, the target is already installed
    pub guard: Guard,
    pub actions: Vec<InstallAction>,
    /// Wait after the actions ran (not when the guard held)
    pub settle: Option<Duration>,
    /// Directory to add to the user PATH once the target is present
    pub path_addition: Option<PathEntry>,
}

impl InstallTarget {
    pub fn new(name: impl Into<String>, guard: Guard) -> Self {
        Self {
            name: name.into(),
            guard,
            actions: Vec::new(),
            settle: None,
            path_addition: None,
        }
    }

    pub fn action(mut self, action: InstallAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn settle(mut self, delay: Duration) -> Self {
        if !delay.is_zero() {
            self.settle = Some(delay);
        }
        self
    }

    pub fn path_addition(mut self, entry: PathEntry) -> Self {
        self.path_addition = Some(entry);
        self
    }
}

/// Drive `target` from `Absent` to `Installed` or `Failed`.
///
/// Actions run in order against the current process PATH; the first
/// failure stops the target. Never fails itself: errors become
/// `StepOutcome::Failed`.
pub fn ensure_installed(
    target: &InstallTarget,
    host: &mut dyn Host,
    env: &dyn EnvironmentStore,
) -> StepOutcome {
    let mut progress = TargetProgress::new(&target.name);

    if target.guard.is_satisfied(host, env) {
        info!("{}: already installed", target.name);
        return match progress.transition_to(InstallState::Installed) {
            Ok(()) => StepOutcome::AlreadySatisfied,
            Err(e) => StepOutcome::Failed(e.to_string()),
        };
    }

    if let Err(e) = progress.transition_to(InstallState::Installing) {
        return StepOutcome::Failed(e.to_string());
    }
    info!("{}: installing", target.name);

    let search_path = env.read(EnvScope::Process).unwrap_or_default();
    for action in &target.actions {
        if let Err(e) = action.execute(host, &search_path) {
            error!("{}: {}", target.name, e);
            // Installing -> Failed is always legal
            let _ = progress.transition_to(InstallState::Failed);
            return StepOutcome::Failed(e.to_string());
        }
    }

    if let Some(delay) = target.settle {
        host.sleep(delay);
    }

    match progress.transition_to(InstallState::Installed) {
        Ok(()) => {
            info!("{}: installed", target.name);
            StepOutcome::NowSatisfied
        }
        Err(e) => StepOutcome::Failed(e.to_string()),
    }
}
