//! Provisioning orchestrator.
//!
//! Runs the workflow top to bottom, once:
//!
//! ```text
//! probe ─► select strategy ─► editor ─► toolchain ─► compilers
//!       ─► user PATH entries ─► refresh process PATH
//!       ─► editor extension ─► settings patch ─► report
//! ```
//!
//! A failed step never aborts the run. Later steps whose preconditions
//! depend on it are reported as skipped; everything else still runs.
//! The report's exit code is non-zero if anything failed.

use crate::config::ProvisionConfig;
use crate::environment::{refresh_path, EnvScope, EnvironmentStore};
use crate::guard::{Guard, StepOutcome};
use crate::host::Host;
use crate::path_entry::ensure_user_path;
use crate::report::RunReport;
use crate::selector::{self, Strategy};
use crate::settings::{patch_config, pending_updates, DocumentSource};
use crate::target::{ensure_installed, InstallTarget};
use serde_json::Map;
use std::path::PathBuf;
use tracing::{info, warn};

pub const STEP_REFRESH: &str = "refresh environment";
pub const STEP_SETTINGS: &str = "editor settings";

/// Knobs that come from the command line rather than the plan.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Preview settings changes instead of writing them; the report then
    /// reads "would do" for steps that were not actually performed
    pub dry_run: bool,
    /// Take the manual path regardless of the capability probe
    pub force_manual: bool,
    /// Retry a failed fast-path install through the manual path
    pub fallback_to_manual: bool,
    /// Where manual-path installers are downloaded
    pub download_dir: PathBuf,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            force_manual: false,
            fallback_to_manual: false,
            download_dir: std::env::temp_dir(),
        }
    }
}

pub struct Provisioner<'a> {
    config: &'a ProvisionConfig,
    host: &'a mut dyn Host,
    env: &'a mut dyn EnvironmentStore,
    options: RunOptions,
}

impl<'a> Provisioner<'a> {
    pub fn new(
        config: &'a ProvisionConfig,
        host: &'a mut dyn Host,
        env: &'a mut dyn EnvironmentStore,
        options: RunOptions,
    ) -> Self {
        Self {
            config,
            host,
            env,
            options,
        }
    }

    fn process_path(&self) -> String {
        self.env.read(EnvScope::Process).unwrap_or_else(|e| {
            warn!("could not read process PATH: {}", e);
            String::new()
        })
    }

    /// Run the whole workflow and return what happened.
    pub fn run(&mut self) -> RunReport {
        let config = self.config;
        let search_path = self.process_path();
        let strategy =
            selector::select_strategy(&*self.host, config, &search_path, self.options.force_manual);
        let mut report = RunReport::new(strategy);
        if self.options.dry_run {
            report = report.preview();
        }
        let dir = self.options.download_dir.clone();

        // Editor and toolchain
        let editor = selector::editor_target(config, strategy, &dir);
        let editor_outcome = self.install_with_fallback(
            &editor,
            strategy,
            || selector::editor_target(config, Strategy::ManualPath, &dir),
        );
        report.push(&editor.name, editor_outcome.clone());

        let toolchain = selector::toolchain_target(config, strategy, &dir);
        let toolchain_outcome = self.install_with_fallback(
            &toolchain,
            strategy,
            || selector::toolchain_target(config, Strategy::ManualPath, &dir),
        );
        report.push(&toolchain.name, toolchain_outcome.clone());

        let compiler = selector::compiler_target(config);
        let compiler_outcome = if toolchain_outcome.is_satisfied() {
            ensure_installed(&compiler, self.host, &*self.env)
        } else {
            StepOutcome::Skipped(format!("{} is not installed", toolchain.name))
        };
        report.push(&compiler.name, compiler_outcome.clone());

        // PATH entries for everything that is now present
        for (target, outcome) in [(&editor, &editor_outcome), (&compiler, &compiler_outcome)] {
            let Some(entry) = &target.path_addition else {
                continue;
            };
            let name = format!("PATH {}", entry);
            let step = if outcome.is_satisfied() {
                ensure_user_path(self.env, entry).unwrap_or_else(|e| StepOutcome::Failed(e.to_string()))
            } else {
                StepOutcome::Skipped(format!("{} is not installed", target.name))
            };
            report.push(name, step);
        }

        // Must come after every PATH-mutating step and before the extension
        let stale = self.process_path();
        let refresh = match refresh_path(self.env) {
            Ok(fresh) if fresh == stale => StepOutcome::AlreadySatisfied,
            Ok(_) => StepOutcome::NowSatisfied,
            Err(e) => StepOutcome::Failed(e.to_string()),
        };
        report.push(STEP_REFRESH, refresh);

        let extension = selector::extension_target(config);
        let cli_available = Guard::CommandAvailable(config.editor.cli.clone());
        let extension_outcome = if cli_available.is_satisfied(self.host, &*self.env) {
            ensure_installed(&extension, self.host, &*self.env)
        } else {
            StepOutcome::Skipped(format!("`{}` not found on PATH", config.editor.cli))
        };
        report.push(&extension.name, extension_outcome);

        report.push(STEP_SETTINGS, self.patch_settings());

        info!(
            "provisioning finished ({}, {} step(s), failures: {})",
            strategy,
            report.steps.len(),
            report.has_failures()
        );
        report
    }

    fn install_with_fallback(
        &mut self,
        target: &InstallTarget,
        strategy: Strategy,
        manual: impl FnOnce() -> InstallTarget,
    ) -> StepOutcome {
        let outcome = ensure_installed(target, self.host, &*self.env);
        if outcome.is_failure() && strategy == Strategy::FastPath && self.options.fallback_to_manual {
            warn!("{}: fast path failed, retrying through the manual path", target.name);
            return ensure_installed(&manual(), self.host, &*self.env);
        }
        outcome
    }

    fn patch_settings(&mut self) -> StepOutcome {
        let updates: Map<String, serde_json::Value> = self
            .config
            .settings
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        if self.options.dry_run {
            let pending = pending_updates(&self.config.settings_path, &updates);
            if pending.is_empty() {
                return StepOutcome::AlreadySatisfied;
            }
            info!(
                "[dry-run] would set {} in {}",
                pending.join(", "),
                self.config.settings_path.display()
            );
            return StepOutcome::NowSatisfied;
        }

        match patch_config(
            &self.config.settings_path,
            &updates,
            self.config.backup_corrupt_settings,
        ) {
            Ok(outcome) => {
                if let DocumentSource::Corrupt { backup: None } = outcome.source {
                    warn!("previous settings were unreadable and have been replaced");
                }
                if outcome.was_noop() {
                    StepOutcome::AlreadySatisfied
                } else {
                    StepOutcome::NowSatisfied
                }
            }
            Err(e) => StepOutcome::Failed(e.to_string()),
        }
    }
}
