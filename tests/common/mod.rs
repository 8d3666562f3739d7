//! Scripted fake machine shared by the integration tests.
//!
//! Commands succeed unless they match a failing pattern; a successful
//! command applies every effect whose pattern it contains, which is how a
//! fake install makes its guard file appear.

#![allow(dead_code)]

use devprov::{
    CommandOutput, CommandSpec, EnvScope, Host, MemoryEnvironment, ProvisionConfig,
    ProvisionError, Result,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SYSTEM_DIR: &str = r"C:\Windows\System32";
pub const USER_BIN: &str = r"C:\Users\dev\bin";

#[derive(Debug, Clone)]
pub enum Effect {
    CreateFile(PathBuf),
    /// Make `name` resolvable whenever `dir` is on the search path
    ProvideCommand { name: String, dir: String },
    InstallExtension(String),
}

#[derive(Debug, Default)]
pub struct FakeHost {
    pub files: BTreeSet<PathBuf>,
    pub commands: BTreeMap<String, String>,
    pub extensions: Vec<String>,
    /// Every command line, read-only ones included
    pub runs: Vec<String>,
    /// Command lines of mutating commands only
    pub mutating_runs: Vec<String>,
    pub downloads: Vec<(String, PathBuf)>,
    pub slept: Vec<Duration>,
    effects: Vec<(String, Effect)>,
    /// Command-line pattern and the exit code it produces
    failing: Vec<(String, i32)>,
    /// URL patterns whose download fails
    failing_downloads: Vec<String>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_command(mut self, name: &str, dir: &str) -> Self {
        self.commands.insert(name.to_string(), dir.to_string());
        self
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.insert(path.into());
        self
    }

    pub fn on(mut self, pattern: impl Into<String>, effect: Effect) -> Self {
        self.effects.push((pattern.into(), effect));
        self
    }

    pub fn failing(self, pattern: impl Into<String>) -> Self {
        self.exiting_with(pattern, 1)
    }

    /// Matching commands exit with `code` and apply no effects.
    pub fn exiting_with(mut self, pattern: impl Into<String>, code: i32) -> Self {
        self.failing.push((pattern.into(), code));
        self
    }

    pub fn failing_download(mut self, url_pattern: impl Into<String>) -> Self {
        self.failing_downloads.push(url_pattern.into());
        self
    }

    pub fn ran(&self, pattern: &str) -> bool {
        self.runs.iter().any(|line| line.contains(pattern))
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::CreateFile(path) => {
                self.files.insert(path);
            }
            Effect::ProvideCommand { name, dir } => {
                self.commands.insert(name, dir);
            }
            Effect::InstallExtension(id) => {
                if !self.extensions.contains(&id) {
                    self.extensions.push(id);
                }
            }
        }
    }
}

impl Host for FakeHost {
    fn command_exists(&self, name: &str, search_path: &str) -> bool {
        self.commands
            .get(name)
            .is_some_and(|dir| search_path.split(';').any(|entry| entry == dir))
    }

    fn path_exists(&self, path: &Path) -> bool {
        self.files.contains(path)
    }

    fn run(&mut self, cmd: &CommandSpec, search_path: &str) -> Result<CommandOutput> {
        let line = cmd.command_line();
        self.runs.push(line.clone());
        if cmd.mutating {
            self.mutating_runs.push(line.clone());
        }

        // Bare program names must resolve like they would on a real PATH
        if self.commands.contains_key(&cmd.program) && !self.command_exists(&cmd.program, search_path)
        {
            return Err(ProvisionError::command(&cmd.program, "program not found"));
        }

        if let Some((_, code)) = self
            .failing
            .iter()
            .find(|(pattern, _)| line.contains(pattern.as_str()))
        {
            return Ok(CommandOutput::failed(*code, "scripted failure"));
        }

        if cmd.args.iter().any(|a| a == "--list-extensions") {
            return Ok(CommandOutput::ok(self.extensions.join("\n")));
        }

        let matched: Vec<Effect> = self
            .effects
            .iter()
            .filter(|(pattern, _)| line.contains(pattern.as_str()))
            .map(|(_, effect)| effect.clone())
            .collect();
        for effect in matched {
            self.apply(effect);
        }
        Ok(CommandOutput::ok(""))
    }

    fn download(&mut self, url: &str, dest: &Path) -> Result<()> {
        if self.failing_downloads.iter().any(|p| url.contains(p.as_str())) {
            return Err(ProvisionError::download(url, "HTTP 404"));
        }
        self.downloads.push((url.to_string(), dest.to_path_buf()));
        self.files.insert(dest.to_path_buf());
        Ok(())
    }

    fn sleep(&mut self, duration: Duration) {
        self.slept.push(duration);
    }
}

/// Default plan with the settings file redirected into `dir`.
pub fn plan_in(dir: &Path) -> ProvisionConfig {
    ProvisionConfig {
        settings_path: dir.join("Code").join("User").join("settings.json"),
        ..ProvisionConfig::default()
    }
}

/// A bare machine where every install behaves like the real one would:
/// the editor and toolchain installers create their guard files, the
/// editor puts `code` in its bin directory, and pacman drops g++.
pub fn bare_machine(config: &ProvisionConfig) -> FakeHost {
    let editor = &config.editor;
    let toolchain = &config.toolchain;
    let code = || Effect::ProvideCommand {
        name: editor.cli.clone(),
        dir: editor.cli_dir().to_string_lossy().to_string(),
    };

    FakeHost::new()
        .on(format!("--id {}", editor.package_id), Effect::CreateFile(editor.executable()))
        .on(format!("--id {}", editor.package_id), code())
        .on(editor.installer_file.clone(), Effect::CreateFile(editor.executable()))
        .on(editor.installer_file.clone(), code())
        .on(format!("--id {}", toolchain.package_id), Effect::CreateFile(toolchain.shell()))
        .on(toolchain.installer_file.clone(), Effect::CreateFile(toolchain.shell()))
        .on("pacman -S", Effect::CreateFile(toolchain.compiler()))
        .on(
            "--install-extension",
            Effect::InstallExtension(config.extension_id.clone()),
        )
}

/// Same as `bare_machine`, with the package manager on the system PATH.
pub fn machine_with_winget(config: &ProvisionConfig) -> FakeHost {
    bare_machine(config).with_command(&config.package_manager, SYSTEM_DIR)
}

/// Persisted machine/user PATH plus a process PATH inherited from them.
pub fn fresh_environment() -> MemoryEnvironment {
    MemoryEnvironment::new()
        .with(EnvScope::Machine, SYSTEM_DIR)
        .with(EnvScope::User, USER_BIN)
        .with(EnvScope::Process, format!("{SYSTEM_DIR};{USER_BIN}"))
}
