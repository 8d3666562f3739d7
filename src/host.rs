//! Host operations: command lookup, file probes, subprocesses, downloads.
//!
//! Everything the orchestrator does to the machine goes through the `Host`
//! trait so the whole workflow can run against a scripted fake in tests.
//! `SystemHost` is the real implementation.
//!
//! # Blocking
//!
//! Every operation is synchronous. Subprocesses are awaited to completion
//! and downloads are read fully before returning. No timeout is applied;
//! a hung installer hangs the run.

use crate::error::{ProvisionError, Result};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, info, warn};

/// A fully described external command.
///
/// `mutating` marks commands that change the machine. Read-only commands
/// (e.g. listing installed extensions) still run in dry-run mode so guards
/// see real state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub mutating: bool,
    /// Non-zero exit codes that still mean the command achieved its goal
    pub accepted_exit_codes: Vec<i32>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            mutating: true,
            accepted_exit_codes: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Mark the command as side-effect free.
    pub fn read_only(mut self) -> Self {
        self.mutating = false;
        self
    }

    /// Treat these exit codes as success.
    pub fn accept_exit_codes(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.accepted_exit_codes.extend(codes);
        self
    }

    /// Succeed if `output` exited 0 or with an accepted code.
    pub fn check(&self, output: &CommandOutput) -> Result<()> {
        match output.exit_code {
            Some(code) if !output.success && self.accepted_exit_codes.contains(&code) => {
                info!("{} exited with accepted code {:#010x}", self.program, code);
                Ok(())
            }
            _ => output.ensure_success(&self.program),
        }
    }

    /// Program followed by its arguments, space separated.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Output from a finished command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Standard output from the command.
    pub stdout: String,
    /// Standard error from the command.
    pub stderr: String,
    /// Exit code (None if terminated by signal).
    pub exit_code: Option<i32>,
    /// Whether the command exited successfully (exit code 0).
    pub success: bool,
}

impl CommandOutput {
    /// Successful output carrying `stdout`.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
            success: true,
        }
    }

    /// Failed output with the given exit code and stderr.
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: Some(exit_code),
            success: false,
        }
    }

    /// Check if the command succeeded and return an error if not.
    pub fn ensure_success(&self, program: &str) -> Result<()> {
        if self.success {
            return Ok(());
        }
        let code = self.exit_code.unwrap_or(-1);
        let detail = self.stderr.trim();
        let reason = if detail.is_empty() {
            format!("exit code {code}")
        } else {
            format!("exit code {code}: {detail}")
        };
        Err(ProvisionError::command(program, reason))
    }
}

/// Operations the provisioning workflow performs against the machine.
///
/// `search_path` arguments are the PATH value the orchestrator currently
/// believes in (its refreshed process scope), not whatever the OS process
/// environment happened to hold at startup.
pub trait Host {
    /// Capability probe: is `name` resolvable on `search_path`? Never fails.
    fn command_exists(&self, name: &str, search_path: &str) -> bool;

    /// Does `path` exist? Never fails.
    fn path_exists(&self, path: &Path) -> bool;

    /// Run a command to completion with `search_path` as its PATH.
    fn run(&mut self, cmd: &CommandSpec, search_path: &str) -> Result<CommandOutput>;

    /// Fetch `url` into `dest`, replacing any existing file.
    fn download(&mut self, url: &str, dest: &Path) -> Result<()>;

    /// Block the run for `duration`.
    fn sleep(&mut self, duration: Duration);
}

/// The real machine.
#[derive(Debug, Default)]
pub struct SystemHost {
    dry_run: bool,
}

impl SystemHost {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn resolve_program(program: &str, search_path: &str) -> PathBuf {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        which::which_in(program, Some(search_path), cwd).unwrap_or_else(|_| PathBuf::from(program))
    }
}

impl Host for SystemHost {
    fn command_exists(&self, name: &str, search_path: &str) -> bool {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let found = which::which_in(name, Some(search_path), cwd);
        debug!("probe {}: {:?}", name, found);
        found.is_ok()
    }

    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn run(&mut self, cmd: &CommandSpec, search_path: &str) -> Result<CommandOutput> {
        if self.dry_run && cmd.mutating {
            info!("[dry-run] would run: {}", cmd);
            return Ok(CommandOutput::ok(""));
        }

        let program = Self::resolve_program(&cmd.program, search_path);

        // Log exact command and environment for transparency
        info!("run: {} args={:?} env={:?}", program.display(), cmd.args, cmd.env);

        let mut command = Command::new(&program);
        command
            .args(&cmd.args)
            .env("PATH", search_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &cmd.env {
            command.env(key, value);
        }

        let output = command
            .output()
            .map_err(|e| ProvisionError::command(&cmd.program, e.to_string()))?;

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
            success: output.status.success(),
        };

        if result.success {
            debug!("{} exited successfully", cmd.program);
        } else {
            warn!(
                "{} failed with exit code {}",
                cmd.program,
                result.exit_code.unwrap_or(-1)
            );
        }
        Ok(result)
    }

    fn download(&mut self, url: &str, dest: &Path) -> Result<()> {
        if self.dry_run {
            info!("[dry-run] would download {} -> {}", url, dest.display());
            return Ok(());
        }

        info!("download: {} -> {}", url, dest.display());
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("devprov/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let response = client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProvisionError::download(url, format!("HTTP {status}")));
        }
        let bytes = response.bytes()?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(dest, &bytes)?;
        debug!("downloaded {} bytes to {}", bytes.len(), dest.display());
        Ok(())
    }

    fn sleep(&mut self, duration: Duration) {
        if self.dry_run {
            info!("[dry-run] would wait {}s", duration.as_secs());
            return;
        }
        info!("waiting {}s for the toolchain to settle", duration.as_secs());
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_rendering() {
        let cmd = CommandSpec::new("winget")
            .args(["install", "--id", "MSYS2.MSYS2"])
            .arg("-e");
        assert_eq!(cmd.command_line(), "winget install --id MSYS2.MSYS2 -e");
        assert_eq!(cmd.to_string(), cmd.command_line());
        assert!(cmd.mutating);
    }

    #[test]
    fn test_accepted_exit_codes() {
        let cmd = CommandSpec::new("winget").accept_exit_codes([-1978335135]);
        assert!(cmd.check(&CommandOutput::failed(-1978335135, "already installed")).is_ok());
        assert!(cmd.check(&CommandOutput::failed(1, "boom")).is_err());
        assert!(CommandSpec::new("winget")
            .check(&CommandOutput::failed(-1978335135, ""))
            .is_err());
    }

    #[test]
    fn test_read_only_marker() {
        let cmd = CommandSpec::new("code").arg("--list-extensions").read_only();
        assert!(!cmd.mutating);
    }

    #[test]
    fn test_ensure_success() {
        assert!(CommandOutput::ok("fine").ensure_success("winget").is_ok());

        let err = CommandOutput::failed(3, "no such package")
            .ensure_success("winget")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Command `winget` failed: exit code 3: no such package"
        );

        let err = CommandOutput::failed(1, "  ").ensure_success("pacman").unwrap_err();
        assert_eq!(err.to_string(), "Command `pacman` failed: exit code 1");
    }

    #[test]
    fn test_command_exists_nonexistent() {
        let host = SystemHost::new(false);
        let path = std::env::var("PATH").unwrap_or_default();
        assert!(!host.command_exists("this_binary_definitely_does_not_exist_12345", &path));
    }

    #[test]
    fn test_command_exists_respects_search_path() {
        let host = SystemHost::new(false);
        let empty = tempfile::tempdir().unwrap();
        let search = empty.path().to_string_lossy().to_string();
        assert!(!host.command_exists("cargo", &search));
    }

    #[test]
    fn test_dry_run_skips_mutating_commands() {
        let mut host = SystemHost::new(true);
        let out = host
            .run(
                &CommandSpec::new("this_binary_definitely_does_not_exist_12345"),
                "",
            )
            .unwrap();
        assert!(out.success);
    }

    #[test]
    fn test_dry_run_skips_download() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("setup.exe");
        let mut host = SystemHost::new(true);
        host.download("https://example.invalid/setup.exe", &dest)
            .unwrap();
        assert!(!dest.exists());
    }

    #[test]
    fn test_missing_program_is_command_error() {
        let mut host = SystemHost::new(false);
        let err = host
            .run(
                &CommandSpec::new("this_binary_definitely_does_not_exist_12345").read_only(),
                "",
            )
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Command { .. }));
    }
}
