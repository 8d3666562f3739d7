//! Idempotency guards and per-step outcomes.
//!
//! A guard is a pure check over observable machine state. When it holds,
//! the step it protects is skipped and reported as already satisfied.
//! Guards never fail: any error while checking is logged and treated as
//! "not satisfied", which is safe because every protected action can be
//! re-run.

use crate::environment::{EnvScope, EnvironmentStore};
use crate::host::{CommandSpec, Host};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Predicate deciding whether a step's effect is already present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    /// A file or directory exists
    FileExists(PathBuf),
    /// A command resolves on the current process PATH
    CommandAvailable(String),
    /// A PATH scope already contains `dir` as a substring
    PathContains { scope: EnvScope, dir: String },
    /// `cli --list-extensions` reports `id` (case-insensitive)
    ExtensionInstalled { cli: String, id: String },
}

impl Guard {
    /// Evaluate the guard. Never fails.
    pub fn is_satisfied(&self, host: &mut dyn Host, env: &dyn EnvironmentStore) -> bool {
        let satisfied = match self {
            Self::FileExists(path) => host.path_exists(path),
            Self::CommandAvailable(name) => {
                let path = read_or_empty(env, EnvScope::Process);
                host.command_exists(name, &path)
            }
            Self::PathContains { scope, dir } => read_or_empty(env, *scope).contains(dir.as_str()),
            Self::ExtensionInstalled { cli, id } => {
                let path = read_or_empty(env, EnvScope::Process);
                let list = CommandSpec::new(cli).arg("--list-extensions").read_only();
                match host.run(&list, &path) {
                    Ok(out) if out.success => out
                        .stdout
                        .lines()
                        .map(str::trim)
                        .any(|line| line.eq_ignore_ascii_case(id)),
                    Ok(out) => {
                        warn!(
                            "{} --list-extensions exited with {}",
                            cli,
                            out.exit_code.unwrap_or(-1)
                        );
                        false
                    }
                    Err(e) => {
                        warn!("could not list extensions: {}", e);
                        false
                    }
                }
            }
        };
        debug!("guard {} -> {}", self, satisfied);
        satisfied
    }
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileExists(path) => write!(f, "exists({})", path.display()),
            Self::CommandAvailable(name) => write!(f, "command({name})"),
            Self::PathContains { scope, dir } => write!(f, "{scope}-path-contains({dir})"),
            Self::ExtensionInstalled { id, .. } => write!(f, "extension({id})"),
        }
    }
}

fn read_or_empty(env: &dyn EnvironmentStore, scope: EnvScope) -> String {
    env.read(scope).unwrap_or_else(|e| {
        warn!("could not read {} PATH: {}", scope, e);
        String::new()
    })
}

/// What happened to one step of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Guard held; nothing was done
    AlreadySatisfied,
    /// Action ran and succeeded
    NowSatisfied,
    /// Step could not run (a precondition is missing)
    Skipped(String),
    /// Action ran and failed
    Failed(String),
}

impl StepOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// True for both satisfied variants.
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::AlreadySatisfied | Self::NowSatisfied)
    }

    /// Short status word shown in the summary.
    pub fn label(&self) -> &'static str {
        match self {
            Self::AlreadySatisfied => "already done",
            Self::NowSatisfied => "done",
            Self::Skipped(_) => "skipped",
            Self::Failed(_) => "error",
        }
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped(reason) | Self::Failed(reason) => write!(f, "{}: {}", self.label(), reason),
            _ => f.write_str(self.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::MemoryEnvironment;

    #[test]
    fn test_path_contains_guard() {
        let env = MemoryEnvironment::new().with(EnvScope::User, r"C:\a;C:\msys64\ucrt64\bin");
        let guard = Guard::PathContains {
            scope: EnvScope::User,
            dir: r"C:\msys64\ucrt64\bin".to_string(),
        };
        let mut host = crate::host::SystemHost::new(true);
        assert!(guard.is_satisfied(&mut host, &env));

        let guard = Guard::PathContains {
            scope: EnvScope::Machine,
            dir: r"C:\msys64\ucrt64\bin".to_string(),
        };
        assert!(!guard.is_satisfied(&mut host, &env));
    }

    #[test]
    fn test_file_exists_guard() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("Code.exe");
        let env = MemoryEnvironment::new();
        let mut host = crate::host::SystemHost::new(false);

        let guard = Guard::FileExists(file.clone());
        assert!(!guard.is_satisfied(&mut host, &env));
        std::fs::write(&file, b"").unwrap();
        assert!(guard.is_satisfied(&mut host, &env));
    }

    #[test]
    fn test_extension_guard_never_fails_when_cli_missing() {
        let env = MemoryEnvironment::new();
        let mut host = crate::host::SystemHost::new(false);
        let guard = Guard::ExtensionInstalled {
            cli: "this_binary_definitely_does_not_exist_12345".to_string(),
            id: "formulahendry.code-runner".to_string(),
        };
        assert!(!guard.is_satisfied(&mut host, &env));
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(StepOutcome::AlreadySatisfied.to_string(), "already done");
        assert_eq!(StepOutcome::NowSatisfied.to_string(), "done");
        assert_eq!(
            StepOutcome::Failed("exit code 1".into()).to_string(),
            "error: exit code 1"
        );
        assert!(StepOutcome::Failed(String::new()).is_failure());
        assert!(!StepOutcome::Skipped(String::new()).is_satisfied());
    }
}
