//! Error handling module for devprov
//!
//! Provides the crate-wide error type using thiserror. Step-level failures
//! during a provisioning run are not raised through this type; they are
//! recorded as `StepOutcome::Failed` in the run report so later steps keep
//! going. `ProvisionError` covers the operations that can fail underneath
//! a step (subprocesses, downloads, environment access, file IO).

use crate::install_state::TransitionError;
use thiserror::Error;

/// Main error type for devprov
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// IO errors (settings file, temp files, spawning processes)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Provisioning plan errors (loading, validation)
    #[error("Configuration error: {0}")]
    Config(String),

    /// External command could not be run or exited unsuccessfully
    #[error("Command `{program}` failed: {reason}")]
    Command { program: String, reason: String },

    /// Installer artifact could not be fetched
    #[error("Download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    /// Reading or writing a PATH scope failed
    #[error("Environment error: {0}")]
    Environment(String),

    /// Install state machine transition errors
    #[error("Install transition error: {0}")]
    Transition(#[from] TransitionError),
}

/// Result type alias for devprov operations
pub type Result<T> = std::result::Result<T, ProvisionError>;

impl ProvisionError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a command error
    pub fn command(program: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Command {
            program: program.into(),
            reason: reason.into(),
        }
    }

    /// Create a download error
    pub fn download(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Download {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create an environment error
    pub fn environment(msg: impl Into<String>) -> Self {
        Self::Environment(msg.into())
    }
}

impl From<reqwest::Error> for ProvisionError {
    fn from(err: reqwest::Error) -> Self {
        let url = err
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "<unknown url>".to_string());
        Self::Download {
            url,
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install_state::InstallState;

    #[test]
    fn test_error_display() {
        let err = ProvisionError::config("extension id must not be empty");
        assert_eq!(
            err.to_string(),
            "Configuration error: extension id must not be empty"
        );

        let err = ProvisionError::command("winget", "exit code 1");
        assert_eq!(err.to_string(), "Command `winget` failed: exit code 1");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ProvisionError = io_err.into();
        assert!(matches!(err, ProvisionError::Io(_)));
    }

    #[test]
    fn test_transition_error_conversion() {
        let err: ProvisionError = TransitionError::FromTerminalState {
            from: InstallState::Installed,
        }
        .into();
        assert!(matches!(err, ProvisionError::Transition(_)));
    }

    #[test]
    fn test_error_constructors() {
        let err = ProvisionError::download("https://example.invalid/setup.exe", "HTTP 404");
        assert!(matches!(err, ProvisionError::Download { .. }));

        let err = ProvisionError::environment("powershell not found");
        assert!(matches!(err, ProvisionError::Environment(_)));
    }
}
