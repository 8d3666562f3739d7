//! devprov library
//!
//! Provisions a Windows C/C++ workstation: VS Code, MSYS2 with the UCRT64
//! GCC toolchain, the Code Runner extension and a handful of editor
//! settings. Every step is guarded so the whole run can be repeated.

pub mod cli;
pub mod config;
pub mod environment;
pub mod error;
pub mod guard;
pub mod host;
pub mod install_state;
pub mod orchestrator;
pub mod path_entry;
pub mod report;
pub mod selector;
pub mod settings;
pub mod target;

// Re-export main types for convenience
pub use config::{EditorConfig, ProvisionConfig, ToolchainConfig};
pub use environment::{refresh_path, EnvScope, EnvironmentStore, MemoryEnvironment, SystemEnvironment};
pub use error::{ProvisionError, Result};
pub use guard::{Guard, StepOutcome};
pub use host::{CommandOutput, CommandSpec, Host, SystemHost};
pub use install_state::{InstallState, TargetProgress, TransitionError};
pub use orchestrator::{Provisioner, RunOptions};
pub use path_entry::{ensure_user_path, PathEntry};
pub use report::{RunReport, StepReport};
pub use selector::{select_strategy, Strategy};
pub use settings::{patch_config, pending_updates, DocumentSource, PatchOutcome};
pub use target::{ensure_installed, InstallAction, InstallTarget};
