//! Provisioning plan: what gets installed, from where, and which editor
//! settings are forced.
//!
//! The built-in defaults describe the standard VS Code + MSYS2 UCRT64 GCC +
//! Code Runner setup. A JSON file can override any subset of fields; every
//! field falls back to its default when absent.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::host::CommandSpec;
use crate::path_entry::PathEntry;

/// Environment variable naming a plan file (used when `--config` is absent)
pub const CONFIG_ENV_VAR: &str = "DEVPROV_CONFIG";

/// Environment variable forcing the manual path
pub const FORCE_MANUAL_ENV_VAR: &str = "DEVPROV_FORCE_MANUAL";

/// Complete provisioning plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// System package manager probed for the fast path
    pub package_manager: String,
    pub editor: EditorConfig,
    pub toolchain: ToolchainConfig,
    /// Editor extension installed through the editor CLI
    pub extension_id: String,
    /// Editor settings file patched at the end of the run
    pub settings_path: PathBuf,
    /// Top-level keys forced into the settings file
    pub settings: BTreeMap<String, Value>,
    /// Retry a failed fast-path install through the manual path
    pub fallback_to_manual: bool,
    /// Copy an unparsable settings file to `<file>.bak` before replacing it
    pub backup_corrupt_settings: bool,
}

/// Visual Studio Code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub package_id: String,
    pub install_dir: PathBuf,
    pub installer_url: String,
    pub installer_file: String,
    pub silent_args: Vec<String>,
    /// Editor command-line launcher
    pub cli: String,
}

/// MSYS2 and the GCC packages installed inside it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    pub package_id: String,
    pub root: PathBuf,
    pub installer_url: String,
    pub installer_file: String,
    pub silent_args: Vec<String>,
    pub compiler_packages: Vec<String>,
    /// Directory holding the compilers; added to the user PATH
    pub bin_dir: PathBuf,
    /// Wait after a package-manager install before using the toolchain shell
    pub settle_delay_secs: u64,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        let settings_path = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(r"C:\Users\Default\AppData\Roaming"))
            .join("Code")
            .join("User")
            .join("settings.json");

        let mut settings = BTreeMap::new();
        settings.insert("code-runner.runInTerminal".to_string(), Value::Bool(true));
        settings.insert("code-runner.saveFileBeforeRun".to_string(), Value::Bool(true));
        settings.insert("code-runner.clearPreviousOutput".to_string(), Value::Bool(true));

        Self {
            package_manager: "winget".to_string(),
            editor: EditorConfig::default(),
            toolchain: ToolchainConfig::default(),
            extension_id: "formulahendry.code-runner".to_string(),
            settings_path,
            settings,
            fallback_to_manual: false,
            backup_corrupt_settings: true,
        }
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        let install_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(r"C:\Users\Default\AppData\Local"))
            .join("Programs")
            .join("Microsoft VS Code");
        Self {
            package_id: "Microsoft.VisualStudioCode".to_string(),
            install_dir,
            installer_url: "https://update.code.visualstudio.com/latest/win32-x64-user/stable"
                .to_string(),
            installer_file: "VSCodeUserSetup-x64.exe".to_string(),
            silent_args: vec![
                "/VERYSILENT".to_string(),
                "/NORESTART".to_string(),
                "/MERGETASKS=!runcode,addtopath".to_string(),
            ],
            cli: "code".to_string(),
        }
    }
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        let root = PathBuf::from(r"C:\msys64");
        let bin_dir = root.join("ucrt64").join("bin");
        Self {
            package_id: "MSYS2.MSYS2".to_string(),
            installer_url: "https://github.com/msys2/msys2-installer/releases/download/nightly-x86_64/msys2-x86_64-latest.exe".to_string(),
            installer_file: "msys2-x86_64-latest.exe".to_string(),
            silent_args: vec![
                "install".to_string(),
                "--root".to_string(),
                root.to_string_lossy().to_string(),
                "--confirm-command".to_string(),
            ],
            compiler_packages: vec!["mingw-w64-ucrt-x86_64-gcc".to_string()],
            root,
            bin_dir,
            settle_delay_secs: 10,
        }
    }
}

impl EditorConfig {
    /// File whose presence means the editor is installed
    pub fn executable(&self) -> PathBuf {
        self.install_dir.join("Code.exe")
    }

    /// Directory holding the CLI launcher
    pub fn cli_dir(&self) -> PathBuf {
        self.install_dir.join("bin")
    }
}

impl ToolchainConfig {
    /// Toolchain login shell; its presence means MSYS2 is installed
    pub fn shell(&self) -> PathBuf {
        self.root.join("usr").join("bin").join("bash.exe")
    }

    /// File whose presence means the compiler packages are installed
    pub fn compiler(&self) -> PathBuf {
        self.bin_dir.join("g++.exe")
    }

    pub fn path_entry(&self) -> PathEntry {
        PathEntry::new(self.bin_dir.to_string_lossy())
    }

    /// `bash -lc "pacman -S --needed --noconfirm <packages>"`
    pub fn compiler_install_command(&self) -> CommandSpec {
        let script = format!(
            "pacman -S --needed --noconfirm {}",
            self.compiler_packages.join(" ")
        );
        CommandSpec::new(self.shell().to_string_lossy())
            .arg("-lc")
            .arg(script)
            .env("MSYSTEM", "UCRT64")
    }
}

impl ProvisionConfig {
    /// Save the plan to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize plan to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write plan to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Load a plan from a JSON file; missing fields take their defaults
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read plan from {:?}", path.as_ref()))?;

        let config: Self = serde_json::from_str(&content).context("Failed to parse plan JSON")?;

        Ok(config)
    }

    /// Plan file to use: explicit CLI path first, then `DEVPROV_CONFIG`.
    pub fn locate(cli_path: Option<&Path>) -> Option<PathBuf> {
        if let Some(p) = cli_path {
            return Some(p.to_path_buf());
        }
        std::env::var(CONFIG_ENV_VAR)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
    }

    /// Manual path forced through the environment.
    /// Set DEVPROV_FORCE_MANUAL=1 to force it
    pub fn force_manual_from_env() -> bool {
        std::env::var(FORCE_MANUAL_ENV_VAR)
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false)
    }

    /// Validate the plan
    pub fn validate(&self) -> Result<()> {
        if self.package_manager.trim().is_empty() {
            anyhow::bail!("Package manager must be specified");
        }
        if self.editor.package_id.trim().is_empty() || self.toolchain.package_id.trim().is_empty()
        {
            anyhow::bail!("Package identifiers must not be empty");
        }
        if self.editor.cli.trim().is_empty() {
            anyhow::bail!("Editor CLI must be specified");
        }
        if self.extension_id.trim().is_empty() {
            anyhow::bail!("Extension id must be specified");
        }

        for (what, url) in [
            ("editor", &self.editor.installer_url),
            ("toolchain", &self.toolchain.installer_url),
        ] {
            let url = url.trim();
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("{} installer URL must start with http:// or https://", what);
            }
        }
        if self.editor.installer_file.trim().is_empty()
            || self.toolchain.installer_file.trim().is_empty()
        {
            anyhow::bail!("Installer file names must not be empty");
        }

        if self.toolchain.compiler_packages.is_empty() {
            anyhow::bail!("At least one compiler package must be listed");
        }
        if self
            .toolchain
            .compiler_packages
            .iter()
            .any(|p| p.trim().is_empty() || p.contains(char::is_whitespace))
        {
            anyhow::bail!("Compiler package names cannot be empty or contain whitespace");
        }

        if self.settings_path.as_os_str().is_empty() {
            anyhow::bail!("Settings path must be specified");
        }
        if self.settings.keys().any(|k| k.trim().is_empty()) {
            anyhow::bail!("Settings keys cannot be empty");
        }

        Ok(())
    }
}
