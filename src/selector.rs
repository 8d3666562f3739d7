//! Installer selection: fast path vs manual path.
//!
//! The fast path hands the editor and the toolchain to the system package
//! manager, one call each. The manual path downloads each vendor installer
//! and runs it unattended. Both paths share the same guards, so an editor
//! that is already installed is skipped either way.

use crate::config::ProvisionConfig;
use crate::guard::Guard;
use crate::host::{CommandSpec, Host};
use crate::path_entry::PathEntry;
use crate::target::{InstallAction, InstallTarget};
use std::path::Path;
use std::time::Duration;
use strum::Display;
use tracing::info;

/// Top-level installation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Strategy {
    #[strum(to_string = "fast path")]
    FastPath,
    #[strum(to_string = "manual path")]
    ManualPath,
}

/// Pick the strategy from the capability probe.
///
/// `force_manual` overrides the probe.
pub fn select_strategy(
    host: &dyn Host,
    config: &ProvisionConfig,
    search_path: &str,
    force_manual: bool,
) -> Strategy {
    if force_manual {
        info!("manual path forced");
        return Strategy::ManualPath;
    }
    if host.command_exists(&config.package_manager, search_path) {
        info!("{} found, using the fast path", config.package_manager);
        Strategy::FastPath
    } else {
        info!("{} not found, using the manual path", config.package_manager);
        Strategy::ManualPath
    }
}

/// winget `APPINSTALLER_CLI_ERROR_UPDATE_NOT_APPLICABLE` (0x8A15002B)
pub const WINGET_NO_APPLICABLE_UPGRADE: i32 = 0x8A15_002B_u32 as i32;
/// winget `APPINSTALLER_CLI_ERROR_PACKAGE_ALREADY_INSTALLED` (0x8A150061)
pub const WINGET_PACKAGE_ALREADY_INSTALLED: i32 = 0x8A15_0061_u32 as i32;

/// `<pm> install --id <id> -e --silent --accept-package-agreements --accept-source-agreements`
///
/// A package that is already present (possibly machine-wide, outside the
/// guarded location) makes winget exit non-zero; those codes count as
/// success.
pub fn package_install_command(package_manager: &str, package_id: &str) -> CommandSpec {
    CommandSpec::new(package_manager)
        .accept_exit_codes([WINGET_NO_APPLICABLE_UPGRADE, WINGET_PACKAGE_ALREADY_INSTALLED])
        .args([
            "install",
            "--id",
            package_id,
            "-e",
            "--silent",
            "--accept-package-agreements",
            "--accept-source-agreements",
        ])
}

pub fn editor_target(config: &ProvisionConfig, strategy: Strategy, download_dir: &Path) -> InstallTarget {
    let editor = &config.editor;
    let action = match strategy {
        Strategy::FastPath => InstallAction::Run(package_install_command(
            &config.package_manager,
            &editor.package_id,
        )),
        Strategy::ManualPath => InstallAction::DownloadAndRun {
            url: editor.installer_url.clone(),
            dest: download_dir.join(&editor.installer_file),
            args: editor.silent_args.clone(),
        },
    };

    InstallTarget::new("Visual Studio Code", Guard::FileExists(editor.executable()))
        .action(action)
        .path_addition(PathEntry::new(editor.cli_dir().to_string_lossy()))
}

/// MSYS2 itself. The fast path waits after install so the toolchain's
/// filesystem is ready before its shell is used.
pub fn toolchain_target(config: &ProvisionConfig, strategy: Strategy, download_dir: &Path) -> InstallTarget {
    let toolchain = &config.toolchain;
    let target = InstallTarget::new("MSYS2", Guard::FileExists(toolchain.shell()));

    match strategy {
        Strategy::FastPath => target
            .action(InstallAction::Run(package_install_command(
                &config.package_manager,
                &toolchain.package_id,
            )))
            .settle(Duration::from_secs(toolchain.settle_delay_secs)),
        Strategy::ManualPath => target.action(InstallAction::DownloadAndRun {
            url: toolchain.installer_url.clone(),
            dest: download_dir.join(&toolchain.installer_file),
            args: toolchain.silent_args.clone(),
        }),
    }
}

/// Compiler packages through the toolchain's own package manager. Same on
/// both paths: the toolchain installer ships without compilers.
pub fn compiler_target(config: &ProvisionConfig) -> InstallTarget {
    let toolchain = &config.toolchain;
    InstallTarget::new("GCC/G++", Guard::FileExists(toolchain.compiler()))
        .action(InstallAction::Run(toolchain.compiler_install_command()))
        .path_addition(toolchain.path_entry())
}

pub fn extension_target(config: &ProvisionConfig) -> InstallTarget {
    InstallTarget::new(
        format!("extension {}", config.extension_id),
        Guard::ExtensionInstalled {
            cli: config.editor.cli.clone(),
            id: config.extension_id.clone(),
        },
    )
    .action(InstallAction::Run(CommandSpec::new(&config.editor.cli).args([
        "--install-extension",
        config.extension_id.as_str(),
        "--force",
    ])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::CommandOutput;
    use std::path::PathBuf;

    #[test]
    fn test_package_install_command() {
        let cmd = package_install_command("winget", "MSYS2.MSYS2");
        assert_eq!(
            cmd.command_line(),
            "winget install --id MSYS2.MSYS2 -e --silent --accept-package-agreements --accept-source-agreements"
        );
    }

    #[test]
    fn test_package_install_accepts_already_installed() {
        let cmd = package_install_command("winget", "Microsoft.VisualStudioCode");
        assert_eq!(WINGET_PACKAGE_ALREADY_INSTALLED, -1978335135);
        assert_eq!(WINGET_NO_APPLICABLE_UPGRADE, -1978335189);
        assert!(cmd.check(&CommandOutput::failed(WINGET_NO_APPLICABLE_UPGRADE, "")).is_ok());
        assert!(cmd.check(&CommandOutput::failed(1, "")).is_err());
    }

    #[test]
    fn test_fast_toolchain_settles() {
        let config = ProvisionConfig::default();
        let t = toolchain_target(&config, Strategy::FastPath, Path::new("/tmp"));
        assert_eq!(t.settle, Some(Duration::from_secs(10)));
        assert!(matches!(t.actions[0], InstallAction::Run(_)));
    }

    #[test]
    fn test_manual_toolchain_downloads() {
        let config = ProvisionConfig::default();
        let t = toolchain_target(&config, Strategy::ManualPath, Path::new("/tmp"));
        assert_eq!(t.settle, None);
        match &t.actions[0] {
            InstallAction::DownloadAndRun { url, dest, args } => {
                assert_eq!(url, &config.toolchain.installer_url);
                assert_eq!(dest, &PathBuf::from("/tmp").join("msys2-x86_64-latest.exe"));
                assert_eq!(args[0], "install");
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_guards_identical_across_strategies() {
        let config = ProvisionConfig::default();
        let dir = Path::new("/tmp");
        assert_eq!(
            editor_target(&config, Strategy::FastPath, dir).guard,
            editor_target(&config, Strategy::ManualPath, dir).guard
        );
        assert_eq!(
            toolchain_target(&config, Strategy::FastPath, dir).guard,
            toolchain_target(&config, Strategy::ManualPath, dir).guard
        );
    }

    #[test]
    fn test_compiler_target_adds_bin_dir() {
        let config = ProvisionConfig::default();
        let t = compiler_target(&config);
        assert_eq!(t.path_addition, Some(config.toolchain.path_entry()));
    }

    #[test]
    fn test_strategy_display() {
        assert_eq!(Strategy::FastPath.to_string(), "fast path");
        assert_eq!(Strategy::ManualPath.to_string(), "manual path");
    }
}
