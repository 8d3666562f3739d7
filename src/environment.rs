//! PATH scopes and the environment refresher.
//!
//! The OS keeps two persisted PATH values (machine and user). A running
//! process only sees the copy it inherited at startup, which goes stale as
//! soon as an installer persists a new entry. `EnvironmentStore` models the
//! three values explicitly so the orchestrator can re-derive its process
//! PATH after installs, and so tests can swap in `MemoryEnvironment`.

use crate::error::{ProvisionError, Result};
use std::collections::BTreeMap;
use strum::{Display, EnumString};
use tracing::{debug, info};

/// Separator between PATH entries on the provisioning target (Windows).
pub const PATH_SEPARATOR: char = ';';

/// Which PATH value an operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum EnvScope {
    /// Persisted, machine-wide
    Machine,
    /// Persisted, current user
    User,
    /// This run's working copy, handed to every spawned command
    Process,
}

/// Read/write access to the PATH variable in each scope.
pub trait EnvironmentStore {
    fn read(&self, scope: EnvScope) -> Result<String>;
    fn write(&mut self, scope: EnvScope, value: &str) -> Result<()>;
}

/// Recompute the process PATH as machine PATH followed by user PATH.
///
/// Overwrites the process scope and returns the new value. Empty scopes
/// contribute nothing, so no leading/trailing separators are introduced.
/// `%VAR%` references are expanded from this process's environment.
pub fn refresh_path(store: &mut dyn EnvironmentStore) -> Result<String> {
    let machine = store.read(EnvScope::Machine)?;
    let user = store.read(EnvScope::User)?;

    let parts: Vec<&str> = [machine.as_str(), user.as_str()]
        .into_iter()
        .map(|s| s.trim_end_matches(PATH_SEPARATOR))
        .filter(|s| !s.is_empty())
        .collect();
    let joined = parts.join(&PATH_SEPARATOR.to_string());
    let merged = expand_references(&joined, |name| std::env::var(name).ok());

    store.write(EnvScope::Process, &merged)?;
    info!("process PATH refreshed ({} entries)", merged.split(PATH_SEPARATOR).count());
    Ok(merged)
}

/// In-memory store; starts with every scope empty.
#[derive(Debug, Clone, Default)]
pub struct MemoryEnvironment {
    values: BTreeMap<EnvScope, String>,
    writes: BTreeMap<EnvScope, usize>,
}

impl MemoryEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style initial value for `scope`.
    pub fn with(mut self, scope: EnvScope, value: impl Into<String>) -> Self {
        self.values.insert(scope, value.into());
        self
    }

    /// How many times `scope` has been written.
    pub fn write_count(&self, scope: EnvScope) -> usize {
        self.writes.get(&scope).copied().unwrap_or(0)
    }
}

impl EnvironmentStore for MemoryEnvironment {
    fn read(&self, scope: EnvScope) -> Result<String> {
        Ok(self.values.get(&scope).cloned().unwrap_or_default())
    }

    fn write(&mut self, scope: EnvScope, value: &str) -> Result<()> {
        self.values.insert(scope, value.to_string());
        *self.writes.entry(scope).or_insert(0) += 1;
        Ok(())
    }
}

/// Registry location of a persisted PATH scope.
fn registry_key(scope: EnvScope) -> Option<&'static str> {
    match scope {
        EnvScope::Machine => Some(r"SYSTEM\CurrentControlSet\Control\Session Manager\Environment"),
        EnvScope::User => Some("Environment"),
        EnvScope::Process => None,
    }
}

/// Decode a `REG_SZ`/`REG_EXPAND_SZ` payload (UTF-16LE, NUL-terminated).
pub fn decode_reg_string(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    let end = units.iter().position(|&u| u == 0).unwrap_or(units.len());
    String::from_utf16_lossy(&units[..end])
}

/// Encode `value` as a NUL-terminated UTF-16LE registry string.
pub fn encode_reg_string(value: &str) -> Vec<u8> {
    value
        .encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(u16::to_le_bytes)
        .collect()
}

/// Expand `%NAME%` references with `lookup`; unknown names stay verbatim.
///
/// Persisted PATH values are `REG_EXPAND_SZ` and routinely hold entries
/// such as `%SystemRoot%\system32`, which a child process cannot resolve.
pub fn expand_references(value: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(open) = rest.find('%') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('%') {
            Some(close) if close > 0 => {
                let name = &after[..close];
                match lookup(name) {
                    Some(expanded) => out.push_str(&expanded),
                    None => {
                        out.push('%');
                        out.push_str(name);
                        out.push('%');
                    }
                }
                rest = &after[close + 1..];
            }
            _ => {
                out.push('%');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// The machine's real PATH scopes.
///
/// Persisted scopes are the `Path` values under `HKLM\...\Session
/// Manager\Environment` and `HKCU\Environment`, read and written as raw
/// UTF-16 so non-ASCII directories survive a round trip and `%VAR%`
/// references are kept unexpanded. The process scope is held in memory
/// and seeded from this process's own PATH.
///
/// In dry-run mode persisted writes land in an overlay instead of the OS,
/// so later reads in the same run still observe them.
#[derive(Debug, Clone)]
pub struct SystemEnvironment {
    process: String,
    dry_run: bool,
    overlay: BTreeMap<EnvScope, String>,
}

impl SystemEnvironment {
    pub fn from_process(dry_run: bool) -> Self {
        let process = std::env::var_os("PATH")
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            process,
            dry_run,
            overlay: BTreeMap::new(),
        }
    }

    #[cfg(windows)]
    fn root(scope: EnvScope) -> winreg::RegKey {
        use winreg::enums::{HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE};
        match scope {
            EnvScope::Machine => winreg::RegKey::predef(HKEY_LOCAL_MACHINE),
            _ => winreg::RegKey::predef(HKEY_CURRENT_USER),
        }
    }

    #[cfg(windows)]
    fn read_persisted(scope: EnvScope, subkey: &str) -> Result<String> {
        let key = Self::root(scope)
            .open_subkey(subkey)
            .map_err(|e| ProvisionError::environment(format!("cannot open {subkey}: {e}")))?;
        match key.get_raw_value("Path") {
            Ok(raw) => Ok(decode_reg_string(&raw.bytes)),
            // No Path value yet (fresh user profile)
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(ProvisionError::environment(format!(
                "cannot read {scope} PATH: {e}"
            ))),
        }
    }

    #[cfg(windows)]
    fn write_persisted(scope: EnvScope, subkey: &str, value: &str) -> Result<()> {
        use winreg::enums::{RegType, KEY_READ, KEY_SET_VALUE};
        let key = Self::root(scope)
            .open_subkey_with_flags(subkey, KEY_READ | KEY_SET_VALUE)
            .map_err(|e| ProvisionError::environment(format!("cannot open {subkey}: {e}")))?;
        let raw = winreg::RegValue {
            bytes: encode_reg_string(value),
            vtype: RegType::REG_EXPAND_SZ,
        };
        // TODO: broadcast WM_SETTINGCHANGE so already-running Explorer
        // windows pick up the new PATH without signing out.
        key.set_raw_value("Path", &raw)
            .map_err(|e| ProvisionError::environment(format!("cannot write {scope} PATH: {e}")))
    }

    #[cfg(not(windows))]
    fn read_persisted(scope: EnvScope, _subkey: &str) -> Result<String> {
        Err(ProvisionError::environment(format!(
            "{scope} PATH is only persisted on Windows"
        )))
    }

    #[cfg(not(windows))]
    fn write_persisted(scope: EnvScope, _subkey: &str, _value: &str) -> Result<()> {
        Err(ProvisionError::environment(format!(
            "{scope} PATH is only persisted on Windows"
        )))
    }
}

impl EnvironmentStore for SystemEnvironment {
    fn read(&self, scope: EnvScope) -> Result<String> {
        let Some(subkey) = registry_key(scope) else {
            return Ok(self.process.clone());
        };
        if let Some(v) = self.overlay.get(&scope) {
            return Ok(v.clone());
        }
        let value = Self::read_persisted(scope, subkey)?;
        debug!("read {} PATH ({} chars)", scope, value.chars().count());
        Ok(value)
    }

    fn write(&mut self, scope: EnvScope, value: &str) -> Result<()> {
        let Some(subkey) = registry_key(scope) else {
            self.process = value.to_string();
            return Ok(());
        };
        if self.dry_run {
            info!("[dry-run] would persist {} PATH", scope);
            self.overlay.insert(scope, value.to_string());
            return Ok(());
        }
        Self::write_persisted(scope, subkey, value)?;
        info!("persisted {} PATH", scope);
        Ok(())
    }
}
