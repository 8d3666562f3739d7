//! User-scope PATH entries.
//!
//! An entry is appended only when its directory is not already a substring
//! of the current user PATH. Re-running the append is therefore a no-op and
//! never inserts a duplicate.

use crate::environment::{EnvScope, EnvironmentStore, PATH_SEPARATOR};
use crate::error::Result;
use crate::guard::StepOutcome;
use tracing::info;

/// A directory destined for the user PATH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEntry {
    dir: String,
}

impl PathEntry {
    pub fn new(dir: impl Into<String>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.dir
    }

    /// Substring containment, byte-exact.
    pub fn is_present_in(&self, path_value: &str) -> bool {
        path_value.contains(&self.dir)
    }

    /// `path_value` with this entry appended, or `None` if already present.
    pub fn appended_to(&self, path_value: &str) -> Option<String> {
        if self.is_present_in(path_value) {
            return None;
        }
        let mut out = String::with_capacity(path_value.len() + self.dir.len() + 1);
        out.push_str(path_value);
        if !out.is_empty() && !out.ends_with(PATH_SEPARATOR) {
            out.push(PATH_SEPARATOR);
        }
        out.push_str(&self.dir);
        Some(out)
    }
}

impl std::fmt::Display for PathEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.dir)
    }
}

/// Append `entry` to the persisted user PATH unless it is already there.
pub fn ensure_user_path(store: &mut dyn EnvironmentStore, entry: &PathEntry) -> Result<StepOutcome> {
    let current = store.read(EnvScope::User)?;
    match entry.appended_to(&current) {
        None => Ok(StepOutcome::AlreadySatisfied),
        Some(updated) => {
            store.write(EnvScope::User, &updated)?;
            info!("added {} to user PATH", entry);
            Ok(StepOutcome::NowSatisfied)
        }
    }
}
