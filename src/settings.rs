//! Editor settings patcher.
//!
//! Forces a set of top-level keys into a JSON settings file while keeping
//! every other key. A missing, blank or unparsable file is treated as an
//! empty document; an unparsable one is optionally copied aside first so
//! the user's previous settings are recoverable.
//!
//! Editor settings files are JSONC in practice, so `//` and `/* */`
//! comments and trailing commas are stripped before parsing. Comments and
//! formatting are not preserved on write; key order follows `serde_json`.

use crate::error::Result;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where the document that got patched came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    /// File did not exist and was created
    Created,
    /// File existed but was blank
    Empty,
    /// File parsed as a JSON object
    Parsed,
    /// File could not be parsed (or was not an object); started fresh
    Corrupt { backup: Option<PathBuf> },
}

/// Result of a patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    pub source: DocumentSource,
    /// Keys that were added or whose value changed
    pub changed_keys: Vec<String>,
    /// Whether the file was rewritten
    pub written: bool,
}

impl PatchOutcome {
    /// Nothing needed to change.
    pub fn was_noop(&self) -> bool {
        !self.written
    }
}

/// Apply `updates` to the settings file at `path`.
///
/// Missing parent directories and the file itself are created. When the
/// parsed document already holds every update, the file is left untouched.
pub fn patch_config(
    path: &Path,
    updates: &Map<String, Value>,
    backup_corrupt: bool,
) -> Result<PatchOutcome> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut created = false;
    if !path.exists() {
        fs::write(path, "{}\n")?;
        created = true;
        debug!("created {}", path.display());
    }

    let raw = fs::read_to_string(path)?;
    let (mut document, source) = if created {
        (Map::new(), DocumentSource::Created)
    } else if strip_bom(&raw).trim().is_empty() {
        (Map::new(), DocumentSource::Empty)
    } else {
        match parse_document(&raw) {
            Some(map) => (map, DocumentSource::Parsed),
            None => {
                let backup = if backup_corrupt {
                    Some(backup_file(path)?)
                } else {
                    None
                };
                warn!(
                    "{} is not a valid settings document; starting from an empty one{}",
                    path.display(),
                    backup
                        .as_ref()
                        .map(|b| format!(" (previous content saved to {})", b.display()))
                        .unwrap_or_default()
                );
                (Map::new(), DocumentSource::Corrupt { backup })
            }
        }
    };

    let changed_keys = apply_updates(&mut document, updates);

    let must_write = source != DocumentSource::Parsed || !changed_keys.is_empty();
    if must_write {
        let mut out = serde_json::to_string_pretty(&Value::Object(document))?;
        out.push('\n');
        fs::write(path, out)?;
        info!("patched {} ({} key(s) changed)", path.display(), changed_keys.len());
    } else {
        info!("{} already has the requested settings", path.display());
    }

    Ok(PatchOutcome {
        source,
        changed_keys,
        written: must_write,
    })
}

/// Keys `patch_config` would change, without touching the filesystem.
///
/// A missing, blank or corrupt file counts as empty, so every update is
/// reported.
pub fn pending_updates(path: &Path, updates: &Map<String, Value>) -> Vec<String> {
    let mut document = fs::read_to_string(path)
        .ok()
        .and_then(|raw| parse_document(&raw))
        .unwrap_or_default();
    apply_updates(&mut document, updates)
}

/// Set every key of `updates` on `document`; returns the keys that changed.
pub fn apply_updates(document: &mut Map<String, Value>, updates: &Map<String, Value>) -> Vec<String> {
    let mut changed = Vec::new();
    for (key, value) in updates {
        if document.get(key) != Some(value) {
            document.insert(key.clone(), value.clone());
            changed.push(key.clone());
        }
    }
    changed
}

/// Parse a JSON/JSONC document; `None` unless it is an object.
pub fn parse_document(raw: &str) -> Option<Map<String, Value>> {
    let cleaned = strip_jsonc(strip_bom(raw));
    match serde_json::from_str::<Value>(&cleaned) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => None,
        Err(e) => {
            debug!("settings parse error: {}", e);
            None
        }
    }
}

/// Drop a leading UTF-8 byte order mark (Windows PowerShell writes one).
fn strip_bom(raw: &str) -> &str {
    raw.strip_prefix('\u{FEFF}').unwrap_or(raw)
}

fn backup_file(path: &Path) -> Result<PathBuf> {
    let mut name = path.as_os_str().to_os_string();
    name.push(".bak");
    let backup = PathBuf::from(name);
    fs::copy(path, &backup)?;
    Ok(backup)
}

/// Remove `//` and `/* */` comments and trailing commas outside strings.
pub fn strip_jsonc(content: &str) -> String {
    let chars: Vec<char> = content.chars().collect();
    let len = chars.len();
    let mut without_comments = String::with_capacity(content.len());

    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;
    while i < len {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if in_string {
            without_comments.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        match (c, next) {
            ('"', _) => {
                in_string = true;
                without_comments.push(c);
                i += 1;
            }
            ('/', Some('/')) => {
                while i < len && chars[i] != '\n' {
                    i += 1;
                }
            }
            ('/', Some('*')) => {
                i += 2;
                while i < len && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
            }
            _ => {
                without_comments.push(c);
                i += 1;
            }
        }
    }

    strip_trailing_commas(&without_comments)
}

fn strip_trailing_commas(content: &str) -> String {
    let chars: Vec<char> = content.chars().collect();
    let mut out = String::with_capacity(content.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == '"' {
            in_string = true;
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace()).copied();
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}
