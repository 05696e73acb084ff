//! Environment helpers shared by the OntoPortal MCP binaries.
//!
//! - `.env` loading that never overrides variables already present in the process environment
//! - required / optional accessors that treat an empty value the same as an unset one

use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Default `.env` location (relative to the working directory).
pub const DEFAULT_ENV_FILE: &str = ".env";

#[derive(Error, Debug)]
pub enum EnvError {
    #[error("Missing required environment variable: {name}")]
    Missing { name: String },

    #[error("failed to read env file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// One `KEY=VALUE` assignment from a `.env` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvEntry {
    pub key: String,
    pub value: String,
}

/// Parse `.env` contents.
///
/// Blank lines, `#` comments and lines without `=` are ignored. The line is split on the first
/// `=`, both sides are trimmed, and surrounding double then single quotes are stripped from the
/// value. Entries are returned in file order (duplicates included).
#[must_use]
pub fn parse_env_file(contents: &str) -> Vec<EnvEntry> {
    contents
        .lines()
        .filter_map(|raw| {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            let value = value.trim().trim_matches('"').trim_matches('\'');
            Some(EnvEntry {
                key: key.to_string(),
                value: value.to_string(),
            })
        })
        .collect()
}

/// Select the entries that should be applied given a lookup for already-set variables.
///
/// A variable that is already set is left alone; when a key repeats in the file, the first
/// occurrence wins.
#[must_use]
pub fn pending_entries(entries: Vec<EnvEntry>, is_set: impl Fn(&str) -> bool) -> Vec<EnvEntry> {
    let mut seen: HashSet<String> = HashSet::new();
    entries
        .into_iter()
        .filter(|e| seen.insert(e.key.clone()) && !is_set(&e.key))
        .collect()
}

/// Load a `.env` file into the process environment.
///
/// Returns the number of variables that were set. A missing file is not an error.
///
/// Call this before the async runtime (or any other thread) starts: mutating the process
/// environment is only sound while the process is single-threaded.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn load_env_file(path: impl AsRef<Path>) -> Result<usize, EnvError> {
    let path = path.as_ref();
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => {
            return Err(EnvError::Read {
                path: path.display().to_string(),
                source: e,
            });
        }
    };

    let pending = pending_entries(parse_env_file(&contents), |k| {
        std::env::var_os(k).is_some()
    });
    for entry in &pending {
        // SAFETY: documented precondition, callers load the env file before spawning threads.
        unsafe { std::env::set_var(&entry.key, &entry.value) };
    }

    tracing::debug!(path = %path.display(), applied = pending.len(), "loaded env file");
    Ok(pending.len())
}

/// Validate a looked-up value for a required variable.
///
/// # Errors
///
/// Returns [`EnvError::Missing`] if the value is absent or empty.
pub fn require_value(name: &str, value: Option<String>) -> Result<String, EnvError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(EnvError::Missing {
            name: name.to_string(),
        }),
    }
}

/// Read a required environment variable.
///
/// # Errors
///
/// Returns [`EnvError::Missing`] if the variable is unset, empty, or not valid unicode.
pub fn required_env(name: &str) -> Result<String, EnvError> {
    require_value(name, std::env::var(name).ok())
}

/// Read an optional environment variable, treating an empty value as unset.
#[must_use]
pub fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
