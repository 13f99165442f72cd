//! Credential file: a `.env`-style `KEY=value` file holding the token.
//!
//! Only the configured key is read or rewritten; every other line
//! (comments, unrelated variables) is preserved as-is.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::ConfigError;

/// Reads and replaces one variable in a dotenv file.
pub struct CredentialStore {
    path: PathBuf,
    key: String,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("path", &self.path)
            .field("key", &self.key)
            .finish()
    }
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current value of the key, `None` if the file or the key is absent.
    ///
    /// Lines dotenvy cannot parse are skipped.
    pub fn get(&self) -> Result<Option<String>, ConfigError> {
        let entries = match dotenvy::from_path_iter(&self.path) {
            Ok(iter) => iter,
            Err(e) if e.not_found() => return Ok(None),
            Err(e) => {
                return Err(ConfigError::ReadError {
                    path: self.path.clone(),
                    reason: e.to_string(),
                });
            }
        };

        let mut value = None;
        for entry in entries {
            match entry {
                Ok((k, v)) if k == self.key => value = Some(v),
                Ok(_) => {}
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "Skipping malformed credential line")
                }
            }
        }
        Ok(value)
    }

    /// Replace (or append) the key's value and write the file back.
    pub fn set(&self, value: &str) -> Result<(), ConfigError> {
        let existing = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(ConfigError::ReadError {
                    path: self.path.clone(),
                    reason: e.to_string(),
                });
            }
        };

        let entry = format!("{}={}", self.key, quote(value));
        let mut replaced = false;
        let mut lines: Vec<String> = Vec::new();
        for line in existing.lines() {
            if defines(line, &self.key) {
                if !replaced {
                    lines.push(entry.clone());
                    replaced = true;
                }
            } else {
                lines.push(line.to_string());
            }
        }
        if !replaced {
            lines.push(entry);
        }

        let mut content = lines.join("\n");
        content.push('\n');
        write_atomic(&self.path, content.as_bytes())
    }
}

/// Whether `line` assigns `key`, with or without a leading `export`.
fn defines(line: &str, key: &str) -> bool {
    let line = line.trim_start();
    let line = line.strip_prefix("export ").unwrap_or(line);
    line.split_once('=').is_some_and(|(k, _)| k.trim() == key)
}

fn quote(value: &str) -> String {
    if value
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '#' | '"' | '$' | '\\'))
    {
        format!("'{value}'")
    } else {
        value.to_string()
    }
}

/// Write to a temporary sibling, then rename over the target.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ConfigError> {
    let write_err = |e: std::io::Error| ConfigError::WriteError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, bytes).map_err(write_err)?;
    std::fs::rename(&tmp, path).map_err(write_err)
}
