//! Login shell allow-list.

use adduser_core::{Error, Result};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Parses a shells file: one shell per line, skipping blank lines, comments and lines that start
/// with whitespace.
#[must_use]
pub fn parse_shells(contents: &str) -> Vec<String> {
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !line.starts_with('#') && !line.starts_with(char::is_whitespace))
        .map(|line| line.trim_end().to_string())
        .collect()
}

/// Reads the allow-list from `path`.
///
/// # Errors
///
/// Returns [`Error::ConfigError`] if the file cannot be read.
pub fn load_shells(path: &Path) -> Result<Vec<String>> {
    let contents = fs::read_to_string(path).map_err(|err| {
        Error::ConfigError(format!("failed to read shells file {}: {err}", path.display()))
    })?;
    let shells = parse_shells(&contents);
    debug!(path = %path.display(), count = shells.len(), "loaded login shells");
    Ok(shells)
}
