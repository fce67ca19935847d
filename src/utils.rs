//! Utility functions for revmap
//!
//! Small helpers shared by the backends, the session and the CLI:
//!
//! - **File operations**: atomic writes and JSON read/write
//! - **Formatting**: byte sizes and compact value previews
//! - **Parsing**: `key=value` assignments with JSON-or-string values
//!
//! All functions are stateless and safe to call from any thread.

use crate::error::{Result, RevmapError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Atomic file write (write to temp file then rename)
///
/// The target is never observed partially written: readers see either the
/// old content or the new content.
///
/// # Errors
///
/// - [`RevmapError::Io`] if writing the temporary file or the rename fails
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let temp_path = temp_path_for(path);

    if let Err(e) = fs::write(&temp_path, content) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }

    trace!("Wrote {} bytes to {:?}", content.len(), path);
    Ok(())
}

/// Sibling temp path: `versions.json` -> `versions.json.tmp`
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Serialize a value as pretty JSON and write it atomically
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    atomic_write(path, &bytes)
}

/// Read and deserialize a JSON file
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Format bytes as human-readable string
///
/// ```rust
/// use revmap::utils::format_bytes;
///
/// assert_eq!(format_bytes(1023), "1023 B");
/// assert_eq!(format_bytes(1536), "1.50 KB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// Compact one-line rendering of a value, cut to `max_len` characters
pub fn preview_value(value: &Value, max_len: usize) -> String {
    let rendered = value.to_string();
    if rendered.chars().count() <= max_len {
        return rendered;
    }
    let cut: String = rendered.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", cut)
}

/// Parse a value given on the command line
///
/// Valid JSON is taken as JSON (`42`, `true`, `{"a":1}`, `"quoted"`);
/// anything else becomes a plain string.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Split a `key=value` assignment and parse the value with [`parse_value`]
///
/// # Errors
///
/// - [`RevmapError::Validation`] if there is no `=` or the key is empty
pub fn parse_assignment(raw: &str) -> Result<(String, Value)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| RevmapError::validation(format!("expected key=value, got '{}'", raw)))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(RevmapError::validation(format!("empty key in '{}'", raw)));
    }

    Ok((key.to_string(), parse_value(value)))
}
