//! Script discovery for compile-all runs.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Papyrus source extension, without the dot.
pub const SCRIPT_EXTENSION: &str = "psc";

/// Returns true if `path` names a Papyrus source file (case-insensitive).
pub fn is_script_file(path: &Utf8Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(SCRIPT_EXTENSION))
}

/// Lists the `*.psc` files directly inside `dir`, sorted by path.
///
/// Subdirectories are not searched. Returns `Ok(None)` when `dir` does not exist or is
/// not a directory, so callers can tell "missing" apart from "empty".
pub fn find_scripts(dir: &Utf8Path) -> Result<Option<Vec<Utf8PathBuf>>> {
    if !dir.is_dir() {
        return Ok(None);
    }

    let entries =
        fs::read_dir(dir).with_context(|| format!("Failed to read script folder: {}", dir))?;

    let mut scripts = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to read entry in: {}", dir))?;
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }

        let path = match Utf8PathBuf::from_path_buf(entry.path()) {
            Ok(path) => path,
            Err(path) => {
                tracing::warn!("Skipping non UTF-8 path: {}", path.display());
                continue;
            }
        };

        if is_script_file(&path) {
            scripts.push(path);
        }
    }

    scripts.sort();
    tracing::debug!("Found {} scripts in {}", scripts.len(), dir);

    Ok(Some(scripts))
}
