//! Input file discovery

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::IngestError;

/// Recursively collect regular files under `root` whose extension matches
/// `extension` (case-insensitive, without the leading dot).
///
/// Paths listed in `exclude` are left out even when they match. The result
/// is sorted, so files are always processed in the same order.
pub fn discover_files(
    root: &Path,
    extension: &str,
    exclude: &[PathBuf],
) -> Result<Vec<PathBuf>, IngestError> {
    if !root.is_dir() {
        return Err(IngestError::RootNotFound(root.to_path_buf()));
    }

    let extension = extension.trim_start_matches('.');
    let excluded: Vec<PathBuf> = exclude.iter().filter_map(|p| p.canonicalize().ok()).collect();

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "Skipping unreadable directory entry");
                continue;
            },
        };

        if !entry.file_type().is_file() || !has_extension(entry.path(), extension) {
            continue;
        }

        if !excluded.is_empty() {
            let is_excluded = entry
                .path()
                .canonicalize()
                .map(|p| excluded.contains(&p))
                .unwrap_or(false);
            if is_excluded {
                debug!(path = %entry.path().display(), "Excluding file from discovery");
                continue;
            }
        }

        files.push(entry.into_path());
    }

    files.sort();
    Ok(files)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}
