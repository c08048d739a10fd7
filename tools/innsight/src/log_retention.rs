use crate::errors::ConsoleError;
use std::fs;
use std::path::{Path, PathBuf};

/// Deletes the oldest rotated segments in `dir` until the directory's total
/// size fits the budget. The active log file is counted against the budget
/// but never deleted, so the newest events always survive a sweep.
pub fn enforce_total_budget(
    dir: &Path,
    budget_bytes: u64,
    active: &Path,
) -> Result<Vec<PathBuf>, ConsoleError> {
    let mut segments = fs::read_dir(dir)
        .map_err(|e| ConsoleError::Io(e.to_string()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path != active)
        .collect::<Vec<_>>();

    segments.sort_by(|a, b| {
        let ma = fs::metadata(a).ok().and_then(|m| m.modified().ok());
        let mb = fs::metadata(b).ok().and_then(|m| m.modified().ok());
        ma.cmp(&mb)
    });

    let active_len = fs::metadata(active).map(|meta| meta.len()).unwrap_or(0);
    let mut total = active_len
        + segments
            .iter()
            .filter_map(|path| fs::metadata(path).ok().map(|meta| meta.len()))
            .sum::<u64>();

    let mut deleted = Vec::new();
    for path in segments {
        if total <= budget_bytes {
            break;
        }
        let len = fs::metadata(&path)
            .map_err(|e| ConsoleError::Io(e.to_string()))?
            .len();
        fs::remove_file(&path).map_err(|e| ConsoleError::Io(e.to_string()))?;
        total = total.saturating_sub(len);
        deleted.push(path);
    }

    Ok(deleted)
}
