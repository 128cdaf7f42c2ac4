//! Trailing idle-window check over the working tree.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, trace};
use walkdir::WalkDir;

/// Return the first file under `root` modified after `now - window`.
///
/// Paths listed in `exclude` are ignored (files) or not descended into
/// (directories). Entries that vanish mid-walk or whose metadata cannot be
/// read are skipped.
pub fn find_recent_change(
    root: &Path,
    window: Duration,
    now: SystemTime,
    exclude: &[PathBuf],
) -> Option<PathBuf> {
    let cutoff = now.checked_sub(window).unwrap_or(SystemTime::UNIX_EPOCH);

    let recent = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| !exclude.iter().any(|p| entry.path() == p))
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .find(|entry| {
            let modified = match entry.metadata().map(|m| m.modified()) {
                Ok(Ok(t)) => t,
                _ => {
                    trace!(path = %entry.path().display(), "metadata unavailable, skipping");
                    return false;
                }
            };
            modified > cutoff
        })
        .map(|entry| entry.into_path());

    if let Some(path) = &recent {
        debug!(path = %path.display(), window_secs = window.as_secs(), "recent change found");
    }
    recent
}
