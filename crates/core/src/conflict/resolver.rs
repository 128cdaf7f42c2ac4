//! Backup snapshot lookup.
//!
//! Syncthing's staggered/simple versioning moves the previous copy of a file
//! into `.stversions/<same relative dir>/<stem>~<YYYYMMDD>-<HHMMSS>.<ext>`
//! before replacing it. That snapshot is the common ancestor for the union
//! merge of an original and its conflict copy.

use std::path::{Path, PathBuf};

use regex_lite::Regex;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::detector::relative_slash_path;
use crate::config::BackupSelection;

/// Finds pre-conflict snapshots inside the backup store.
#[derive(Debug, Clone)]
pub struct BackupResolver {
    store: PathBuf,
    selection: BackupSelection,
}

impl BackupResolver {
    pub fn new(store: impl Into<PathBuf>, selection: BackupSelection) -> Self {
        Self {
            store: store.into(),
            selection,
        }
    }

    pub fn store(&self) -> &Path {
        &self.store
    }

    /// Locate a snapshot of `<base_name>.<extension>`.
    ///
    /// With [`BackupSelection::First`] the first match in directory-walk order
    /// wins, which is not necessarily the newest snapshot when several exist.
    /// [`BackupSelection::Latest`] compares the embedded timestamps instead.
    pub fn find_backup(&self, base_name: &str, extension: &str) -> Option<PathBuf> {
        let pattern = match backup_pattern(base_name, extension) {
            Ok(re) => re,
            Err(e) => {
                warn!(base_name, error = %e, "could not build backup pattern");
                return None;
            }
        };

        let mut candidates = WalkDir::new(&self.store)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let rel = relative_slash_path(&self.store, entry.path())?;
                let stamp = pattern.captures(&rel)?.get(1)?.as_str().to_string();
                Some((stamp, entry.into_path()))
            });

        let found = match self.selection {
            BackupSelection::First => candidates.next(),
            BackupSelection::Latest => candidates.max_by(|a, b| a.0.cmp(&b.0)),
        };

        match found {
            Some((stamp, path)) => {
                debug!(base_name, %stamp, backup = %path.display(), "backup resolved");
                Some(path)
            }
            None => {
                debug!(base_name, extension, "no backup found");
                None
            }
        }
    }
}

/// `^<base>~(<8 digits>-<6 digits>)[.<ext>]$`, matched against store-relative paths.
fn backup_pattern(base_name: &str, extension: &str) -> Result<Regex, regex_lite::Error> {
    let mut pattern = format!(r"^{}~(\d{{8}}-\d{{6}})", regex_lite::escape(base_name));
    if !extension.is_empty() {
        pattern.push_str(r"\.");
        pattern.push_str(&regex_lite::escape(extension));
    }
    pattern.push('$');
    Regex::new(&pattern)
}
