//! Conflict artifact detection.
//!
//! Syncthing never overwrites a file that changed on two devices at once; it
//! keeps the losing copy next to the original as
//! `<base>.sync-conflict-<YYYYMMDD>-<HHMMSS>-<device>.<ext>`. The
//! [`ConflictScanner`] walks a working tree and yields every such copy.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex_lite::Regex;
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::models::ConflictArtifact;

/// `<base>(.|%2F)sync-conflict-<8 digits>-<6 digits>-<7 word chars>[.]<ext>`
const CONFLICT_PATTERN: &str = r"^(.*?)(?:\.|%2F)sync-conflict-\d{8}-\d{6}-\w{7}\.?(.*)$";

fn conflict_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(CONFLICT_PATTERN).expect("conflict pattern is valid"))
}

/// Parse a root-relative, `/`-separated path into a [`ConflictArtifact`].
///
/// Returns `None` when the path is not a conflict copy. This is the only
/// parser for artifact names; the scanner and the merge step both use it.
pub fn parse_conflict_path(relative_path: &str) -> Option<ConflictArtifact> {
    let caps = conflict_regex().captures(relative_path)?;
    let base_name = caps.get(1).map_or("", |m| m.as_str());
    let extension = caps.get(2).map_or("", |m| m.as_str());

    Some(ConflictArtifact {
        relative_path: relative_path.to_string(),
        base_name: base_name.to_string(),
        extension: extension.to_string(),
    })
}

/// Render `path` relative to `root` with `/` separators.
///
/// Returns `None` for paths outside `root` or with non-UTF-8 components.
pub fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in rel.components() {
        parts.push(component.as_os_str().to_str()?);
    }
    Some(parts.join("/"))
}

/// Walks a working tree looking for conflict artifacts.
#[derive(Debug, Clone)]
pub struct ConflictScanner {
    root: PathBuf,
    pruned: Vec<PathBuf>,
}

impl ConflictScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pruned: Vec::new(),
        }
    }

    /// Do not descend into `dir` (typically the backup store).
    pub fn prune(mut self, dir: impl Into<PathBuf>) -> Self {
        self.pruned.push(dir.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily enumerate conflict artifacts under the root.
    ///
    /// Each call starts a fresh walk. Order follows the directory walk and is
    /// not otherwise defined. Unreadable entries are skipped.
    pub fn find_conflicts(&self) -> impl Iterator<Item = ConflictArtifact> + '_ {
        debug!(root = %self.root.display(), "scanning for conflict artifacts");

        WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(move |entry| !self.pruned.iter().any(|p| entry.path() == p))
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter_map(move |entry| {
                let rel = relative_slash_path(&self.root, entry.path())?;
                let artifact = parse_conflict_path(&rel);
                if artifact.is_some() {
                    trace!(path = %rel, "found conflict artifact");
                }
                artifact
            })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::fs;

    use super::*;

    #[test]
    fn test_parse_markdown_conflict() {
        let a = parse_conflict_path("notes/todo.sync-conflict-20240101-120000-abc1234.md").unwrap();
        assert_eq!(a.base_name, "notes/todo");
        assert_eq!(a.extension, "md");
        assert_eq!(a.original_relative_path(), "notes/todo.md");
    }

    #[test]
    fn test_parse_without_extension() {
        let a = parse_conflict_path("LICENSE.sync-conflict-20231231-235959-ZZZZZZZ").unwrap();
        assert_eq!(a.base_name, "LICENSE");
        assert_eq!(a.extension, "");
    }

    #[test]
    fn test_parse_encoded_separator() {
        let a = parse_conflict_path("journal%2Fsync-conflict-20240301-080000-DEV0001.md").unwrap();
        assert_eq!(a.base_name, "journal");
        assert_eq!(a.extension, "md");
    }

    #[test]
    fn test_parse_multi_dot_extension() {
        let a = parse_conflict_path("data/export.sync-conflict-20240101-120000-abc1234.tar.gz")
            .unwrap();
        assert_eq!(a.base_name, "data/export");
        assert_eq!(a.extension, "tar.gz");
    }

    #[test]
    fn test_parse_rejects_non_conflicts() {
        assert!(parse_conflict_path("notes/todo.md").is_none());
        // Wrong digit counts.
        assert!(parse_conflict_path("a.sync-conflict-2024011-120000-abc1234.md").is_none());
        assert!(parse_conflict_path("a.sync-conflict-20240101-12000-abc1234.md").is_none());
        // Device id too short.
        assert!(parse_conflict_path("a.sync-conflict-20240101-120000-abc12.md").is_none());
        // Missing separator before the marker.
        assert!(parse_conflict_path("async-conflict-20240101-120000-abc1234.md").is_none());
    }

    #[test]
    fn test_relative_slash_path() {
        let root = Path::new("/vault");
        assert_eq!(
            relative_slash_path(root, Path::new("/vault/a/b.md")).as_deref(),
            Some("a/b.md")
        );
        assert!(relative_slash_path(root, Path::new("/elsewhere/b.md")).is_none());
    }

    #[test]
    fn test_find_conflicts_walks_tree() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("notes/deep")).unwrap();
        fs::write(root.join("notes/a.md"), "a").unwrap();
        fs::write(
            root.join("notes/a.sync-conflict-20240102-130000-abcd123.md"),
            "a2",
        )
        .unwrap();
        fs::write(
            root.join("notes/deep/b.sync-conflict-20240102-130000-efgh456.txt"),
            "b2",
        )
        .unwrap();
        fs::write(root.join("readme.txt"), "r").unwrap();

        let scanner = ConflictScanner::new(root);
        let found: HashSet<String> = scanner
            .find_conflicts()
            .map(|a| a.relative_path)
            .collect();

        let expected: HashSet<String> = [
            "notes/a.sync-conflict-20240102-130000-abcd123.md",
            "notes/deep/b.sync-conflict-20240102-130000-efgh456.txt",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(found, expected);

        // Restartable: a second walk sees the same set.
        assert_eq!(scanner.find_conflicts().count(), 2);
    }

    #[test]
    fn test_find_conflicts_prunes_backup_store() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let versions = root.join(".stversions");
        fs::create_dir_all(versions.join("notes")).unwrap();
        fs::write(
            versions.join("notes/a.sync-conflict-20240102-130000-abcd123~20240103-000000.md"),
            "old",
        )
        .unwrap();

        let scanner = ConflictScanner::new(root).prune(&versions);
        assert_eq!(scanner.find_conflicts().count(), 0);

        let unpruned = ConflictScanner::new(root);
        assert_eq!(unpruned.find_conflicts().count(), 1);
    }

    #[test]
    fn test_find_conflicts_missing_root_is_empty() {
        let scanner = ConflictScanner::new("/definitely/not/here");
        assert_eq!(scanner.find_conflicts().count(), 0);
    }
}
