//! Merge tool implementations.
//!
//! A [`MergeTool`] merges `conflict` into `original` using `backup` as the
//! common ancestor and writes the result over `original`. The run engine only
//! sees the trait, so tests substitute fakes without spawning processes.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use super::merger::Merger;
use crate::config::MergeToolKind;
use crate::errors::MergeError;

/// Three-way union merge into `original`, in place.
#[async_trait]
pub trait MergeTool: Send + Sync {
    async fn merge(&self, original: &Path, backup: &Path, conflict: &Path)
        -> Result<(), MergeError>;
}

/// Build the tool selected in configuration.
pub fn merge_tool_for(kind: MergeToolKind) -> Box<dyn MergeTool> {
    match kind {
        MergeToolKind::Git => Box::new(GitMergeFile::default()),
        MergeToolKind::Builtin => Box::new(UnionMerge),
    }
}

#[async_trait]
impl<T: MergeTool + ?Sized> MergeTool for Box<T> {
    async fn merge(
        &self,
        original: &Path,
        backup: &Path,
        conflict: &Path,
    ) -> Result<(), MergeError> {
        (**self).merge(original, backup, conflict).await
    }
}

// ---------------------------------------------------------------------------
// git merge-file --union
// ---------------------------------------------------------------------------

/// Runs `git merge-file --union <original> <backup> <conflict>`.
#[derive(Debug, Clone)]
pub struct GitMergeFile {
    git: String,
}

impl Default for GitMergeFile {
    fn default() -> Self {
        Self { git: "git".into() }
    }
}

impl GitMergeFile {
    /// Use a specific `git` executable.
    pub fn with_binary(git: impl Into<String>) -> Self {
        Self { git: git.into() }
    }
}

#[async_trait]
impl MergeTool for GitMergeFile {
    #[instrument(skip_all, fields(original = %original.display()))]
    async fn merge(
        &self,
        original: &Path,
        backup: &Path,
        conflict: &Path,
    ) -> Result<(), MergeError> {
        let mut cmd = Command::new(&self.git);
        cmd.args(["merge-file", "--union"])
            .arg(original)
            .arg(backup)
            .arg(conflict)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(backup = %backup.display(), conflict = %conflict.display(), "running git merge-file");
        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MergeError::BinaryNotFound(self.git.clone())
            } else {
                MergeError::IoError(e)
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            let exit_code = output.status.code().unwrap_or(-1);
            warn!(exit_code, %stderr, "git merge-file failed");
            return Err(MergeError::CommandFailed { exit_code, stderr });
        }

        info!("git merge-file succeeded");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-process union merge
// ---------------------------------------------------------------------------

/// In-process line-level union merge in the same spirit as
/// `git merge-file --union`.
///
/// Hunks are grouped more finely than git's, so when several edits interleave
/// the order of union lines can differ from git's output. Every line of both
/// sides is still kept and no markers are written.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnionMerge;

#[async_trait]
impl MergeTool for UnionMerge {
    #[instrument(skip_all, fields(original = %original.display()))]
    async fn merge(
        &self,
        original: &Path,
        backup: &Path,
        conflict: &Path,
    ) -> Result<(), MergeError> {
        let ours = read_text(original).await?;
        let base = read_text(backup).await?;
        let theirs = read_text(conflict).await?;

        let result = Merger::union_merge(&base, &ours, &theirs);
        tokio::fs::write(original, result.merged_content.as_bytes()).await?;

        info!(
            union_regions = result.union_regions.len(),
            "union merge written"
        );
        Ok(())
    }
}

async fn read_text(path: &Path) -> Result<String, MergeError> {
    let bytes = tokio::fs::read(path).await?;
    String::from_utf8(bytes).map_err(|_| MergeError::NotText {
        path: path.display().to_string(),
    })
}
