//! Domain model types shared by the scanner, merge engine and run engine.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Conflict artifact
// ---------------------------------------------------------------------------

/// A Syncthing conflict copy discovered in the working tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictArtifact {
    /// Path relative to the working-tree root, `/`-separated.
    pub relative_path: String,
    /// Logical stem before the conflict marker, including any directory prefix.
    pub base_name: String,
    /// Trailing extension without the dot; may be empty.
    pub extension: String,
}

impl ConflictArtifact {
    /// Relative path of the live file this artifact diverged from.
    pub fn original_relative_path(&self) -> String {
        if self.extension.is_empty() {
            self.base_name.clone()
        } else {
            format!("{}.{}", self.base_name, self.extension)
        }
    }
}

// ---------------------------------------------------------------------------
// Per-artifact outcome
// ---------------------------------------------------------------------------

/// Why an artifact was left alone without attempting a merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The path does not parse as a conflict artifact.
    NotAConflict,
    /// The live file the conflict belongs to is gone.
    OriginalMissing,
    /// No pre-conflict snapshot exists in the backup store.
    BackupMissing,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAConflict => write!(f, "not a conflict artifact"),
            Self::OriginalMissing => write!(f, "original file missing"),
            Self::BackupMissing => write!(f, "no backup snapshot"),
        }
    }
}

/// Result of processing one conflict artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConflictOutcome {
    /// Merged into the original and deleted.
    Resolved { path: String },
    /// Not attempted; the artifact stays on disk.
    Skipped { path: String, reason: SkipReason },
    /// The merge was attempted and failed; the artifact stays on disk.
    Failed { path: String, cause: String },
}

impl ConflictOutcome {
    pub fn path(&self) -> &str {
        match self {
            Self::Resolved { path } | Self::Skipped { path, .. } | Self::Failed { path, .. } => path,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// Why the quiescence gate refused the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateReason {
    /// The named editor process is running.
    EditorRunning(String),
    /// Syncthing did not report the folder as idle.
    SyncActive,
    /// A file under the root changed within the idle window.
    RecentChanges { path: PathBuf },
}

impl GateReason {
    /// The run-log line recorded for this skip.
    pub fn log_message(&self) -> String {
        match self {
            Self::EditorRunning(name) => format!("Skipped: {} is running", name),
            Self::SyncActive => "Skipped: Syncthing is active".to_string(),
            Self::RecentChanges { .. } => "Skipped: recent file changes detected".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Run summary
// ---------------------------------------------------------------------------

/// Aggregate of one completed pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Every artifact processed, in scan order.
    pub outcomes: Vec<ConflictOutcome>,
}

impl RunSummary {
    /// Relative paths of resolved artifacts, in scan order.
    pub fn resolved(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.is_resolved())
            .map(ConflictOutcome::path)
            .collect()
    }

    /// The single summary line written to the run log.
    pub fn log_message(&self) -> String {
        let resolved = self.resolved();
        if resolved.is_empty() {
            "No conflicts found".to_string()
        } else {
            format!(
                "Resolved {} conflict(s): {}",
                resolved.len(),
                resolved.join(", ")
            )
        }
    }
}

/// What a call to the engine's run produced.
#[derive(Debug, Clone)]
pub enum RunReport {
    Skipped(GateReason),
    Completed(RunSummary),
}

impl RunReport {
    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            Self::Completed(s) => Some(s),
            Self::Skipped(_) => None,
        }
    }
}
