//! Deconflict engine: one maintenance pass over a synced tree.
//!
//! Per-run state machine:
//! `Idle → CheckingQuiescence → {Skipped | Scanning} → Merging → Done`
//!
//! Nothing escapes [`DeconflictEngine::run`]: gate failures become a
//! [`RunReport::Skipped`], per-artifact problems become [`ConflictOutcome`]s,
//! and the run log records one line per pass.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use tracing::{debug, error, info, warn};

use crate::config::DeconflictConfig;
use crate::conflict::{merge_tool_for, parse_conflict_path, BackupResolver, ConflictScanner, MergeTool};
use crate::errors::CoreError;
use crate::models::{ConflictOutcome, GateReason, RunReport, RunSummary, SkipReason};
use crate::quiescence::syncthing::IDLE_STATE;
use crate::quiescence::{find_recent_change, Pgrep, ProcessChecker, SyncMonitor, SyncthingClient};
use crate::runlog::RunLog;

// ---------------------------------------------------------------------------
// Run state machine
// ---------------------------------------------------------------------------

/// Where the current pass is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    CheckingQuiescence,
    Skipped,
    Scanning,
    Merging,
    Done,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::CheckingQuiescence => write!(f, "checking_quiescence"),
            Self::Skipped => write!(f, "skipped"),
            Self::Scanning => write!(f, "scanning"),
            Self::Merging => write!(f, "merging"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Every gate evaluated without short-circuiting, for operator display.
#[derive(Debug, Clone)]
pub struct QuiescenceReport {
    /// Editor name and whether it is running; `None` when the check is disabled.
    pub editor: Option<(String, bool)>,
    /// Folder state or the error text; `None` when the check is disabled.
    pub sync_state: Option<Result<String, String>>,
    /// First file changed inside the idle window.
    pub recent_change: Option<PathBuf>,
}

impl QuiescenceReport {
    pub fn is_quiet(&self) -> bool {
        let editor_ok = !matches!(self.editor, Some((_, true)));
        let sync_ok = match &self.sync_state {
            None => true,
            Some(Ok(state)) => state == IDLE_STATE,
            Some(Err(_)) => false,
        };
        editor_ok && sync_ok && self.recent_change.is_none()
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Engine wired with the production collaborators.
pub type DefaultEngine = DeconflictEngine<Pgrep, SyncthingClient, Box<dyn MergeTool>>;

/// Sequences the quiescence gate, the scan and the merges for one pass.
pub struct DeconflictEngine<P, S, M> {
    config: DeconflictConfig,
    scanner: ConflictScanner,
    resolver: BackupResolver,
    run_log: RunLog,
    processes: P,
    monitor: Option<S>,
    merge_tool: M,
    state: Mutex<RunState>,
}

impl DefaultEngine {
    /// Build an engine using `pgrep`, the Syncthing REST API and the
    /// configured merge tool.
    pub fn from_config(config: DeconflictConfig) -> Result<Self, CoreError> {
        let monitor = if config.syncthing.enabled {
            let client = SyncthingClient::new(
                config.syncthing.url.clone(),
                config.syncthing.folder_id.clone(),
                config.syncthing.api_key.as_deref(),
                Duration::from_secs(config.syncthing.timeout_secs),
            )?;
            Some(client)
        } else {
            None
        };
        let tool = merge_tool_for(config.merge.tool);
        Ok(Self::new(config, Pgrep::default(), monitor, tool))
    }
}

impl<P, S, M> DeconflictEngine<P, S, M>
where
    P: ProcessChecker,
    S: SyncMonitor,
    M: MergeTool,
{
    /// Create an engine. Pass `None` as `monitor` to skip the sync-idle gate.
    pub fn new(config: DeconflictConfig, processes: P, monitor: Option<S>, merge_tool: M) -> Self {
        let versions = config.versions_path();
        let scanner = ConflictScanner::new(&config.paths.root).prune(&versions);
        let resolver = BackupResolver::new(&versions, config.merge.backup_selection);
        let run_log = RunLog::new(config.log_path());

        info!(
            root = %config.paths.root.display(),
            versions = %versions.display(),
            log = %run_log.path().display(),
            "deconflict engine created"
        );

        Self {
            config,
            scanner,
            resolver,
            run_log,
            processes,
            monitor,
            merge_tool,
            state: Mutex::new(RunState::Idle),
        }
    }

    pub fn config(&self) -> &DeconflictConfig {
        &self.config
    }

    pub fn scanner(&self) -> &ConflictScanner {
        &self.scanner
    }

    pub fn resolver(&self) -> &BackupResolver {
        &self.resolver
    }

    pub fn root(&self) -> &Path {
        &self.config.paths.root
    }

    pub fn state(&self) -> RunState {
        self.state.lock().map(|s| *s).unwrap_or(RunState::Idle)
    }

    fn set_state(&self, new_state: RunState) {
        if let Ok(mut state) = self.state.lock() {
            debug!(from = %*state, to = %new_state, "run state transition");
            *state = new_state;
        }
    }

    /// Run one pass. Never fails; see the module docs.
    pub async fn run(&self) -> RunReport {
        self.set_state(RunState::CheckingQuiescence);
        if let Err(reason) = self.check_quiescence().await {
            info!(?reason, "pass skipped");
            self.log(&reason.log_message());
            self.set_state(RunState::Skipped);
            return RunReport::Skipped(reason);
        }

        // Let in-flight Syncthing renames land before listing the tree.
        tokio::time::sleep(self.config.settle_delay()).await;

        self.set_state(RunState::Scanning);
        let conflicts: Vec<String> = self
            .scanner
            .find_conflicts()
            .map(|a| a.relative_path)
            .collect();
        info!(count = conflicts.len(), "conflict scan complete");

        self.set_state(RunState::Merging);
        let mut summary = RunSummary::default();
        for path in &conflicts {
            let outcome = self.process_conflict(path).await;
            match &outcome {
                ConflictOutcome::Resolved { path } => info!(%path, "conflict resolved"),
                ConflictOutcome::Skipped { path, reason } => debug!(%path, %reason, "conflict skipped"),
                ConflictOutcome::Failed { path, cause } => warn!(%path, %cause, "conflict merge failed"),
            }
            summary.outcomes.push(outcome);
        }

        self.log(&summary.log_message());
        self.set_state(RunState::Done);
        RunReport::Completed(summary)
    }

    /// Evaluate the gates in order, stopping at the first that fails.
    pub async fn check_quiescence(&self) -> Result<(), GateReason> {
        let editor = &self.config.quiescence.editor_process;
        if !editor.is_empty() && self.processes.is_running(editor).await {
            return Err(GateReason::EditorRunning(editor.clone()));
        }

        if let Some(monitor) = &self.monitor {
            match monitor.folder_state().await {
                Ok(state) if state == IDLE_STATE => {}
                Ok(state) => {
                    debug!(%state, "folder not idle");
                    return Err(GateReason::SyncActive);
                }
                Err(e) => {
                    warn!(error = %e, "Syncthing status check failed");
                    self.log(&format!("Error checking Syncthing status: {}", e));
                    return Err(GateReason::SyncActive);
                }
            }
        }

        if let Some(path) = self.recent_change() {
            return Err(GateReason::RecentChanges { path });
        }
        Ok(())
    }

    /// Evaluate every gate without writing the run log.
    pub async fn inspect(&self) -> QuiescenceReport {
        let editor_name = &self.config.quiescence.editor_process;
        let editor = if editor_name.is_empty() {
            None
        } else {
            Some((editor_name.clone(), self.processes.is_running(editor_name).await))
        };

        let sync_state = match &self.monitor {
            Some(monitor) => Some(monitor.folder_state().await.map_err(|e| e.to_string())),
            None => None,
        };

        QuiescenceReport {
            editor,
            sync_state,
            recent_change: self.recent_change(),
        }
    }

    fn recent_change(&self) -> Option<PathBuf> {
        let exclude = [self.run_log.path().to_path_buf()];
        find_recent_change(
            &self.config.paths.root,
            self.config.idle_window(),
            SystemTime::now(),
            &exclude,
        )
    }

    /// Resolve one artifact given its root-relative path.
    ///
    /// The artifact is deleted only after a successful merge; every other
    /// outcome leaves it on disk for the next pass.
    pub async fn process_conflict(&self, relative_path: &str) -> ConflictOutcome {
        let path = relative_path.to_string();

        let Some(artifact) = parse_conflict_path(relative_path) else {
            return ConflictOutcome::Skipped {
                path,
                reason: SkipReason::NotAConflict,
            };
        };

        let root = &self.config.paths.root;
        let original = root.join(artifact.original_relative_path());
        if !original.is_file() {
            return ConflictOutcome::Skipped {
                path,
                reason: SkipReason::OriginalMissing,
            };
        }

        let Some(backup) = self
            .resolver
            .find_backup(&artifact.base_name, &artifact.extension)
        else {
            return ConflictOutcome::Skipped {
                path,
                reason: SkipReason::BackupMissing,
            };
        };

        let conflict = root.join(relative_path);
        if let Err(e) = self.merge_tool.merge(&original, &backup, &conflict).await {
            return ConflictOutcome::Failed {
                path,
                cause: e.to_string(),
            };
        }

        match std::fs::remove_file(&conflict) {
            Ok(()) => ConflictOutcome::Resolved { path },
            Err(e) => ConflictOutcome::Failed {
                path,
                cause: format!("merged but could not remove artifact: {}", e),
            },
        }
    }

    fn log(&self, message: &str) {
        if let Err(e) = self.run_log.append(message) {
            error!(error = %e, message, "could not write run log");
        }
    }
}
