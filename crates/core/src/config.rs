//! Configuration for a deconflicter pass.
//!
//! The configuration is an explicit [`DeconflictConfig`] handed to the engine
//! at construction. It can be loaded from an optional TOML file, then
//! overlaid with the environment variables a scheduler typically sets
//! (`SYNCTHING_API_KEY`, `SYNCTHING_FOLDER_ID`, ...), then validated.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;

/// Environment variable holding the Syncthing folder ID.
pub const ENV_FOLDER_ID: &str = "SYNCTHING_FOLDER_ID";
/// Environment variable overriding the Syncthing base URL.
pub const ENV_SYNCTHING_URL: &str = "SYNCTHING_URL";
/// Environment variable overriding the idle window, in seconds.
pub const ENV_IDLE_SECS: &str = "DECONFLICTER_IDLE_SECS";
/// Environment variable overriding the working-tree root.
pub const ENV_ROOT: &str = "DECONFLICTER_ROOT";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Complete configuration for one deconflicter run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeconflictConfig {
    /// Working tree, backup store and run log locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Syncthing REST API settings.
    #[serde(default)]
    pub syncthing: SyncthingConfig,

    /// Gating thresholds.
    #[serde(default)]
    pub quiescence: QuiescenceConfig,

    /// Merge tool selection.
    #[serde(default)]
    pub merge: MergeConfig,
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// Filesystem layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root of the synced working tree.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Syncthing versions directory, relative to `root` unless absolute.
    #[serde(default = "default_versions_dir")]
    pub versions_dir: PathBuf,

    /// Append-only run log, relative to `root` unless absolute.
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_versions_dir() -> PathBuf {
    PathBuf::from(".stversions")
}

fn default_log_file() -> PathBuf {
    PathBuf::from("deconflicter.log")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            versions_dir: default_versions_dir(),
            log_file: default_log_file(),
        }
    }
}

// ---------------------------------------------------------------------------
// Syncthing
// ---------------------------------------------------------------------------

/// Settings for the Syncthing folder status check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncthingConfig {
    /// Set to false to skip the sync-idle gate entirely.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Base URL of the local Syncthing GUI/REST listener.
    #[serde(default = "default_syncthing_url")]
    pub url: String,

    /// Folder ID whose state is queried.
    #[serde(default)]
    pub folder_id: String,

    /// Environment variable holding the REST API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Resolved API key (populated by `apply_env`).
    #[serde(skip)]
    pub api_key: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_syncthing_url() -> String {
    "http://localhost:8384".into()
}

fn default_api_key_env() -> String {
    "SYNCTHING_API_KEY".into()
}

fn default_timeout_secs() -> u64 {
    5
}

impl Default for SyncthingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_syncthing_url(),
            folder_id: String::new(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            api_key: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Quiescence
// ---------------------------------------------------------------------------

/// Thresholds for deciding whether the tree is quiet enough to touch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuiescenceConfig {
    /// Exact process name of the editor to wait for. Empty disables the check.
    #[serde(default = "default_editor_process")]
    pub editor_process: String,

    /// Files modified within this many seconds block the run.
    #[serde(default = "default_idle_window_secs")]
    pub idle_window_secs: u64,

    /// Pause between the gate and the scan, in milliseconds.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

fn default_editor_process() -> String {
    "Obsidian".into()
}

fn default_idle_window_secs() -> u64 {
    600
}

fn default_settle_delay_ms() -> u64 {
    100
}

impl Default for QuiescenceConfig {
    fn default() -> Self {
        Self {
            editor_process: default_editor_process(),
            idle_window_secs: default_idle_window_secs(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Which three-way union merge implementation to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeToolKind {
    /// `git merge-file --union`.
    #[default]
    Git,
    /// In-process union merge.
    Builtin,
}

/// How to pick among several timestamped backups of the same file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupSelection {
    /// First match in directory-walk order (not necessarily the newest).
    #[default]
    First,
    /// Match with the greatest `~YYYYMMDD-HHMMSS` stamp.
    Latest,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeConfig {
    #[serde(default)]
    pub tool: MergeToolKind,

    #[serde(default)]
    pub backup_selection: BackupSelection,
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl DeconflictConfig {
    /// Load a [`DeconflictConfig`] from a TOML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: DeconflictConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Overlay values using `lookup` as the environment.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        self.syncthing.api_key = get(&self.syncthing.api_key_env);
        if self.syncthing.api_key.is_none() {
            warn!(env = %self.syncthing.api_key_env, "Syncthing API key not set");
        }
        if let Some(folder) = get(ENV_FOLDER_ID) {
            self.syncthing.folder_id = folder;
        }
        if let Some(url) = get(ENV_SYNCTHING_URL) {
            self.syncthing.url = url;
        }
        if let Some(root) = get(ENV_ROOT) {
            self.paths.root = PathBuf::from(root);
        }
        if let Some(secs) = get(ENV_IDLE_SECS) {
            self.quiescence.idle_window_secs =
                secs.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    field: ENV_IDLE_SECS.into(),
                    detail: format!("'{}' is not a number of seconds", secs),
                })?;
        }

        debug!("environment overlay complete");
        Ok(())
    }

    /// Validate that the values are usable, including Syncthing credentials
    /// when the sync check is enabled.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_for_run()?;
        if self.syncthing.enabled {
            if self.syncthing.folder_id.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "syncthing.folder_id".into(),
                    detail: format!("set {} or syncthing.folder_id", ENV_FOLDER_ID),
                });
            }
            if self.syncthing.api_key.is_none() {
                return Err(ConfigError::InvalidValue {
                    field: "syncthing.api_key_env".into(),
                    detail: format!("{} is not set", self.syncthing.api_key_env),
                });
            }
        }
        Ok(())
    }

    /// The subset of [`validate`](Self::validate) an unattended pass needs.
    ///
    /// Missing Syncthing credentials are not rejected here; the sync gate
    /// reports them in the run log and skips the pass.
    pub fn validate_for_run(&self) -> Result<(), ConfigError> {
        if self.paths.root.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "paths.root".into(),
                detail: "root must not be empty".into(),
            });
        }
        if self.paths.versions_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "paths.versions_dir".into(),
                detail: "versions directory must not be empty".into(),
            });
        }
        if self.syncthing.enabled && self.syncthing.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "syncthing.timeout_secs".into(),
                detail: "timeout must be > 0".into(),
            });
        }
        Ok(())
    }

    /// Convenience: load (if a path is given), overlay the environment, validate.
    pub fn load_and_resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::load_from_file(p)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Absolute-or-root-relative path of the backup store.
    pub fn versions_path(&self) -> PathBuf {
        self.paths.root.join(&self.paths.versions_dir)
    }

    /// Absolute-or-root-relative path of the run log.
    pub fn log_path(&self) -> PathBuf {
        self.paths.root.join(&self.paths.log_file)
    }

    pub fn idle_window(&self) -> Duration {
        Duration::from_secs(self.quiescence.idle_window_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.quiescence.settle_delay_ms)
    }

    /// Generate a default TOML config template string.
    pub fn default_template() -> &'static str {
        r#"# deconflicter configuration
# Every key is optional; environment variables override the values below.

[paths]
root = "."
versions_dir = ".stversions"
log_file = "deconflicter.log"

[syncthing]
enabled = true
url = "http://localhost:8384"      # or SYNCTHING_URL
folder_id = ""                     # or SYNCTHING_FOLDER_ID
api_key_env = "SYNCTHING_API_KEY"
timeout_secs = 5

[quiescence]
editor_process = "Obsidian"        # "" disables the editor check
idle_window_secs = 600             # or DECONFLICTER_IDLE_SECS
settle_delay_ms = 100

[merge]
tool = "git"                       # "git" | "builtin"
backup_selection = "first"         # "first" | "latest"
"#
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn sample_toml() -> &'static str {
        r#"
[paths]
root = "/srv/vault"
versions_dir = ".stversions"
log_file = "/var/log/deconflicter.log"

[syncthing]
url = "http://127.0.0.1:8384"
folder_id = "abcd-1234"
api_key_env = "VAULT_ST_KEY"

[quiescence]
editor_process = "obsidian"
idle_window_secs = 120

[merge]
tool = "builtin"
backup_selection = "latest"
"#
    }

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_full_config() {
        let config: DeconflictConfig = toml::from_str(sample_toml()).expect("failed to parse");
        assert_eq!(config.paths.root, PathBuf::from("/srv/vault"));
        assert_eq!(config.syncthing.folder_id, "abcd-1234");
        assert_eq!(config.quiescence.idle_window_secs, 120);
        assert_eq!(config.quiescence.settle_delay_ms, 100);
        assert_eq!(config.merge.tool, MergeToolKind::Builtin);
        assert_eq!(config.merge.backup_selection, BackupSelection::Latest);
        assert_eq!(
            config.log_path(),
            PathBuf::from("/var/log/deconflicter.log")
        );
        assert_eq!(
            config.versions_path(),
            PathBuf::from("/srv/vault/.stversions")
        );
    }

    #[test]
    fn test_defaults() {
        let config: DeconflictConfig = toml::from_str("").unwrap();
        assert_eq!(config.paths.root, PathBuf::from("."));
        assert_eq!(config.syncthing.url, "http://localhost:8384");
        assert_eq!(config.syncthing.timeout_secs, 5);
        assert_eq!(config.quiescence.editor_process, "Obsidian");
        assert_eq!(config.idle_window(), Duration::from_secs(600));
        assert_eq!(config.settle_delay(), Duration::from_millis(100));
        assert_eq!(config.merge.tool, MergeToolKind::Git);
        assert_eq!(config.merge.backup_selection, BackupSelection::First);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deconflicter.toml");
        std::fs::write(&path, sample_toml()).unwrap();

        let config = DeconflictConfig::load_from_file(&path).expect("load failed");
        assert_eq!(config.syncthing.api_key_env, "VAULT_ST_KEY");
    }

    #[test]
    fn test_file_not_found() {
        let result = DeconflictConfig::load_from_file("/nonexistent/deconflicter.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_apply_env_overrides() {
        let vars = env(&[
            ("SYNCTHING_API_KEY", "k3y"),
            (ENV_FOLDER_ID, "notes"),
            (ENV_SYNCTHING_URL, "http://10.0.0.2:8384"),
            (ENV_IDLE_SECS, "30"),
            (ENV_ROOT, "/data/notes"),
        ]);
        let mut config = DeconflictConfig::default();
        config
            .apply_env_from(|name| vars.get(name).cloned())
            .unwrap();

        assert_eq!(config.syncthing.api_key.as_deref(), Some("k3y"));
        assert_eq!(config.syncthing.folder_id, "notes");
        assert_eq!(config.syncthing.url, "http://10.0.0.2:8384");
        assert_eq!(config.quiescence.idle_window_secs, 30);
        assert_eq!(config.paths.root, PathBuf::from("/data/notes"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_apply_env_rejects_bad_idle_secs() {
        let vars = env(&[(ENV_IDLE_SECS, "ten minutes")]);
        let mut config = DeconflictConfig::default();
        let result = config.apply_env_from(|name| vars.get(name).cloned());
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == ENV_IDLE_SECS
        ));
    }

    #[test]
    fn test_validate_requires_folder_and_key() {
        let mut config = DeconflictConfig::default();
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "syncthing.folder_id"
        ));

        config.syncthing.folder_id = "notes".into();
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "syncthing.api_key_env"
        ));

        config.syncthing.enabled = false;
        config.syncthing.folder_id.clear();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_run_validation_allows_missing_credentials() {
        let mut config = DeconflictConfig::default();
        assert!(config.validate().is_err());
        assert!(config.validate_for_run().is_ok());

        config.syncthing.timeout_secs = 0;
        assert!(matches!(
            config.validate_for_run(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "syncthing.timeout_secs"
        ));

        config.paths.root = PathBuf::new();
        assert!(config.validate_for_run().is_err());
    }

    #[test]
    fn test_default_template_is_valid() {
        let config: DeconflictConfig = toml::from_str(DeconflictConfig::default_template())
            .expect("default template should be valid TOML");
        assert!(config.syncthing.enabled);
        assert_eq!(config.quiescence.idle_window_secs, 600);
    }
}
