//! Error types for the deconflicter core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them for callers that want a single
//! error type. Most of these never escape a run: the engine converts them into
//! skip/failure outcomes at the boundary where they occur.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Status(#[from] StatusError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    RunLog(#[from] RunLogError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Sync-engine status errors
// ---------------------------------------------------------------------------

/// Errors from querying the Syncthing REST status endpoint.
#[derive(Debug, Error)]
pub enum StatusError {
    /// Transport error (connection refused, timeout, TLS).
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status code.
    #[error("status endpoint returned HTTP {status}: {body}")]
    ApiError { status: u16, body: String },

    /// The body was not the expected JSON document.
    #[error("malformed status response: {0}")]
    ParseError(String),

    /// Folder ID or API key missing, so no request was sent.
    #[error("Syncthing is not configured: {0}")]
    NotConfigured(String),
}

// ---------------------------------------------------------------------------
// Merge errors
// ---------------------------------------------------------------------------

/// Errors from a three-way merge attempt.
#[derive(Debug, Error)]
pub enum MergeError {
    /// The external merge binary was not found on `$PATH`.
    #[error("merge tool binary not found: {0}")]
    BinaryNotFound(String),

    /// The merge tool exited with a non-zero status.
    #[error("merge tool failed (exit {exit_code}): {stderr}")]
    CommandFailed { exit_code: i32, stderr: String },

    /// One of the inputs is not valid UTF-8 text.
    #[error("'{path}' is not a UTF-8 text file")]
    NotText { path: String },

    /// Generic I/O wrapper.
    #[error("merge I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Run log errors
// ---------------------------------------------------------------------------

/// Errors from appending to the run log.
#[derive(Debug, Error)]
pub enum RunLogError {
    #[error("failed to write run log '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
