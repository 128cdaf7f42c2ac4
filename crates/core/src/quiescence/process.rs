//! Foreground editor detection.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

/// Answers whether a process with an exact name is running.
#[async_trait]
pub trait ProcessChecker: Send + Sync {
    async fn is_running(&self, name: &str) -> bool;
}

/// Process lookup through `pgrep -x <name>`.
///
/// Only the exit status is consulted. If `pgrep` cannot be spawned the
/// process is reported as not running.
#[derive(Debug, Clone)]
pub struct Pgrep {
    binary: String,
}

impl Default for Pgrep {
    fn default() -> Self {
        Self {
            binary: "pgrep".into(),
        }
    }
}

impl Pgrep {
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl ProcessChecker for Pgrep {
    async fn is_running(&self, name: &str) -> bool {
        let status = Command::new(&self.binary)
            .arg("-x")
            .arg(name)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) => {
                debug!(name, found = status.success(), "process lookup finished");
                status.success()
            }
            Err(e) => {
                warn!(name, binary = %self.binary, error = %e, "process lookup failed");
                false
            }
        }
    }
}
