//! Quiescence checks: is it safe to rewrite files right now?
//!
//! Three independent signals must all be quiet before a pass touches the
//! tree: no editor process, Syncthing idle for the folder, and no file
//! modified within the idle window.

pub mod idle;
pub mod process;
pub mod syncthing;

pub use idle::find_recent_change;
pub use process::{Pgrep, ProcessChecker};
pub use syncthing::{SyncMonitor, SyncthingClient};
