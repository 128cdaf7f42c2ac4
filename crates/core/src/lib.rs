//! Deconflicter core library.
//!
//! This crate provides the components of a scheduled Syncthing conflict
//! cleanup pass: configuration, quiescence checks, conflict detection,
//! backup lookup, three-way union merging, the run log, and the engine that
//! sequences them.

pub mod config;
pub mod conflict;
pub mod engine;
pub mod errors;
pub mod models;
pub mod quiescence;
pub mod runlog;

// Re-exports for convenience.
pub use config::DeconflictConfig;
pub use engine::{DeconflictEngine, DefaultEngine};
pub use models::{ConflictOutcome, RunReport, RunSummary};
pub use runlog::RunLog;
