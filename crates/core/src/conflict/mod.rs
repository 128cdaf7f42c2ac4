//! Conflict detection, backup lookup, and union merging.
//!
//! The conflict subsystem is responsible for:
//! 1. **Detection** -- finding Syncthing conflict copies in the working tree.
//! 2. **Backup lookup** -- locating the pre-conflict snapshot in `.stversions`.
//! 3. **Merging** -- three-way union merges that never leave markers behind.

pub mod detector;
pub mod merger;
pub mod resolver;
pub mod tool;

pub use detector::{parse_conflict_path, ConflictScanner};
pub use merger::{MergeResult, Merger, UnionRegion};
pub use resolver::BackupResolver;
pub use tool::{merge_tool_for, GitMergeFile, MergeTool, UnionMerge};
