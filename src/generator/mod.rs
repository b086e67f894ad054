//! Per-theme generation runs.
//!
//! A run moves through selection, curation, assembly and commit. Dry runs stop
//! before commit and report the would-be playlist.

mod coordinator;
mod run;

pub use coordinator::{CoordinatorSettings, RunCoordinator};
pub use run::{RunError, RunResult, RunState, RunStatus, RunTracker};
