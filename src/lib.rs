//! Program Director library
//!
//! Themed channel programming: candidate selection, model-assisted curation, playlist
//! assembly and cooldown bookkeeping, plus the scheduler and HTTP surface around them.

pub mod catalog;
pub mod clock;
pub mod config;
pub mod cooldown;
pub mod curator;
pub mod engine;
pub mod generator;
pub mod llm;
pub mod playlist;
pub mod publisher;
pub mod retry_policy;
pub mod scheduler;
pub mod selector;
pub mod server;
pub mod sqlite_persistence;
pub mod theme;
pub mod trakt;

// Re-export commonly used types for convenience
pub use engine::Engine;
pub use generator::{RunCoordinator, RunResult, RunStatus};
pub use server::{run_server, RequestsLoggingLevel};
pub use theme::ThemeSpec;
