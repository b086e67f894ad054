//! Common test infrastructure
//!
//! This module provides everything the integration tests need: an isolated
//! generation engine over temporary SQLite stores, scripted collaborators, and
//! an HTTP server wrapping it. Tests should only import from this module, not
//! from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{movie, TestEngine, MOVIE_CHANNEL};
//! use program_director::RunStatus;
//!
//! #[tokio::test]
//! async fn test_generate_movie_night() {
//!     let engine = TestEngine::builder().build();
//!     engine.add_media(movie("Alien", 8.5, 117));
//!
//!     let result = engine.run(&engine.movie_theme(117), false).await;
//!     assert_eq!(result.status, RunStatus::Succeeded);
//! }
//! ```

mod constants;
mod engine;
mod fixtures;
mod server;
mod stubs;

// Public API - this is what tests import
pub use constants::*;
pub use engine::{TestEngine, TestEngineBuilder};
pub use fixtures::{anime, movie, series};
pub use server::TestServer;
pub use stubs::{FailingCooldownStore, RecordingPublisher, ScriptedProvider, StalledProvider};
