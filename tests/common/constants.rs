//! Shared constants for integration tests
//!
//! When fixture channels or timing budgets change, update only this file.

// ============================================================================
// Channels and Themes
// ============================================================================

/// Tunarr channel fed by movie themes
pub const MOVIE_CHANNEL: &str = "ch-movies";

/// Tunarr channel fed by series themes
pub const SERIES_CHANNEL: &str = "ch-series";

/// Theme name used by `TestEngine::movie_theme`
pub const MOVIE_THEME: &str = "Movie Night";

/// Theme name used by `TestEngine::series_theme`
pub const SERIES_THEME: &str = "Binge Block";

// ============================================================================
// Timing
// ============================================================================

/// Maximum time to wait for the test server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Interval between readiness checks (milliseconds)
pub const SERVER_READY_POLL_MS: u64 = 20;

/// Default HTTP request timeout (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Run deadline used by tests that exercise the timeout path (milliseconds)
pub const SHORT_RUN_TIMEOUT_MS: u64 = 200;
