//! Isolated generation engine
//!
//! Wires a `RunCoordinator` over temporary SQLite stores, a manual clock and
//! the scripted collaborators from `stubs`. Each test gets its own engine.

use super::constants::*;
use super::stubs::{FailingCooldownStore, RecordingPublisher};
use chrono::{TimeZone, Utc};
use program_director::catalog::{CatalogStore, MediaItem, MediaKind, SqliteCatalogStore};
use program_director::clock::ManualClock;
use program_director::cooldown::{CooldownLedger, CooldownPolicy};
use program_director::curator::{CuratorSettings, LlmCurator};
use program_director::generator::{CoordinatorSettings, RunCoordinator};
use program_director::llm::LlmProvider;
use program_director::playlist::{DurationTolerance, PlaylistAssembler};
use program_director::retry_policy::RetryPolicy;
use program_director::selector::CandidateSelector;
use program_director::{RunResult, ThemeSpec};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

pub struct TestEngineBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    run_timeout: Duration,
    max_concurrent_themes: usize,
}

impl TestEngineBuilder {
    /// Curate with a model instead of greedy selection.
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    pub fn max_concurrent_themes(mut self, limit: usize) -> Self {
        self.max_concurrent_themes = limit;
        self
    }

    /// # Panics
    ///
    /// Panics if the temporary stores cannot be created.
    pub fn build(self) -> TestEngine {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let catalog = Arc::new(
            SqliteCatalogStore::new(temp_dir.path().join("catalog.db"))
                .expect("Failed to open catalog store"),
        );
        let cooldowns = Arc::new(
            FailingCooldownStore::new(temp_dir.path().join("cooldown.db"))
                .expect("Failed to open cooldown store"),
        );
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 2, 0, 0).unwrap(),
        ));
        let ledger = Arc::new(CooldownLedger::new(
            cooldowns.clone(),
            CooldownPolicy::default(),
            clock.clone(),
        ));
        let publisher = Arc::new(RecordingPublisher::default());

        let curator_settings = CuratorSettings {
            retry: RetryPolicy {
                max_retries: 1,
                initial_backoff_ms: 0,
                max_backoff_ms: 0,
                backoff_multiplier: 2.0,
            },
            ..Default::default()
        };
        let coordinator = Arc::new(RunCoordinator::new(
            CandidateSelector::new(catalog.clone() as Arc<dyn CatalogStore>),
            ledger.clone(),
            LlmCurator::new(self.provider, curator_settings),
            PlaylistAssembler::new(DurationTolerance::default()),
            publisher.clone(),
            CoordinatorSettings {
                run_timeout: self.run_timeout,
                max_concurrent_themes: self.max_concurrent_themes,
            },
        ));

        TestEngine {
            coordinator,
            catalog,
            ledger,
            cooldowns,
            clock,
            publisher,
            _temp_dir: temp_dir,
        }
    }
}

/// Generation engine with direct access to every collaborator.
///
/// Temporary databases are removed when the engine is dropped.
pub struct TestEngine {
    pub coordinator: Arc<RunCoordinator>,
    pub catalog: Arc<SqliteCatalogStore>,
    pub ledger: Arc<CooldownLedger>,
    pub cooldowns: Arc<FailingCooldownStore>,
    pub clock: Arc<ManualClock>,
    pub publisher: Arc<RecordingPublisher>,

    // Keeps the databases alive until drop
    _temp_dir: TempDir,
}

impl TestEngine {
    pub fn builder() -> TestEngineBuilder {
        TestEngineBuilder {
            provider: None,
            run_timeout: Duration::from_secs(30),
            max_concurrent_themes: 2,
        }
    }

    /// Stores `item` and returns it with its assigned id.
    pub fn add_media(&self, item: MediaItem) -> MediaItem {
        let id = self
            .catalog
            .upsert_media(&item)
            .expect("Failed to insert media");
        MediaItem { id, ..item }
    }

    /// Movies only, rated 7.0 or better, on `MOVIE_CHANNEL`.
    pub fn movie_theme(&self, duration_minutes: u32) -> ThemeSpec {
        let mut theme = ThemeSpec::new(MOVIE_THEME, MOVIE_CHANNEL);
        theme.media_kinds = vec![MediaKind::Movie];
        theme.min_rating = 7.0;
        theme.duration_minutes = duration_minutes;
        theme
    }

    /// Series only, on `SERIES_CHANNEL`.
    pub fn series_theme(&self, duration_minutes: u32) -> ThemeSpec {
        let mut theme = ThemeSpec::new(SERIES_THEME, SERIES_CHANNEL);
        theme.media_kinds = vec![MediaKind::Series];
        theme.duration_minutes = duration_minutes;
        theme
    }

    pub async fn run(&self, theme: &ThemeSpec, dry_run: bool) -> RunResult {
        self.coordinator
            .run(theme, dry_run, CancellationToken::new())
            .await
    }
}
