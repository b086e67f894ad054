use super::run::{RunError, RunResult, RunState, RunStatus, RunTracker};
use crate::config::GenerationSettings;
use crate::cooldown::CooldownLedger;
use crate::curator::LlmCurator;
use crate::playlist::{Playlist, PlaylistAssembler};
use crate::publisher::ChannelPublisher;
use crate::selector::CandidateSelector;
use crate::server::metrics;
use crate::theme::ThemeSpec;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Deadline applied to every run, regardless of how it was triggered.
    pub run_timeout: Duration,
    pub max_concurrent_themes: usize,
}

impl CoordinatorSettings {
    pub fn from_config(generation: &GenerationSettings) -> Self {
        Self {
            run_timeout: generation.run_timeout(),
            max_concurrent_themes: generation.max_concurrent_themes,
        }
    }
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self::from_config(&GenerationSettings::default())
    }
}

/// Sequences selection, curation, assembly and commit for each theme.
pub struct RunCoordinator {
    selector: CandidateSelector,
    ledger: Arc<CooldownLedger>,
    curator: LlmCurator,
    assembler: PlaylistAssembler,
    publisher: Arc<dyn ChannelPublisher>,
    settings: CoordinatorSettings,
    running: Mutex<HashSet<String>>,
}

/// Removes a theme from the running set when the run ends, however it ends.
struct RunningGuard<'a> {
    running: &'a Mutex<HashSet<String>>,
    theme: String,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.running.lock().unwrap().remove(&self.theme);
    }
}

struct Committed {
    playlist: Playlist,
    warning: Option<String>,
}

impl RunCoordinator {
    pub fn new(
        selector: CandidateSelector,
        ledger: Arc<CooldownLedger>,
        curator: LlmCurator,
        assembler: PlaylistAssembler,
        publisher: Arc<dyn ChannelPublisher>,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            selector,
            ledger,
            curator,
            assembler,
            publisher,
            settings,
            running: Mutex::new(HashSet::new()),
        }
    }

    pub fn ledger(&self) -> &Arc<CooldownLedger> {
        &self.ledger
    }

    pub fn is_running(&self, theme_name: &str) -> bool {
        self.running.lock().unwrap().contains(theme_name)
    }

    /// Runs one theme to a terminal state. Never returns an error: every failure
    /// is folded into the result.
    ///
    /// The run is bounded by the configured deadline and by `cancel`. Both drop the
    /// in-flight work at its next await point, so nothing is written after the
    /// result is returned.
    pub async fn run(&self, theme: &ThemeSpec, dry_run: bool, cancel: CancellationToken) -> RunResult {
        let started_at = self.ledger.clock().now();
        let started = Instant::now();
        let run_id = Uuid::new_v4().to_string();

        let _guard = match self.claim(&theme.name) {
            Ok(guard) => guard,
            Err(e) => {
                warn!(theme = %theme.name, "Skipping run: {}", e);
                return RunResult::not_started(
                    &theme.name,
                    &theme.channel_id,
                    dry_run,
                    started_at,
                    &e,
                );
            }
        };

        info!(
            run_id = %run_id,
            theme = %theme.name,
            channel = %theme.channel_id,
            dry_run,
            "Starting generation run"
        );

        let mut tracker = RunTracker::new(&theme.name);
        let timeout = self.settings.run_timeout;
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RunError::Cancelled),
            result = tokio::time::timeout(timeout, self.execute(theme, dry_run, &mut tracker)) => {
                result.unwrap_or(Err(RunError::Timeout(timeout)))
            }
        };

        let last_stage = tracker.state();
        let (status, error, warning, playlist) = match outcome {
            Ok(Committed { playlist, warning }) => {
                let status = if warning.is_some() {
                    RunStatus::CommittedWithWarning
                } else {
                    RunStatus::Succeeded
                };
                (status, None, warning, Some(playlist))
            }
            Err(e) => (e.status(), Some(e.to_string()), None, tracker.playlist.take()),
        };
        tracker.finish(status);

        let elapsed = started.elapsed();
        metrics::record_generation_run(status.as_str(), elapsed);

        let result = RunResult {
            run_id,
            theme_name: theme.name.clone(),
            channel_id: theme.channel_id.clone(),
            status,
            generated: status.is_generated(),
            dry_run,
            item_count: playlist.as_ref().map(|p| p.len()).unwrap_or(0),
            duration_minutes: playlist
                .as_ref()
                .map(|p| p.total_duration_minutes)
                .unwrap_or(0),
            total_score: playlist.as_ref().map(|p| p.total_score).unwrap_or(0.0),
            elapsed_ms: elapsed.as_millis() as u64,
            started_at,
            last_stage,
            candidate_count: tracker.candidates,
            curation: tracker.strategy,
            error,
            warning,
            playlist,
        };

        match result.status {
            RunStatus::Succeeded => info!(
                run_id = %result.run_id,
                theme = %result.theme_name,
                items = result.item_count,
                duration = result.duration_minutes,
                elapsed_ms = result.elapsed_ms,
                dry_run,
                "Generation run succeeded"
            ),
            RunStatus::CommittedWithWarning => warn!(
                run_id = %result.run_id,
                theme = %result.theme_name,
                items = result.item_count,
                "Programming published but bookkeeping incomplete: {}",
                result.warning.as_deref().unwrap_or_default()
            ),
            RunStatus::Skipped => info!(
                run_id = %result.run_id,
                theme = %result.theme_name,
                stage = last_stage.as_str(),
                "Generation run skipped: {}",
                result.error.as_deref().unwrap_or_default()
            ),
            RunStatus::Failed => error!(
                run_id = %result.run_id,
                theme = %result.theme_name,
                stage = last_stage.as_str(),
                "Generation run failed: {}",
                result.error.as_deref().unwrap_or_default()
            ),
        }

        result
    }

    /// Runs every theme with bounded concurrency and returns one result per
    /// theme, in input order. Each run is its own task, so a panic in one theme
    /// is reported as that theme's failure.
    pub async fn generate_all(
        self: &Arc<Self>,
        themes: &[ThemeSpec],
        dry_run: bool,
        cancel: CancellationToken,
    ) -> Vec<RunResult> {
        let limit = self.settings.max_concurrent_themes.max(1);
        info!(themes = themes.len(), limit, dry_run, "Generating all themes");

        let results: Vec<RunResult> = stream::iter(themes.iter().cloned())
            .map(|theme| {
                let coordinator = Arc::clone(self);
                let token = cancel.child_token();
                async move {
                    let name = theme.name.clone();
                    let channel = theme.channel_id.clone();
                    let handle =
                        tokio::spawn(async move { coordinator.run(&theme, dry_run, token).await });
                    match handle.await {
                        Ok(result) => result,
                        Err(e) => {
                            error!(theme = %name, "Run task aborted: {}", e);
                            let err = RunError::Aborted(e.to_string());
                            metrics::record_generation_run(err.status().as_str(), Duration::ZERO);
                            RunResult::not_started(
                                &name,
                                &channel,
                                dry_run,
                                chrono::Utc::now(),
                                &err,
                            )
                        }
                    }
                }
            })
            .buffered(limit)
            .collect()
            .await;

        if let Ok(active) = self.ledger.count_active() {
            metrics::set_active_cooldowns(active);
        }
        results
    }

    fn claim(&self, theme_name: &str) -> Result<RunningGuard<'_>, RunError> {
        let mut running = self.running.lock().unwrap();
        if !running.insert(theme_name.to_string()) {
            return Err(RunError::AlreadyRunning(theme_name.to_string()));
        }
        Ok(RunningGuard {
            running: &self.running,
            theme: theme_name.to_string(),
        })
    }

    async fn execute(
        &self,
        theme: &ThemeSpec,
        dry_run: bool,
        tracker: &mut RunTracker,
    ) -> Result<Committed, RunError> {
        tracker.advance(RunState::Selecting);
        let excluded = self
            .ledger
            .active_exclusions()
            .map_err(RunError::Storage)?;
        let candidates = self.selector.select_candidates(theme, &excluded)?;
        tracker.candidates = candidates.len();

        tracker.advance(RunState::Curating);
        let curation = self.curator.curate(theme, &candidates).await?;
        tracker.strategy = Some(curation.strategy);

        tracker.advance(RunState::Assembling);
        let playlist = self
            .assembler
            .assemble(theme, curation.items, self.ledger.clock().now())?;

        tracker.advance(RunState::Committing);
        if dry_run {
            info!(
                theme = %theme.name,
                items = playlist.len(),
                "Dry run, skipping publish and play recording"
            );
            return Ok(Committed {
                playlist,
                warning: None,
            });
        }

        // A playlist that fails to publish must not leave cooldowns behind.
        tracker.playlist = Some(playlist.clone());
        self.publisher
            .set_programming(&theme.channel_id, &playlist)
            .await?;

        let mut failed = Vec::new();
        for item in &playlist.items {
            if let Err(e) = self
                .ledger
                .record_play(&item.media, &theme.channel_id, &theme.name)
            {
                error!(
                    theme = %theme.name,
                    media_id = item.media.id,
                    "Failed to record play: {:#}", e
                );
                failed.push(item.media.title.clone());
            }
        }

        let warning = (!failed.is_empty()).then(|| {
            format!(
                "{} of {} plays not recorded ({})",
                failed.len(),
                playlist.len(),
                failed.join(", ")
            )
        });
        Ok(Committed { playlist, warning })
    }
}
