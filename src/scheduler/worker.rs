use super::handle::{ScheduledTheme, SchedulerCommand, SchedulerHandle, SharedScheduleState};
use super::schedule::ScheduleError;
use crate::clock::Clock;
use crate::config::SchedulerSettings;
use crate::generator::{RunCoordinator, RunResult};
use crate::theme::ThemeSpec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Upper bound on one sleep of the loop, so clock jumps are noticed.
const CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Fires theme runs on their cron schedules and serves manual triggers.
pub struct ThemeScheduler {
    /// Shared state accessible by SchedulerHandle
    shared_state: Arc<RwLock<SharedScheduleState>>,

    /// Batches in flight (not shared, managed by scheduler loop)
    running_handles: Vec<JoinHandle<()>>,

    coordinator: Arc<RunCoordinator>,
    clock: Arc<dyn Clock>,
    enabled: bool,
    shutdown_grace: Duration,

    /// Receiver for commands from SchedulerHandle
    command_receiver: mpsc::Receiver<SchedulerCommand>,

    /// Token to signal scheduler shutdown. Every run's token is a child of it.
    shutdown_token: CancellationToken,
}

impl ThemeScheduler {
    fn new(
        coordinator: Arc<RunCoordinator>,
        settings: &SchedulerSettings,
        command_receiver: mpsc::Receiver<SchedulerCommand>,
        shutdown_token: CancellationToken,
        shared_state: Arc<RwLock<SharedScheduleState>>,
    ) -> Self {
        let clock = Arc::clone(coordinator.ledger().clock());
        Self {
            shared_state,
            running_handles: Vec::new(),
            coordinator,
            clock,
            enabled: settings.enabled,
            shutdown_grace: Duration::from_secs(settings.shutdown_grace_secs),
            command_receiver,
            shutdown_token,
        }
    }

    /// Main scheduler loop. Returns after shutdown completes.
    pub async fn run(&mut self) {
        let theme_count = self.shared_state.read().await.themes.len();
        info!(
            themes = theme_count,
            enabled = self.enabled,
            "Starting theme scheduler"
        );

        loop {
            self.cleanup_finished();

            let sleep_duration = self.time_until_next_fire().await;
            debug!("Scheduler sleeping for {:?}", sleep_duration);

            tokio::select! {
                _ = tokio::time::sleep(sleep_duration) => {
                    self.run_due_themes().await;
                }
                Some(cmd) = self.command_receiver.recv() => {
                    self.handle_command(cmd).await;
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Scheduler received shutdown signal");
                    self.shutdown().await;
                    break;
                }
            }
        }

        info!("Theme scheduler stopped");
    }

    async fn handle_command(&mut self, cmd: SchedulerCommand) {
        match cmd {
            SchedulerCommand::TriggerTheme {
                theme,
                dry_run,
                response,
            } => {
                let spec = {
                    let state = self.shared_state.read().await;
                    state
                        .themes
                        .iter()
                        .find(|t| t.spec.name == theme)
                        .map(|t| t.spec.clone())
                };
                match spec {
                    Some(spec) => {
                        info!(theme = %spec.name, dry_run, "Manual run requested");
                        let name = spec.name.clone();
                        self.spawn_batch(vec![spec], dry_run, move |mut results| {
                            let result = results.pop().ok_or(ScheduleError::UnknownTheme(name));
                            let _ = response.send(result);
                        });
                    }
                    None => {
                        let _ = response.send(Err(ScheduleError::UnknownTheme(theme)));
                    }
                }
            }
            SchedulerCommand::TriggerAll { dry_run, response } => {
                let themes: Vec<ThemeSpec> = {
                    let state = self.shared_state.read().await;
                    state.themes.iter().map(|t| t.spec.clone()).collect()
                };
                info!(themes = themes.len(), dry_run, "Manual run of all themes requested");
                self.spawn_batch(themes, dry_run, move |results| {
                    let _ = response.send(results);
                });
            }
        }
    }

    async fn time_until_next_fire(&self) -> Duration {
        let state = self.shared_state.read().await;
        let now = self.clock.now();
        let mut min_duration = CHECK_INTERVAL;

        for next_run in state.next_runs.values() {
            if *next_run <= now {
                return Duration::ZERO;
            }
            let duration = (*next_run - now).to_std().unwrap_or(Duration::from_secs(1));
            if duration < min_duration {
                min_duration = duration;
            }
        }
        min_duration
    }

    /// Starts one batch with every theme whose fire time has passed.
    async fn run_due_themes(&mut self) {
        if !self.enabled {
            return;
        }
        let now = self.clock.now();
        let mut due = Vec::new();

        {
            let mut guard = self.shared_state.write().await;
            let state = &mut *guard;
            for theme in &state.themes {
                let name = &theme.spec.name;
                match state.next_runs.get(name) {
                    Some(next_run) if *next_run <= now => {}
                    _ => continue,
                }

                // Advance even when the run is skipped, so a long run does not
                // cause a tight retry loop.
                match theme.schedule.next_after(now) {
                    Some(next) => {
                        state.next_runs.insert(name.clone(), next);
                    }
                    None => {
                        state.next_runs.remove(name);
                    }
                }

                if self.coordinator.is_running(name) {
                    warn!(theme = %name, "Skipping scheduled run, previous run still in progress");
                    continue;
                }
                due.push(theme.spec.clone());
            }
        }

        if due.is_empty() {
            return;
        }
        info!(themes = due.len(), "Starting scheduled generation");
        self.spawn_batch(due, false, |_| {});
    }

    /// Hands `themes` to the coordinator in its own task and records the results.
    fn spawn_batch<F>(&mut self, themes: Vec<ThemeSpec>, dry_run: bool, on_done: F)
    where
        F: FnOnce(Vec<RunResult>) + Send + 'static,
    {
        let coordinator = Arc::clone(&self.coordinator);
        let shared_state = Arc::clone(&self.shared_state);
        let cancel = self.shutdown_token.child_token();

        let handle = tokio::spawn(async move {
            let results = coordinator.generate_all(&themes, dry_run, cancel).await;
            shared_state.write().await.record_results(&results);
            on_done(results);
        });
        self.running_handles.push(handle);
    }

    fn cleanup_finished(&mut self) {
        self.running_handles.retain(|handle| !handle.is_finished());
    }

    /// Waits for cancelled runs to settle, then stops accepting commands.
    async fn shutdown(&mut self) {
        info!("Shutting down scheduler...");

        // Run tokens are children of the shutdown token and are already cancelled.
        let handles = std::mem::take(&mut self.running_handles);
        if !handles.is_empty() {
            info!(batches = handles.len(), "Waiting for in-flight runs to finish");
        }
        if tokio::time::timeout(self.shutdown_grace, futures::future::join_all(handles))
            .await
            .is_err()
        {
            warn!(
                grace_secs = self.shutdown_grace.as_secs(),
                "In-flight runs did not finish within the shutdown grace period"
            );
        }

        // Pending requests are dropped, which their callers see as Stopped.
        self.command_receiver.close();
        while self.command_receiver.try_recv().is_ok() {}

        info!("Scheduler shutdown complete");
    }
}

/// Create a scheduler and its handle.
pub fn create_scheduler(
    coordinator: Arc<RunCoordinator>,
    themes: &[ThemeSpec],
    settings: &SchedulerSettings,
    shutdown_token: CancellationToken,
) -> Result<(ThemeScheduler, SchedulerHandle), ScheduleError> {
    let scheduled = themes
        .iter()
        .map(|theme| ScheduledTheme::new(theme.clone(), &settings.default_schedule))
        .collect::<Result<Vec<_>, _>>()?;

    let now = coordinator.ledger().clock().now();
    let mut next_runs = HashMap::new();
    if settings.enabled {
        for theme in &scheduled {
            match theme.schedule.next_after(now) {
                Some(next) => {
                    info!(theme = %theme.spec.name, schedule = %theme.schedule, next_run = %next, "Scheduled theme");
                    next_runs.insert(theme.spec.name.clone(), next);
                }
                None => warn!(
                    theme = %theme.spec.name,
                    schedule = %theme.schedule,
                    "Schedule never fires"
                ),
            }
        }
    }

    let (command_tx, command_rx) = mpsc::channel(100);
    let shared_state = Arc::new(RwLock::new(SharedScheduleState {
        themes: scheduled,
        next_runs,
        last_results: HashMap::new(),
    }));

    let scheduler = ThemeScheduler::new(
        Arc::clone(&coordinator),
        settings,
        command_rx,
        shutdown_token,
        Arc::clone(&shared_state),
    );
    let handle = SchedulerHandle::new(command_tx, shared_state, coordinator);

    Ok((scheduler, handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SqliteCatalogStore;
    use crate::clock::ManualClock;
    use crate::cooldown::{CooldownLedger, CooldownPolicy, SqliteCooldownStore};
    use crate::curator::{CuratorSettings, LlmCurator};
    use crate::generator::{CoordinatorSettings, RunStatus};
    use crate::playlist::{DurationTolerance, Playlist, PlaylistAssembler};
    use crate::publisher::{ChannelPublisher, PublishError};
    use crate::selector::CandidateSelector;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    struct NullPublisher;

    #[async_trait]
    impl ChannelPublisher for NullPublisher {
        fn name(&self) -> &str {
            "null"
        }

        async fn set_programming(&self, _: &str, _: &Playlist) -> Result<(), PublishError> {
            Ok(())
        }

        async fn health_check(&self) -> Result<(), PublishError> {
            Ok(())
        }
    }

    /// Coordinator over an empty catalog: every run ends Skipped.
    fn create_test_coordinator(clock: Arc<ManualClock>) -> (Arc<RunCoordinator>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let catalog = SqliteCatalogStore::new(temp_dir.path().join("catalog.db")).unwrap();
        let cooldowns = SqliteCooldownStore::new(temp_dir.path().join("cooldown.db")).unwrap();
        let ledger = CooldownLedger::new(Arc::new(cooldowns), CooldownPolicy::default(), clock);
        let coordinator = RunCoordinator::new(
            CandidateSelector::new(Arc::new(catalog)),
            Arc::new(ledger),
            LlmCurator::new(None, CuratorSettings::default()),
            PlaylistAssembler::new(DurationTolerance::default()),
            Arc::new(NullPublisher),
            CoordinatorSettings::default(),
        );
        (Arc::new(coordinator), temp_dir)
    }

    fn theme(name: &str, schedule: Option<&str>) -> ThemeSpec {
        let mut theme = ThemeSpec::new(name, "ch-1");
        theme.schedule = schedule.map(str::to_string);
        theme
    }

    #[tokio::test]
    async fn test_next_runs_use_theme_or_default_schedule() {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap()));
        let (coordinator, _dir) = create_test_coordinator(clock);
        let themes = vec![theme("late", Some("30 23 * * *")), theme("default", None)];

        let (_scheduler, handle) = create_scheduler(
            coordinator,
            &themes,
            &SchedulerSettings::default(),
            CancellationToken::new(),
        )
        .unwrap();

        let next = handle.next_runs().await;
        assert_eq!(next.len(), 2);
        assert_eq!(next[0].theme_name, "default");
        assert_eq!(next[0].next_run_at, Utc.with_ymd_and_hms(2024, 1, 1, 2, 0, 0).unwrap());
        assert_eq!(next[1].next_run_at, Utc.with_ymd_and_hms(2024, 1, 1, 23, 30, 0).unwrap());

        let listed = handle.list_themes().await;
        assert_eq!(listed[0].name, "late");
        assert_eq!(listed[0].schedule, "30 23 * * *");
        assert!(!listed[0].is_running);
    }

    #[tokio::test]
    async fn test_invalid_theme_schedule_rejected() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let (coordinator, _dir) = create_test_coordinator(clock);
        let result = create_scheduler(
            coordinator,
            &[theme("broken", Some("every day"))],
            &SchedulerSettings::default(),
            CancellationToken::new(),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_due_theme_runs_and_reschedules() {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap()));
        let (coordinator, _dir) = create_test_coordinator(clock.clone());
        let (mut scheduler, handle) = create_scheduler(
            coordinator,
            &[theme("nightly", None), theme("evening", Some("0 20 * * *"))],
            &SchedulerSettings::default(),
            CancellationToken::new(),
        )
        .unwrap();

        scheduler.run_due_themes().await;
        assert!(scheduler.running_handles.is_empty());

        clock.set(Utc.with_ymd_and_hms(2024, 1, 1, 2, 0, 30).unwrap());
        assert_eq!(scheduler.time_until_next_fire().await, Duration::ZERO);
        scheduler.run_due_themes().await;
        assert_eq!(scheduler.running_handles.len(), 1);
        for handle in std::mem::take(&mut scheduler.running_handles) {
            handle.await.unwrap();
        }

        let results = handle.last_results().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].theme_name, "nightly");
        assert_eq!(results[0].status, RunStatus::Skipped);
        assert!(!results[0].dry_run);

        let next = handle.next_runs().await;
        let nightly = next.iter().find(|n| n.theme_name == "nightly").unwrap();
        assert_eq!(nightly.next_run_at, Utc.with_ymd_and_hms(2024, 1, 2, 2, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_disabled_scheduler_never_fires() {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap()));
        let (coordinator, _dir) = create_test_coordinator(clock.clone());
        let settings = SchedulerSettings {
            enabled: false,
            ..Default::default()
        };
        let (mut scheduler, handle) =
            create_scheduler(coordinator, &[theme("nightly", None)], &settings, CancellationToken::new())
                .unwrap();

        assert!(handle.next_runs().await.is_empty());
        clock.set(Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap());
        scheduler.run_due_themes().await;
        assert!(scheduler.running_handles.is_empty());
    }

    #[tokio::test]
    async fn test_manual_triggers_and_shutdown() {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap()));
        let (coordinator, _dir) = create_test_coordinator(clock);
        let shutdown = CancellationToken::new();
        let (mut scheduler, handle) = create_scheduler(
            coordinator,
            &[theme("a", None), theme("b", None)],
            &SchedulerSettings::default(),
            shutdown.clone(),
        )
        .unwrap();
        let task = tokio::spawn(async move { scheduler.run().await });

        let err = handle.trigger_theme("missing", true).await.unwrap_err();
        assert_eq!(err, ScheduleError::UnknownTheme("missing".to_string()));

        let result = handle.trigger_theme("a", true).await.unwrap();
        assert_eq!(result.theme_name, "a");
        assert!(result.dry_run);

        let results = handle.trigger_all(true).await.unwrap();
        let names: Vec<_> = results.iter().map(|r| r.theme_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(handle.last_results().await.len(), 2);

        shutdown.cancel();
        task.await.unwrap();
        assert_eq!(
            handle.trigger_theme("a", true).await.unwrap_err(),
            ScheduleError::Stopped
        );
    }
}
