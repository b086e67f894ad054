use super::schedule::{Schedule, ScheduleError};
use crate::generator::{RunCoordinator, RunResult};
use crate::theme::ThemeSpec;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};

/// A configured theme together with its effective trigger schedule.
#[derive(Debug, Clone)]
pub struct ScheduledTheme {
    pub spec: ThemeSpec,
    pub schedule: Schedule,
}

impl ScheduledTheme {
    /// Uses the theme's own expression, or `default_schedule` when it has none.
    pub fn new(spec: ThemeSpec, default_schedule: &str) -> Result<Self, ScheduleError> {
        let schedule = Schedule::parse(spec.schedule.as_deref().unwrap_or(default_schedule))?;
        Ok(Self { spec, schedule })
    }
}

/// Theme summary for API and CLI listings.
#[derive(Debug, Clone, Serialize)]
pub struct ThemeInfo {
    pub name: String,
    pub description: String,
    pub channel_id: String,
    pub schedule: String,
    pub duration_minutes: u32,
    pub is_running: bool,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_result: Option<RunResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NextRun {
    pub theme_name: String,
    pub next_run_at: DateTime<Utc>,
}

/// Command sent to the scheduler.
pub enum SchedulerCommand {
    TriggerTheme {
        theme: String,
        dry_run: bool,
        response: oneshot::Sender<Result<RunResult, ScheduleError>>,
    },
    TriggerAll {
        dry_run: bool,
        response: oneshot::Sender<Vec<RunResult>>,
    },
}

/// Shared state between scheduler and handle.
pub struct SharedScheduleState {
    /// Static theme list, in configuration order
    pub themes: Vec<ScheduledTheme>,
    /// Next fire time per theme, absent when the schedule never fires or
    /// scheduling is disabled
    pub next_runs: HashMap<String, DateTime<Utc>>,
    /// Most recent result per theme, scheduled or manual
    pub last_results: HashMap<String, RunResult>,
}

impl SharedScheduleState {
    pub fn record_results(&mut self, results: &[RunResult]) {
        for result in results {
            self.last_results
                .insert(result.theme_name.clone(), result.clone());
        }
    }
}

/// Handle to interact with the theme scheduler from HTTP handlers.
#[derive(Clone)]
pub struct SchedulerHandle {
    command_tx: mpsc::Sender<SchedulerCommand>,
    shared_state: Arc<RwLock<SharedScheduleState>>,
    coordinator: Arc<RunCoordinator>,
}

impl SchedulerHandle {
    pub fn new(
        command_tx: mpsc::Sender<SchedulerCommand>,
        shared_state: Arc<RwLock<SharedScheduleState>>,
        coordinator: Arc<RunCoordinator>,
    ) -> Self {
        Self {
            command_tx,
            shared_state,
            coordinator,
        }
    }

    /// Runs one theme now and waits for its result. Goes through the same
    /// isolation and deadline as scheduled runs.
    pub async fn trigger_theme(
        &self,
        theme: &str,
        dry_run: bool,
    ) -> Result<RunResult, ScheduleError> {
        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(SchedulerCommand::TriggerTheme {
                theme: theme.to_string(),
                dry_run,
                response: response_tx,
            })
            .await
            .map_err(|_| ScheduleError::Stopped)?;

        response_rx.await.map_err(|_| ScheduleError::Stopped)?
    }

    /// Runs every configured theme now.
    pub async fn trigger_all(&self, dry_run: bool) -> Result<Vec<RunResult>, ScheduleError> {
        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(SchedulerCommand::TriggerAll {
                dry_run,
                response: response_tx,
            })
            .await
            .map_err(|_| ScheduleError::Stopped)?;

        response_rx.await.map_err(|_| ScheduleError::Stopped)
    }

    pub async fn list_themes(&self) -> Vec<ThemeInfo> {
        let state = self.shared_state.read().await;
        state
            .themes
            .iter()
            .map(|theme| ThemeInfo {
                name: theme.spec.name.clone(),
                description: theme.spec.description.clone(),
                channel_id: theme.spec.channel_id.clone(),
                schedule: theme.schedule.to_string(),
                duration_minutes: theme.spec.duration_minutes,
                is_running: self.coordinator.is_running(&theme.spec.name),
                next_run_at: state.next_runs.get(&theme.spec.name).copied(),
                last_result: state.last_results.get(&theme.spec.name).cloned(),
            })
            .collect()
    }

    /// Last result per theme, sorted by theme name.
    pub async fn last_results(&self) -> Vec<RunResult> {
        let state = self.shared_state.read().await;
        let mut results: Vec<RunResult> = state.last_results.values().cloned().collect();
        results.sort_by(|a, b| a.theme_name.cmp(&b.theme_name));
        results
    }

    /// Upcoming fire time per theme, soonest first.
    pub async fn next_runs(&self) -> Vec<NextRun> {
        let state = self.shared_state.read().await;
        let mut runs: Vec<NextRun> = state
            .next_runs
            .iter()
            .map(|(name, at)| NextRun {
                theme_name: name.clone(),
                next_run_at: *at,
            })
            .collect();
        runs.sort_by(|a, b| {
            a.next_run_at
                .cmp(&b.next_run_at)
                .then_with(|| a.theme_name.cmp(&b.theme_name))
        });
        runs
    }
}
