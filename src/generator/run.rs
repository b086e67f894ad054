use crate::curator::{CurationError, CurationStrategy};
use crate::playlist::{AssemblyError, Playlist};
use crate::publisher::PublishError;
use crate::selector::SelectionError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Lifecycle of a single theme run. States only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Pending,
    Selecting,
    Curating,
    Assembling,
    Committing,
    Succeeded,
    CommittedWithWarning,
    Skipped,
    Failed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Pending => "pending",
            RunState::Selecting => "selecting",
            RunState::Curating => "curating",
            RunState::Assembling => "assembling",
            RunState::Committing => "committing",
            RunState::Succeeded => "succeeded",
            RunState::CommittedWithWarning => "committed_with_warning",
            RunState::Skipped => "skipped",
            RunState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Succeeded
                | RunState::CommittedWithWarning
                | RunState::Skipped
                | RunState::Failed
        )
    }

    pub fn can_transition_to(&self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (Pending, Selecting)
            | (Selecting, Curating)
            | (Curating, Assembling)
            | (Assembling, Committing)
            | (Committing, Succeeded)
            | (Committing, CommittedWithWarning) => true,
            (Pending | Selecting | Curating | Assembling | Committing, Skipped | Failed) => true,
            _ => false,
        }
    }
}

/// Terminal outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    /// Published, but cooldown/history bookkeeping failed for some items.
    CommittedWithWarning,
    Skipped,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Succeeded => "succeeded",
            RunStatus::CommittedWithWarning => "committed_with_warning",
            RunStatus::Skipped => "skipped",
            RunStatus::Failed => "failed",
        }
    }

    /// Whether a playlist came out of a run ending in this status.
    pub fn is_generated(&self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::CommittedWithWarning)
    }

    fn state(&self) -> RunState {
        match self {
            RunStatus::Succeeded => RunState::Succeeded,
            RunStatus::CommittedWithWarning => RunState::CommittedWithWarning,
            RunStatus::Skipped => RunState::Skipped,
            RunStatus::Failed => RunState::Failed,
        }
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Curation(#[from] CurationError),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("Cooldown storage unavailable: {0:#}")]
    Storage(anyhow::Error),

    #[error("Run timed out after {0:?}")]
    Timeout(Duration),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Theme {0} is already running")]
    AlreadyRunning(String),

    #[error("Run task aborted: {0}")]
    Aborted(String),
}

impl RunError {
    /// Recoverable outcomes are skips; everything else fails the run.
    pub fn status(&self) -> RunStatus {
        match self {
            RunError::Selection(SelectionError::NoCandidates(_))
            | RunError::Assembly(AssemblyError::DurationOutOfTolerance { .. })
            | RunError::Assembly(AssemblyError::Empty(_))
            | RunError::AlreadyRunning(_) => RunStatus::Skipped,
            _ => RunStatus::Failed,
        }
    }
}

/// Progress of one run, advanced by the coordinator as it moves through the stages.
#[derive(Debug)]
pub struct RunTracker {
    theme: String,
    state: RunState,
    pub candidates: usize,
    pub strategy: Option<CurationStrategy>,
    pub playlist: Option<Playlist>,
}

impl RunTracker {
    pub fn new(theme: &str) -> Self {
        Self {
            theme: theme.to_string(),
            state: RunState::Pending,
            candidates: 0,
            strategy: None,
            playlist: None,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn advance(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal run transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(theme = %self.theme, from = self.state.as_str(), to = next.as_str(), "Run state");
        self.state = next;
    }

    pub fn finish(&mut self, status: RunStatus) {
        self.advance(status.state());
    }
}

/// Report for one theme in one invocation. Not persisted.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    /// Random id, also attached to the run's log lines.
    pub run_id: String,
    pub theme_name: String,
    pub channel_id: String,
    pub status: RunStatus,
    /// Whether a playlist came out of the run.
    pub generated: bool,
    pub dry_run: bool,
    pub item_count: usize,
    pub duration_minutes: u32,
    pub total_score: f64,
    pub elapsed_ms: u64,
    pub started_at: DateTime<Utc>,
    /// State the run was in when it stopped.
    pub last_stage: RunState,
    pub candidate_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub curation: Option<CurationStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// The lineup that was (or, for dry runs, would have been) published.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playlist: Option<Playlist>,
}

impl RunResult {
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }

    /// A result for a run that never got as far as selecting.
    pub fn not_started(
        theme_name: &str,
        channel_id: &str,
        dry_run: bool,
        started_at: DateTime<Utc>,
        error: &RunError,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            theme_name: theme_name.to_string(),
            channel_id: channel_id.to_string(),
            status: error.status(),
            generated: false,
            dry_run,
            item_count: 0,
            duration_minutes: 0,
            total_score: 0.0,
            elapsed_ms: 0,
            started_at,
            last_stage: RunState::Pending,
            candidate_count: 0,
            curation: None,
            error: Some(error.to_string()),
            warning: None,
            playlist: None,
        }
    }

    /// One-line summary for logs and CLI output.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{:<24} {:<22} items={:<3} duration={}m elapsed={:.1}s",
            self.theme_name,
            self.status.as_str(),
            self.item_count,
            self.duration_minutes,
            self.elapsed().as_secs_f64()
        );
        if self.dry_run {
            line.push_str(" [dry-run]");
        }
        if let Some(warning) = &self.warning {
            line.push_str(&format!(" warning: {}", warning));
        }
        if let Some(error) = &self.error {
            line.push_str(&format!(" error: {}", error));
        }
        line
    }
}
