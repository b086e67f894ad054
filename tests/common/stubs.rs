//! Scripted collaborators
//!
//! Stand-ins for the generative model, the channel publisher and cooldown
//! storage, each recording what it was asked to do.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use program_director::cooldown::{
    CooldownFilter, CooldownRecord, CooldownStore, HistoryFilter, PlayHistoryEntry,
    SqliteCooldownStore,
};
use program_director::llm::{
    CompletionOptions, CompletionResponse, FinishReason, LlmError, LlmProvider, Message,
};
use program_director::playlist::Playlist;
use program_director::publisher::{ChannelPublisher, PublishError};
use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Generative model
// ============================================================================

/// Replies with a fixed script, one entry per call. Once the script runs out
/// every call fails as if the endpoint were down.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: Mutex<usize>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Result<String, LlmError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(0),
        })
    }

    /// A provider that answers once with `content`.
    pub fn replying(content: &str) -> Arc<Self> {
        Self::new(vec![Ok(content.to_string())])
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }

    async fn complete(
        &self,
        _messages: &[Message],
        _options: &CompletionOptions,
    ) -> Result<CompletionResponse, LlmError> {
        *self.calls.lock().unwrap() += 1;
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Connection("script exhausted".into())));
        reply.map(|content| CompletionResponse {
            message: Message::assistant(content),
            finish_reason: FinishReason::Stop,
            usage: None,
        })
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        Ok(())
    }
}

/// Never answers. Runs using it end on their deadline or on cancellation.
pub struct StalledProvider;

#[async_trait]
impl LlmProvider for StalledProvider {
    fn name(&self) -> &str {
        "stalled"
    }

    fn model(&self) -> &str {
        "stalled-1"
    }

    async fn complete(
        &self,
        _messages: &[Message],
        _options: &CompletionOptions,
    ) -> Result<CompletionResponse, LlmError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(LlmError::Timeout)
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        Ok(())
    }
}

// ============================================================================
// Channel publisher
// ============================================================================

/// Records every programming update. Channels marked failing reject updates.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<(String, Playlist)>>,
    failing_channels: Mutex<HashSet<String>>,
}

impl RecordingPublisher {
    pub fn fail_channel(&self, channel_id: &str) {
        self.failing_channels
            .lock()
            .unwrap()
            .insert(channel_id.to_string());
    }

    pub fn published(&self) -> Vec<(String, Playlist)> {
        self.published.lock().unwrap().clone()
    }

    pub fn publish_count(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

#[async_trait]
impl ChannelPublisher for RecordingPublisher {
    fn name(&self) -> &str {
        "recording"
    }

    async fn set_programming(
        &self,
        channel_id: &str,
        playlist: &Playlist,
    ) -> Result<(), PublishError> {
        if self.failing_channels.lock().unwrap().contains(channel_id) {
            return Err(PublishError::Unavailable("connection refused".to_string()));
        }
        self.published
            .lock()
            .unwrap()
            .push((channel_id.to_string(), playlist.clone()));
        Ok(())
    }

    async fn health_check(&self) -> Result<(), PublishError> {
        Ok(())
    }
}

// ============================================================================
// Cooldown storage
// ============================================================================

/// SQLite cooldown store whose writes can be switched off, for exercising
/// the publish-succeeded-but-bookkeeping-failed path.
pub struct FailingCooldownStore {
    inner: SqliteCooldownStore,
    fail_writes: AtomicBool,
}

impl FailingCooldownStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        Ok(Self {
            inner: SqliteCooldownStore::new(db_path)?,
            fail_writes: AtomicBool::new(false),
        })
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl CooldownStore for FailingCooldownStore {
    fn record_play(&self, entry: &PlayHistoryEntry, cooldown: &CooldownRecord) -> Result<i64> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("database is locked");
        }
        self.inner.record_play(entry, cooldown)
    }

    fn active_media_ids(&self, now: DateTime<Utc>) -> Result<HashSet<i64>> {
        self.inner.active_media_ids(now)
    }

    fn get_cooldown(&self, media_id: i64) -> Result<Option<CooldownRecord>> {
        self.inner.get_cooldown(media_id)
    }

    fn list_cooldowns(
        &self,
        filter: &CooldownFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<CooldownRecord>> {
        self.inner.list_cooldowns(filter, now)
    }

    fn count_active(&self, now: DateTime<Utc>) -> Result<usize> {
        self.inner.count_active(now)
    }

    fn list_history(&self, filter: &HistoryFilter) -> Result<Vec<PlayHistoryEntry>> {
        self.inner.list_history(filter)
    }

    fn count_history(&self, filter: &HistoryFilter) -> Result<usize> {
        self.inner.count_history(filter)
    }

    fn purge_expired_cooldowns(&self, now: DateTime<Utc>) -> Result<usize> {
        self.inner.purge_expired_cooldowns(now)
    }
}
