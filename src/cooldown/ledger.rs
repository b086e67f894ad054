use super::models::{CooldownFilter, CooldownRecord, HistoryFilter, PlayHistoryEntry};
use super::CooldownStore;
use crate::catalog::{MediaItem, MediaKind};
use crate::clock::Clock;
use crate::config::CooldownSettings;
use anyhow::Result;
use chrono::Duration;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Cooldown length per media kind, in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownPolicy {
    pub movie_days: u32,
    pub series_days: u32,
    pub anime_days: u32,
}

impl CooldownPolicy {
    pub fn new(settings: &CooldownSettings) -> Self {
        Self {
            movie_days: settings.movie_days,
            series_days: settings.series_days,
            anime_days: settings.anime_days,
        }
    }

    pub fn days_for(&self, kind: MediaKind) -> u32 {
        match kind {
            MediaKind::Movie => self.movie_days,
            MediaKind::Series => self.series_days,
            MediaKind::Anime => self.anime_days,
        }
    }

    /// Like [`Self::days_for`] but for a raw type string; unknown kinds use the movie window.
    pub fn days_for_type(&self, media_type: &str) -> u32 {
        MediaKind::parse(media_type)
            .map(|kind| self.days_for(kind))
            .unwrap_or(self.movie_days)
    }
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self {
            movie_days: 30,
            series_days: 14,
            anime_days: 14,
        }
    }
}

/// Owns replay-eligibility decisions on top of a [`CooldownStore`].
pub struct CooldownLedger {
    store: Arc<dyn CooldownStore>,
    policy: CooldownPolicy,
    clock: Arc<dyn Clock>,
}

impl CooldownLedger {
    pub fn new(store: Arc<dyn CooldownStore>, policy: CooldownPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            policy,
            clock,
        }
    }

    pub fn policy(&self) -> &CooldownPolicy {
        &self.policy
    }

    pub fn store(&self) -> &Arc<dyn CooldownStore> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Ids currently inside their cooldown window. Read-only.
    pub fn active_exclusions(&self) -> Result<HashSet<i64>> {
        self.store.active_media_ids(self.clock.now())
    }

    /// Records one committed play: history append plus cooldown upsert, as one
    /// transaction. Re-recording the same item at the same instant yields the
    /// same `can_replay_at`.
    pub fn record_play(
        &self,
        media: &MediaItem,
        channel_id: &str,
        theme_name: &str,
    ) -> Result<CooldownRecord> {
        let now = self.clock.now();
        let days = self.policy.days_for(media.kind);

        let entry = PlayHistoryEntry {
            id: 0,
            media_id: media.id,
            channel_id: channel_id.to_string(),
            theme_name: theme_name.to_string(),
            media_title: media.title.clone(),
            media_type: media.kind,
            played_at: now,
        };
        let cooldown = CooldownRecord {
            media_id: media.id,
            media_type: media.kind,
            cooldown_days: days,
            last_played_at: now,
            can_replay_at: now + Duration::days(days as i64),
        };

        self.store.record_play(&entry, &cooldown)?;
        debug!(
            media_id = media.id,
            title = %media.title,
            days,
            "Recorded play"
        );
        Ok(cooldown)
    }

    pub fn count_active(&self) -> Result<usize> {
        self.store.count_active(self.clock.now())
    }

    pub fn purge_expired(&self) -> Result<usize> {
        self.store.purge_expired_cooldowns(self.clock.now())
    }

    pub fn list_cooldowns(&self, filter: &CooldownFilter) -> Result<Vec<CooldownRecord>> {
        self.store.list_cooldowns(filter, self.clock.now())
    }

    pub fn list_history(&self, filter: &HistoryFilter) -> Result<Vec<PlayHistoryEntry>> {
        self.store.list_history(filter)
    }
}
