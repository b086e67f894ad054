use crate::catalog::MediaKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Replay-eligibility state for a single media item. At most one per item;
/// every recorded play overwrites it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CooldownRecord {
    pub media_id: i64,
    pub media_type: MediaKind,
    pub cooldown_days: u32,
    pub last_played_at: DateTime<Utc>,
    pub can_replay_at: DateTime<Utc>,
}

impl CooldownRecord {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.can_replay_at
    }
}

/// Append-only audit entry for a committed play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayHistoryEntry {
    /// Assigned by the store; ignored on insert.
    pub id: i64,
    pub media_id: i64,
    pub channel_id: String,
    pub theme_name: String,
    pub media_title: String,
    pub media_type: MediaKind,
    pub played_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct CooldownFilter {
    pub media_type: Option<MediaKind>,
    pub active_only: bool,
    pub expired_only: bool,
    pub limit: Option<usize>,
    pub offset: usize,
}

#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub media_id: Option<i64>,
    pub channel_id: Option<String>,
    pub theme_name: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: usize,
}
