//! Replay-eligibility state and play history.
//!
//! Cooldown rows gate future selection; history rows are an audit trail only.
//! Both are written in a single transaction when a generated lineup is committed.

mod ledger;
mod models;
mod schema;
mod sqlite_cooldown_store;

pub use ledger::{CooldownLedger, CooldownPolicy};
pub use models::{CooldownFilter, CooldownRecord, HistoryFilter, PlayHistoryEntry};
pub use schema::COOLDOWN_VERSIONED_SCHEMAS;
pub use sqlite_cooldown_store::SqliteCooldownStore;

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

pub trait CooldownStore: Send + Sync {
    /// Atomically appends `entry` and upserts `cooldown`. Returns the history row id.
    fn record_play(&self, entry: &PlayHistoryEntry, cooldown: &CooldownRecord) -> Result<i64>;

    /// Media ids whose `can_replay_at` is strictly after `now`.
    fn active_media_ids(&self, now: DateTime<Utc>) -> Result<HashSet<i64>>;
    fn get_cooldown(&self, media_id: i64) -> Result<Option<CooldownRecord>>;
    fn list_cooldowns(&self, filter: &CooldownFilter, now: DateTime<Utc>)
        -> Result<Vec<CooldownRecord>>;
    fn count_active(&self, now: DateTime<Utc>) -> Result<usize>;

    fn list_history(&self, filter: &HistoryFilter) -> Result<Vec<PlayHistoryEntry>>;
    fn count_history(&self, filter: &HistoryFilter) -> Result<usize>;

    /// Deletes cooldown rows that no longer exclude anything. History is untouched.
    fn purge_expired_cooldowns(&self, now: DateTime<Utc>) -> Result<usize>;
}
