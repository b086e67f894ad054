use super::models::{CooldownFilter, CooldownRecord, HistoryFilter, PlayHistoryEntry};
use super::schema::COOLDOWN_VERSIONED_SCHEMAS;
use super::CooldownStore;
use crate::catalog::MediaKind;
use crate::sqlite_persistence::{SqliteConnections, DEFAULT_READ_POOL_SIZE};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;

/// Plays are written through the WAL write connection; exclusion lookups and
/// listings go through the read pool so they never queue behind a write.
pub struct SqliteCooldownStore {
    conns: SqliteConnections,
}

impl SqliteCooldownStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        Self::with_read_pool_size(db_path, DEFAULT_READ_POOL_SIZE)
    }

    pub fn with_read_pool_size<P: AsRef<Path>>(db_path: P, read_pool_size: usize) -> Result<Self> {
        let conns = SqliteConnections::open(
            db_path.as_ref(),
            "cooldown",
            COOLDOWN_VERSIONED_SCHEMAS,
            read_pool_size,
        )?;
        Ok(Self { conns })
    }

    fn from_timestamp(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap_or_default()
    }

    fn parse_kind(s: &str) -> MediaKind {
        MediaKind::parse(s).unwrap_or(MediaKind::Movie)
    }

    fn row_to_cooldown(row: &rusqlite::Row) -> rusqlite::Result<CooldownRecord> {
        let media_type: String = row.get("media_type")?;
        let cooldown_days: i64 = row.get("cooldown_days")?;
        Ok(CooldownRecord {
            media_id: row.get("media_id")?,
            media_type: Self::parse_kind(&media_type),
            cooldown_days: cooldown_days.max(0) as u32,
            last_played_at: Self::from_timestamp(row.get("last_played_at")?),
            can_replay_at: Self::from_timestamp(row.get("can_replay_at")?),
        })
    }

    fn row_to_history(row: &rusqlite::Row) -> rusqlite::Result<PlayHistoryEntry> {
        let media_type: String = row.get("media_type")?;
        Ok(PlayHistoryEntry {
            id: row.get("id")?,
            media_id: row.get("media_id")?,
            channel_id: row.get("channel_id")?,
            theme_name: row.get("theme_name")?,
            media_title: row.get("media_title")?,
            media_type: Self::parse_kind(&media_type),
            played_at: Self::from_timestamp(row.get("played_at")?),
        })
    }

    fn history_where(filter: &HistoryFilter, values: &mut Vec<Value>) -> String {
        let mut clauses = Vec::new();
        if let Some(media_id) = filter.media_id {
            values.push(Value::Integer(media_id));
            clauses.push(format!("media_id = ?{}", values.len()));
        }
        if let Some(channel_id) = &filter.channel_id {
            values.push(Value::Text(channel_id.clone()));
            clauses.push(format!("channel_id = ?{}", values.len()));
        }
        if let Some(theme_name) = &filter.theme_name {
            values.push(Value::Text(theme_name.clone()));
            clauses.push(format!("theme_name = ?{}", values.len()));
        }
        if let Some(since) = filter.since {
            values.push(Value::Integer(since.timestamp()));
            clauses.push(format!("played_at >= ?{}", values.len()));
        }
        if let Some(until) = filter.until {
            values.push(Value::Integer(until.timestamp()));
            clauses.push(format!("played_at <= ?{}", values.len()));
        }
        if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        }
    }

    fn push_paging(sql: &mut String, limit: Option<usize>, offset: usize) {
        // SQLite needs a LIMIT for OFFSET; -1 means unbounded.
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));
    }
}

impl CooldownStore for SqliteCooldownStore {
    fn record_play(&self, entry: &PlayHistoryEntry, cooldown: &CooldownRecord) -> Result<i64> {
        let writer = self.conns.writer();
        let mut conn = writer.lock().unwrap();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO play_history (media_id, channel_id, theme_name, media_title, media_type, played_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.media_id,
                entry.channel_id,
                entry.theme_name,
                entry.media_title,
                entry.media_type.as_str(),
                entry.played_at.timestamp(),
            ],
        )
        .context("Failed to append play history")?;
        let history_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO media_cooldowns (media_id, media_type, cooldown_days, last_played_at, can_replay_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(media_id) DO UPDATE SET
                media_type = ?2, cooldown_days = ?3, last_played_at = ?4, can_replay_at = ?5",
            params![
                cooldown.media_id,
                cooldown.media_type.as_str(),
                cooldown.cooldown_days as i64,
                cooldown.last_played_at.timestamp(),
                cooldown.can_replay_at.timestamp(),
            ],
        )
        .context("Failed to upsert cooldown")?;

        tx.commit()?;
        Ok(history_id)
    }

    fn active_media_ids(&self, now: DateTime<Utc>) -> Result<HashSet<i64>> {
        let reader = self.conns.reader();
        let conn = reader.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT media_id FROM media_cooldowns WHERE can_replay_at > ?1")?;
        let ids = stmt
            .query_map(params![now.timestamp()], |row| row.get(0))?
            .collect::<rusqlite::Result<HashSet<i64>>>()?;
        Ok(ids)
    }

    fn get_cooldown(&self, media_id: i64) -> Result<Option<CooldownRecord>> {
        let reader = self.conns.reader();
        let conn = reader.lock().unwrap();
        let record = conn
            .query_row(
                "SELECT media_id, media_type, cooldown_days, last_played_at, can_replay_at
                 FROM media_cooldowns WHERE media_id = ?1",
                params![media_id],
                Self::row_to_cooldown,
            )
            .optional()?;
        Ok(record)
    }

    fn list_cooldowns(
        &self,
        filter: &CooldownFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<CooldownRecord>> {
        let mut clauses = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(kind) = filter.media_type {
            values.push(Value::Text(kind.as_str().to_string()));
            clauses.push(format!("media_type = ?{}", values.len()));
        }
        if filter.active_only {
            values.push(Value::Integer(now.timestamp()));
            clauses.push(format!("can_replay_at > ?{}", values.len()));
        }
        if filter.expired_only {
            values.push(Value::Integer(now.timestamp()));
            clauses.push(format!("can_replay_at <= ?{}", values.len()));
        }

        let mut sql = "SELECT media_id, media_type, cooldown_days, last_played_at, can_replay_at
                       FROM media_cooldowns"
            .to_string();
        if !clauses.is_empty() {
            sql.push_str(&format!(" WHERE {}", clauses.join(" AND ")));
        }
        sql.push_str(" ORDER BY can_replay_at DESC");
        Self::push_paging(&mut sql, filter.limit, filter.offset);

        let reader = self.conns.reader();
        let conn = reader.lock().unwrap();
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(values), Self::row_to_cooldown)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn count_active(&self, now: DateTime<Utc>) -> Result<usize> {
        let reader = self.conns.reader();
        let conn = reader.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM media_cooldowns WHERE can_replay_at > ?1",
            params![now.timestamp()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn list_history(&self, filter: &HistoryFilter) -> Result<Vec<PlayHistoryEntry>> {
        let mut values = Vec::new();
        let mut sql = format!(
            "SELECT id, media_id, channel_id, theme_name, media_title, media_type, played_at
             FROM play_history{} ORDER BY played_at DESC, id DESC",
            Self::history_where(filter, &mut values)
        );
        Self::push_paging(&mut sql, filter.limit, filter.offset);

        let reader = self.conns.reader();
        let conn = reader.lock().unwrap();
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params_from_iter(values), Self::row_to_history)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn count_history(&self, filter: &HistoryFilter) -> Result<usize> {
        let mut values = Vec::new();
        let sql = format!(
            "SELECT COUNT(*) FROM play_history{}",
            Self::history_where(filter, &mut values)
        );
        let reader = self.conns.reader();
        let conn = reader.lock().unwrap();
        let count: i64 = conn.query_row(&sql, params_from_iter(values), |row| row.get(0))?;
        Ok(count as usize)
    }

    fn purge_expired_cooldowns(&self, now: DateTime<Utc>) -> Result<usize> {
        let writer = self.conns.writer();
        let conn = writer.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM media_cooldowns WHERE can_replay_at <= ?1",
            params![now.timestamp()],
        )?;
        Ok(deleted)
    }
}
