//! SQLite schema for cooldown state and play history.
//!
//! Timestamps are stored as unix seconds so range comparisons stay numeric.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, Index, SqlType, Table, VersionedSchema};

/// One row per media item ever played, overwritten on each play.
const MEDIA_COOLDOWNS_TABLE_V1: Table = Table {
    name: "media_cooldowns",
    columns: &[
        sqlite_column!("media_id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("media_type", &SqlType::Text, non_null = true),
        sqlite_column!("cooldown_days", &SqlType::Integer, non_null = true),
        sqlite_column!("last_played_at", &SqlType::Integer, non_null = true),
        sqlite_column!("can_replay_at", &SqlType::Integer, non_null = true),
    ],
    indices: &[Index {
        name: "idx_media_cooldowns_can_replay_at",
        columns: "can_replay_at",
        unique: false,
    }],
};

/// Append-only log of committed plays.
const PLAY_HISTORY_TABLE_V1: Table = Table {
    name: "play_history",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("media_id", &SqlType::Integer, non_null = true),
        sqlite_column!("channel_id", &SqlType::Text, non_null = true),
        sqlite_column!("theme_name", &SqlType::Text, non_null = true),
        sqlite_column!("media_title", &SqlType::Text, non_null = true),
        sqlite_column!("media_type", &SqlType::Text, non_null = true),
        sqlite_column!("played_at", &SqlType::Integer, non_null = true),
    ],
    indices: &[
        Index {
            name: "idx_play_history_media_id",
            columns: "media_id",
            unique: false,
        },
        Index {
            name: "idx_play_history_played_at",
            columns: "played_at",
            unique: false,
        },
        Index {
            name: "idx_play_history_theme",
            columns: "theme_name",
            unique: false,
        },
    ],
};

pub static COOLDOWN_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[MEDIA_COOLDOWNS_TABLE_V1, PLAY_HISTORY_TABLE_V1],
    migration: None,
}];
