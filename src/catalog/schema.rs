use crate::sqlite_column;
use crate::sqlite_persistence::{Column, Index, SqlType, Table, VersionedSchema};

const MEDIA_TABLE_V1: Table = Table {
    name: "media",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("source", &SqlType::Text, non_null = true),
        sqlite_column!("external_id", &SqlType::Text, non_null = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("year", &SqlType::Integer),
        sqlite_column!("media_type", &SqlType::Text, non_null = true),
        // JSON array of genre tags
        sqlite_column!("genres", &SqlType::Text, non_null = true),
        sqlite_column!("content_rating", &SqlType::Text),
        sqlite_column!("imdb_rating", &SqlType::Real),
        sqlite_column!("tmdb_rating", &SqlType::Real),
        sqlite_column!("runtime_minutes", &SqlType::Integer, non_null = true),
        sqlite_column!("path", &SqlType::Text),
        sqlite_column!("overview", &SqlType::Text),
        sqlite_column!("has_file", &SqlType::Integer, non_null = true),
        sqlite_column!("synced_at", &SqlType::Text, non_null = true),
    ],
    indices: &[
        Index {
            name: "idx_media_source_external",
            columns: "source, external_id",
            unique: true,
        },
        Index {
            name: "idx_media_type",
            columns: "media_type",
            unique: false,
        },
    ],
};

pub static CATALOG_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[MEDIA_TABLE_V1],
    migration: None,
}];
