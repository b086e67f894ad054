use super::models::{CatalogFilter, MediaItem, MediaKind, MediaSource};
use super::schema::CATALOG_VERSIONED_SCHEMAS;
use super::CatalogStore;
use crate::sqlite_persistence::{SqliteConnections, DEFAULT_READ_POOL_SIZE};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, OptionalExtension};
use std::path::Path;

const MEDIA_COLUMNS: &str = "id, source, external_id, title, year, media_type, genres, \
     content_rating, imdb_rating, tmdb_rating, runtime_minutes, path, overview, has_file, synced_at";

pub struct SqliteCatalogStore {
    conns: SqliteConnections,
}

impl SqliteCatalogStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        Self::with_read_pool_size(db_path, DEFAULT_READ_POOL_SIZE)
    }

    pub fn with_read_pool_size<P: AsRef<Path>>(db_path: P, read_pool_size: usize) -> Result<Self> {
        let conns = SqliteConnections::open(
            db_path.as_ref(),
            "catalog",
            CATALOG_VERSIONED_SCHEMAS,
            read_pool_size,
        )?;
        Ok(Self { conns })
    }

    fn row_to_media(row: &rusqlite::Row) -> rusqlite::Result<MediaItem> {
        let source_str: String = row.get("source")?;
        let kind_str: String = row.get("media_type")?;
        let genres_str: String = row.get("genres")?;
        let synced_at_str: String = row.get("synced_at")?;
        let runtime: i64 = row.get("runtime_minutes")?;

        Ok(MediaItem {
            id: row.get("id")?,
            source: MediaSource::parse(&source_str).unwrap_or(MediaSource::Radarr),
            external_id: row.get("external_id")?,
            title: row.get("title")?,
            year: row.get("year")?,
            // Unknown kinds are treated as movies, same as cooldown lookups.
            kind: MediaKind::parse(&kind_str).unwrap_or(MediaKind::Movie),
            genres: serde_json::from_str(&genres_str).unwrap_or_default(),
            content_rating: row.get("content_rating")?,
            imdb_rating: row.get("imdb_rating")?,
            tmdb_rating: row.get("tmdb_rating")?,
            runtime_minutes: runtime.max(0) as u32,
            path: row.get("path")?,
            overview: row.get("overview")?,
            has_file: row.get::<_, i64>("has_file")? != 0,
            synced_at: DateTime::parse_from_rfc3339(&synced_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

impl CatalogStore for SqliteCatalogStore {
    fn list_media(&self, filter: &CatalogFilter) -> Result<Vec<MediaItem>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<String> = Vec::new();

        if !filter.kinds.is_empty() {
            let placeholders = filter
                .kinds
                .iter()
                .map(|kind| {
                    values.push(kind.as_str().to_string());
                    format!("?{}", values.len())
                })
                .collect::<Vec<_>>()
                .join(", ");
            clauses.push(format!("media_type IN ({})", placeholders));
        }
        if let Some(source) = filter.source {
            values.push(source.as_str().to_string());
            clauses.push(format!("source = ?{}", values.len()));
        }
        if filter.available_only {
            clauses.push("has_file = 1".to_string());
        }

        let mut sql = format!("SELECT {} FROM media", MEDIA_COLUMNS);
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id ASC");

        let reader = self.conns.reader();
        let conn = reader.lock().unwrap();
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(params_from_iter(values.iter()), Self::row_to_media)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    fn get_media(&self, id: i64) -> Result<Option<MediaItem>> {
        let reader = self.conns.reader();
        let conn = reader.lock().unwrap();
        let mut stmt = conn.prepare(&format!("SELECT {} FROM media WHERE id = ?1", MEDIA_COLUMNS))?;
        let item = stmt.query_row(params![id], Self::row_to_media).optional()?;
        Ok(item)
    }

    fn upsert_media(&self, item: &MediaItem) -> Result<i64> {
        let genres = serde_json::to_string(&item.genres).context("Failed to encode genres")?;
        let writer = self.conns.writer();
        let conn = writer.lock().unwrap();

        let id: i64 = conn.query_row(
            "INSERT INTO media (source, external_id, title, year, media_type, genres, content_rating,
                                imdb_rating, tmdb_rating, runtime_minutes, path, overview, has_file, synced_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT(source, external_id) DO UPDATE SET
                title = ?3, year = ?4, media_type = ?5, genres = ?6, content_rating = ?7,
                imdb_rating = ?8, tmdb_rating = ?9, runtime_minutes = ?10, path = ?11,
                overview = ?12, has_file = ?13, synced_at = ?14
             RETURNING id",
            params![
                item.source.as_str(),
                item.external_id,
                item.title,
                item.year,
                item.kind.as_str(),
                genres,
                item.content_rating,
                item.imdb_rating,
                item.tmdb_rating,
                item.runtime_minutes as i64,
                item.path,
                item.overview,
                item.has_file as i64,
                item.synced_at.to_rfc3339(),
            ],
            |row| row.get(0),
        )?;

        Ok(id)
    }

    fn count_media(&self) -> Result<usize> {
        let reader = self.conns.reader();
        let conn = reader.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM media", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
