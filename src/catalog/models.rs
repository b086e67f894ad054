use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of media item. Drives both theme filtering and cooldown length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Movie,
    Series,
    Anime,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Series => "series",
            MediaKind::Anime => "anime",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "movie" => Some(MediaKind::Movie),
            "series" => Some(MediaKind::Series),
            "anime" => Some(MediaKind::Anime),
            _ => None,
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upstream media manager the item was synced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaSource {
    Radarr,
    Sonarr,
}

impl MediaSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaSource::Radarr => "radarr",
            MediaSource::Sonarr => "sonarr",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "radarr" => Some(MediaSource::Radarr),
            "sonarr" => Some(MediaSource::Sonarr),
            _ => None,
        }
    }
}

/// A catalog entry as synced by the ingestion pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: i64,
    pub source: MediaSource,
    /// Identifier native to `source`.
    pub external_id: String,
    pub title: String,
    pub year: Option<i32>,
    pub kind: MediaKind,
    pub genres: Vec<String>,
    /// Content rating such as "PG-13" or "TV-MA".
    pub content_rating: Option<String>,
    pub imdb_rating: Option<f64>,
    pub tmdb_rating: Option<f64>,
    pub runtime_minutes: u32,
    pub path: Option<String>,
    pub overview: Option<String>,
    pub has_file: bool,
    pub synced_at: DateTime<Utc>,
}

impl MediaItem {
    /// Quality score in the 0-10 range. The first non-zero provider rating wins
    /// (IMDb, then TMDb); an unrated item scores 0.
    pub fn quality_score(&self) -> f64 {
        [self.imdb_rating, self.tmdb_rating]
            .into_iter()
            .flatten()
            .find(|r| *r > 0.0)
            .unwrap_or(0.0)
    }
}

/// Read filter for catalog queries.
#[derive(Debug, Clone, Default)]
pub struct CatalogFilter {
    /// Empty means every kind.
    pub kinds: Vec<MediaKind>,
    pub source: Option<MediaSource>,
    pub available_only: bool,
}
