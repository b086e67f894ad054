//! Catalog fixtures
//!
//! Media items are built unsaved (`id` 0); `TestEngine::add_media` stores them
//! and hands back the stored copy.

use chrono::{TimeZone, Utc};
use program_director::catalog::{MediaItem, MediaKind, MediaSource};

fn item(source: MediaSource, kind: MediaKind, title: &str, rating: f64, runtime: u32) -> MediaItem {
    MediaItem {
        id: 0,
        source,
        external_id: title.to_lowercase().replace(' ', "-"),
        title: title.to_string(),
        year: Some(1999),
        kind,
        genres: vec![],
        content_rating: None,
        imdb_rating: Some(rating),
        tmdb_rating: None,
        runtime_minutes: runtime,
        path: Some(format!("/media/{}", title)),
        overview: Some(format!("Synopsis of {}", title)),
        has_file: true,
        synced_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
    }
}

pub fn movie(title: &str, rating: f64, runtime: u32) -> MediaItem {
    item(MediaSource::Radarr, MediaKind::Movie, title, rating, runtime)
}

pub fn series(title: &str, rating: f64, runtime: u32) -> MediaItem {
    item(MediaSource::Sonarr, MediaKind::Series, title, rating, runtime)
}

pub fn anime(title: &str, rating: f64, runtime: u32) -> MediaItem {
    item(MediaSource::Sonarr, MediaKind::Anime, title, rating, runtime)
}
