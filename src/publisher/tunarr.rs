//! Tunarr channel publisher.

use super::{ChannelPublisher, PublishError};
use crate::catalog::MediaItem;
use crate::config::TunarrSettings;
use crate::playlist::Playlist;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TunarrChannel {
    pub id: String,
    #[serde(default)]
    pub number: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub program_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TunarrProgram {
    #[serde(rename = "type")]
    pub program_type: String,
    /// Milliseconds.
    pub duration: u64,
    pub external_source_type: String,
    pub external_source_name: String,
    pub external_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plex_file_path: Option<String>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
}

/// A Plex or Jellyfin server registered in Tunarr.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TunarrMediaSource {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub source_type: String,
}

impl TunarrProgram {
    pub fn new(media: &MediaItem, source: &TunarrMediaSource) -> Self {
        TunarrProgram {
            program_type: "content".to_string(),
            duration: media.runtime_minutes as u64 * 60_000,
            external_source_type: source.source_type.clone(),
            external_source_name: source.name.clone(),
            external_key: media.external_id.clone(),
            plex_file_path: media.path.clone(),
            title: media.title.clone(),
            summary: media.overview.clone(),
            rating: media.content_rating.clone(),
            year: media.year,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TunarrProgramming {
    #[serde(rename = "type")]
    pub programming_type: String,
    pub programs: Vec<TunarrProgram>,
}

impl TunarrProgramming {
    pub fn manual(playlist: &Playlist, source: &TunarrMediaSource) -> Self {
        TunarrProgramming {
            programming_type: "manual".to_string(),
            programs: playlist
                .items
                .iter()
                .map(|i| TunarrProgram::new(&i.media, source))
                .collect(),
        }
    }
}

pub struct TunarrPublisher {
    client: Client,
    base_url: String,
    timeout: Duration,
    media_source: Option<String>,
}

impl TunarrPublisher {
    pub fn new(settings: &TunarrSettings) -> Self {
        Self {
            client: Client::new(),
            base_url: settings.url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(settings.timeout_secs),
            media_source: settings.media_source.clone(),
        }
    }

    pub async fn list_media_sources(&self) -> Result<Vec<TunarrMediaSource>, PublishError> {
        let url = format!("{}/api/media-sources", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| PublishError::Unavailable(e.to_string()))?;
        let response = check_status(response).await?;
        response.json().await.map_err(|e| {
            PublishError::Unavailable(format!("Failed to decode media sources: {}", e))
        })
    }

    /// The configured media source, or the first one Tunarr lists.
    pub async fn resolve_media_source(&self) -> Result<TunarrMediaSource, PublishError> {
        let sources = self.list_media_sources().await?;
        let found = match &self.media_source {
            Some(name) => sources
                .into_iter()
                .find(|s| s.name == *name || s.name.eq_ignore_ascii_case(name)),
            None => sources.into_iter().next(),
        };
        found.ok_or_else(|| {
            PublishError::MediaSourceNotFound(
                self.media_source
                    .clone()
                    .unwrap_or_else(|| "(none configured in Tunarr)".to_string()),
            )
        })
    }

    pub async fn get_channel(&self, channel_id: &str) -> Result<TunarrChannel, PublishError> {
        let url = format!("{}/api/channels/{}", self.base_url, channel_id);
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| PublishError::Unavailable(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(PublishError::ChannelNotFound(channel_id.to_string()));
        }
        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| PublishError::Unavailable(format!("Failed to decode channel: {}", e)))
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, PublishError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        Err(PublishError::Unavailable(format!("status {}: {}", status.as_u16(), message)))
    } else {
        Err(PublishError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ChannelPublisher for TunarrPublisher {
    fn name(&self) -> &str {
        "tunarr"
    }

    async fn set_programming(
        &self,
        channel_id: &str,
        playlist: &Playlist,
    ) -> Result<(), PublishError> {
        let channel = self.get_channel(channel_id).await?;
        debug!(
            channel_id,
            channel_name = %channel.name,
            current_programs = channel.program_count,
            "Replacing channel programming"
        );

        let source = self.resolve_media_source().await?;
        let url = format!("{}/api/channels/{}/programming", self.base_url, channel_id);
        let body = TunarrProgramming::manual(playlist, &source);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| PublishError::Unavailable(e.to_string()))?;
        check_status(response).await?;

        info!(
            channel_id,
            theme = %playlist.theme_name,
            programs = body.programs.len(),
            media_source = %source.name,
            "Published programming to Tunarr"
        );
        Ok(())
    }

    async fn health_check(&self) -> Result<(), PublishError> {
        let url = format!("{}/api/channels", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| PublishError::Unavailable(e.to_string()))?;
        check_status(response).await.map(|_| ())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MediaKind, MediaSource};
    use crate::playlist::PlaylistItem;
    use axum::extract::{Path, State};
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use chrono::Utc;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn media() -> MediaItem {
        MediaItem {
            id: 7,
            source: MediaSource::Radarr,
            external_id: "12345".to_string(),
            title: "Heat".to_string(),
            year: Some(1995),
            kind: MediaKind::Movie,
            genres: vec!["Crime".to_string()],
            content_rating: Some("R".to_string()),
            imdb_rating: Some(8.3),
            tmdb_rating: None,
            runtime_minutes: 170,
            path: Some("/movies/Heat (1995)/Heat.mkv".to_string()),
            overview: Some("A heist crew".to_string()),
            has_file: true,
            synced_at: Utc::now(),
        }
    }

    fn jellyfin() -> TunarrMediaSource {
        TunarrMediaSource {
            id: "src-2".to_string(),
            name: "Basement Jellyfin".to_string(),
            source_type: "jellyfin".to_string(),
        }
    }

    fn playlist() -> Playlist {
        let item = media();
        Playlist {
            theme_name: "Crime Night".to_string(),
            channel_id: "ch-1".to_string(),
            generated_at: Utc::now(),
            total_score: item.quality_score(),
            total_duration_minutes: item.runtime_minutes,
            items: vec![PlaylistItem {
                score: item.quality_score(),
                media: item,
                reason: None,
            }],
        }
    }

    fn settings(url: String, media_source: Option<&str>) -> TunarrSettings {
        TunarrSettings {
            url,
            timeout_secs: 5,
            media_source: media_source.map(str::to_string),
        }
    }

    #[test]
    fn test_program_conversion() {
        let program = TunarrProgram::new(&media(), &jellyfin());
        assert_eq!(program.duration, 170 * 60_000);

        let json = serde_json::to_value(&program).unwrap();
        assert_eq!(json["type"], "content");
        assert_eq!(json["externalSourceType"], "jellyfin");
        assert_eq!(json["externalSourceName"], "Basement Jellyfin");
        assert_eq!(json["externalKey"], "12345");
        assert_eq!(json["plexFilePath"], "/movies/Heat (1995)/Heat.mkv");
        assert_eq!(json["year"], 1995);
    }

    #[test]
    fn test_programming_is_manual() {
        let json = serde_json::to_value(TunarrProgramming::manual(&playlist(), &jellyfin())).unwrap();
        assert_eq!(json["type"], "manual");
        assert_eq!(json["programs"].as_array().unwrap().len(), 1);
    }

    type Captured = Arc<Mutex<Vec<(String, serde_json::Value)>>>;

    #[derive(Clone)]
    struct FakeTunarr {
        captured: Captured,
        sources: serde_json::Value,
    }

    async fn spawn_fake_tunarr(sources: serde_json::Value) -> (String, Captured) {
        let captured: Captured = Arc::new(Mutex::new(vec![]));

        async fn channel(Path(id): Path<String>) -> Result<Json<serde_json::Value>, AxumStatus> {
            if id == "ch-1" {
                Ok(Json(json!({"id": "ch-1", "number": 3, "name": "Crime"})))
            } else {
                Err(AxumStatus::NOT_FOUND)
            }
        }

        async fn media_sources(State(fake): State<FakeTunarr>) -> Json<serde_json::Value> {
            Json(fake.sources)
        }

        async fn programming(
            State(fake): State<FakeTunarr>,
            Path(id): Path<String>,
            Json(body): Json<serde_json::Value>,
        ) -> AxumStatus {
            fake.captured.lock().unwrap().push((id, body));
            AxumStatus::OK
        }

        let app = Router::new()
            .route("/api/channels/{id}", get(channel))
            .route("/api/channels/{id}/programming", post(programming))
            .route("/api/media-sources", get(media_sources))
            .with_state(FakeTunarr {
                captured: captured.clone(),
                sources,
            });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), captured)
    }

    fn two_sources() -> serde_json::Value {
        json!([
            {"id": "src-1", "name": "Living Room Plex", "type": "plex", "uri": "http://plex:32400"},
            {"id": "src-2", "name": "Basement Jellyfin", "type": "jellyfin", "uri": "http://jf:8096"}
        ])
    }

    #[tokio::test]
    async fn test_set_programming_posts_lineup() {
        let (url, captured) = spawn_fake_tunarr(two_sources()).await;
        let publisher = TunarrPublisher::new(&settings(url, None));

        publisher.set_programming("ch-1", &playlist()).await.unwrap();
        publisher.set_programming("ch-1", &playlist()).await.unwrap();

        let captured = captured.lock().unwrap();
        assert_eq!(captured.len(), 2);
        assert_eq!(captured[0].0, "ch-1");
        let program = &captured[0].1["programs"][0];
        assert_eq!(program["title"], "Heat");
        // First listed source when none is configured
        assert_eq!(program["externalSourceType"], "plex");
        assert_eq!(program["externalSourceName"], "Living Room Plex");
        assert_eq!(captured[0].1, captured[1].1);
    }

    #[tokio::test]
    async fn test_configured_media_source_reaches_programs() {
        let (url, captured) = spawn_fake_tunarr(two_sources()).await;
        let publisher = TunarrPublisher::new(&settings(url, Some("basement jellyfin")));

        publisher.set_programming("ch-1", &playlist()).await.unwrap();

        let captured = captured.lock().unwrap();
        let program = &captured[0].1["programs"][0];
        assert_eq!(program["externalSourceType"], "jellyfin");
        assert_eq!(program["externalSourceName"], "Basement Jellyfin");
    }

    #[tokio::test]
    async fn test_missing_media_source_not_published() {
        let (url, captured) = spawn_fake_tunarr(two_sources()).await;
        let publisher = TunarrPublisher::new(&settings(url, Some("Attic Emby")));

        let err = publisher
            .set_programming("ch-1", &playlist())
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::MediaSourceNotFound(ref name) if name == "Attic Emby"));
        assert!(captured.lock().unwrap().is_empty());

        let (url, captured) = spawn_fake_tunarr(json!([])).await;
        let publisher = TunarrPublisher::new(&settings(url, None));
        let err = publisher
            .set_programming("ch-1", &playlist())
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::MediaSourceNotFound(_)));
        assert!(captured.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_channel_not_published() {
        let (url, captured) = spawn_fake_tunarr(two_sources()).await;
        let publisher = TunarrPublisher::new(&settings(url, None));

        let err = publisher
            .set_programming("missing", &playlist())
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::ChannelNotFound(_)));
        assert!(captured.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_is_unavailable() {
        let publisher = TunarrPublisher::new(&TunarrSettings {
            url: "http://127.0.0.1:1".to_string(),
            timeout_secs: 1,
            media_source: None,
        });
        let err = publisher.health_check().await.unwrap_err();
        assert!(matches!(err, PublishError::Unavailable(_)));
    }
}
