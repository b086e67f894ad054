//! HTTP client for the Trakt.tv API.

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use super::models::{SearchResult, TraktMovie, TraktShow, TrendingMovie, TrendingShow};
use crate::config::TraktSettings;

const API_VERSION: &str = "2";
pub const DEFAULT_LIMIT: usize = 10;

pub struct TraktClient {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
}

impl TraktClient {
    /// Fails when no client id is configured; every Trakt call needs one.
    pub fn new(settings: &TraktSettings) -> Result<Self> {
        let client_id = settings
            .client_id
            .clone()
            .context("Trakt client id not configured, set trakt.client_id or --trakt-client-id")?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
            client_id,
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Trakt request");
        let response = self
            .client
            .get(&url)
            .header("Content-Type", "application/json")
            .header("trakt-api-version", API_VERSION)
            .header("trakt-api-key", &self.client_id)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to reach Trakt at {}", self.base_url))?;

        let status = response.status();
        if !status.is_success() {
            bail!("Trakt request {} failed with status {}", path, status);
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse Trakt response for {}", path))
    }

    fn listing_query(limit: usize) -> Vec<(&'static str, String)> {
        let limit = if limit == 0 { DEFAULT_LIMIT } else { limit };
        vec![("extended", "full".to_string()), ("limit", limit.to_string())]
    }

    pub async fn trending_movies(&self, limit: usize) -> Result<Vec<TrendingMovie>> {
        self.get("/movies/trending", &Self::listing_query(limit)).await
    }

    pub async fn trending_shows(&self, limit: usize) -> Result<Vec<TrendingShow>> {
        self.get("/shows/trending", &Self::listing_query(limit)).await
    }

    pub async fn popular_movies(&self, limit: usize) -> Result<Vec<TraktMovie>> {
        self.get("/movies/popular", &Self::listing_query(limit)).await
    }

    pub async fn popular_shows(&self, limit: usize) -> Result<Vec<TraktShow>> {
        self.get("/shows/popular", &Self::listing_query(limit)).await
    }

    /// Movie by Trakt slug, Trakt id or IMDb id.
    pub async fn movie(&self, id: &str) -> Result<TraktMovie> {
        self.get(
            &format!("/movies/{}", id),
            &[("extended", "full".to_string())],
        )
        .await
    }

    /// Searches movies and shows together.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let mut params = Self::listing_query(limit);
        params.push(("query", query.to_string()));
        self.get("/search/movie,show", &params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Query};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;

    fn check_headers(headers: &HeaderMap) -> Result<(), StatusCode> {
        let version = headers.get("trakt-api-version").and_then(|v| v.to_str().ok());
        let key = headers.get("trakt-api-key").and_then(|v| v.to_str().ok());
        if version == Some("2") && key == Some("test-key") {
            Ok(())
        } else {
            Err(StatusCode::UNAUTHORIZED)
        }
    }

    fn inception() -> Value {
        json!({
            "title": "Inception",
            "year": 2010,
            "ids": {"trakt": 16662, "slug": "inception-2010", "imdb": "tt1375666", "tmdb": 27205},
            "tagline": "Your mind is the scene of the crime",
            "overview": "A thief who steals corporate secrets...",
            "runtime": 148,
            "genres": ["action", "science-fiction"],
            "rating": 8.8,
            "votes": 100000
        })
    }

    fn severance() -> Value {
        json!({
            "title": "Severance",
            "year": 2022,
            "ids": {"trakt": 154997, "slug": "severance", "tvdb": 371980},
            "overview": "Office workers with split memories.",
            "status": "returning series",
            "rating": 8.6,
            "network": "Apple TV+"
        })
    }

    async fn spawn_fake_trakt() -> String {
        async fn trending_movies(
            headers: HeaderMap,
            Query(params): Query<HashMap<String, String>>,
        ) -> Result<Json<Value>, StatusCode> {
            check_headers(&headers)?;
            let limit: usize = params.get("limit").and_then(|l| l.parse().ok()).unwrap_or(0);
            let all = vec![
                json!({"watchers": 42, "movie": inception()}),
                json!({"watchers": 7, "movie": {"title": "Heat", "year": 1995}}),
            ];
            Ok(Json(Value::Array(all.into_iter().take(limit).collect())))
        }

        async fn trending_shows(headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
            check_headers(&headers)?;
            Ok(Json(json!([{"watchers": 12, "show": severance()}])))
        }

        async fn popular_movies(headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
            check_headers(&headers)?;
            Ok(Json(json!([inception()])))
        }

        async fn popular_shows(headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
            check_headers(&headers)?;
            Ok(Json(json!([severance()])))
        }

        async fn movie(
            headers: HeaderMap,
            Path(id): Path<String>,
        ) -> Result<Json<Value>, StatusCode> {
            check_headers(&headers)?;
            if id == "inception-2010" {
                Ok(Json(inception()))
            } else {
                Err(StatusCode::NOT_FOUND)
            }
        }

        async fn search(
            headers: HeaderMap,
            Query(params): Query<HashMap<String, String>>,
        ) -> Result<Json<Value>, StatusCode> {
            check_headers(&headers)?;
            let query = params.get("query").cloned().unwrap_or_default();
            if query == "sever" {
                Ok(Json(json!([
                    {"type": "show", "score": 91.5, "show": severance()},
                    {"type": "movie", "score": null, "movie": {"title": "Severance", "year": 2006}}
                ])))
            } else {
                Ok(Json(json!([])))
            }
        }

        let app = Router::new()
            .route("/movies/trending", get(trending_movies))
            .route("/shows/trending", get(trending_shows))
            .route("/movies/popular", get(popular_movies))
            .route("/shows/popular", get(popular_shows))
            .route("/movies/{id}", get(movie))
            .route("/search/movie,show", get(search));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn settings(url: String, client_id: Option<&str>) -> TraktSettings {
        TraktSettings {
            url,
            client_id: client_id.map(str::to_string),
            client_secret: None,
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_client_requires_client_id() {
        let result = TraktClient::new(&settings("http://trakt".to_string(), None));
        let err = result.err().unwrap();
        assert!(err.to_string().contains("client id"));
    }

    #[tokio::test]
    async fn test_trending_movies_sends_headers_and_limit() {
        let url = spawn_fake_trakt().await;
        let client = TraktClient::new(&settings(url, Some("test-key"))).unwrap();

        let movies = client.trending_movies(1).await.unwrap();
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0].watchers, 42);
        assert_eq!(movies[0].movie.title, "Inception");
        assert_eq!(movies[0].movie.ids.imdb.as_deref(), Some("tt1375666"));
        assert_eq!(movies[0].movie.runtime, Some(148));

        // Zero falls back to the default limit
        assert_eq!(client.trending_movies(0).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_shows_and_popular_listings() {
        let url = spawn_fake_trakt().await;
        let client = TraktClient::new(&settings(url, Some("test-key"))).unwrap();

        let trending = client.trending_shows(10).await.unwrap();
        assert_eq!(trending[0].show.title, "Severance");
        assert_eq!(trending[0].show.network.as_deref(), Some("Apple TV+"));

        let popular = client.popular_movies(10).await.unwrap();
        assert_eq!(popular[0].genres, vec!["action", "science-fiction"]);

        let shows = client.popular_shows(10).await.unwrap();
        assert_eq!(shows[0].ids.tvdb, Some(371980));
    }

    #[tokio::test]
    async fn test_movie_lookup() {
        let url = spawn_fake_trakt().await;
        let client = TraktClient::new(&settings(url, Some("test-key"))).unwrap();

        let movie = client.movie("inception-2010").await.unwrap();
        assert_eq!(movie.year, Some(2010));
        assert!((movie.rating - 8.8).abs() < 1e-9);

        let err = client.movie("nope").await.unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_search_mixes_movies_and_shows() {
        let url = spawn_fake_trakt().await;
        let client = TraktClient::new(&settings(url, Some("test-key"))).unwrap();

        let results = client.search("sever", 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].result_type, "show");
        assert_eq!(results[0].score, Some(91.5));
        assert!(results[0].show.is_some());
        assert_eq!(results[1].movie.as_ref().unwrap().year, Some(2006));
        assert!(results[1].score.is_none());

        assert!(client.search("zzz", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_key_is_an_error() {
        let url = spawn_fake_trakt().await;
        let client = TraktClient::new(&settings(url, Some("other-key"))).unwrap();

        let err = client.popular_movies(5).await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }
}
