//! Trakt API payloads. Only the fields the CLI shows are kept.

use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TraktIds {
    pub trakt: Option<i64>,
    pub slug: Option<String>,
    pub imdb: Option<String>,
    pub tmdb: Option<i64>,
    pub tvdb: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TraktMovie {
    pub title: String,
    pub year: Option<i32>,
    pub ids: TraktIds,
    pub tagline: Option<String>,
    pub overview: Option<String>,
    pub released: Option<String>,
    /// Minutes.
    pub runtime: Option<u32>,
    pub genres: Vec<String>,
    pub rating: f64,
    pub votes: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TraktShow {
    pub title: String,
    pub year: Option<i32>,
    pub ids: TraktIds,
    pub overview: Option<String>,
    pub genres: Vec<String>,
    pub status: Option<String>,
    pub rating: f64,
    pub votes: u64,
    pub network: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrendingMovie {
    #[serde(default)]
    pub watchers: u64,
    pub movie: TraktMovie,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrendingShow {
    #[serde(default)]
    pub watchers: u64,
    pub show: TraktShow,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResult {
    #[serde(rename = "type")]
    pub result_type: String,
    pub score: Option<f64>,
    pub movie: Option<TraktMovie>,
    pub show: Option<TraktShow>,
}
