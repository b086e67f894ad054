//! Trakt.tv lookups for trending, popular and searched titles.

mod client;
mod models;

pub use client::{TraktClient, DEFAULT_LIMIT};
pub use models::{SearchResult, TraktIds, TraktMovie, TraktShow, TrendingMovie, TrendingShow};
