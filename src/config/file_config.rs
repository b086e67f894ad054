use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,

    pub ollama: Option<OllamaConfig>,
    pub tunarr: Option<TunarrConfig>,
    pub trakt: Option<TraktConfig>,
    pub cooldown: Option<CooldownConfig>,
    pub generation: Option<GenerationConfig>,
    pub scheduler: Option<SchedulerConfig>,
    pub server: Option<ServerConfig>,
    pub themes: Vec<ThemeConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct OllamaConfig {
    pub enabled: Option<bool>,
    pub url: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub num_ctx: Option<u32>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct TunarrConfig {
    pub url: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Name of the Tunarr media source that serves the catalog's files.
    pub media_source: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct TraktConfig {
    pub url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct CooldownConfig {
    pub movie_days: Option<u32>,
    pub series_days: Option<u32>,
    pub anime_days: Option<u32>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct GenerationConfig {
    pub duration_tolerance: Option<f64>,
    pub run_timeout_secs: Option<u64>,
    pub max_concurrent_themes: Option<usize>,
    pub max_concurrent_curations: Option<usize>,
    pub max_repair_attempts: Option<u32>,
    pub max_transport_retries: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
    pub backoff_multiplier: Option<f64>,
    pub max_candidates_in_prompt: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: Option<bool>,
    pub default_schedule: Option<String>,
    pub shutdown_grace_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: Option<u16>,
}

/// One `[[themes]]` table.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ThemeConfig {
    pub name: String,
    pub description: Option<String>,
    pub channel_id: String,
    pub schedule: Option<String>,
    pub media_types: Vec<String>,
    pub genres: Vec<String>,
    pub keywords: Vec<String>,
    pub min_rating: Option<f64>,
    pub max_items: Option<usize>,
    /// Target duration in minutes.
    pub duration: Option<u32>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::parse(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
