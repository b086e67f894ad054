mod file_config;

pub use file_config::{
    CooldownConfig, FileConfig, GenerationConfig, OllamaConfig, SchedulerConfig, ServerConfig,
    ThemeConfig, TraktConfig, TunarrConfig,
};

use crate::catalog::MediaKind;
use crate::scheduler::Schedule;
use crate::theme::{ThemeSpec, DEFAULT_THEME_DURATION_MINUTES, DEFAULT_THEME_MAX_ITEMS};
use anyhow::{anyhow, bail, Context, Result};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments that can be used for config resolution.
/// TOML values take precedence over these.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: Option<u16>,
    pub ollama_url: Option<String>,
    pub ollama_model: Option<String>,
    pub tunarr_url: Option<String>,
    pub trakt_client_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub ollama: OllamaSettings,
    pub tunarr: TunarrSettings,
    pub trakt: TraktSettings,
    pub cooldown: CooldownSettings,
    pub generation: GenerationSettings,
    pub scheduler: SchedulerSettings,
    pub port: u16,
    pub themes: Vec<ThemeSpec>,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| anyhow!("db_dir must be specified via --db-dir or in config file"))?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let ollama_file = file.ollama.unwrap_or_default();
        let ollama_url = ollama_file
            .url
            .or_else(|| cli.ollama_url.clone())
            .unwrap_or_else(|| "http://ollama:11434".to_string());
        let ollama = OllamaSettings {
            enabled: ollama_file.enabled.unwrap_or(true) && !ollama_url.trim().is_empty(),
            url: ollama_url.trim_end_matches('/').to_string(),
            model: ollama_file
                .model
                .or_else(|| cli.ollama_model.clone())
                .unwrap_or_else(|| "dolphin-llama3:8b".to_string()),
            temperature: ollama_file.temperature.unwrap_or(0.7),
            num_ctx: ollama_file.num_ctx.unwrap_or(8192),
            timeout_secs: ollama_file.timeout_secs.unwrap_or(300),
        };

        let tunarr_file = file.tunarr.unwrap_or_default();
        let tunarr = TunarrSettings {
            url: tunarr_file
                .url
                .or_else(|| cli.tunarr_url.clone())
                .unwrap_or_else(|| "http://tunarr:8000".to_string())
                .trim_end_matches('/')
                .to_string(),
            timeout_secs: tunarr_file.timeout_secs.unwrap_or(30),
            media_source: tunarr_file
                .media_source
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
        };

        let trakt_file = file.trakt.unwrap_or_default();
        let trakt = TraktSettings {
            url: trakt_file
                .url
                .unwrap_or_else(|| "https://api.trakt.tv".to_string())
                .trim_end_matches('/')
                .to_string(),
            client_id: trakt_file
                .client_id
                .or_else(|| cli.trakt_client_id.clone())
                .filter(|id| !id.trim().is_empty()),
            client_secret: trakt_file.client_secret,
            timeout_secs: trakt_file.timeout_secs.unwrap_or(30),
        };

        let cd_file = file.cooldown.unwrap_or_default();
        let defaults = CooldownSettings::default();
        let cooldown = CooldownSettings {
            movie_days: cd_file.movie_days.unwrap_or(defaults.movie_days),
            series_days: cd_file.series_days.unwrap_or(defaults.series_days),
            anime_days: cd_file.anime_days.unwrap_or(defaults.anime_days),
        };

        let gen_file = file.generation.unwrap_or_default();
        let defaults = GenerationSettings::default();
        let generation = GenerationSettings {
            duration_tolerance: gen_file
                .duration_tolerance
                .unwrap_or(defaults.duration_tolerance),
            run_timeout_secs: gen_file.run_timeout_secs.unwrap_or(defaults.run_timeout_secs),
            max_concurrent_themes: gen_file
                .max_concurrent_themes
                .unwrap_or(defaults.max_concurrent_themes)
                .max(1),
            max_concurrent_curations: gen_file
                .max_concurrent_curations
                .unwrap_or(defaults.max_concurrent_curations)
                .max(1),
            max_repair_attempts: gen_file
                .max_repair_attempts
                .unwrap_or(defaults.max_repair_attempts),
            max_transport_retries: gen_file
                .max_transport_retries
                .unwrap_or(defaults.max_transport_retries),
            initial_backoff_ms: gen_file
                .initial_backoff_ms
                .unwrap_or(defaults.initial_backoff_ms),
            max_backoff_ms: gen_file.max_backoff_ms.unwrap_or(defaults.max_backoff_ms),
            backoff_multiplier: gen_file
                .backoff_multiplier
                .unwrap_or(defaults.backoff_multiplier),
            max_candidates_in_prompt: gen_file
                .max_candidates_in_prompt
                .unwrap_or(defaults.max_candidates_in_prompt),
        };
        if !(0.0..1.0).contains(&generation.duration_tolerance) {
            bail!(
                "generation.duration_tolerance must be in [0, 1), got {}",
                generation.duration_tolerance
            );
        }

        let sched_file = file.scheduler.unwrap_or_default();
        let scheduler = SchedulerSettings {
            enabled: sched_file.enabled.unwrap_or(true),
            default_schedule: sched_file
                .default_schedule
                .unwrap_or_else(|| "0 2 * * *".to_string()),
            shutdown_grace_secs: sched_file.shutdown_grace_secs.unwrap_or(30),
        };
        Schedule::parse(&scheduler.default_schedule)
            .context("Invalid scheduler.default_schedule")?;

        let port = file
            .server
            .and_then(|s| s.port)
            .or(cli.port)
            .unwrap_or(8080);

        let mut themes = Vec::with_capacity(file.themes.len());
        let mut seen = HashSet::new();
        for theme in file.themes {
            let spec = resolve_theme(theme)?;
            if !seen.insert(spec.name.clone()) {
                bail!("Duplicate theme name: {}", spec.name);
            }
            themes.push(spec);
        }

        Ok(Self {
            db_dir,
            ollama,
            tunarr,
            trakt,
            cooldown,
            generation,
            scheduler,
            port,
            themes,
        })
    }

    pub fn catalog_db_path(&self) -> PathBuf {
        self.db_dir.join("catalog.db")
    }

    pub fn cooldown_db_path(&self) -> PathBuf {
        self.db_dir.join("cooldown.db")
    }

    pub fn theme(&self, name: &str) -> Option<&ThemeSpec> {
        self.themes.iter().find(|t| t.name == name)
    }
}

fn resolve_theme(theme: ThemeConfig) -> Result<ThemeSpec> {
    let name = theme.name.trim().to_string();
    if name.is_empty() {
        bail!("Every theme needs a non-empty name");
    }
    let channel_id = theme.channel_id.trim().to_string();
    if channel_id.is_empty() {
        bail!("Theme {} has no channel_id", name);
    }

    let mut media_kinds = Vec::new();
    for raw in &theme.media_types {
        match MediaKind::parse(raw) {
            Some(kind) if !media_kinds.contains(&kind) => media_kinds.push(kind),
            Some(_) => {}
            None => bail!("Theme {} has unknown media type: {}", name, raw),
        }
    }
    if media_kinds.is_empty() {
        bail!("Theme {} must allow at least one media type", name);
    }

    if let Some(expr) = &theme.schedule {
        Schedule::parse(expr).with_context(|| format!("Invalid schedule for theme {}", name))?;
    }

    let duration_minutes = theme.duration.unwrap_or(DEFAULT_THEME_DURATION_MINUTES);
    if duration_minutes == 0 {
        bail!("Theme {} must have a positive duration", name);
    }
    let max_items = theme.max_items.unwrap_or(DEFAULT_THEME_MAX_ITEMS);
    if max_items == 0 {
        bail!("Theme {} must allow at least one item (max_items)", name);
    }

    Ok(ThemeSpec {
        description: theme.description.unwrap_or_default(),
        channel_id,
        schedule: theme.schedule,
        media_kinds,
        genres: theme.genres,
        keywords: theme.keywords,
        min_rating: theme.min_rating.unwrap_or(0.0),
        max_items,
        duration_minutes,
        name,
    })
}

#[derive(Debug, Clone)]
pub struct OllamaSettings {
    pub enabled: bool,
    pub url: String,
    pub model: String,
    pub temperature: f32,
    pub num_ctx: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct TunarrSettings {
    pub url: String,
    pub timeout_secs: u64,
    /// Media source programs point at; the first one Tunarr lists when unset.
    pub media_source: Option<String>,
}

/// Optional; only the `trakt` CLI commands use it.
#[derive(Debug, Clone)]
pub struct TraktSettings {
    pub url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct CooldownSettings {
    pub movie_days: u32,
    pub series_days: u32,
    pub anime_days: u32,
}

impl Default for CooldownSettings {
    fn default() -> Self {
        Self {
            movie_days: 30,
            series_days: 14,
            anime_days: 14,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationSettings {
    /// Fraction of the target duration allowed on either side.
    pub duration_tolerance: f64,
    pub run_timeout_secs: u64,
    pub max_concurrent_themes: usize,
    pub max_concurrent_curations: usize,
    /// Corrective re-prompts after an unparseable model response.
    pub max_repair_attempts: u32,
    pub max_transport_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub max_candidates_in_prompt: usize,
}

impl GenerationSettings {
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            duration_tolerance: 0.15,
            run_timeout_secs: 1800,
            max_concurrent_themes: 2,
            max_concurrent_curations: 1,
            max_repair_attempts: 2,
            max_transport_retries: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 10_000,
            backoff_multiplier: 2.0,
            max_candidates_in_prompt: 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub enabled: bool,
    pub default_schedule: String,
    pub shutdown_grace_secs: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            default_schedule: "0 2 * * *".to_string(),
            shutdown_grace_secs: 30,
        }
    }
}
