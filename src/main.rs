use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Import modules from the library crate
use program_director::catalog::MediaKind;
use program_director::config::{AppConfig, CliConfig, FileConfig};
use program_director::cooldown::{CooldownFilter, HistoryFilter};
use program_director::generator::RunStatus;
use program_director::scheduler::{create_scheduler, ScheduledTheme};
use program_director::server::{metrics, run_server, RequestsLoggingLevel, ServerConfig, ServerState};
use program_director::trakt::{TraktClient, DEFAULT_LIMIT};
use program_director::{Engine, ThemeSpec};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

fn parse_dir(s: &str) -> Result<PathBuf, String> {
    let path = parse_path(s)?;
    if !path.exists() {
        return Err(format!("Directory does not exist: {}", s));
    }
    if !path.is_dir() {
        return Err(format!("Path is not a directory: {}", s));
    }
    Ok(path)
}

#[derive(Parser, Debug)]
#[clap(version, about = "Themed channel programming for Tunarr")]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory containing database files (catalog.db, cooldown.db).
    /// Can also be specified in config file.
    #[clap(long, value_parser = parse_dir)]
    pub db_dir: Option<PathBuf>,

    /// The port to listen on when serving.
    #[clap(short, long)]
    pub port: Option<u16>,

    /// Base URL of the Ollama server.
    #[clap(long)]
    pub ollama_url: Option<String>,

    /// Model used for curation.
    #[clap(long)]
    pub ollama_model: Option<String>,

    /// Base URL of the Tunarr server.
    #[clap(long)]
    pub tunarr_url: Option<String>,

    /// Trakt API client id, needed by the `trakt` commands.
    #[clap(long)]
    pub trakt_client_id: Option<String>,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the scheduler and the HTTP status surface until interrupted.
    Serve,

    /// Generate playlists once, for every theme or a single one.
    Generate {
        /// Only generate this theme.
        #[clap(long)]
        theme: Option<String>,

        /// Build and print the playlists without publishing or recording plays.
        #[clap(long)]
        dry_run: bool,
    },

    /// List cooldown records.
    Cooldowns {
        /// Only items still inside their cooldown window.
        #[clap(long)]
        active: bool,

        /// Filter by media type (movie, series, anime).
        #[clap(long)]
        media_type: Option<String>,

        #[clap(long, default_value_t = 50)]
        limit: usize,
    },

    /// List play history, newest first.
    History {
        #[clap(long)]
        theme: Option<String>,

        #[clap(long)]
        channel: Option<String>,

        #[clap(long, default_value_t = 50)]
        limit: usize,
    },

    /// List configured themes and their next scheduled run.
    Themes,

    /// Delete cooldown records that have expired. History is kept.
    PurgeCooldowns,

    /// Query Trakt.tv for trending, popular or searched titles.
    Trakt {
        #[clap(subcommand)]
        command: TraktCommand,
    },
}

#[derive(Subcommand, Debug)]
enum TraktCommand {
    /// Titles being watched right now.
    Trending {
        #[clap(flatten)]
        kinds: TraktKinds,
        #[clap(short, long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,
    },

    /// Most popular titles overall.
    Popular {
        #[clap(flatten)]
        kinds: TraktKinds,
        #[clap(short, long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,
    },

    /// Search movies and shows by title or keyword.
    Search {
        #[clap(short, long)]
        query: String,
        #[clap(short, long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,
    },
}

/// Neither flag means both.
#[derive(clap::Args, Debug)]
struct TraktKinds {
    #[clap(long)]
    movies: bool,
    #[clap(long)]
    shows: bool,
}

impl TraktKinds {
    fn resolve(&self) -> (bool, bool) {
        if !self.movies && !self.shows {
            (true, true)
        } else {
            (self.movies, self.shows)
        }
    }
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_dir: self.db_dir.clone(),
            port: self.port,
            ollama_url: self.ollama_url.clone(),
            ollama_model: self.ollama_model.clone(),
            tunarr_url: self.tunarr_url.clone(),
            trakt_client_id: self.trakt_client_id.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let app_config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    match cli_args.command {
        Command::Serve => {
            let engine = Engine::open(app_config)?;
            serve(engine, cli_args.logging_level).await
        }
        Command::Generate { theme, dry_run } => {
            let engine = Engine::open(app_config)?;
            generate(engine, theme, dry_run).await
        }
        Command::Cooldowns {
            active,
            media_type,
            limit,
        } => {
            let engine = Engine::open(app_config)?;
            list_cooldowns(&engine, active, media_type, limit)
        }
        Command::History {
            theme,
            channel,
            limit,
        } => {
            let engine = Engine::open(app_config)?;
            list_history(&engine, theme, channel, limit)
        }
        Command::Themes => list_themes(&app_config),
        Command::PurgeCooldowns => {
            let engine = Engine::open(app_config)?;
            let purged = engine.ledger.purge_expired()?;
            println!("Purged {} expired cooldown records", purged);
            Ok(())
        }
        Command::Trakt { command } => {
            let client = TraktClient::new(&app_config.trakt)?;
            trakt(&client, command).await
        }
    }
}

async fn serve(engine: Engine, logging_level: RequestsLoggingLevel) -> Result<()> {
    info!("Initializing metrics...");
    metrics::init_metrics();
    if let Ok(active) = engine.ledger.count_active() {
        metrics::set_active_cooldowns(active);
    }

    let shutdown_token = CancellationToken::new();
    let (mut scheduler, scheduler_handle) = create_scheduler(
        engine.coordinator.clone(),
        &engine.config.themes,
        &engine.config.scheduler,
        shutdown_token.clone(),
    )?;

    let state = ServerState::new(
        ServerConfig {
            requests_logging_level: logging_level,
            port: engine.config.port,
        },
        scheduler_handle,
        engine.ledger.clone(),
    );

    let scheduler_task = tokio::spawn(async move { scheduler.run().await });

    info!("Ready to serve at port {}!", engine.config.port);

    let result = tokio::select! {
        result = run_server(state, shutdown_token.clone()) => {
            info!("HTTP server stopped: {:?}", result);
            result
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, initiating graceful shutdown");
            Ok(())
        }
    };

    // The scheduler cancels in-flight runs and waits out its grace period.
    shutdown_token.cancel();
    if let Err(e) = scheduler_task.await {
        error!("Scheduler task ended abnormally: {}", e);
    }
    result
}

async fn generate(engine: Engine, theme: Option<String>, dry_run: bool) -> Result<()> {
    let themes: Vec<ThemeSpec> = match theme {
        Some(name) => vec![engine
            .config
            .theme(&name)
            .cloned()
            .ok_or_else(|| anyhow!("Unknown theme: {}", name))?],
        None => engine.config.themes.clone(),
    };
    if themes.is_empty() {
        bail!("No themes configured");
    }

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl+C, cancelling runs");
            ctrl_c_token.cancel();
        }
    });

    let results = engine
        .coordinator
        .generate_all(&themes, dry_run, cancel)
        .await;

    for result in &results {
        println!("{}", result.summary());
        if let Some(playlist) = result.playlist.as_ref().filter(|_| dry_run) {
            for (i, item) in playlist.items.iter().enumerate() {
                println!(
                    "    {:>2}. {} ({}) {}m score={:.1}",
                    i + 1,
                    item.media.title,
                    item.media
                        .year
                        .map(|y| y.to_string())
                        .unwrap_or_else(|| "?".to_string()),
                    item.media.runtime_minutes,
                    item.score
                );
            }
        }
    }

    let failed = results
        .iter()
        .filter(|r| r.status == RunStatus::Failed)
        .count();
    if failed > 0 {
        bail!("{} of {} runs failed", failed, results.len());
    }
    Ok(())
}

fn list_cooldowns(
    engine: &Engine,
    active_only: bool,
    media_type: Option<String>,
    limit: usize,
) -> Result<()> {
    let media_type = match media_type {
        Some(raw) => {
            Some(MediaKind::parse(&raw).ok_or_else(|| anyhow!("Unknown media type: {}", raw))?)
        }
        None => None,
    };
    let filter = CooldownFilter {
        media_type,
        active_only,
        limit: Some(limit),
        ..Default::default()
    };

    let now = Utc::now();
    let cooldowns = engine.ledger.list_cooldowns(&filter)?;
    if cooldowns.is_empty() {
        println!("No cooldown records");
        return Ok(());
    }
    for record in cooldowns {
        let title = engine
            .catalog
            .get_media(record.media_id)?
            .map(|m| m.title)
            .unwrap_or_else(|| format!("#{}", record.media_id));
        println!(
            "{:<40} {:<7} played {}  replay {}{}",
            title,
            record.media_type.as_str(),
            record.last_played_at.format("%Y-%m-%d %H:%M"),
            record.can_replay_at.format("%Y-%m-%d %H:%M"),
            if record.is_active(now) { "  [active]" } else { "" }
        );
    }
    Ok(())
}

fn list_history(
    engine: &Engine,
    theme: Option<String>,
    channel: Option<String>,
    limit: usize,
) -> Result<()> {
    let filter = HistoryFilter {
        theme_name: theme,
        channel_id: channel,
        limit: Some(limit),
        ..Default::default()
    };
    let history = engine.ledger.list_history(&filter)?;
    if history.is_empty() {
        println!("No plays recorded");
        return Ok(());
    }
    for entry in history {
        println!(
            "{}  {:<24} {:<12} {} ({})",
            entry.played_at.format("%Y-%m-%d %H:%M"),
            entry.theme_name,
            entry.channel_id,
            entry.media_title,
            entry.media_type.as_str()
        );
    }
    Ok(())
}

fn list_themes(config: &AppConfig) -> Result<()> {
    if config.themes.is_empty() {
        println!("No themes configured");
        return Ok(());
    }
    let now = Utc::now();
    for theme in &config.themes {
        let scheduled = ScheduledTheme::new(theme.clone(), &config.scheduler.default_schedule)?;
        let next = if config.scheduler.enabled {
            scheduled
                .schedule
                .next_after(now)
                .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
                .unwrap_or_else(|| "never".to_string())
        } else {
            "disabled".to_string()
        };
        println!(
            "{:<24} channel={:<12} {}m  schedule=\"{}\"  next={}",
            theme.name, theme.channel_id, theme.duration_minutes, scheduled.schedule, next
        );
    }
    Ok(())
}

/// First 100 characters of an overview, for one-line listings.
fn short_overview(overview: Option<&str>) -> Option<String> {
    let overview = overview.map(str::trim).filter(|o| !o.is_empty())?;
    if overview.chars().count() > 100 {
        Some(format!("{}...", overview.chars().take(100).collect::<String>()))
    } else {
        Some(overview.to_string())
    }
}

fn year_label(year: Option<i32>) -> String {
    year.map(|y| y.to_string()).unwrap_or_else(|| "?".to_string())
}

fn print_heading(title: &str) {
    println!();
    println!("{}", title);
    println!("{}", "=".repeat(title.len()));
}

async fn trakt(client: &TraktClient, command: TraktCommand) -> Result<()> {
    match command {
        TraktCommand::Trending { kinds, limit } => {
            let (movies, shows) = kinds.resolve();
            if movies {
                info!(limit, "Fetching trending movies");
                let trending = client.trending_movies(limit).await?;
                print_heading("Trending Movies");
                for (i, entry) in trending.iter().enumerate() {
                    println!(
                        "{:>2}. {} ({}) - Watchers: {}, Rating: {:.1}/10",
                        i + 1,
                        entry.movie.title,
                        year_label(entry.movie.year),
                        entry.watchers,
                        entry.movie.rating
                    );
                    if let Some(overview) = short_overview(entry.movie.overview.as_deref()) {
                        println!("    {}", overview);
                    }
                }
            }
            if shows {
                info!(limit, "Fetching trending shows");
                let trending = client.trending_shows(limit).await?;
                print_heading("Trending TV Shows");
                for (i, entry) in trending.iter().enumerate() {
                    println!(
                        "{:>2}. {} ({}) - Watchers: {}, Rating: {:.1}/10",
                        i + 1,
                        entry.show.title,
                        year_label(entry.show.year),
                        entry.watchers,
                        entry.show.rating
                    );
                    if let Some(overview) = short_overview(entry.show.overview.as_deref()) {
                        println!("    {}", overview);
                    }
                }
            }
        }
        TraktCommand::Popular { kinds, limit } => {
            let (movies, shows) = kinds.resolve();
            if movies {
                info!(limit, "Fetching popular movies");
                let popular = client.popular_movies(limit).await?;
                print_heading("Popular Movies");
                for (i, movie) in popular.iter().enumerate() {
                    println!(
                        "{:>2}. {} ({}) - Rating: {:.1}/10",
                        i + 1,
                        movie.title,
                        year_label(movie.year),
                        movie.rating
                    );
                    if let Some(overview) = short_overview(movie.overview.as_deref()) {
                        println!("    {}", overview);
                    }
                }
            }
            if shows {
                info!(limit, "Fetching popular shows");
                let popular = client.popular_shows(limit).await?;
                print_heading("Popular TV Shows");
                for (i, show) in popular.iter().enumerate() {
                    println!(
                        "{:>2}. {} ({}) - Rating: {:.1}/10",
                        i + 1,
                        show.title,
                        year_label(show.year),
                        show.rating
                    );
                    if let Some(overview) = short_overview(show.overview.as_deref()) {
                        println!("    {}", overview);
                    }
                }
            }
        }
        TraktCommand::Search { query, limit } => {
            info!(query = %query, limit, "Searching Trakt");
            let results = client.search(&query, limit).await?;
            print_heading(&format!("Search Results for '{}'", query));
            if results.is_empty() {
                println!("No results found");
            }
            for (i, result) in results.iter().enumerate() {
                let (label, title, year, rating, overview) = match (&result.movie, &result.show) {
                    (Some(m), _) => ("Movie", &m.title, m.year, m.rating, m.overview.as_deref()),
                    (None, Some(s)) => ("Show", &s.title, s.year, s.rating, s.overview.as_deref()),
                    (None, None) => continue,
                };
                println!(
                    "{:>2}. [{}] {} ({}) - Rating: {:.1}/10, Score: {:.2}",
                    i + 1,
                    label,
                    title,
                    year_label(year),
                    rating,
                    result.score.unwrap_or(0.0)
                );
                if let Some(overview) = short_overview(overview) {
                    println!("    {}", overview);
                }
            }
        }
    }
    Ok(())
}
