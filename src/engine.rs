//! Wires stores, model, publisher and coordinator from a resolved [`AppConfig`].

use crate::catalog::{CatalogStore, SqliteCatalogStore};
use crate::clock::SystemClock;
use crate::config::AppConfig;
use crate::cooldown::{CooldownLedger, CooldownPolicy, SqliteCooldownStore};
use crate::curator::{CuratorSettings, LlmCurator};
use crate::generator::{CoordinatorSettings, RunCoordinator};
use crate::llm::{LlmProvider, OllamaProvider};
use crate::playlist::{DurationTolerance, PlaylistAssembler};
use crate::publisher::{ChannelPublisher, TunarrPublisher};
use crate::selector::CandidateSelector;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

pub struct Engine {
    pub config: AppConfig,
    pub catalog: Arc<dyn CatalogStore>,
    pub ledger: Arc<CooldownLedger>,
    pub coordinator: Arc<RunCoordinator>,
}

impl Engine {
    pub fn open(config: AppConfig) -> Result<Self> {
        let catalog_path = config.catalog_db_path();
        info!("Opening SQLite catalog database at {:?}...", catalog_path);
        let catalog: Arc<dyn CatalogStore> = Arc::new(
            SqliteCatalogStore::new(&catalog_path).context("Failed to open catalog database")?,
        );

        let cooldown_path = config.cooldown_db_path();
        info!("Opening SQLite cooldown database at {:?}...", cooldown_path);
        let cooldowns = SqliteCooldownStore::new(&cooldown_path)
            .context("Failed to open cooldown database")?;
        let ledger = Arc::new(CooldownLedger::new(
            Arc::new(cooldowns),
            CooldownPolicy::new(&config.cooldown),
            Arc::new(SystemClock),
        ));

        let provider: Option<Arc<dyn LlmProvider>> = if config.ollama.enabled {
            info!(
                url = %config.ollama.url,
                model = %config.ollama.model,
                "Using Ollama for curation"
            );
            Some(Arc::new(
                OllamaProvider::new(&config.ollama.url, &config.ollama.model)
                    .with_num_ctx(config.ollama.num_ctx),
            ))
        } else {
            info!("No model configured, curation uses greedy selection only");
            None
        };
        let curator = LlmCurator::new(
            provider,
            CuratorSettings::from_config(&config.generation, &config.ollama),
        );

        let publisher: Arc<dyn ChannelPublisher> = Arc::new(TunarrPublisher::new(&config.tunarr));

        let coordinator = Arc::new(RunCoordinator::new(
            CandidateSelector::new(Arc::clone(&catalog)),
            Arc::clone(&ledger),
            curator,
            PlaylistAssembler::new(DurationTolerance::new(config.generation.duration_tolerance)),
            publisher,
            CoordinatorSettings::from_config(&config.generation),
        ));

        Ok(Self {
            config,
            catalog,
            ledger,
            coordinator,
        })
    }
}
