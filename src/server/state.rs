use axum::extract::FromRef;

use crate::cooldown::CooldownLedger;
use crate::scheduler::SchedulerHandle;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type SharedCooldownLedger = Arc<CooldownLedger>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub scheduler: SchedulerHandle,
    pub ledger: SharedCooldownLedger,
    pub hash: String,
}

impl ServerState {
    pub fn new(config: ServerConfig, scheduler: SchedulerHandle, ledger: SharedCooldownLedger) -> Self {
        ServerState {
            config,
            start_time: Instant::now(),
            scheduler,
            ledger,
            hash: env!("GIT_HASH").to_owned(),
        }
    }
}

impl FromRef<ServerState> for SchedulerHandle {
    fn from_ref(input: &ServerState) -> Self {
        input.scheduler.clone()
    }
}

impl FromRef<ServerState> for SharedCooldownLedger {
    fn from_ref(input: &ServerState) -> Self {
        input.ledger.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
