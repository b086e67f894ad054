pub mod config;
mod generation_routes;
mod http_layers;
pub mod metrics;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use http_layers::*;
use generation_routes::generation_routes;
pub use server::{make_app, run_server};
pub use state::ServerState;
