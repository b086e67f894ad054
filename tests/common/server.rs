//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own engine and scheduler.

use super::constants::*;
use super::engine::TestEngine;
use program_director::config::SchedulerSettings;
use program_director::scheduler::create_scheduler;
use program_director::server::{make_app, RequestsLoggingLevel, ServerConfig, ServerState};
use program_director::ThemeSpec;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Test server instance wrapping a [`TestEngine`]
///
/// The scheduler is created disabled, so themes only run when a test triggers
/// them. When dropped, the server and scheduler shut down.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The engine behind the server, for seeding and inspecting state
    pub engine: TestEngine,

    /// Client with the suite's default timeout
    pub client: reqwest::Client,

    shutdown: CancellationToken,
}

impl TestServer {
    /// Spawns a server over `engine` serving `themes`, on a random port
    ///
    /// # Panics
    ///
    /// Panics if the scheduler rejects the themes, port binding fails, or the
    /// server doesn't become ready within timeout.
    pub async fn spawn(engine: TestEngine, themes: Vec<ThemeSpec>) -> Self {
        let shutdown = CancellationToken::new();
        let settings = SchedulerSettings {
            enabled: false,
            shutdown_grace_secs: 1,
            ..Default::default()
        };
        let (mut scheduler, handle) = create_scheduler(
            engine.coordinator.clone(),
            &themes,
            &settings,
            shutdown.clone(),
        )
        .expect("Failed to create scheduler");
        tokio::spawn(async move { scheduler.run().await });

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let config = ServerConfig {
            requests_logging_level: RequestsLoggingLevel::None,
            port,
        };
        let app = make_app(ServerState::new(config, handle, engine.ledger.clone()));

        let server_shutdown = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
                .await
                .expect("Server failed");
        });

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        let server = Self {
            base_url,
            engine,
            client,
            shutdown,
        };
        server.wait_for_ready().await;
        server
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed")
    }

    pub async fn post(&self, path: &str) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .send()
            .await
            .expect("POST request failed")
    }

    /// Waits for the server to become ready by polling /health
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(self.url("/health")).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_MS)).await,
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
