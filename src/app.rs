use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, sync::broadcast};
use tracing::info;

use ridehail_api::{create_routes, AppState};
use ridehail_core::config::AppConfig;
use ridehail_core::providers::InMemoryHistorySink;
use ridehail_dispatcher::{Dispatcher, DriverPool, NearestDriverStrategy};

/// Wires the driver pool, dispatcher and HTTP surface together.
pub struct Application {
    config: AppConfig,
    dispatcher: Arc<Dispatcher>,
}

impl Application {
    pub fn new(config: AppConfig) -> Result<Self> {
        info!(
            driver_count = config.pool.driver_count,
            "seeding driver pool"
        );
        let pool = Arc::new(DriverPool::seed(&config.pool));
        let strategy = Arc::new(NearestDriverStrategy::new(
            config.dispatcher.average_speed_kmh,
        ));
        let history = Arc::new(InMemoryHistorySink::new());
        let dispatcher = Dispatcher::new(config.dispatcher.clone(), pool, strategy, history);

        Ok(Self { config, dispatcher })
    }

    /// Serve until the shutdown signal fires, then wind the dispatcher
    /// down.
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let router = create_routes(AppState {
            dispatcher: Arc::clone(&self.dispatcher),
        });

        let listener = TcpListener::bind(&self.config.server.bind_address)
            .await
            .with_context(|| format!("failed to bind {}", self.config.server.bind_address))?;
        info!(address = %listener.local_addr()?, "listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await
            .context("server error")?;

        info!("server stopped, cancelling live rides");
        self.dispatcher.shutdown().await;
        Ok(())
    }
}
