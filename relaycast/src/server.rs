//! Server lifecycle management
//!
//! Starts the HTTP API and the consistency sweep, then on SIGINT/SIGTERM
//! stops them in order and sweeps every relay worker before exit.

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use relaycast_core::Config;
use relaycast_livestream::SimulcastService;

/// How long in-flight HTTP requests get to finish after a shutdown signal.
const HTTP_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

pub struct RelaycastServer {
    config: Config,
    simulcast: Arc<SimulcastService>,
}

impl RelaycastServer {
    pub const fn new(config: Config, simulcast: Arc<SimulcastService>) -> Self {
        Self { config, simulcast }
    }

    /// Start all components and wait for a shutdown signal
    pub async fn start(self) -> anyhow::Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let sweep_cancel = CancellationToken::new();

        let sweep_handle = match self.config.sweep.interval() {
            Some(interval) => {
                info!(interval = ?interval, "Consistency sweep enabled");
                Some(self.simulcast.spawn_consistency_sweep(interval, sweep_cancel.clone()))
            }
            None => {
                info!("Consistency sweep disabled");
                None
            }
        };

        let mut http_handle = self.start_http_server(shutdown_rx).await?;
        info!("All components started");

        let http_exited = tokio::select! {
            _ = &mut http_handle => {
                error!("HTTP server stopped unexpectedly");
                true
            }
            () = shutdown_signal() => {
                info!("Shutdown signal received, starting graceful shutdown...");
                false
            }
        };

        let _ = shutdown_tx.send(true);
        if !http_exited {
            match tokio::time::timeout(HTTP_DRAIN_TIMEOUT, &mut http_handle).await {
                Ok(_) => info!("HTTP server drained"),
                Err(_) => {
                    warn!("HTTP server did not drain within {:?}", HTTP_DRAIN_TIMEOUT);
                    http_handle.abort();
                }
            }
        }

        self.shutdown(sweep_cancel, sweep_handle).await;
        Ok(())
    }

    async fn start_http_server(&self, shutdown_rx: watch::Receiver<bool>) -> anyhow::Result<JoinHandle<()>> {
        let http_address = self.config.http_address();
        let listener = tokio::net::TcpListener::bind(&http_address)
            .await
            .with_context(|| format!("failed to bind HTTP address {http_address}"))?;
        info!("HTTP server listening on {}", http_address);

        let router = relaycast_api::http::create_router(Arc::clone(&self.simulcast));

        Ok(tokio::spawn(async move {
            let mut rx = shutdown_rx;
            let graceful = async move {
                let _ = rx.changed().await;
            };

            if let Err(e) = axum::serve(listener, router).with_graceful_shutdown(graceful).await {
                error!("HTTP server error: {}", e);
            }
            info!("HTTP server shut down");
        }))
    }

    async fn shutdown(&self, sweep_cancel: CancellationToken, sweep_handle: Option<JoinHandle<()>>) {
        info!("Shutting down relaycast...");

        // 1. Stop the sweep so it cannot restart anything
        sweep_cancel.cancel();
        if let Some(handle) = sweep_handle {
            if let Err(e) = handle.await {
                warn!("Consistency sweep task failed: {}", e);
            }
        }

        // 2. Stop every relay worker
        let failures = self.simulcast.shutdown().await;
        if failures.is_empty() {
            info!("Relay workers stopped");
        } else {
            warn!("{} relay worker(s) had to be killed or failed", failures.len());
        }

        info!("relaycast stopped");
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT/Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received Ctrl+C"); }
        () = terminate => { info!("Received SIGTERM"); }
    }
}
