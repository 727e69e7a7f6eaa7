//! API Server

use super::{
    handlers::AppState, middleware::create_cors_layer, routes::create_router,
    security::CredentialRegistry,
};
use crate::config::ApiConfig;
use crate::engine::CrashEngine;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};

pub struct ApiServer {
    config: ApiConfig,
    engine: Arc<CrashEngine>,
    enable_metrics: bool,
}

impl ApiServer {
    pub fn new(config: ApiConfig, engine: Arc<CrashEngine>) -> Self {
        Self {
            config,
            engine,
            enable_metrics: true,
        }
    }

    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.enable_metrics = enabled;
        self
    }

    /// Serve until Ctrl+C or SIGTERM.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let app = self.create_app();
        let addr = self.get_socket_addr()?;

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Balloonfly API listening on http://{}", addr);
        self.log_server_info();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("API server stopped gracefully");
        Ok(())
    }

    /// Router plus the middleware stack
    pub fn create_app(&self) -> axum::Router {
        let mut state = AppState::new(Arc::clone(&self.engine))
            .with_credentials(CredentialRegistry::from_config(&self.config.credentials));
        state.metrics_enabled = self.enable_metrics;

        create_router(Arc::new(state))
            // CORS before timeout so preflight is answered
            .layer(create_cors_layer(self.config.allowed_origins.clone()))
            // A timed-out response does not cancel the engine call already
            // running on the blocking pool, so a 408 on a mutating route may
            // still have committed. Clients re-read the bet or round before
            // retrying.
            .layer(TimeoutLayer::new(Duration::from_secs(
                self.config.request_timeout_secs,
            )))
            .layer(TraceLayer::new_for_http())
    }

    fn get_socket_addr(&self) -> Result<SocketAddr, Box<dyn std::error::Error>> {
        Ok(SocketAddr::from((
            self.config.host.parse::<std::net::IpAddr>()?,
            self.config.port,
        )))
    }

    fn log_server_info(&self) {
        info!("   Admin: {}", self.engine.admin());
        info!("   House account: {}", self.engine.house());
        info!("   House edge: {} bps", self.engine.game_config().house_edge_bps);
        info!("   CORS: {:?}", self.config.allowed_origins);
        info!("   API credentials: {}", self.config.credentials.len());
        if self.config.credentials.is_empty() {
            warn!("no API credentials configured; every mutating route will refuse requests");
        }
        info!("   Request timeout: {}s", self.config.request_timeout_secs);
        info!("   Metrics enabled: {}", self.enable_metrics);
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
