//! Pressmill update server.
//!
//! Serves WordPress plugin metadata and package downloads over the
//! update protocol's query-argument API, gated by a static shared-secret
//! license key. Package metadata reads are backed by the tiered cache in
//! `pressmill-cache`; a cache failure is invisible to clients because
//! the package directory remains the authoritative source.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod license;
pub mod packages;
pub mod request;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::Router;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Server builder for constructing and running the update server.
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    /// Create a new server with the given configuration.
    pub async fn new(config: ServerConfig) -> Result<Self, anyhow::Error> {
        let state = AppState::new(&config).await?;
        Ok(Self { config, state })
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        routes::create_router(self.state.clone())
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(Duration::from_secs(
                self.config.server.request_timeout_secs,
            )))
    }

    /// Run the server, binding to the configured address.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let addr = self.config.server.socket_addr();
        let listener = TcpListener::bind(addr).await?;

        info!("Server listening on {}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }

    /// Get the server's socket address.
    pub fn addr(&self) -> SocketAddr {
        self.config.server.socket_addr()
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}
