//! Web server for homenas.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;

use crate::config::Config;
use crate::storage::{EscapePolicy, PathResolver, StorageRoot, UploadTracker};
use crate::{NasError, Result};

use super::handlers::AppState;
use super::router::{create_health_router, create_openapi_router, create_router};

/// Interval between sweeps of abandoned upload sessions.
const SESSION_SWEEP_INTERVAL_SECS: u64 = 300;

/// Web server for the file API.
pub struct WebServer {
    /// Server address.
    addr: SocketAddr,
    /// Application state.
    app_state: Arc<AppState>,
    /// CORS allowed origins.
    cors_origins: Vec<String>,
    /// Whether to serve the OpenAPI document.
    serve_openapi: bool,
}

impl WebServer {
    /// Create a new web server.
    ///
    /// Opens (and, if configured, creates) the storage root.
    pub fn new(config: &Config) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|e| NasError::Config(format!("invalid server address: {e}")))?;

        let root = if config.storage.create_root {
            StorageRoot::create(&config.storage.root)?
        } else {
            StorageRoot::new(&config.storage.root)?
        };
        tracing::info!("Storage root: {}", root.path().display());

        let policy = if config.storage.reject_path_escapes {
            EscapePolicy::Reject
        } else {
            EscapePolicy::Clamp
        };
        let resolver = PathResolver::new(root).with_policy(policy);

        Ok(Self {
            addr,
            app_state: Arc::new(AppState::new(resolver, &config.upload)),
            cors_origins: config.server.cors_origins.clone(),
            serve_openapi: config.server.serve_openapi,
        })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the application state.
    pub fn state(&self) -> &Arc<AppState> {
        &self.app_state
    }

    /// Build the complete application router.
    pub fn router(&self) -> Router {
        let router = create_router(self.app_state.clone(), &self.cors_origins)
            .merge(create_health_router());

        if self.serve_openapi {
            router.merge(create_openapi_router())
        } else {
            router
        }
    }

    /// Start the background task that drops abandoned upload sessions.
    fn start_session_sweep_task(tracker: Arc<UploadTracker>) {
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(SESSION_SWEEP_INTERVAL_SECS));

            // Skip the first immediate tick
            interval.tick().await;

            loop {
                interval.tick().await;

                let purged = tracker.purge_expired();
                if purged > 0 {
                    tracing::info!(purged, "Dropped abandoned upload sessions");
                } else {
                    tracing::debug!("No abandoned upload sessions");
                }
            }
        });
    }

    async fn bind(self) -> std::io::Result<(TcpListener, Router)> {
        let router = self.router();
        let listener = TcpListener::bind(self.addr).await?;

        Self::start_session_sweep_task(self.app_state.uploads().clone());

        Ok((listener, router))
    }

    /// Run the web server.
    pub async fn run(self) -> std::io::Result<()> {
        let (listener, router) = self.bind().await?;
        tracing::info!("Web server listening on http://{}", listener.local_addr()?);

        axum::serve(listener, router).await
    }

    /// Run the server in the background and return the actual bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self) -> std::io::Result<SocketAddr> {
        let (listener, router) = self.bind().await?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Web server listening on http://{}", local_addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}
