//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all gateway handler
//! - Wire up middleware (request ID, tracing, concurrency limit)
//! - Bind server to listener, plain or TLS
//! - Start background tasks (bucket sweeper, service table reload, admin API)
//! - Drain in-flight requests on shutdown

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::limit::GlobalConcurrencyLimitLayer;
use tower::ServiceBuilder;

use crate::admin::{self, AdminState};
use crate::config::GatewayConfig;
use crate::http::dispatcher::Dispatcher;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::Shutdown;
use crate::observability::span;
use crate::routing::StaticRegistry;
use crate::security::rate_limit;

/// Drain deadline for TLS connections after shutdown is triggered.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    dispatcher: Arc<Dispatcher>,
    registry: Arc<StaticRegistry>,
    config_updates: Option<mpsc::UnboundedReceiver<GatewayConfig>>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig) -> Self {
        let registry = Arc::new(StaticRegistry::from_config(&config.services));
        let dispatcher = Arc::new(Dispatcher::from_config(&config, registry.clone()));

        let state = AppState {
            dispatcher: dispatcher.clone(),
        };
        let router = Self::build_router(&config, state);

        Self {
            router,
            config,
            dispatcher,
            registry,
            config_updates: None,
        }
    }

    /// Apply service table changes from a config watcher while running.
    pub fn with_config_updates(mut self, updates: mpsc::UnboundedReceiver<GatewayConfig>) -> Self {
        self.config_updates = Some(updates);
        self
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(span::trace_layer())
                    .layer(propagate_request_id_layer())
                    .layer(GlobalConcurrencyLimitLayer::new(config.listener.max_connections)),
            )
    }

    /// Router for the admin API, when enabled.
    pub fn admin_router(&self) -> Option<Router> {
        self.config.admin.enabled.then(|| {
            admin::setup_admin_router(AdminState::new(
                self.dispatcher.breakers().clone(),
                self.dispatcher.limiter().clone(),
                self.dispatcher.registry().clone(),
                &self.config.admin.api_key,
            ))
        })
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(mut self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        self.spawn_background(&shutdown).await?;

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let mut stop = shutdown.subscribe();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server over TLS.
    pub async fn run_tls(
        mut self,
        addr: SocketAddr,
        tls: RustlsConfig,
        shutdown: Shutdown,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        self.spawn_background(&shutdown).await?;

        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        let mut stop = shutdown.subscribe();
        tokio::spawn(async move {
            let _ = stop.recv().await;
            tracing::info!("Shutdown signal received, draining connections");
            drain.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum_server::bind_rustls(addr, tls).handle(handle).serve(app).await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    async fn spawn_background(&mut self, shutdown: &Shutdown) -> Result<(), std::io::Error> {
        rate_limit::spawn_sweeper(self.dispatcher.limiter().clone(), shutdown.subscribe());

        if let Some(updates) = self.config_updates.take() {
            tokio::spawn(apply_config_updates(self.registry.clone(), updates, shutdown.subscribe()));
        }

        if let Some(admin) = self.admin_router() {
            let listener = TcpListener::bind(&self.config.admin.bind_address).await?;
            tracing::info!(address = %listener.local_addr()?, "Admin API listening");
            let mut stop = shutdown.subscribe();
            tokio::spawn(async move {
                let served = axum::serve(listener, admin)
                    .with_graceful_shutdown(async move {
                        let _ = stop.recv().await;
                    })
                    .await;
                if let Err(e) = served {
                    tracing::error!(error = %e, "Admin API server failed");
                }
            });
        }
        Ok(())
    }
}

/// Swap the service table whenever the watcher delivers a new config.
async fn apply_config_updates(
    registry: Arc<StaticRegistry>,
    mut updates: mpsc::UnboundedReceiver<GatewayConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(config) => registry.replace(&config.services),
                None => break,
            },
            _ = shutdown.recv() => break,
        }
    }
    tracing::debug!("Config update task stopped");
}

/// Catch-all handler: every request goes through the dispatcher.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    state.dispatcher.dispatch(request, Some(peer)).await
}
