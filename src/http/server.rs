//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with a catch-all metadata handler
//! - Wire up middleware (tracing, timeout, request ID, Server header,
//!   in-flight tracking)
//! - Dispatch requests to the current MetadataRouter
//! - Swap the router on configuration reload
//! - Sweep expired tokens in the background
//! - Drain in-flight requests on shutdown, bounded by the grace period

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request},
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, oneshot};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::catalog::Category;
use crate::config::validation::validate_config;
use crate::config::{ConfigError, MockConfig, ValidationError};
use crate::http::inflight::{track_in_flight, InFlightTracker};
use crate::http::request::context_from;
use crate::observability::metrics;
use crate::routing::context::TOKEN_PATH;
use crate::routing::MetadataRouter;
use crate::token::sweeper::TokenSweeper;
use crate::token::TokenManager;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<ArcSwap<MetadataRouter>>,
}

/// HTTP server for the metadata mock.
#[derive(Clone)]
pub struct MockServer {
    router: Arc<ArcSwap<MetadataRouter>>,
    tracker: InFlightTracker,
}

impl MockServer {
    /// Create a server with a fresh in-memory token store. The configuration
    /// is validated first.
    pub fn new(config: MockConfig) -> Result<Self, ConfigError> {
        Self::with_tokens(config, TokenManager::in_memory())
    }

    /// Create a server backed by the given token manager.
    pub fn with_tokens(config: MockConfig, tokens: TokenManager) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        let router = MetadataRouter::new(config, tokens, Instant::now())
            .map_err(|e| ConfigError::Validation(vec![ValidationError::Catalog(e)]))?;

        Ok(Self {
            router: Arc::new(ArcSwap::from_pointee(router)),
            tracker: InFlightTracker::new(),
        })
    }

    /// The router serving requests right now.
    pub fn current(&self) -> Arc<MetadataRouter> {
        self.router.load_full()
    }

    /// Validate `config` and swap it in. Tokens and the start instant carry
    /// over; on error the current router keeps serving.
    pub fn reload(&self, config: MockConfig) -> Result<(), ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        let current = self.router.load();
        let next = MetadataRouter::new(config, current.tokens().clone(), current.started_at())
            .map_err(|e| ConfigError::Validation(vec![ValidationError::Catalog(e)]))?;
        self.router.store(Arc::new(next));
        Ok(())
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn app(&self) -> Router {
        let timeout = Duration::from_secs(self.router.load().config().server.request_timeout_secs);
        let state = AppState {
            router: Arc::clone(&self.router),
        };

        Router::new()
            .route("/", any(metadata_handler))
            .route("/{*path}", any(metadata_handler))
            .with_state(state)
            .layer(middleware::from_fn_with_state(
                self.tracker.clone(),
                track_in_flight,
            ))
            .layer(TimeoutLayer::new(timeout))
            .layer(SetResponseHeaderLayer::overriding(
                header::SERVER,
                HeaderValue::from_static("EC2ws"),
            ))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server on `listener` until `shutdown` fires, applying
    /// configurations received on `config_updates`.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<MockConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let current = self.current();
        let grace = Duration::from_secs(current.config().server.grace_period_secs);
        let sweep_every = Duration::from_secs(current.config().imds.token_sweep_interval_secs);

        tracing::info!(
            address = %addr,
            endpoints = current.catalog().len(),
            v2_required = current.config().imds.v2_required,
            "IMDS mock listening"
        );

        let sweeper = TokenSweeper::new(current.tokens().clone(), sweep_every);
        tokio::spawn(sweeper.run(shutdown.resubscribe()));

        let reloader = self.clone();
        let mut reload_shutdown = shutdown.resubscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = config_updates.recv() => match update {
                        Some(config) => match reloader.reload(config) {
                            Ok(()) => tracing::info!("Configuration reloaded"),
                            Err(e) => tracing::error!(
                                error = %e,
                                "Rejected reloaded configuration, keeping current one"
                            ),
                        },
                        None => break,
                    },
                    _ = reload_shutdown.recv() => break,
                }
            }
        });

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let app = self.app().into_make_service_with_connect_info::<SocketAddr>();
        let serve = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.await;
            })
            .into_future();
        tokio::pin!(serve);

        tokio::select! {
            result = &mut serve => {
                result?;
                tracing::info!("HTTP server stopped");
                return Ok(());
            }
            _ = shutdown.recv() => {}
        }

        tracing::info!(
            in_flight = self.tracker.active(),
            grace_secs = grace.as_secs(),
            "Shutdown signal received, draining"
        );
        let _ = stop_tx.send(());

        let drain = async {
            self.tracker.wait_idle().await;
            tracing::debug!("In-flight requests drained");
            (&mut serve).await
        };
        match tokio::time::timeout(grace, drain).await {
            Ok(result) => result?,
            Err(_) => tracing::warn!(
                abandoned = self.tracker.active(),
                "Grace period elapsed, abandoning in-flight requests"
            ),
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Catch-all handler: every path goes through the current router.
async fn metadata_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let ctx = context_from(&request);
    let method = ctx.method.to_string();
    let category = if ctx.path == TOKEN_PATH {
        "token"
    } else {
        Category::for_path(&ctx.path)
            .map(|c| c.as_str())
            .unwrap_or("other")
    };

    tracing::debug!(
        request_id = %ctx.request_id,
        method = %method,
        path = %ctx.path,
        "Metadata request"
    );

    let router = state.router.load_full();
    let request_id = ctx.request_id.clone();
    let response = match router.handle(ctx).await {
        Ok(response) => response.into_response(),
        Err(e) => {
            tracing::debug!(request_id = %request_id, error = %e, "Request refused");
            e.into_response()
        }
    };

    metrics::record_request(&method, response.status().as_u16(), category, start_time);
    response
}
