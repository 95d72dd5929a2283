use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use vitrine_store::{HttpRecordStore, StoreConfig, StoreError};

use crate::middleware::{rate_limit, request_id, RateLimiter};
use crate::state::AppState;
use crate::{config::AppConfig, handlers};

/// Assemble the router with per-scope rate limits and the shared
/// middleware stack.
pub fn build_app(state: AppState) -> Router {
    let cfg = &state.config;
    let api_limiter = RateLimiter::new(
        "api",
        Duration::from_secs(60),
        cfg.rate_limit.api_per_minute,
    );
    let facets_limiter = RateLimiter::new(
        "facets",
        Duration::from_secs(60),
        cfg.rate_limit.facets_per_minute,
    );
    let orders_limiter = RateLimiter::new(
        "orders",
        Duration::from_secs(cfg.rate_limit.orders_window_secs),
        cfg.rate_limit.orders_max,
    );
    let body_limit = cfg.server.body_limit_bytes;

    let general = Router::new()
        .route("/external-products", get(handlers::external_products))
        .route("/products/{id}", get(handlers::product_detail))
        .route(
            "/profile/state",
            get(handlers::profile_state_get).post(handlers::profile_state_post),
        )
        .route("/cache/stats", get(handlers::cache_stats))
        .route("/cache/invalidate", post(handlers::cache_invalidate))
        .route_layer(middleware::from_fn_with_state(api_limiter, rate_limit));

    // Facet assembly sweeps the whole catalog upstream; it gets the
    // strictest per-minute budget.
    let facets = Router::new()
        .route("/catalog-filters", get(handlers::catalog_filters))
        .route_layer(middleware::from_fn_with_state(facets_limiter, rate_limit));

    let orders = Router::new()
        .route("/orders", post(handlers::submit_order))
        .route_layer(middleware::from_fn_with_state(orders_limiter, rate_limit));

    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .merge(general)
        .merge(facets)
        .merge(orders)
        // Middleware stack (order: request id -> cors -> compression -> trace -> body limit)
        .layer(middleware::from_fn(request_id))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                let req_id = req
                    .extensions()
                    .get::<axum::http::HeaderValue>()
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                tracing::info_span!(
                    "http.request",
                    http.method = %req.method(),
                    http.target = %req.uri(),
                    request_id = %req_id
                )
            }),
        )
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

pub struct VitrineServer {
    addr: SocketAddr,
    app: Router,
}

impl VitrineServer {
    pub async fn run(self) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!(addr = %self.addr, "server listening");
        axum::serve(
            listener,
            self.app
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

pub struct ServerBuilder {
    config: AppConfig,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<VitrineServer, StoreError> {
        let store = HttpRecordStore::new(&StoreConfig {
            base_url: self.config.store.url.clone(),
            token: self.config.store.token.clone(),
            timeout: self.config.store.timeout(),
        })?;

        let addr = self.config.addr();
        let state = AppState::new(self.config, std::sync::Arc::new(store));

        Ok(VitrineServer {
            addr,
            app: build_app(state),
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
