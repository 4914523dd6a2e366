use std::net::SocketAddr;

use axum::{Router, middleware, routing::get, routing::post};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::middleware as app_middleware;
use crate::state::AppState;
use crate::{handlers, realtime};

pub struct ReliefnetServer {
    addr: SocketAddr,
    app: Router,
}

pub fn build_app(cfg: &AppConfig, state: AppState) -> Router {
    let body_limit = cfg.server.body_limit_bytes;
    Router::new()
        // Health and info endpoints
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        // Domain services
        .route("/api/geocode", post(handlers::services::geocode))
        .route("/api/analyze", post(handlers::services::analyze))
        .route("/api/verify-image", post(handlers::services::verify_image))
        .route(
            "/api/disasters/{id}/updates",
            get(handlers::services::disaster_updates),
        )
        .route(
            "/api/disasters/{id}/social",
            get(handlers::services::disaster_social),
        )
        // Record CRUD; collection names are validated in the handlers
        .route(
            "/api/{collection}",
            get(handlers::records::list_records).post(handlers::records::create_record),
        )
        .route(
            "/api/{collection}/{id}",
            get(handlers::records::read_record)
                .put(handlers::records::update_record)
                .delete(handlers::records::delete_record),
        )
        // Realtime feed
        .route("/ws", get(realtime::ws_handler))
        // Layers wrap inside-out: the last `.layer` call is the outermost
        // service. request_id goes last so it runs first and the trace
        // span below can read the extension it inserts.
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let req_id = req
                        .extensions()
                        .get::<app_middleware::RequestId>()
                        .map(app_middleware::RequestId::as_str)
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(middleware::from_fn(app_middleware::request_id))
        .with_state(state)
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub async fn build(self) -> anyhow::Result<ReliefnetServer> {
        let state = crate::state::build_state(&self.config).await?;

        // Periodic cleanup of expired cache rows runs for the life of the
        // process, independent of request traffic
        let sweeper = reliefnet_cache::CacheSweeper::new(
            state.cache.clone(),
            std::time::Duration::from_secs(self.config.cache.cleanup_interval_secs),
        );
        sweeper.spawn();

        let app = build_app(&self.config, state);
        Ok(ReliefnetServer {
            addr: self.addr,
            app,
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReliefnetServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
