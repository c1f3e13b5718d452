//! HTTP API gateway for Addis-Sync.
//!
//! Exposes a health check and the v1 API (chat plus session
//! administration) on top of a shared [`TurnOrchestrator`].
//!
//! Built on Axum for high performance async HTTP.

pub mod api_v1;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{Router, extract::State, response::Json, routing::get};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::info;

use addis_agent::{Runtime, TurnOrchestrator};

/// Request body cap for every route.
const BODY_LIMIT_BYTES: usize = 64 * 1024;

/// Build the full router: `/health` plus the v1 API under `/v1`.
///
/// Layers applied:
/// - CORS restricted to the gateway's own origin
/// - Request body size limit
/// - HTTP trace logging
pub fn build_router(orchestrator: Arc<TurnOrchestrator>, origin: Option<HeaderValue>) -> Router {
    let api_state = Arc::new(api_v1::ApiV1State {
        orchestrator: Arc::clone(&orchestrator),
    });

    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));
    if let Some(origin) = origin {
        cors = cors.allow_origin(origin);
    }

    Router::new()
        .route("/health", get(health_handler))
        .with_state(orchestrator)
        .nest("/v1", api_v1::v1_router(api_state))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server and run until the listener fails.
pub async fn start(
    config: addis_config::AppConfig,
    runtime: &Runtime,
) -> Result<(), Box<dyn std::error::Error>> {
    let host = config.gateway.host.clone();
    let port = config.gateway.port;
    let addr = format!("{host}:{port}");
    let origin = HeaderValue::from_str(&format!("http://{addr}")).ok();

    let _sweeper = runtime.spawn_sweeper(&config);
    let app = build_router(Arc::clone(&runtime.orchestrator), origin);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub sessions: usize,
    pub providers: usize,
}

async fn health_handler(State(orchestrator): State<Arc<TurnOrchestrator>>) -> Json<HealthResponse> {
    let providers = orchestrator
        .chain()
        .status()
        .iter()
        .filter(|c| !c.disabled)
        .count();
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        sessions: orchestrator.store().len(),
        providers,
    })
}
