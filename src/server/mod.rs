use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::pipeline::Generator;
use crate::provider::DynProvider;

pub mod routes;
pub mod ws;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub generator: Generator,
}

impl AppState {
    pub fn new(config: Arc<Config>, provider: DynProvider) -> Self {
        Self { generator: Generator::new(config.clone(), provider), config }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);
    let api = Router::new()
        .route("/health", get(routes::health))
        .route("/generate/html", post(routes::generate_html))
        .route("/generate/css", post(routes::generate_css))
        .route("/generate/react", post(routes::generate_react))
        .route("/generate/raw", post(routes::generate_raw))
        .route("/generate/stream", get(ws::stream_handler))
        .route("/enhance", post(routes::enhance))
        .route("/fix", post(routes::fix))
        .route("/create/website", post(routes::create_website));

    Router::new()
        .route("/health", get(routes::liveness))
        .nest("/api/ollama", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring malformed CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Serve until Ctrl-C.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("listening on http://{}", addr);
    }
    axum::serve(listener, router(state)).with_graceful_shutdown(shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
