// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP server wiring: router, CORS, listener

use axum::{
    extract::DefaultBodyLimit,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::api::generate_model::generate_model_handler;
use crate::pipeline::GenerationPipeline;
use crate::vision::MAX_IMAGE_SIZE;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<GenerationPipeline>,
}

/// Build the service router. Split out from [`start_server`] so tests can
/// drive it without a listener.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_handler))
        // Generation endpoint
        .route("/generate-3d", post(generate_model_handler))
        // Uploads can exceed axum's 2 MB default; cap a little above the
        // image limit to leave room for multipart framing
        .layer(DefaultBodyLimit::max(MAX_IMAGE_SIZE + 64 * 1024))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn start_server(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("🚀 3D generation server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_handler() -> impl IntoResponse {
    axum::response::Json(json!({ "status": "ok" }))
}
