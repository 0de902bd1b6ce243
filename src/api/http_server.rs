// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::{signal, sync::RwLock};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use super::errors::ApiError;
use super::handlers::health_handler;
use super::upload::upload_handler;
use crate::storage::ArtifactStore;
use crate::vision::DetectionService;

/// Shared request state
///
/// The detection service is absent when startup loading failed; the server
/// keeps running so `/health` still answers.
#[derive(Clone)]
pub struct AppState {
    pub detection_service: Arc<RwLock<Option<Arc<DetectionService>>>>,
    /// Why the detection service is absent
    pub startup_error: Arc<RwLock<Option<String>>>,
    pub store: ArtifactStore,
}

impl AppState {
    pub fn new(store: ArtifactStore) -> Self {
        Self {
            detection_service: Arc::new(RwLock::new(None)),
            startup_error: Arc::new(RwLock::new(None)),
            store,
        }
    }

    pub async fn set_detection_service(&self, service: Arc<DetectionService>) {
        *self.detection_service.write().await = Some(service);
        *self.startup_error.write().await = None;
    }

    pub async fn set_startup_error(&self, reason: impl Into<String>) {
        *self.startup_error.write().await = Some(reason.into());
    }

    /// The loaded detection service, or the reason it is missing
    pub async fn detection_service(&self) -> Result<Arc<DetectionService>, ApiError> {
        if let Some(service) = self.detection_service.read().await.as_ref() {
            return Ok(Arc::clone(service));
        }

        let reason = self
            .startup_error
            .read()
            .await
            .clone()
            .unwrap_or_else(|| "detection service not initialized".to_string());
        Err(ApiError::ServiceUnavailable(reason))
    }
}

/// Build the router: POST /upload, GET /health
pub fn create_app(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_handler))
        // Species detection
        .route("/upload", post(upload_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until Ctrl+C
pub async fn start_server(addr: SocketAddr, app: Router) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("API server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if signal::ctrl_c().await.is_ok() {
        info!("⏹️  Shutdown signal received");
    }
}
