//! API Routes
//!
//! This module organizes all HTTP endpoints for the application:
//! - `/api/video`, `/api/archive`, `/api/media/{category}` - Kept lists and deletes
//! - `/api/upload/{token}` - Upload grants and completion webhook
//! - `/api/upload-auth` - Shared-password session
//! - `/api/health` - Health checks

pub mod auth;
pub mod health;
pub mod media;
pub mod upload;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::middleware::cors::apply_cors;
use crate::models::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let server_config = state.config.server.clone();

    let api_router = Router::new()
        .merge(media::router(state.clone()))
        .merge(upload::router(state.clone()))
        .merge(auth::router(state.clone()))
        .merge(health::router(state))
        .layer(TraceLayer::new_for_http());

    apply_cors(api_router, &server_config)
}
