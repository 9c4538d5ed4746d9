// Docshare - keeps the newest uploads per media category in object storage

pub mod cache;
pub mod config;
pub mod media;
pub mod middleware;
pub mod models;
pub mod retention;
pub mod routes;
pub mod storage;
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
