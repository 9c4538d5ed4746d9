//! Kept-list endpoints
//!
//! `GET` returns the retained items for a category; `DELETE` removes one of
//! them after checking the shared secret, then refreshes the cached list.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::get,
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{error, info, warn};

use crate::media::{Category, KeptList};
use crate::middleware::auth::authorize;
use crate::models::{AppState, DeleteRequest};
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/video", get(list_videos).delete(delete_video))
        .route("/api/archive", get(list_archives).delete(delete_archive))
        .route(
            "/api/media/{category}",
            get(list_category).delete(delete_category),
        )
        .with_state(state)
}

fn parse_category(name: &str) -> AppResult<Category> {
    name.parse::<Category>()
        .map_err(|e| AppError::NotFound(e.to_string()))
}

async fn list_videos(State(state): State<AppState>) -> Json<KeptList> {
    Json(state.retention.kept(Category::Video).await)
}

async fn list_archives(State(state): State<AppState>) -> Json<KeptList> {
    Json(state.retention.kept(Category::Archive).await)
}

async fn list_category(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Json<KeptList>> {
    let category = parse_category(&name)?;
    Ok(Json(state.retention.kept(category).await))
}

async fn delete_video(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Result<Json<DeleteRequest>, JsonRejection>,
) -> AppResult<Json<KeptList>> {
    delete_item(&state, Category::Video, &jar, body).await.map(Json)
}

async fn delete_archive(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Result<Json<DeleteRequest>, JsonRejection>,
) -> AppResult<Json<KeptList>> {
    delete_item(&state, Category::Archive, &jar, body).await.map(Json)
}

async fn delete_category(
    State(state): State<AppState>,
    Path(name): Path<String>,
    jar: CookieJar,
    body: Result<Json<DeleteRequest>, JsonRejection>,
) -> AppResult<Json<KeptList>> {
    let category = parse_category(&name)?;
    delete_item(&state, category, &jar, body).await.map(Json)
}

/// Deletes one item and returns the refreshed kept list.
///
/// Nothing touches the store until the request is authorized.
async fn delete_item(
    state: &AppState,
    category: Category,
    jar: &CookieJar,
    body: Result<Json<DeleteRequest>, JsonRejection>,
) -> AppResult<KeptList> {
    let Json(request) = body.map_err(|e| {
        warn!("Rejected {} delete body: {}", category, e);
        AppError::InvalidRequest("Invalid request".to_string())
    })?;

    let url = request
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| AppError::InvalidRequest("Missing url".to_string()))?;

    authorize(&state.config.auth, jar, request.password.as_deref())?;

    let in_category = state
        .store
        .pathname_of(&url)
        .is_some_and(|pathname| category.matches(&pathname));
    if !in_category {
        warn!("Refusing to delete {} through the {} endpoint", url, category);
        return Err(AppError::DeleteFailed);
    }

    if let Err(e) = state.store.delete(&url).await {
        error!("{} delete error: {}", category, e);
        return Err(AppError::DeleteFailed);
    }
    info!("Deleted {} item {}", category, url);

    Ok(state.retention.resync(category).await)
}
