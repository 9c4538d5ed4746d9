//! Upload webhook
//!
//! The browser uploads straight to the bucket. This endpoint hands out a
//! presigned URL for each upload and, once the client reports completion,
//! applies the retention policy to the category it landed in.

use axum::{
    body::Bytes,
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::media::{upload_pathname, Category};
use crate::middleware::auth::upload_token_accepted;
use crate::models::{
    AppState, ClientTokenRequest, ClientTokenResponse, UploadCompletedPayload,
    UploadCompletedResponse, UploadEvent,
};
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/upload/{token}", post(handle_upload))
        .with_state(state)
}

async fn handle_upload(
    State(state): State<AppState>,
    Path(token): Path<String>,
    body: Bytes,
) -> AppResult<Response> {
    if !upload_token_accepted(&state.config.auth, &token) {
        warn!("Upload webhook called with an unknown token");
        return Err(AppError::Forbidden);
    }

    let value: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|_| AppError::InvalidRequest("Invalid JSON body".to_string()))?;

    let event: UploadEvent = serde_json::from_value(value).map_err(|e| {
        error!("handleUpload error: {}", e);
        AppError::UploadFailed
    })?;

    match event {
        UploadEvent::GenerateClientToken(request) => {
            Ok(Json(issue_client_token(&state, request).await?).into_response())
        }
        UploadEvent::UploadCompleted(payload) => {
            Ok(Json(complete_upload(&state, payload).await?).into_response())
        }
    }
}

/// Inserts a random suffix before the extension so uploads never collide.
fn with_random_suffix(pathname: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    match pathname.rsplit_once('.') {
        Some((stem, ext)) => format!("{}-{}.{}", stem, &suffix[..12], ext),
        None => format!("{}-{}", pathname, &suffix[..12]),
    }
}

async fn issue_client_token(
    state: &AppState,
    request: ClientTokenRequest,
) -> AppResult<ClientTokenResponse> {
    let Some((category, pathname)) = upload_pathname(&request.pathname) else {
        warn!("No category accepts {:?}", request.pathname);
        return Err(AppError::UploadFailed);
    };
    let policy = state.retention.policy(category);
    if let Some(client_payload) = request.client_payload.as_deref() {
        debug!("Client payload for {}: {}", pathname, client_payload);
    }

    if let Some(content_type) = request.content_type.as_deref() {
        if !category.accepts_content_type(content_type) {
            warn!("Content type {} not allowed for {}", content_type, category);
            return Err(AppError::UploadFailed);
        }
    }
    if request.size.is_some_and(|size| size > policy.max_size_bytes) {
        warn!(
            "Declared size {:?} exceeds the {} limit of {} bytes",
            request.size, category, policy.max_size_bytes
        );
        return Err(AppError::UploadFailed);
    }

    let pathname = with_random_suffix(&pathname);
    let client_token = state
        .store
        .presign_upload(&pathname, state.config.storage.upload_url_ttl_secs)
        .await
        .map_err(|e| {
            error!("Presigning {} failed: {}", pathname, e);
            AppError::UploadFailed
        })?;

    info!("Issued upload grant for {}", pathname);

    Ok(ClientTokenResponse {
        event_type: "blob.generate-client-token",
        client_token,
        pathname,
        maximum_size_in_bytes: policy.max_size_bytes,
        allowed_content_types: category
            .content_types()
            .iter()
            .map(|ct| ct.to_string())
            .collect(),
    })
}

async fn complete_upload(
    state: &AppState,
    payload: UploadCompletedPayload,
) -> AppResult<UploadCompletedResponse> {
    let Some(category) = Category::for_pathname(&payload.blob.pathname) else {
        warn!("Completed upload {:?} matches no category", payload.blob.pathname);
        return Err(AppError::UploadFailed);
    };

    info!(
        "Upload completed: {} ({})",
        payload.blob.url,
        payload.blob.content_type.as_deref().unwrap_or("unknown type")
    );
    if let Some(token_payload) = payload.token_payload.as_deref() {
        debug!("Token payload: {}", token_payload);
    }
    let kept = state.retention.reconcile(category).await;
    info!("{} now keeps {} items", category, kept.len());

    Ok(UploadCompletedResponse {
        event_type: "blob.upload-completed",
        response: "ok",
    })
}
