use axum::{
    extract::{rejection::JsonRejection, State},
    routing::get,
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{info, warn};

use crate::middleware::auth::{has_upload_session, secrets_match, session_cookie};
use crate::models::{AppState, AuthStatusResponse, PasswordRequest};
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/upload-auth", get(auth_status).post(login))
        .with_state(state)
}

async fn auth_status(jar: CookieJar) -> Json<AuthStatusResponse> {
    Json(AuthStatusResponse {
        authorized: has_upload_session(&jar),
    })
}

/// Exchanges the shared password for a session cookie.
async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Result<Json<PasswordRequest>, JsonRejection>,
) -> AppResult<(CookieJar, Json<serde_json::Value>)> {
    let Some(expected) = state.config.auth.upload_password.as_deref() else {
        return Err(AppError::Misconfigured(
            "Upload password is not configured".to_string(),
        ));
    };

    let Json(request) = body.map_err(|_| AppError::InvalidRequest("Invalid request".to_string()))?;
    let password = request.password.unwrap_or_default();

    if !secrets_match(&password, expected) {
        warn!("Upload login rejected");
        return Err(AppError::Unauthorized("Invalid password".to_string()));
    }

    info!("Upload session granted");
    Ok((
        jar.add(session_cookie(&state.config.auth)),
        Json(serde_json::json!({ "ok": true })),
    ))
}
