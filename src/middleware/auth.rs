// Shared-secret authentication
//
// A single password unlocks deletes. Verifying it once through the
// upload-auth endpoint sets a session cookie; later requests may present
// either the cookie or the password itself.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use crate::config::AuthConfig;
use crate::types::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

pub const AUTH_COOKIE_NAME: &str = "docshare_upload_auth";
const AUTH_COOKIE_VALUE: &str = "1";
const COMPARE_CONTEXT: &[u8] = b"docshare-secret-compare";

/// Compares two secrets without leaking where they differ.
///
/// Both sides are keyed into an HMAC over a fixed message and the tags are
/// checked with `verify_slice`, which is constant-time.
pub fn secrets_match(candidate: &str, expected: &str) -> bool {
    let Ok(mut expected_mac) = HmacSha256::new_from_slice(expected.as_bytes()) else {
        return false;
    };
    expected_mac.update(COMPARE_CONTEXT);
    let expected_tag = expected_mac.finalize().into_bytes();

    let Ok(mut candidate_mac) = HmacSha256::new_from_slice(candidate.as_bytes()) else {
        return false;
    };
    candidate_mac.update(COMPARE_CONTEXT);
    candidate_mac.verify_slice(&expected_tag).is_ok()
}

pub fn has_upload_session(jar: &CookieJar) -> bool {
    jar.get(AUTH_COOKIE_NAME)
        .is_some_and(|cookie| cookie.value() == AUTH_COOKIE_VALUE)
}

/// True when `password` equals the configured upload password.
pub fn password_accepted(config: &AuthConfig, password: Option<&str>) -> bool {
    match (config.upload_password.as_deref(), password) {
        (Some(expected), Some(given)) => secrets_match(given, expected),
        _ => false,
    }
}

/// Authorizes a destructive request by cookie or password.
pub fn authorize(config: &AuthConfig, jar: &CookieJar, password: Option<&str>) -> AppResult<()> {
    if has_upload_session(jar) || password_accepted(config, password) {
        Ok(())
    } else {
        warn!("Rejected unauthorized request");
        Err(AppError::Unauthorized("Unauthorized".to_string()))
    }
}

/// True when the route token matches the configured upload token.
pub fn upload_token_accepted(config: &AuthConfig, token: &str) -> bool {
    config
        .upload_token
        .as_deref()
        .is_some_and(|expected| secrets_match(token, expected))
}

pub fn session_cookie(config: &AuthConfig) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE_NAME, AUTH_COOKIE_VALUE))
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(config.session_max_age_secs))
        .build()
}
