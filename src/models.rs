use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::cache::CacheStore;
use crate::config::Config;
use crate::retention::RetentionEngine;
use crate::storage::ObjectStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn ObjectStore>,
    pub cache: Arc<dyn CacheStore>,
    pub retention: RetentionEngine,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn ObjectStore>, cache: Arc<dyn CacheStore>) -> Self {
        let retention = RetentionEngine::new(store.clone(), cache.clone(), config.retention.clone());
        Self {
            config,
            store,
            cache,
            retention,
        }
    }
}

// API Request/Response types

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub url: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PasswordRequest {
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthStatusResponse {
    pub authorized: bool,
}

/// Events posted by the upload client, tagged by `type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum UploadEvent {
    #[serde(rename = "blob.generate-client-token")]
    GenerateClientToken(ClientTokenRequest),
    #[serde(rename = "blob.upload-completed")]
    UploadCompleted(UploadCompletedPayload),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientTokenRequest {
    pub pathname: String,
    #[serde(default)]
    pub client_payload: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    /// Declared object size in bytes.
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientTokenResponse {
    #[serde(rename = "type")]
    pub event_type: &'static str,
    /// Presigned PUT URL for the object body.
    pub client_token: String,
    pub pathname: String,
    pub maximum_size_in_bytes: u64,
    pub allowed_content_types: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadCompletedPayload {
    pub blob: CompletedBlob,
    #[serde(default)]
    pub token_payload: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedBlob {
    pub url: String,
    pub pathname: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadCompletedResponse {
    #[serde(rename = "type")]
    pub event_type: &'static str,
    pub response: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub cache: String,
}
