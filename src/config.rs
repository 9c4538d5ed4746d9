use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub redis: RedisConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub retention: RetentionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Cache is disabled when unset.
    pub url: Option<String>,
    /// Rewrite `redis://` to `rediss://` for managed providers that only accept TLS.
    pub force_tls: bool,
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// "s3" or "memory"
    pub provider: String,
    pub s3_bucket: String,
    pub s3_region: String,
    pub s3_access_key_id: Option<String>,
    pub s3_secret_access_key: Option<String>,
    pub s3_endpoint: Option<String>,
    /// Base URL objects are served from. Defaults to the bucket URL.
    pub public_url: Option<String>,
    pub upload_url_ttl_secs: u32,
}

#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    pub upload_token: Option<String>,
    pub upload_password: Option<String>,
    pub cookie_secure: bool,
    pub session_max_age_secs: i64,
}

// Secrets stay out of the startup log.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("upload_token", &self.upload_token.as_ref().map(|_| "***"))
            .field("upload_password", &self.upload_password.as_ref().map(|_| "***"))
            .field("cookie_secure", &self.cookie_secure)
            .field("session_max_age_secs", &self.session_max_age_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetentionConfig {
    /// Number of items kept per category.
    pub limit: usize,
    pub max_video_size_mb: u64,
    pub max_archive_size_mb: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
            cors_allowed_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            force_tls: false,
            connect_timeout_ms: 10_000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: "s3".to_string(),
            s3_bucket: String::new(),
            s3_region: "us-east-1".to_string(),
            s3_access_key_id: None,
            s3_secret_access_key: None,
            s3_endpoint: None,
            public_url: None,
            upload_url_ttl_secs: 3600,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            upload_token: None,
            upload_password: None,
            cookie_secure: false,
            session_max_age_secs: 60 * 60 * 12,
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            limit: 3,
            max_video_size_mb: 1024,
            max_archive_size_mb: 1024,
        }
    }
}

/// Reads an optional variable, treating empty values as unset.
fn var_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn var_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var_opt(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        Ok(Self {
            server: ServerConfig {
                port: var_parse("PORT", defaults.server.port)?,
                host: var_opt("HOST").unwrap_or(defaults.server.host),
                cors_allowed_origins: var_opt("ALLOWED_ORIGINS")
                    .map(|raw| {
                        raw.split(',')
                            .map(|s| s.trim().to_string())
                            .filter(|s| !s.is_empty())
                            .collect()
                    })
                    .unwrap_or(defaults.server.cors_allowed_origins),
            },
            redis: RedisConfig {
                url: var_opt("REDIS_URL"),
                force_tls: var_parse("REDIS_FORCE_TLS", defaults.redis.force_tls)?,
                connect_timeout_ms: var_parse(
                    "REDIS_CONNECT_TIMEOUT_MS",
                    defaults.redis.connect_timeout_ms,
                )?,
            },
            storage: StorageConfig {
                provider: var_opt("STORAGE_PROVIDER").unwrap_or(defaults.storage.provider),
                s3_bucket: var_opt("S3_BUCKET").unwrap_or_default(),
                s3_region: var_opt("S3_REGION").unwrap_or(defaults.storage.s3_region),
                s3_access_key_id: var_opt("AWS_ACCESS_KEY_ID"),
                s3_secret_access_key: var_opt("AWS_SECRET_ACCESS_KEY"),
                s3_endpoint: var_opt("S3_ENDPOINT"),
                public_url: var_opt("S3_PUBLIC_URL"),
                upload_url_ttl_secs: var_parse(
                    "UPLOAD_URL_TTL_SECS",
                    defaults.storage.upload_url_ttl_secs,
                )?,
            },
            auth: AuthConfig {
                upload_token: var_opt("UPLOAD_TOKEN"),
                upload_password: var_opt("UPLOAD_PAGE_PASSWORD"),
                cookie_secure: var_parse("COOKIE_SECURE", defaults.auth.cookie_secure)?,
                session_max_age_secs: defaults.auth.session_max_age_secs,
            },
            retention: RetentionConfig {
                limit: var_parse("RETENTION_LIMIT", defaults.retention.limit)?,
                max_video_size_mb: var_parse(
                    "MAX_VIDEO_SIZE_MB",
                    defaults.retention.max_video_size_mb,
                )?,
                max_archive_size_mb: var_parse(
                    "MAX_ARCHIVE_SIZE_MB",
                    defaults.retention.max_archive_size_mb,
                )?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.retention.limit, 3);
        assert_eq!(config.retention.max_video_size_mb, 1024);
        assert_eq!(config.auth.session_max_age_secs, 43_200);
        assert_eq!(config.redis.connect_timeout_ms, 10_000);
        assert!(config.redis.url.is_none());
    }

    #[test]
    fn test_auth_debug_hides_secrets() {
        let auth = AuthConfig {
            upload_token: Some("token-value".to_string()),
            upload_password: Some("hunter2".to_string()),
            ..AuthConfig::default()
        };
        let rendered = format!("{:?}", auth);
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("token-value"));
    }
}
