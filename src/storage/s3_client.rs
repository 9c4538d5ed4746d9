// S3 client backed by rust-s3

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use s3::creds::Credentials;
use s3::{Bucket, Region};
use tracing::{debug, info, warn};

use super::{join_url, strip_base, ObjectStore, StorageError, StoredObject};
use crate::config::StorageConfig;

pub struct S3Store {
    bucket: Box<Bucket>,
    public_url: String,
}

impl S3Store {
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        if config.s3_bucket.is_empty() {
            return Err(StorageError::Configuration("S3_BUCKET must be set".to_string()));
        }

        let region = match &config.s3_endpoint {
            Some(endpoint) => Region::Custom {
                region: config.s3_region.clone(),
                endpoint: endpoint.clone(),
            },
            None => config
                .s3_region
                .parse()
                .map_err(|e| StorageError::Configuration(format!("invalid S3_REGION: {}", e)))?,
        };

        let credentials = Credentials::new(
            config.s3_access_key_id.as_deref(),
            config.s3_secret_access_key.as_deref(),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Configuration(format!("invalid S3 credentials: {}", e)))?;

        let mut bucket = Box::new(Bucket::new(&config.s3_bucket, region, credentials)?);
        // Custom endpoints (MinIO, R2) generally need path-style addressing.
        if config.s3_endpoint.is_some() {
            bucket = Box::new(bucket.with_path_style());
        }

        let public_url = config.public_url.clone().unwrap_or_else(|| bucket.url());
        info!("S3 store ready: bucket={} public_url={}", config.s3_bucket, public_url);

        Ok(Self { bucket, public_url })
    }

    fn check_status(operation: &'static str, status: u16) -> Result<(), StorageError> {
        if (200..300).contains(&status) {
            Ok(())
        } else if status == 404 {
            Err(StorageError::NotFound(operation.to_string()))
        } else {
            Err(StorageError::Status { operation, status })
        }
    }
}

/// Unparsable timestamps rank as the oldest object, so retention evicts them first.
fn parse_last_modified(key: &str, raw: &str) -> DateTime<Utc> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(e) => {
            warn!(
                "Unparsable LastModified {:?} on {} ({}); treating it as the oldest object",
                raw, key, e
            );
            DateTime::UNIX_EPOCH
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError> {
        let pages = self.bucket.list(prefix.to_string(), None).await?;
        let objects: Vec<StoredObject> = pages
            .into_iter()
            .flat_map(|page| page.contents)
            .map(|object| StoredObject {
                url: join_url(&self.public_url, &object.key),
                uploaded_at: parse_last_modified(&object.key, &object.last_modified),
                size: object.size,
                pathname: object.key,
            })
            .collect();
        debug!("Listed {} objects under {:?}", objects.len(), prefix);
        Ok(objects)
    }

    async fn put(
        &self,
        pathname: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        let size = data.len() as u64;
        let response = self
            .bucket
            .put_object_with_content_type(pathname, &data, content_type)
            .await?;
        Self::check_status("put", response.status_code())?;

        Ok(StoredObject {
            url: join_url(&self.public_url, pathname),
            pathname: pathname.to_string(),
            size,
            uploaded_at: Utc::now(),
        })
    }

    async fn delete(&self, url: &str) -> Result<(), StorageError> {
        let pathname = self
            .pathname_of(url)
            .ok_or_else(|| StorageError::ForeignUrl(url.to_string()))?;
        let response = self.bucket.delete_object(&pathname).await?;
        Self::check_status("delete", response.status_code())
    }

    async fn presign_upload(
        &self,
        pathname: &str,
        expires_in_secs: u32,
    ) -> Result<String, StorageError> {
        Ok(self
            .bucket
            .presign_put(pathname, expires_in_secs, None)
            .await?)
    }

    fn pathname_of(&self, url: &str) -> Option<String> {
        strip_base(&self.public_url, url)
    }
}
