use anyhow::{Context, Result};
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::StorageCredentials;

const CREDENTIALS_PROVIDER: &str = "ecom-explorer-credentials-file";

#[derive(Clone)]
pub struct StorageClient {
    client: Client,
    bucket: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredObject {
    pub key: String,
    pub size: i64,
    pub last_modified: Option<chrono::DateTime<chrono::Utc>>,
}

impl StorageClient {
    /// Build an S3 client from explicit credentials, without touching the environment
    pub async fn new(credentials: StorageCredentials, bucket: String) -> Result<Self> {
        info!("Initializing storage client for bucket: {} in region: {}", bucket, credentials.region);

        let provider = Credentials::new(
            credentials.access_key_id,
            credentials.secret_access_key,
            None,
            None,
            CREDENTIALS_PROVIDER,
        );
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(credentials.region))
            .credentials_provider(provider)
            .load()
            .await;

        Ok(Self {
            client: Client::new(&config),
            bucket,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// List objects under `prefix`, following continuation tokens
    pub async fn list_objects(&self, prefix: &str, max_keys: Option<usize>) -> Result<Vec<StoredObject>> {
        info!("Listing objects with prefix: '{}'", prefix);

        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .max_keys(1000);

            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .context("Failed to list storage objects")?;

            for object in response.contents() {
                if let (Some(key), Some(size)) = (object.key(), object.size()) {
                    objects.push(StoredObject {
                        key: key.to_string(),
                        size,
                        last_modified: object
                            .last_modified()
                            .and_then(|ts| chrono::DateTime::from_timestamp(ts.secs(), ts.subsec_nanos())),
                    });

                    if max_keys.is_some_and(|max| objects.len() >= max) {
                        debug!("Reached maximum key limit: {}", objects.len());
                        return Ok(objects);
                    }
                }
            }

            if response.is_truncated().unwrap_or(false) {
                continuation_token = response.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }

        info!("Found {} objects", objects.len());
        Ok(objects)
    }
}
