//! S3-compatible bucket source (Yandex Object Storage by default)

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::error::DisplayErrorContext;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::{ItemSource, Snapshot, SourceError, TempItem};

pub const DEFAULT_ENDPOINT: &str = "https://storage.yandexcloud.net";
pub const DEFAULT_REGION: &str = "ru-central1";

/// Connection settings for a bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Settings {
    pub bucket: String,
    pub endpoint: String,
    pub region: String,
    /// Only keys under this prefix are listed
    pub prefix: Option<String>,
}

pub struct S3Source {
    client: S3Client,
    settings: S3Settings,
}

impl S3Source {
    /// Build the client and probe the bucket once
    ///
    /// Credentials come from the usual AWS chain (`AWS_ACCESS_KEY_ID`,
    /// profile files, ...).
    pub async fn connect(settings: S3Settings) -> Result<Self, SourceError> {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .endpoint_url(&settings.endpoint)
            .load()
            .await;
        let client = S3Client::new(&aws_config);

        client
            .list_objects_v2()
            .bucket(&settings.bucket)
            .max_keys(1)
            .send()
            .await
            .map_err(|e| {
                SourceError::Unavailable(format!(
                    "bucket {}: {}",
                    settings.bucket,
                    DisplayErrorContext(&e)
                ))
            })?;

        info!(bucket = %settings.bucket, endpoint = %settings.endpoint, "Connected to bucket");
        Ok(Self { client, settings })
    }
}

#[async_trait]
impl ItemSource for S3Source {
    fn describe(&self) -> String {
        match &self.settings.prefix {
            Some(prefix) => format!("s3://{}/{}", self.settings.bucket, prefix),
            None => format!("s3://{}", self.settings.bucket),
        }
    }

    async fn list(&self) -> Result<Snapshot, SourceError> {
        let mut snapshot = Snapshot::new();
        let mut token: Option<String> = None;
        let mut pages = 0u32;

        loop {
            let mut req = self.client.list_objects_v2().bucket(&self.settings.bucket);
            if let Some(prefix) = &self.settings.prefix {
                req = req.prefix(prefix);
            }
            if let Some(t) = token.take() {
                req = req.continuation_token(t);
            }

            let resp = req
                .send()
                .await
                .map_err(|e| SourceError::List(DisplayErrorContext(&e).to_string()))?;
            pages += 1;

            for object in resp.contents() {
                let (Some(key), Some(modified)) = (object.key(), object.last_modified()) else {
                    continue;
                };
                // Folder placeholders
                if key.ends_with('/') {
                    continue;
                }
                let Some(modified) =
                    DateTime::<Utc>::from_timestamp(modified.secs(), modified.subsec_nanos())
                else {
                    continue;
                };
                snapshot.insert(key, modified);
            }

            match resp.next_continuation_token() {
                Some(next) => token = Some(next.to_string()),
                None => break,
            }
        }

        debug!(pages, items = snapshot.len(), "Bucket listed");
        Ok(snapshot)
    }

    async fn fetch(&self, key: &str) -> Result<TempItem, SourceError> {
        let fetch_err = |message: String| SourceError::Fetch {
            key: key.to_string(),
            message,
        };

        let resp = self
            .client
            .get_object()
            .bucket(&self.settings.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| fetch_err(DisplayErrorContext(&e).to_string()))?;

        let bytes = resp
            .body
            .collect()
            .await
            .map_err(|e| fetch_err(e.to_string()))?
            .into_bytes();

        let item = TempItem::create(key)?;
        tokio::fs::write(item.path(), &bytes).await?;
        debug!(key, bytes = bytes.len(), "Object downloaded");
        Ok(item)
    }
}
