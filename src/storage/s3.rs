use super::{ObjectTransport, StorageError};
use crate::config::RemoteConfig;
use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_s3::Client;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// S3 allows at most this many keys per batch delete request.
const DELETE_BATCH_SIZE: usize = 1000;

/// Object transport for S3-compatible services (AWS, MinIO, ...).
pub struct S3Transport {
    client: Client,
    bucket: String,
}

impl S3Transport {
    pub async fn new(config: &RemoteConfig) -> Result<Self, StorageError> {
        let timeouts = TimeoutConfig::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .read_timeout(Duration::from_millis(config.read_timeout_ms))
            .build();

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint)
            .timeout_config(timeouts)
            .retry_config(RetryConfig::standard().with_max_attempts(3));

        if let (Some(access_key), Some(secret_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "coral-datasets",
            ));
        }

        let sdk_config = loader.load().await;
        // MinIO and most self-hosted stores do not serve virtual-hosted buckets.
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        info!(
            "S3 transport ready: bucket={}, endpoint={}",
            config.bucket, config.endpoint
        );

        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
        })
    }
}

fn sdk_error<E, R>(operation: &str, err: SdkError<E, R>) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    match err {
        SdkError::TimeoutError(_) => StorageError::Timeout(format!("S3 {} timed out", operation)),
        // Connect and read timeouts are raised by the connector, not the orchestrator.
        SdkError::DispatchFailure(failure) if failure.is_timeout() => {
            StorageError::Timeout(format!("S3 {} timed out", operation))
        }
        other => StorageError::Io(format!(
            "S3 {} error: {}",
            operation,
            DisplayErrorContext(&other)
        )),
    }
}

#[async_trait]
impl ObjectTransport for S3Transport {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.bucket);

            if !prefix.is_empty() {
                request = request.prefix(prefix);
            }
            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let output = request.send().await.map_err(|e| sdk_error("list", e))?;

            // A bucket with no matching keys simply has no contents.
            keys.extend(
                output
                    .contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_owned)),
            );

            match (output.is_truncated(), output.next_continuation_token()) {
                (Some(true), Some(token)) => continuation_token = Some(token.to_owned()),
                _ => break,
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn download(&self, key: &str, dest: &Path) -> Result<(), StorageError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().map_or(false, |se| se.is_no_such_key()) {
                    StorageError::NotFound(key.to_owned())
                } else {
                    sdk_error("get", e)
                }
            })?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Io(format!("S3 body read error: {}", e)))?
            .into_bytes();

        tokio::fs::write(dest, &bytes).await?;
        debug!(key, size = bytes.len(), "downloaded object");
        Ok(())
    }

    async fn upload(&self, src: &Path, key: &str) -> Result<(), StorageError> {
        let body = ByteStream::from_path(src)
            .await
            .map_err(|e| StorageError::Io(format!("failed to read upload source: {}", e)))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| sdk_error("put", e))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        // S3 reports success for deletes of missing keys, so probe first.
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => {}
            Err(e) if e.as_service_error().map_or(false, |se| se.is_not_found()) => {
                return Ok(false)
            }
            Err(e) => return Err(sdk_error("head", e)),
        }

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_error("delete", e))?;

        Ok(true)
    }

    async fn delete_many(&self, keys: &[String]) -> Result<usize, StorageError> {
        let mut deleted = 0;

        for chunk in keys.chunks(DELETE_BATCH_SIZE) {
            let objects = chunk
                .iter()
                .map(|key| ObjectIdentifier::builder().key(key).build())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| StorageError::InvalidInput(format!("S3 delete request: {}", e)))?;

            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(false)
                .build()
                .map_err(|e| StorageError::InvalidInput(format!("S3 delete request: {}", e)))?;

            let output = self
                .client
                .delete_objects()
                .bucket(&self.bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|e| sdk_error("batch delete", e))?;

            deleted += output.deleted().len();
            if let Some(first) = output.errors().first() {
                warn!(
                    bucket = %self.bucket,
                    deleted,
                    failed = output.errors().len(),
                    "S3 batch delete partially failed"
                );
                return Err(StorageError::Io(format!(
                    "S3 batch delete failed for {} after deleting {} objects: {}",
                    first.key().unwrap_or("?"),
                    deleted,
                    first.message().unwrap_or("unknown error")
                )));
            }
        }

        Ok(deleted)
    }
}
