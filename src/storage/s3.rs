//! S3-compatible storage backend
//!
//! Uses `aws-sdk-s3` directly with:
//! - Optional fixed endpoint override for S3-compatible services (MinIO etc.)
//! - Path-style addressing, always
//! - Credentials and region from the default AWS provider chain:
//!   environment variables, shared config files, web identity, ECS/EC2 metadata
//!
//! Uploads are streamed: bodies are cut into parts of at least
//! [`DEFAULT_PART_SIZE`] bytes and sent as a multipart upload, so no more than
//! one part is held in memory at a time.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use bytes::Bytes;
use std::fmt::Debug;
use std::io;
use std::time::Instant;
use tracing::{info, warn};

use crate::config::StorageConfig;
use crate::logger::{fields, FieldValue, Logger};
use crate::metrics;
use crate::storage::{read_part, ObjectBody, ObjectStorage, StorageError};

/// Smallest body that is sent as a multipart upload, and the size of each part
pub const DEFAULT_PART_SIZE: usize = 8 * 1024 * 1024;

/// Object storage backed by an S3-compatible service
#[derive(Debug, Clone)]
pub struct S3Storage {
    client: Client,
    part_size: usize,
}

impl S3Storage {
    /// Build the client from the gateway configuration and the AWS default chain.
    ///
    /// This never fails: a configuration the SDK cannot use (no region, no
    /// credentials) only shows up as errors on the first request.
    pub async fn connect(config: &StorageConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;

        if sdk_config.region().is_none() {
            warn!("No AWS region configured; storage requests will fail until AWS_REGION is set");
        }

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(true);
        if let Some(endpoint) = &config.endpoint {
            info!(endpoint = %endpoint, "Using custom storage endpoint");
            builder = builder.endpoint_url(endpoint);
        }

        Self::from_conf(builder.build())
    }

    pub fn from_conf(conf: aws_sdk_s3::Config) -> Self {
        Self {
            client: Client::from_conf(conf),
            part_size: DEFAULT_PART_SIZE,
        }
    }

    async fn fetch(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| classify_get_error(err, bucket, key))?;

        // Consumes the response body; the connection is released when it drops.
        let data = output.body.collect().await.map_err(StorageError::other)?;
        Ok(data.into_bytes())
    }

    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        body: &mut ObjectBody<'_>,
    ) -> Result<String, StorageError> {
        let first = read_part(body, self.part_size).await?;

        if first.len() < self.part_size {
            let output = self
                .client
                .put_object()
                .bucket(bucket)
                .key(key)
                .body(ByteStream::from(first))
                .send()
                .await
                .map_err(backend_error)?;
            return Ok(output.e_tag().unwrap_or_default().to_string());
        }

        let created = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(backend_error)?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| {
                StorageError::other(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "backend returned no multipart upload id",
                ))
            })?
            .to_string();

        match self.upload_parts(bucket, key, &upload_id, first, body).await {
            Ok(etag) => Ok(etag),
            Err(err) => {
                if let Err(abort_err) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    warn!(
                        upload_id = %upload_id,
                        error = %DisplayErrorContext(&abort_err),
                        "Failed to abort multipart upload"
                    );
                }
                Err(err)
            }
        }
    }

    async fn upload_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        first: Bytes,
        body: &mut ObjectBody<'_>,
    ) -> Result<String, StorageError> {
        let mut completed = Vec::new();
        let mut part = first;
        let mut part_number = 1;

        while !part.is_empty() {
            let output = self
                .client
                .upload_part()
                .bucket(bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(part))
                .send()
                .await
                .map_err(backend_error)?;

            completed.push(
                CompletedPart::builder()
                    .set_e_tag(output.e_tag().map(str::to_string))
                    .part_number(part_number)
                    .build(),
            );
            part_number += 1;
            part = read_part(body, self.part_size).await?;
        }

        let output = self
            .client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed))
                    .build(),
            )
            .send()
            .await
            .map_err(backend_error)?;

        Ok(output.e_tag().unwrap_or_default().to_string())
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn list_buckets(&self, log: &dyn Logger) -> Result<Vec<String>, StorageError> {
        let started = Instant::now();
        let result: Result<Vec<String>, StorageError> = self
            .client
            .list_buckets()
            .send()
            .await
            .map(|output| {
                output
                    .buckets()
                    .iter()
                    .filter_map(|bucket| bucket.name().map(str::to_string))
                    .collect()
            })
            .map_err(backend_error);
        metrics::observe_storage("list_buckets", started, &result);

        result.map_err(|err| {
            log.error("Unable to get buckets", fields! { "error" => FieldValue::error(&err) });
            err
        })
    }

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        log: &dyn Logger,
    ) -> Result<Bytes, StorageError> {
        let started = Instant::now();
        let result = self.fetch(bucket, key).await;
        metrics::observe_storage("get_object", started, &result);

        result.map_err(|err| {
            log.error(
                "Couldn't get object",
                fields! {
                    "error" => FieldValue::error(&err),
                    "bucket_name" => bucket,
                    "key" => key,
                },
            );
            err
        })
    }

    async fn upload_object<'a>(
        &self,
        bucket: &str,
        key: &str,
        mut body: ObjectBody<'a>,
        log: &dyn Logger,
    ) -> Result<String, StorageError> {
        let started = Instant::now();
        let result = self.upload(bucket, key, &mut body).await;
        metrics::observe_storage("upload_object", started, &result);

        result.map_err(|err| {
            log.error(
                "Unable to upload",
                fields! {
                    "error" => FieldValue::error(&err),
                    "bucket_name" => bucket,
                    "key" => key,
                },
            );
            err
        })
    }
}

fn backend_error<E, R>(err: SdkError<E, R>) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
    R: Debug + Send + Sync + 'static,
{
    StorageError::Other {
        message: DisplayErrorContext(&err).to_string(),
        source: Box::new(err),
    }
}

fn classify_get_error<R>(err: SdkError<GetObjectError, R>, bucket: &str, key: &str) -> StorageError
where
    R: Debug + Send + Sync + 'static,
{
    if let Some(service_err) = err.as_service_error() {
        if service_err.code() == Some("NoSuchBucket") {
            return StorageError::NoSuchBucket {
                bucket: bucket.to_string(),
            };
        }
        if service_err.is_no_such_key() {
            return StorageError::NoSuchKey {
                bucket: bucket.to_string(),
                key: key.to_string(),
            };
        }
    }
    backend_error(err)
}
