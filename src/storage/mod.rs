//! Storage backend abstraction layer
//!
//! All object storage access goes through the [`ObjectStorage`] trait. The
//! production implementation talks to an S3-compatible service through
//! `aws-sdk-s3`; backend-specific errors are classified once, at this
//! boundary, into [`StorageError`] so that callers never depend on SDK types.

mod s3;

#[cfg(test)]
pub(crate) mod memory;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::{BoxStream, StreamExt};
use std::io;
use thiserror::Error;

use crate::logger::Logger;

pub use s3::S3Storage;

/// Boxed error carried by [`StorageError::Other`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Streaming object content handed to [`ObjectStorage::upload_object`]
pub type ObjectBody<'a> = BoxStream<'a, io::Result<Bytes>>;

/// Errors surfaced by storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// The requested bucket does not exist
    #[error("no such bucket: {bucket}")]
    NoSuchBucket { bucket: String },

    /// The bucket exists but holds no object under the key
    #[error("no such key: {bucket}/{key}")]
    NoSuchKey { bucket: String, key: String },

    /// Any other failure: network, permissions, throttling, body I/O
    #[error("{message}")]
    Other {
        message: String,
        #[source]
        source: BoxError,
    },
}

impl StorageError {
    pub fn other<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Other {
            message: err.to_string(),
            source: Box::new(err),
        }
    }

    /// Operation status label used in metrics
    pub fn kind(&self) -> &'static str {
        match self {
            StorageError::NoSuchBucket { .. } => "no_such_bucket",
            StorageError::NoSuchKey { .. } => "no_such_key",
            StorageError::Other { .. } => "error",
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        StorageError::other(err)
    }
}

/// Object storage operations exposed by the gateway
///
/// Implementations log failures through the supplied request logger before
/// returning them; they never swallow errors and never retry on their own.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Names of all buckets visible to the configured credentials.
    ///
    /// Only the first page of the backend listing is returned.
    async fn list_buckets(&self, log: &dyn Logger) -> Result<Vec<String>, StorageError>;

    /// Entire content of `bucket/key`, read into memory
    async fn get_object(&self, bucket: &str, key: &str, log: &dyn Logger)
        -> Result<Bytes, StorageError>;

    /// Store `body` under `bucket/key` and return the backend ETag
    async fn upload_object<'a>(
        &self,
        bucket: &str,
        key: &str,
        body: ObjectBody<'a>,
        log: &dyn Logger,
    ) -> Result<String, StorageError>;
}

/// Pull chunks from `body` until at least `part_size` bytes are buffered or
/// the stream ends. An empty result means the stream was already exhausted.
pub(crate) async fn read_part(body: &mut ObjectBody<'_>, part_size: usize) -> io::Result<Bytes> {
    let mut part = BytesMut::new();
    while part.len() < part_size {
        match body.next().await {
            Some(chunk) => part.extend_from_slice(&chunk?),
            None => break,
        }
    }
    Ok(part.freeze())
}
