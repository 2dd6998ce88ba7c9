//! In-memory `ObjectStorage` used by handler tests

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::TryStreamExt;
use std::collections::BTreeMap;
use std::io;
use std::sync::Mutex;

use crate::logger::{fields, FieldValue, Logger};
use crate::storage::{ObjectBody, ObjectStorage, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Healthy,
    Failing,
    Panicking,
}

/// Buckets and objects kept in a map; optionally fails or panics on every call
#[derive(Debug)]
pub struct MemoryStorage {
    buckets: Mutex<BTreeMap<String, BTreeMap<String, Bytes>>>,
    mode: Mode,
}

impl MemoryStorage {
    pub fn with_buckets(names: &[&str]) -> Self {
        let buckets = names
            .iter()
            .map(|name| (name.to_string(), BTreeMap::new()))
            .collect();
        Self {
            buckets: Mutex::new(buckets),
            mode: Mode::Healthy,
        }
    }

    /// Every operation returns a backend error
    pub fn failing() -> Self {
        Self {
            mode: Mode::Failing,
            ..Self::with_buckets(&[])
        }
    }

    /// Every operation panics
    pub fn panicking() -> Self {
        Self {
            mode: Mode::Panicking,
            ..Self::with_buckets(&[])
        }
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.buckets
            .lock()
            .unwrap()
            .get(bucket)
            .and_then(|objects| objects.get(key).cloned())
    }

    fn check_mode(&self) -> Result<(), StorageError> {
        match self.mode {
            Mode::Healthy => Ok(()),
            Mode::Failing => Err(StorageError::other(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "backend unreachable",
            ))),
            Mode::Panicking => panic!("storage backend exploded"),
        }
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn list_buckets(&self, log: &dyn Logger) -> Result<Vec<String>, StorageError> {
        if let Err(err) = self.check_mode() {
            log.error("Unable to get buckets", fields! { "error" => FieldValue::error(&err) });
            return Err(err);
        }
        Ok(self.buckets.lock().unwrap().keys().cloned().collect())
    }

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        log: &dyn Logger,
    ) -> Result<Bytes, StorageError> {
        let result = self.check_mode().and_then(|()| {
            let buckets = self.buckets.lock().unwrap();
            let objects = buckets.get(bucket).ok_or_else(|| StorageError::NoSuchBucket {
                bucket: bucket.to_string(),
            })?;
            objects.get(key).cloned().ok_or_else(|| StorageError::NoSuchKey {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
        });

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
        body: ObjectBody<'a>,
        log: &dyn Logger,
    ) -> Result<String, StorageError> {
        let result = match self.check_mode() {
            Ok(()) => body
                .try_fold(BytesMut::new(), |mut acc, chunk| async move {
                    acc.extend_from_slice(&chunk);
                    Ok::<_, io::Error>(acc)
                })
                .await
                .map_err(StorageError::from),
            Err(err) => Err(err),
        };

        let result = result.and_then(|data| {
            let data = data.freeze();
            let etag = format!("\"{:x}-{}\"", data.len(), uuid::Uuid::new_v4().simple());
            let mut buckets = self.buckets.lock().unwrap();
            let objects = buckets.get_mut(bucket).ok_or_else(|| StorageError::NoSuchBucket {
                bucket: bucket.to_string(),
            })?;
            objects.insert(key.to_string(), data);
            Ok(etag)
        });

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
