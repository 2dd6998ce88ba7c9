//! HTTP routes for the gateway JSON API
//!
//! Implements:
//! - GET /api/v1/bucket - ListBuckets
//! - GET /api/v1/object/{bucket}/{key} - GetObject
//! - PUT /api/v1/object/{bucket}/{key} - UploadObject (multipart/form-data, field `file`)
//! - GET /health - liveness
//! - GET /metrics - Prometheus metrics

mod handlers;

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::logger::{Logger, LoggerFactory, RequestContext};
use crate::storage::ObjectStorage;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn ObjectStorage>,
    pub loggers: LoggerFactory,
    /// Cap on buffered non-file multipart fields per upload
    pub max_form_memory: usize,
}

impl AppState {
    pub fn new(storage: Arc<dyn ObjectStorage>, loggers: LoggerFactory, max_form_memory: usize) -> Self {
        Self {
            storage,
            loggers,
            max_form_memory,
        }
    }

    /// Logger bound to a freshly generated correlation id
    pub fn request_logger(&self) -> Arc<dyn Logger> {
        self.loggers.for_request(&RequestContext::new())
    }
}

/// Body of a successful ListBuckets
#[derive(Debug, Serialize, Deserialize)]
pub struct BucketList {
    pub buckets: Vec<String>,
}

/// Body of a successful GetObject; `object` is the base64-encoded content
#[derive(Debug, Serialize, Deserialize)]
pub struct ObjectContent {
    pub object: String,
}

/// Body of a successful UploadObject
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub etag: String,
    pub bucket: String,
    pub key: String,
}

/// Create the gateway router
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/bucket", get(handlers::list_buckets))
        .route(
            "/object/:bucket/:key",
            get(handlers::get_object)
                .put(handlers::upload_object)
                // File parts are streamed to storage; only buffered form fields are capped.
                .layer(DefaultBodyLimit::disable()),
        );

    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .nest("/api/v1", api)
        .fallback(handlers::redirect_slashes)
        .with_state(state)
}
