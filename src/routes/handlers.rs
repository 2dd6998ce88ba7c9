//! Request handlers for the gateway API endpoints

use axum::{
    extract::{
        multipart::{Field, MultipartRejection},
        Multipart, OriginalUri, Path, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::prelude::*;
use futures::{StreamExt, TryStreamExt};
use std::io;
use tracing::error;

use crate::errors::{ApiError, Result};
use crate::logger::{fields, FieldValue, Logger};
use crate::routes::{AppState, BucketList, ObjectContent, UploadReceipt};

/// Form field carrying the uploaded file
const FILE_FIELD: &str = "file";

/// Liveness probe; never touches the storage backend
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, ".")
}

/// Prometheus metrics endpoint
pub async fn metrics() -> Result<String> {
    crate::metrics::render().map_err(|e| {
        error!(error = %e, "Failed to encode metrics");
        ApiError::Internal
    })
}

/// Requests that match no route: paths with a trailing slash are redirected
/// to the trimmed path, anything else is a 404.
pub async fn redirect_slashes(OriginalUri(uri): OriginalUri) -> Response {
    let path = uri.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };
        let location = match uri.query() {
            Some(query) => format!("{}?{}", trimmed, query),
            None => trimmed.to_string(),
        };
        return (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response();
    }
    StatusCode::NOT_FOUND.into_response()
}

/// ListBuckets - GET /api/v1/bucket
pub async fn list_buckets(State(state): State<AppState>) -> Result<Json<BucketList>> {
    let log = state.request_logger();

    // The adapter has already logged the cause.
    let buckets = state
        .storage
        .list_buckets(log.as_ref())
        .await
        .map_err(|_| ApiError::Internal)?;

    Ok(Json(BucketList { buckets }))
}

/// GetObject - GET /api/v1/object/{bucket}/{key}
pub async fn get_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Json<ObjectContent>> {
    let log = state.request_logger();

    let data = state.storage.get_object(&bucket, &key, log.as_ref()).await?;

    Ok(Json(ObjectContent {
        object: BASE64_STANDARD.encode(&data),
    }))
}

/// UploadObject - PUT /api/v1/object/{bucket}/{key}
///
/// Expects `multipart/form-data` with a `file` field. Fields ahead of it are
/// read and discarded, counting against the form memory cap; the file itself
/// is streamed to storage and anything after it is ignored.
pub async fn upload_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadReceipt>> {
    let log = state.request_logger();

    let mut multipart =
        multipart.map_err(|rejection| bad_request(log.as_ref(), rejection.body_text()))?;

    let mut buffered = 0usize;
    loop {
        let mut field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => {
                return Err(bad_request(
                    log.as_ref(),
                    format!("request has no \"{}\" form field", FILE_FIELD),
                ))
            }
            Err(err) => return Err(bad_request(log.as_ref(), err.body_text())),
        };

        if field.name() == Some(FILE_FIELD) {
            return store_file(&state, log.as_ref(), bucket, key, field).await;
        }

        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|err| bad_request(log.as_ref(), err.body_text()))?
        {
            buffered += chunk.len();
            if buffered > state.max_form_memory {
                return Err(bad_request(
                    log.as_ref(),
                    format!("multipart form exceeds {} bytes", state.max_form_memory),
                ));
            }
        }
    }
}

async fn store_file(
    state: &AppState,
    log: &dyn Logger,
    bucket: String,
    key: String,
    field: Field<'_>,
) -> Result<Json<UploadReceipt>> {
    let filename = field.file_name().unwrap_or_default().to_string();
    let content_type = field.content_type().unwrap_or_default().to_string();

    log.info(
        "Uploading file",
        fields! {
            "filename" => filename.as_str(),
            "content_type" => content_type.as_str(),
            "mime_header" => FieldValue::debug(field.headers()),
            "bucket_name" => bucket.as_str(),
            "key" => key.as_str(),
        },
    );

    let mut file_size = 0u64;
    let body = field
        .map_err(io::Error::other)
        .inspect_ok(|chunk| file_size += chunk.len() as u64)
        .boxed();

    let etag = state
        .storage
        .upload_object(&bucket, &key, body, log)
        .await
        .map_err(|_| ApiError::Internal)?;

    log.info(
        "File uploaded",
        fields! {
            "filename" => filename.as_str(),
            "file_size" => file_size,
            "content_type" => content_type.as_str(),
            "etag" => etag.as_str(),
        },
    );

    Ok(Json(UploadReceipt { etag, bucket, key }))
}

fn bad_request(log: &dyn Logger, message: String) -> ApiError {
    log.warn(
        "Error retrieving the file",
        fields! { "error" => FieldValue::Error(message.clone()) },
    );
    ApiError::BadRequest(message)
}
