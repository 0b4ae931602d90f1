//! Transport adapters over `StorageService`.
//!
//! - `api_handlers`: JSON REST surface under `/api`
//! - `s3_handlers`: S3-XML surface at the root, for unmodified AWS SDKs
//! - `health_handlers`: liveness and readiness probes

pub mod api_handlers;
pub mod health_handlers;
pub mod s3_handlers;

use crate::services::storage_service::DEFAULT_MAX_KEYS;
use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, header},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use std::io;

/// RFC 7231 `HTTP-date`, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
pub(crate) fn http_date(time: &DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// ETag header value: the hex digest in double quotes.
pub(crate) fn quoted_etag(etag: &str) -> String {
    format!("\"{}\"", etag)
}

/// Content type sent by the client, if any.
pub(crate) fn request_content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

/// Page size from a raw `max-keys` value: missing, unparsable or zero falls
/// back to the default, and anything larger is capped to it.
pub(crate) fn page_size(raw: Option<&str>) -> usize {
    raw.and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|&n| n > 0)
        .map_or(DEFAULT_MAX_KEYS, |n| n.min(DEFAULT_MAX_KEYS))
}

/// Request body as the byte stream the engine consumes.
pub(crate) fn body_stream(body: Body) -> impl Stream<Item = io::Result<Bytes>> {
    body.into_data_stream().map(|chunk| chunk.map_err(io::Error::other))
}

/// Headers shared by GET and HEAD object responses.
pub(crate) fn set_object_headers(
    headers: &mut HeaderMap,
    content_type: &str,
    length: u64,
    etag: &str,
    last_modified: &DateTime<Utc>,
) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));

    if let Ok(value) = HeaderValue::from_str(&quoted_etag(etag)) {
        headers.insert(header::ETAG, value);
    }
    if let Ok(value) = HeaderValue::from_str(&http_date(last_modified)) {
        headers.insert(header::LAST_MODIFIED, value);
    }
}
