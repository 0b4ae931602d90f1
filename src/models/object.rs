//! Represents objects (files) stored in a bucket and the shapes returned by
//! the engine's object operations.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage class reported for every object.
pub const STORAGE_CLASS_STANDARD: &str = "STANDARD";

/// One entry of a listing.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectSummary {
    /// Path relative to the bucket root, `/`-separated.
    pub key: String,

    /// Filesystem modification time.
    pub last_modified: DateTime<Utc>,

    /// Hex MD5 of the current content (unquoted).
    #[serde(rename = "ETag")]
    pub etag: String,

    /// Size in bytes.
    pub size: u64,

    pub storage_class: String,
}

/// Result of a put.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct PutObjectOutput {
    #[serde(rename = "ETag")]
    pub etag: String,
}

/// Full object content plus the fields needed to serve it.
#[derive(Clone, Debug)]
pub struct GetObjectOutput {
    pub data: Bytes,
    pub content_type: String,
    pub etag: String,
    pub last_modified: DateTime<Utc>,
}

/// Object attributes without the content.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HeadObjectOutput {
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub etag: String,
    pub content_type: String,
}
