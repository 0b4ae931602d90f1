//! Side-record persisted next to every object as `<key>.metadata.json`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Content type used when no side-record exists or it cannot be read.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// File name suffix of the side-record.
pub const METADATA_SUFFIX: &str = ".metadata.json";

/// Object metadata stored independently of the object bytes.
///
/// On disk: `{"contentType":"text/plain","uploadDate":"2025-01-01T00:00:00Z"}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    pub content_type: String,
    pub upload_date: DateTime<Utc>,
}

impl ObjectMetadata {
    /// Build a fresh record stamped with the current time.
    pub fn new(content_type: Option<String>) -> Self {
        Self {
            content_type: content_type
                .filter(|ct| !ct.is_empty())
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            upload_date: Utc::now(),
        }
    }
}
