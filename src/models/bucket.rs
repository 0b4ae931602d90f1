//! Represents a logical bucket — a top-level directory under the store root.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A storage bucket in the S3-compatible system.
///
/// Buckets are plain directories directly under the store root, so the
/// filesystem guarantees name uniqueness.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Bucket {
    /// Directory base name.
    pub name: String,

    /// Directory birth time (modification time where birth time is unavailable).
    pub creation_date: DateTime<Utc>,
}
