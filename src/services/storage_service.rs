//! src/services/storage_service.rs
//!
//! StorageService — S3-like bucket/object operations mapped directly onto a
//! directory tree. There is no database and no cache: every call re-reads the
//! filesystem beneath `base_path/{bucket}/{key}`, and per-object metadata lives
//! in a `{key}.metadata.json` side-record next to the payload.

use crate::models::{
    bucket::Bucket,
    metadata::{DEFAULT_CONTENT_TYPE, METADATA_SUFFIX, ObjectMetadata},
    object::{
        GetObjectOutput, HeadObjectOutput, ObjectSummary, PutObjectOutput, STORAGE_CLASS_STANDARD,
    },
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt, pin_mut, stream};
use md5::Context;
use serde::Serialize;
use std::{
    cmp::Ordering,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::{AsyncReadExt, AsyncWriteExt},
};
use tracing::{debug, info};
use uuid::Uuid;

/// Default and upper bound for `max_keys` at the transport layer.
pub const DEFAULT_MAX_KEYS: usize = 1000;

#[derive(Clone, Debug)]
pub struct ListObjectsParams {
    pub prefix: Option<String>,
    pub max_keys: usize,
    /// Resume after this key; keys at or before it in listing order are skipped.
    pub marker: Option<String>,
}

impl Default for ListObjectsParams {
    fn default() -> Self {
        Self {
            prefix: None,
            max_keys: DEFAULT_MAX_KEYS,
            marker: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListObjectsResult {
    pub is_truncated: bool,
    pub contents: Vec<ObjectSummary>,
    pub name: String,
    pub prefix: String,
    pub max_keys: usize,
    pub key_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
    /// Last key of a truncated page; pass it back as `marker` for the next one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_marker: Option<String>,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("bucket `{0}` already exists")]
    BucketAlreadyExists(String),
    #[error("bucket `{0}` does not exist")]
    NoSuchBucket(String),
    #[error("bucket `{0}` is not empty")]
    BucketNotEmpty(String),
    #[error("object `{key}` not found in bucket `{bucket}`")]
    NoSuchKey { bucket: String, key: String },
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("object key `{key}` invalid: {reason}")]
    InvalidObjectKey { key: String, reason: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl StorageError {
    /// S3 error code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BucketAlreadyExists(_) => "BucketAlreadyExists",
            Self::NoSuchBucket(_) => "NoSuchBucket",
            Self::BucketNotEmpty(_) => "BucketNotEmpty",
            Self::NoSuchKey { .. } => "NoSuchKey",
            Self::InvalidBucketName { .. } => "InvalidBucketName",
            Self::InvalidObjectKey { .. } => "InvalidArgument",
            Self::Io(_) => "InternalError",
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// StorageService provides the S3-like operations over one root directory:
/// - Buckets are the immediate subdirectories of `base_path`
/// - Object keys map segment-by-segment onto nested directories
/// - ETags are the hex MD5 of the current bytes, recomputed on every access
///
/// The service holds no mutable state beyond its root path and performs no
/// locking; concurrent writers to one key race at the filesystem level.
#[derive(Clone, Debug)]
pub struct StorageService {
    /// Base directory on disk holding one directory per bucket.
    base_path: PathBuf,
}

const MAX_OBJECT_KEY_LEN: usize = 1024;
const TMP_PREFIX: &str = ".tmp-";
const ETAG_READ_BUF: usize = 64 * 1024;

impl StorageService {
    /// Create a StorageService rooted at `base_path`. The directory is created
    /// lazily by the first bucket creation.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Create a StorageService and make sure its root directory exists.
    pub async fn init(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let service = Self::new(base_path);
        fs::create_dir_all(&service.base_path).await?;
        Ok(service)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Reject bucket names that would escape or alias the root directory.
    ///
    /// The only naming rule: any single path segment is a valid bucket.
    fn ensure_bucket_segment_safe(&self, name: &str) -> StorageResult<()> {
        let invalid = |reason: &str| -> StorageResult<()> {
            Err(StorageError::InvalidBucketName {
                name: name.to_string(),
                reason: reason.to_string(),
            })
        };
        if name.is_empty() {
            return invalid("must not be empty");
        }
        if name == "." || name == ".." {
            return invalid("must not be a relative path component");
        }
        if name.contains(['/', '\\']) || name.chars().any(char::is_control) {
            return invalid("must not contain path separators or control characters");
        }
        Ok(())
    }

    /// Key validation against path traversal and reserved names.
    ///
    /// Every `/`-separated segment must be a plain file name: no empty, `.`
    /// or `..` segments, no backslashes or control bytes, and nothing that
    /// collides with side-records or in-flight temporary files.
    fn ensure_key_safe(&self, key: &str) -> StorageResult<()> {
        let invalid = |reason: &str| -> StorageResult<()> {
            Err(StorageError::InvalidObjectKey {
                key: key.to_string(),
                reason: reason.to_string(),
            })
        };
        if key.is_empty() {
            return invalid("must not be empty");
        }
        if key.len() > MAX_OBJECT_KEY_LEN {
            return invalid("must be at most 1024 bytes");
        }
        if key.starts_with('/') {
            return invalid("must not start with `/`");
        }
        if key.bytes().any(|b| b.is_ascii_control() || b == b'\\') {
            return invalid("must not contain backslashes or control characters");
        }
        for segment in key.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return invalid("must not contain empty, `.` or `..` segments");
            }
            if segment.ends_with(METADATA_SUFFIX) || segment.starts_with(TMP_PREFIX) {
                return invalid("uses a name reserved by the store");
            }
        }
        Ok(())
    }

    /// Physical folder of a bucket. Does not check for existence.
    fn bucket_root(&self, bucket_name: &str) -> PathBuf {
        self.base_path.join(bucket_name)
    }

    /// Physical payload path: `base_path/bucket/seg1/seg2/.../segN`.
    fn object_path(&self, bucket_name: &str, key: &str) -> PathBuf {
        let mut path = self.bucket_root(bucket_name);
        path.extend(key.split('/'));
        path
    }

    /// Side-record path for a payload path.
    fn metadata_path(object_path: &Path) -> PathBuf {
        let mut raw = object_path.as_os_str().to_owned();
        raw.push(METADATA_SUFFIX);
        PathBuf::from(raw)
    }

    /// Create a bucket directory.
    ///
    /// Creates the store root on first use. Returns BucketAlreadyExists when
    /// anything already occupies the bucket path.
    pub async fn create_bucket(&self, name: &str) -> StorageResult<()> {
        self.ensure_bucket_segment_safe(name)?;
        fs::create_dir_all(&self.base_path).await?;

        match fs::create_dir(self.bucket_root(name)).await {
            Ok(()) => {
                info!(bucket = name, "created bucket");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                Err(StorageError::BucketAlreadyExists(name.to_string()))
            }
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    /// Every immediate subdirectory of the root, sorted by name.
    pub async fn list_buckets(&self) -> StorageResult<Vec<Bucket>> {
        let mut entries = match fs::read_dir(&self.base_path).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StorageError::Io(err)),
        };

        let mut buckets = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let meta = match fs::metadata(entry.path()).await {
                Ok(meta) => meta,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(StorageError::Io(err)),
            };
            if !meta.is_dir() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                debug!("skipping non-UTF-8 bucket directory {}", entry.path().display());
                continue;
            };
            buckets.push(Bucket {
                name,
                creation_date: creation_time(&meta),
            });
        }

        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buckets)
    }

    /// Delete an empty bucket directory.
    ///
    /// Any entry counts as content, including stray side-records.
    pub async fn delete_bucket(&self, name: &str) -> StorageResult<()> {
        self.ensure_bucket_segment_safe(name)?;
        if !self.bucket_exists(name).await {
            return Err(StorageError::NoSuchBucket(name.to_string()));
        }

        let bucket_root = self.bucket_root(name);
        let mut entries = fs::read_dir(&bucket_root).await?;
        if entries.next_entry().await?.is_some() {
            return Err(StorageError::BucketNotEmpty(name.to_string()));
        }

        match fs::remove_dir(&bucket_root).await {
            Ok(()) => {
                info!(bucket = name, "deleted bucket");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(StorageError::NoSuchBucket(name.to_string()))
            }
            Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => {
                Err(StorageError::BucketNotEmpty(name.to_string()))
            }
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    /// True when `name` is a safe bucket name backed by a directory.
    pub async fn bucket_exists(&self, name: &str) -> bool {
        if self.ensure_bucket_segment_safe(name).is_err() {
            return false;
        }
        fs::metadata(self.bucket_root(name))
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false)
    }

    /// Stream-upload an object and persist its side-record.
    ///
    /// - Creates intermediate directories implied by the key.
    /// - Writes bytes to a temporary file while computing the MD5.
    /// - Renames over the destination (full overwrite).
    /// - Writes `{key}.metadata.json` with the content type and upload time.
    ///
    /// The temporary file is removed on any error before the rename.
    pub async fn put_object_stream<S>(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<String>,
        stream: S,
    ) -> StorageResult<PutObjectOutput>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        self.ensure_bucket_segment_safe(bucket)?;
        self.ensure_key_safe(key)?;
        if !self.bucket_exists(bucket).await {
            return Err(StorageError::NoSuchBucket(bucket.to_string()));
        }

        let file_path = self.object_path(bucket, key);
        let parent = file_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| io::Error::other("object path missing parent directory"))?;
        fs::create_dir_all(&parent).await?;

        let tmp_path = parent.join(format!("{TMP_PREFIX}{}", Uuid::new_v4()));
        let etag = match write_payload(&tmp_path, stream).await {
            Ok(etag) => etag,
            Err(err) => {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StorageError::Io(err));
            }
        };

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists && is_file(&file_path).await {
                fs::remove_file(&file_path).await?;
                fs::rename(&tmp_path, &file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StorageError::Io(err));
            }
        }

        let record = ObjectMetadata::new(content_type);
        let encoded = serde_json::to_vec(&record).map_err(io::Error::other)?;
        fs::write(Self::metadata_path(&file_path), encoded).await?;

        debug!(bucket, key, etag = %etag, "stored object");
        Ok(PutObjectOutput { etag })
    }

    /// Buffered form of [`StorageService::put_object_stream`].
    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: Option<String>,
    ) -> StorageResult<PutObjectOutput> {
        let body = stream::iter([Ok::<_, io::Error>(data)]);
        self.put_object_stream(bucket, key, content_type, body).await
    }

    /// Read an object in full.
    ///
    /// A missing bucket and a missing key both surface as NoSuchKey.
    pub async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<GetObjectOutput> {
        self.ensure_bucket_segment_safe(bucket)?;
        self.ensure_key_safe(key)?;

        let file_path = self.object_path(bucket, key);
        let meta = self.stat_object(bucket, key, &file_path).await?;
        let data = fs::read(&file_path)
            .await
            .map_err(|err| not_found_as_no_such_key(err, bucket, key))?;
        let etag = format!("{:x}", md5::compute(&data));
        let content_type = read_content_type(&file_path).await;

        Ok(GetObjectOutput {
            data: Bytes::from(data),
            content_type,
            etag,
            last_modified: modified_time(&meta),
        })
    }

    /// Object attributes without the payload. The ETag is still computed
    /// from the full current content.
    pub async fn head_object(&self, bucket: &str, key: &str) -> StorageResult<HeadObjectOutput> {
        self.ensure_bucket_segment_safe(bucket)?;
        self.ensure_key_safe(key)?;

        let file_path = self.object_path(bucket, key);
        let meta = self.stat_object(bucket, key, &file_path).await?;
        let etag = compute_etag(&file_path)
            .await
            .map_err(|err| not_found_as_no_such_key(err, bucket, key))?;

        Ok(HeadObjectOutput {
            size: meta.len(),
            last_modified: modified_time(&meta),
            etag,
            content_type: read_content_type(&file_path).await,
        })
    }

    /// Delete an object, its side-record, and any directories left empty.
    ///
    /// Side-record removal and directory pruning are best-effort.
    pub async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.ensure_bucket_segment_safe(bucket)?;
        self.ensure_key_safe(key)?;

        let file_path = self.object_path(bucket, key);
        self.stat_object(bucket, key, &file_path).await?;
        fs::remove_file(&file_path)
            .await
            .map_err(|err| not_found_as_no_such_key(err, bucket, key))?;
        debug!("removed physical file {}", file_path.display());

        let metadata_path = Self::metadata_path(&file_path);
        match fs::remove_file(&metadata_path).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => debug!(
                "failed to remove side-record {}: {}",
                metadata_path.display(),
                err
            ),
        }

        if let Some(parent) = file_path.parent() {
            let bucket_root = self.bucket_root(bucket);
            self.prune_empty_dirs(parent, &bucket_root).await;
        }

        Ok(())
    }

    /// List objects whose key starts with `prefix`.
    ///
    /// Walks the bucket depth-first, visiting the entries of each directory
    /// in byte-lexical name order. Directories that cannot contain a matching
    /// key are not descended into. Side-records and temporary files are
    /// skipped. `is_truncated` is set when a further match exists beyond
    /// `max_keys`, and `next_marker` then names the last key returned.
    pub async fn list_objects(
        &self,
        bucket: &str,
        params: ListObjectsParams,
    ) -> StorageResult<ListObjectsResult> {
        self.ensure_bucket_segment_safe(bucket)?;
        if !self.bucket_exists(bucket).await {
            return Err(StorageError::NoSuchBucket(bucket.to_string()));
        }

        let prefix = params.prefix.unwrap_or_default();
        let marker = params.marker.filter(|m| !m.is_empty());
        let mut contents: Vec<ObjectSummary> = Vec::new();
        let mut is_truncated = false;

        let mut pending = Vec::new();
        push_children(&self.bucket_root(bucket), "", &mut pending).await?;

        while let Some((path, key)) = pending.pop() {
            let meta = match fs::metadata(&path).await {
                Ok(meta) => meta,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(StorageError::Io(err)),
            };

            if meta.is_dir() {
                let dir_key = format!("{key}/");
                let before_marker = marker.as_deref().is_some_and(|m| {
                    key_order(&key, m) == Ordering::Less && !m.starts_with(&dir_key)
                });
                if !before_marker && (dir_key.starts_with(&prefix) || prefix.starts_with(&dir_key))
                {
                    push_children(&path, &dir_key, &mut pending).await?;
                }
                continue;
            }

            if !meta.is_file() || !key.starts_with(&prefix) {
                continue;
            }
            if marker
                .as_deref()
                .is_some_and(|m| key_order(&key, m) != Ordering::Greater)
            {
                continue;
            }
            if contents.len() >= params.max_keys {
                is_truncated = true;
                break;
            }

            let etag = match compute_etag(&path).await {
                Ok(etag) => etag,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(StorageError::Io(err)),
            };
            contents.push(ObjectSummary {
                key,
                last_modified: modified_time(&meta),
                etag,
                size: meta.len(),
                storage_class: STORAGE_CLASS_STANDARD.to_string(),
            });
        }

        let next_marker = if is_truncated {
            contents.last().map(|o| o.key.clone())
        } else {
            None
        };
        Ok(ListObjectsResult {
            is_truncated,
            key_count: contents.len(),
            marker,
            next_marker,
            contents,
            name: bucket.to_string(),
            prefix,
            max_keys: params.max_keys,
        })
    }

    /// Stat an object payload, mapping absence to NoSuchKey.
    ///
    /// A directory at the key path is reported as absent.
    async fn stat_object(
        &self,
        bucket: &str,
        key: &str,
        file_path: &Path,
    ) -> StorageResult<std::fs::Metadata> {
        match fs::metadata(file_path).await {
            Ok(meta) if meta.is_file() => Ok(meta),
            Ok(_) => Err(StorageError::NoSuchKey {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            Err(err) => Err(not_found_as_no_such_key(err, bucket, key)),
        }
    }

    /// Recursively remove empty directories up to bucket root.
    ///
    /// Stops when:
    /// - directory not empty
    /// - directory not found
    /// - reached root
    /// - encountered unexpected I/O errors
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    debug!("pruned empty directory {}", current.display());
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

/// Write the stream to `path`, returning the hex MD5 of everything written.
async fn write_payload<S>(path: &Path, stream: S) -> io::Result<String>
where
    S: Stream<Item = io::Result<Bytes>>,
{
    let mut file = File::create(path).await?;
    let mut digest = Context::new();
    pin_mut!(stream);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        digest.consume(&chunk);
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    file.sync_all().await?;
    Ok(format!("{:x}", digest.compute()))
}

/// Hex MD5 of a file's current content, read in fixed-size chunks.
async fn compute_etag(path: &Path) -> io::Result<String> {
    let mut file = File::open(path).await?;
    let mut digest = Context::new();
    let mut buf = vec![0u8; ETAG_READ_BUF];
    loop {
        let read = file.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        digest.consume(&buf[..read]);
    }
    Ok(format!("{:x}", digest.compute()))
}

/// Content type from the side-record, or the default when the record is
/// missing, unreadable, or blank.
async fn read_content_type(object_path: &Path) -> String {
    let metadata_path = StorageService::metadata_path(object_path);
    let raw = match fs::read(&metadata_path).await {
        Ok(raw) => raw,
        Err(err) => {
            if err.kind() != ErrorKind::NotFound {
                debug!("unreadable side-record {}: {}", metadata_path.display(), err);
            }
            return DEFAULT_CONTENT_TYPE.to_string();
        }
    };
    match serde_json::from_slice::<ObjectMetadata>(&raw) {
        Ok(record) if !record.content_type.is_empty() => record.content_type,
        Ok(_) => DEFAULT_CONTENT_TYPE.to_string(),
        Err(err) => {
            debug!("malformed side-record {}: {}", metadata_path.display(), err);
            DEFAULT_CONTENT_TYPE.to_string()
        }
    }
}

/// Queue the listable children of `dir` so they pop in ascending name order.
async fn push_children(
    dir: &Path,
    key_prefix: &str,
    pending: &mut Vec<(PathBuf, String)>,
) -> io::Result<()> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };

    let mut children = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let Ok(name) = entry.file_name().into_string() else {
            debug!("skipping non-UTF-8 entry {}", entry.path().display());
            continue;
        };
        if name.ends_with(METADATA_SUFFIX) || name.starts_with(TMP_PREFIX) {
            continue;
        }
        children.push((entry.path(), format!("{key_prefix}{name}")));
    }

    children.sort_by(|a, b| b.1.cmp(&a.1));
    pending.extend(children);
    Ok(())
}

/// Listing order: keys compared segment by segment, which is the order the
/// depth-first walk visits them in.
fn key_order(a: &str, b: &str) -> Ordering {
    a.split('/').cmp(b.split('/'))
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

fn not_found_as_no_such_key(err: io::Error, bucket: &str, key: &str) -> StorageError {
    match err.kind() {
        ErrorKind::NotFound | ErrorKind::NotADirectory => StorageError::NoSuchKey {
            bucket: bucket.to_string(),
            key: key.to_string(),
        },
        _ => StorageError::Io(err),
    }
}

fn modified_time(meta: &std::fs::Metadata) -> DateTime<Utc> {
    meta.modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}

/// Birth time where the filesystem records it, otherwise modification time.
fn creation_time(meta: &std::fs::Metadata) -> DateTime<Utc> {
    meta.created()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| modified_time(meta))
}
