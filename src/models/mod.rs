//! Core data models for the filesystem-backed object store.
//!
//! These entities describe buckets, objects and the metadata side-record
//! persisted next to each object. They serialize with the S3 field names
//! (`Name`, `Key`, `ETag`, ...) so the JSON adapter can return them as-is.

pub mod bucket;
pub mod metadata;
pub mod object;
