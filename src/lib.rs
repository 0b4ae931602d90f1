//! Filesystem-backed object store with a JSON REST API and an
//! S3-compatible XML API.
//!
//! Buckets are directories under one root, object keys map onto nested
//! paths, and ETags are MD5 digests of the stored bytes.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
