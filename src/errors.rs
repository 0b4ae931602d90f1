use crate::services::storage_service::StorageError;
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use tracing::error;

/// Status code the transports use for an engine failure.
pub fn status_for(err: &StorageError) -> StatusCode {
    match err {
        StorageError::BucketAlreadyExists(_) | StorageError::BucketNotEmpty(_) => {
            StatusCode::CONFLICT
        }
        StorageError::NoSuchBucket(_) | StorageError::NoSuchKey { .. } => StatusCode::NOT_FOUND,
        StorageError::InvalidBucketName { .. } | StorageError::InvalidObjectKey { .. } => {
            StatusCode::BAD_REQUEST
        }
        StorageError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// JSON error for the REST surface: `{"error": code, "message": ..., "status": ...}`.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status, code and message.
    pub fn new(status: StatusCode, code: &'static str, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: msg.into(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.code,
            "message": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        if let StorageError::Io(io_err) = &err {
            error!("storage I/O failure: {}", io_err);
        }
        AppError::new(status_for(&err), err.code(), err.to_string())
    }
}

/// XML error for the S3 surface, shaped the way AWS SDKs parse it.
#[derive(Debug)]
pub struct S3Error {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub resource: String,
}

impl S3Error {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        msg: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            status,
            code,
            message: msg.into(),
            resource: resource.into(),
        }
    }

    /// Map an engine failure, naming the bucket or object it concerned.
    pub fn from_storage(err: StorageError, resource: impl Into<String>) -> Self {
        if let StorageError::Io(io_err) = &err {
            error!("storage I/O failure: {}", io_err);
        }
        let message = match &err {
            StorageError::BucketAlreadyExists(_) => {
                "The requested bucket name already exists".to_string()
            }
            StorageError::NoSuchBucket(_) => "The specified bucket does not exist".to_string(),
            StorageError::BucketNotEmpty(_) => {
                "The bucket you tried to delete is not empty".to_string()
            }
            StorageError::NoSuchKey { .. } => "The specified key does not exist".to_string(),
            StorageError::Io(_) => "We encountered an internal error".to_string(),
            other => other.to_string(),
        };
        Self::new(status_for(&err), err.code(), message, resource)
    }

    pub fn to_xml(&self) -> String {
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                r#"<Error>"#,
                r#"<Code>{}</Code>"#,
                r#"<Message>{}</Message>"#,
                r#"<Resource>{}</Resource>"#,
                r#"</Error>"#
            ),
            self.code,
            xml_escape(&self.message),
            xml_escape(&self.resource)
        )
    }
}

impl fmt::Display for S3Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for S3Error {}

impl IntoResponse for S3Error {
    fn into_response(self) -> Response {
        let body = self.to_xml();
        let mut response = (self.status, body).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/xml"),
        );
        response
    }
}

pub fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
