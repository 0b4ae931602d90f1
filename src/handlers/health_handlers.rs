//! Health & readiness handlers.
//!
//! - GET /health  -> liveness with a timestamp
//! - GET /readyz  -> readiness that checks disk I/O under the store root

use crate::services::SharedStorage;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tokio::fs;
use uuid::Uuid;

/// `GET /health`
///
/// Always 200. Never performs I/O.
pub async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }),
    )
}

/// `GET /readyz`
///
/// Performs a best-effort write/read/delete of a scratch file in the store
/// root. The scratch file is a plain file, so it never shows up as a bucket.
/// HTTP 200 when the round trip works, HTTP 503 otherwise.
pub async fn readyz(State(service): State<SharedStorage>) -> impl IntoResponse {
    let tmp_path = service
        .base_path()
        .join(format!(".readyz-{}", Uuid::new_v4()));

    let disk_error = match fs::write(&tmp_path, b"readyz").await {
        Ok(()) => {
            let outcome = match fs::read(&tmp_path).await {
                Ok(bytes) if bytes == b"readyz" => None,
                Ok(_) => Some("file content mismatch".to_string()),
                Err(e) => Some(format!("could not read tmp file: {}", e)),
            };
            let _ = fs::remove_file(&tmp_path).await;
            outcome
        }
        Err(e) => Some(format!("could not write tmp file: {}", e)),
    };

    let ok = disk_error.is_none();
    let body = ReadyResponse {
        status: if ok { "ok".into() } else { "error".into() },
        disk: CheckStatus {
            ok,
            error: disk_error,
        },
    };
    let status = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    timestamp: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    disk: CheckStatus,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
