//! JSON REST handlers mounted under `/api`.
//!
//! Same engine operations as the S3 surface, with JSON bodies and
//! `{"error": ...}` failures instead of XML documents.

use crate::{
    errors::AppError,
    handlers::{body_stream, page_size, quoted_etag, request_content_type, set_object_headers},
    models::object::HeadObjectOutput,
    services::{
        SharedStorage,
        storage_service::{ListObjectsParams, ListObjectsResult},
    },
};
use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
pub struct ListObjectsQuery {
    pub prefix: Option<String>,
    #[serde(rename = "max-keys")]
    pub max_keys: Option<String>,
    pub marker: Option<String>,
}

/// GET `/api/buckets`
pub async fn list_buckets(State(service): State<SharedStorage>) -> Result<Json<Value>, AppError> {
    let buckets = service.list_buckets().await?;
    Ok(Json(json!({ "Buckets": buckets })))
}

/// PUT `/api/buckets/{bucket}`
pub async fn create_bucket(
    State(service): State<SharedStorage>,
    Path(bucket): Path<String>,
) -> Result<StatusCode, AppError> {
    service.create_bucket(&bucket).await?;
    Ok(StatusCode::OK)
}

/// DELETE `/api/buckets/{bucket}`
pub async fn delete_bucket(
    State(service): State<SharedStorage>,
    Path(bucket): Path<String>,
) -> Result<StatusCode, AppError> {
    service.delete_bucket(&bucket).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET `/api/buckets/{bucket}/objects?prefix=&max-keys=&marker=`
pub async fn list_objects(
    State(service): State<SharedStorage>,
    Path(bucket): Path<String>,
    Query(q): Query<ListObjectsQuery>,
) -> Result<Json<ListObjectsResult>, AppError> {
    let params = ListObjectsParams {
        max_keys: page_size(q.max_keys.as_deref()),
        prefix: q.prefix,
        marker: q.marker,
    };
    Ok(Json(service.list_objects(&bucket, params).await?))
}

/// PUT `/api/buckets/{bucket}/objects/{*key}`
pub async fn put_object(
    State(service): State<SharedStorage>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, AppError> {
    let output = service
        .put_object_stream(
            &bucket,
            &key,
            request_content_type(&headers),
            body_stream(body),
        )
        .await?;

    let etag_header = HeaderValue::from_str(&quoted_etag(&output.etag)).ok();
    let mut response = Json(output).into_response();
    if let Some(value) = etag_header {
        response.headers_mut().insert(header::ETAG, value);
    }
    Ok(response)
}

/// GET `/api/buckets/{bucket}/objects/{*key}`
pub async fn get_object(
    State(service): State<SharedStorage>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let object = service.get_object(&bucket, &key).await?;
    let length = object.data.len() as u64;
    let mut response = Response::new(Body::from(object.data));
    set_object_headers(
        response.headers_mut(),
        &object.content_type,
        length,
        &object.etag,
        &object.last_modified,
    );
    Ok(response)
}

/// HEAD `/api/buckets/{bucket}/objects/{*key}` — headers only.
pub async fn head_object(
    State(service): State<SharedStorage>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let head = service.head_object(&bucket, &key).await?;
    let mut response = Response::new(Body::empty());
    set_object_headers(
        response.headers_mut(),
        &head.content_type,
        head.size,
        &head.etag,
        &head.last_modified,
    );
    Ok(response)
}

/// GET `/api/buckets/{bucket}/head/{*key}` — object attributes as JSON.
pub async fn object_info(
    State(service): State<SharedStorage>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Json<HeadObjectOutput>, AppError> {
    Ok(Json(service.head_object(&bucket, &key).await?))
}

/// DELETE `/api/buckets/{bucket}/objects/{*key}`
pub async fn delete_object(
    State(service): State<SharedStorage>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    service.delete_object(&bucket, &key).await?;
    Ok(StatusCode::NO_CONTENT)
}
