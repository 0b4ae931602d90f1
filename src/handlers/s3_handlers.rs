//! S3-compatible HTTP handlers.
//! Responses use the AWS XML shapes and status conventions so unmodified
//! SDKs can talk to the store with path-style addressing.

use crate::{
    errors::{S3Error, xml_escape},
    handlers::{body_stream, page_size, quoted_etag, request_content_type, set_object_headers},
    models::bucket::Bucket,
    services::{
        SharedStorage,
        storage_service::{ListObjectsParams, ListObjectsResult},
    },
};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::SecondsFormat;
use serde::Deserialize;

const S3_XMLNS: &str = "http://s3.amazonaws.com/doc/2006-03-01/";
const OWNER_ID: &str = "local-s3";

/// Query params accepted by ListObjects (v1 and v2 share them here).
///
/// `max-keys` is taken as text so a bad value falls back to the default
/// instead of failing extraction.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ListObjectsQuery {
    pub prefix: Option<String>,
    pub max_keys: Option<String>,
    pub marker: Option<String>,
    pub list_type: Option<String>,
    pub continuation_token: Option<String>,
    pub start_after: Option<String>,
}

impl ListObjectsQuery {
    fn is_v2(&self) -> bool {
        self.list_type.as_deref() == Some("2")
    }
}

/// GET `/` — list all buckets.
pub async fn list_buckets(State(service): State<SharedStorage>) -> Result<Response, S3Error> {
    let buckets = service
        .list_buckets()
        .await
        .map_err(|err| S3Error::from_storage(err, "/"))?;
    Ok(xml_response(StatusCode::OK, build_list_buckets_xml(&buckets)))
}

/// PUT `/{bucket}` — create bucket. Any `CreateBucketConfiguration` body is ignored.
pub async fn create_bucket(
    State(service): State<SharedStorage>,
    Path(bucket): Path<String>,
) -> Result<Response, S3Error> {
    service
        .create_bucket(&bucket)
        .await
        .map_err(|err| S3Error::from_storage(err, format!("/{bucket}")))?;

    let mut response = Response::new(Body::empty());
    if let Ok(location) = HeaderValue::from_str(&format!("/{bucket}")) {
        response.headers_mut().insert(header::LOCATION, location);
    }
    Ok(response)
}

/// HEAD `/{bucket}` — bucket pre-flight check.
pub async fn head_bucket(
    State(service): State<SharedStorage>,
    Path(bucket): Path<String>,
) -> StatusCode {
    if service.bucket_exists(&bucket).await {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

/// DELETE `/{bucket}` — delete an empty bucket.
pub async fn delete_bucket(
    State(service): State<SharedStorage>,
    Path(bucket): Path<String>,
) -> Result<StatusCode, S3Error> {
    service
        .delete_bucket(&bucket)
        .await
        .map_err(|err| S3Error::from_storage(err, format!("/{bucket}")))?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET `/{bucket}` — list objects, supports `?prefix=&max-keys=&marker=`.
///
/// With `list-type=2` the resume point is `continuation-token` (or
/// `start-after`), and the token handed back is the last key listed.
pub async fn list_objects(
    State(service): State<SharedStorage>,
    Path(bucket): Path<String>,
    Query(q): Query<ListObjectsQuery>,
) -> Result<Response, S3Error> {
    let v2 = q.is_v2();
    let marker = if v2 {
        q.continuation_token.clone().or(q.start_after.clone())
    } else {
        q.marker.clone()
    };
    let params = ListObjectsParams {
        prefix: q.prefix.clone(),
        max_keys: page_size(q.max_keys.as_deref()),
        marker,
    };
    let result = service
        .list_objects(&bucket, params)
        .await
        .map_err(|err| S3Error::from_storage(err, format!("/{bucket}")))?;
    Ok(xml_response(
        StatusCode::OK,
        build_list_objects_xml(&result, &q),
    ))
}

/// PUT `/{bucket}/{*key}` — upload an object, streaming the body to disk.
pub async fn put_object(
    State(service): State<SharedStorage>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, S3Error> {
    let output = service
        .put_object_stream(
            &bucket,
            &key,
            request_content_type(&headers),
            body_stream(body),
        )
        .await
        .map_err(|err| S3Error::from_storage(err, format!("/{bucket}/{key}")))?;

    let mut response = Response::new(Body::empty());
    if let Ok(value) = HeaderValue::from_str(&quoted_etag(&output.etag)) {
        response.headers_mut().insert(header::ETAG, value);
    }
    Ok(response)
}

/// GET `/{bucket}/{*key}` — download an object.
pub async fn get_object(
    State(service): State<SharedStorage>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, S3Error> {
    let object = service
        .get_object(&bucket, &key)
        .await
        .map_err(|err| S3Error::from_storage(err, format!("/{bucket}/{key}")))?;

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

/// HEAD `/{bucket}/{*key}` — same headers as GET but no body.
///
/// HEAD responses cannot carry an error document, so failures are bare statuses.
pub async fn head_object(
    State(service): State<SharedStorage>,
    Path((bucket, key)): Path<(String, String)>,
) -> Response {
    match service.head_object(&bucket, &key).await {
        Ok(head) => {
            let mut response = Response::new(Body::empty());
            set_object_headers(
                response.headers_mut(),
                &head.content_type,
                head.size,
                &head.etag,
                &head.last_modified,
            );
            response
        }
        Err(err) => S3Error::from_storage(err, format!("/{bucket}/{key}"))
            .status
            .into_response(),
    }
}

/// DELETE `/{bucket}/{*key}` — delete an object.
pub async fn delete_object(
    State(service): State<SharedStorage>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<StatusCode, S3Error> {
    service
        .delete_object(&bucket, &key)
        .await
        .map_err(|err| S3Error::from_storage(err, format!("/{bucket}/{key}")))?;
    Ok(StatusCode::NO_CONTENT)
}

fn xml_response(status: StatusCode, xml: String) -> Response {
    let mut response = Response::new(Body::from(xml));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/xml"),
    );
    *response.status_mut() = status;
    response
}

fn build_list_buckets_xml(buckets: &[Bucket]) -> String {
    let mut xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><ListAllMyBucketsResult xmlns="{S3_XMLNS}">"#
    );
    xml.push_str(&format!(
        "<Owner><ID>{OWNER_ID}</ID><DisplayName>{OWNER_ID}</DisplayName></Owner>"
    ));
    xml.push_str("<Buckets>");
    for bucket in buckets {
        xml.push_str("<Bucket>");
        xml.push_str(&format!("<Name>{}</Name>", xml_escape(&bucket.name)));
        xml.push_str(&format!(
            "<CreationDate>{}</CreationDate>",
            bucket
                .creation_date
                .to_rfc3339_opts(SecondsFormat::Millis, true)
        ));
        xml.push_str("</Bucket>");
    }
    xml.push_str("</Buckets></ListAllMyBucketsResult>");
    xml
}

fn build_list_objects_xml(result: &ListObjectsResult, query: &ListObjectsQuery) -> String {
    let mut xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><ListBucketResult xmlns="{S3_XMLNS}">"#
    );
    xml.push_str(&format!("<Name>{}</Name>", xml_escape(&result.name)));
    xml.push_str(&format!("<Prefix>{}</Prefix>", xml_escape(&result.prefix)));
    xml.push_str(&format!("<MaxKeys>{}</MaxKeys>", result.max_keys));
    xml.push_str(&format!("<KeyCount>{}</KeyCount>", result.key_count));
    xml.push_str(&format!(
        "<IsTruncated>{}</IsTruncated>",
        if result.is_truncated { "true" } else { "false" }
    ));
    if query.is_v2() {
        if let Some(token) = &query.continuation_token {
            xml.push_str(&format!(
                "<ContinuationToken>{}</ContinuationToken>",
                xml_escape(token)
            ));
        }
        if let Some(start_after) = &query.start_after {
            xml.push_str(&format!("<StartAfter>{}</StartAfter>", xml_escape(start_after)));
        }
        if let Some(next) = &result.next_marker {
            xml.push_str(&format!(
                "<NextContinuationToken>{}</NextContinuationToken>",
                xml_escape(next)
            ));
        }
    } else {
        xml.push_str(&format!(
            "<Marker>{}</Marker>",
            xml_escape(result.marker.as_deref().unwrap_or_default())
        ));
        if let Some(next) = &result.next_marker {
            xml.push_str(&format!("<NextMarker>{}</NextMarker>", xml_escape(next)));
        }
    }

    for obj in &result.contents {
        xml.push_str("<Contents>");
        xml.push_str(&format!("<Key>{}</Key>", xml_escape(&obj.key)));
        xml.push_str(&format!(
            "<LastModified>{}</LastModified>",
            obj.last_modified
                .to_rfc3339_opts(SecondsFormat::Millis, true)
        ));
        xml.push_str(&format!(
            "<ETag>{}</ETag>",
            xml_escape(&quoted_etag(&obj.etag))
        ));
        xml.push_str(&format!("<Size>{}</Size>", obj.size));
        xml.push_str(&format!(
            "<StorageClass>{}</StorageClass>",
            xml_escape(&obj.storage_class)
        ));
        xml.push_str("</Contents>");
    }

    xml.push_str("</ListBucketResult>");
    xml
}
