use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use fs_object_store::{routes, services::storage_service::StorageService};
use serde_json::Value;
use std::sync::Arc;
use tempfile::{TempDir, tempdir};
use tower::ServiceExt;

fn app() -> (TempDir, Router) {
    let dir = tempdir().unwrap();
    let storage = StorageService::new(dir.path().join("storage"));
    (dir, routes::app(Arc::new(storage)))
}

async fn send(app: &Router, method: Method, uri: &str, body: Body) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(body)
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

fn md5_hex(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}

#[tokio::test]
async fn health_reports_ok() {
    let (_dir, app) = app();
    let response = send(&app, Method::GET, "/health", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn s3_end_to_end_hello_world() {
    let (_dir, app) = app();

    let created = send(&app, Method::PUT, "/test", Body::empty()).await;
    assert_eq!(created.status(), StatusCode::OK);

    let put = Request::builder()
        .method(Method::PUT)
        .uri("/test/hello.txt")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("Hello World!"))
        .unwrap();
    let put = app.clone().oneshot(put).await.unwrap();
    assert_eq!(put.status(), StatusCode::OK);
    let expected_etag = format!("\"{}\"", md5_hex(b"Hello World!"));
    assert_eq!(put.headers()[header::ETAG], expected_etag.as_str());

    let listed = send(&app, Method::GET, "/test?list-type=2", Body::empty()).await;
    assert_eq!(listed.status(), StatusCode::OK);
    assert_eq!(listed.headers()[header::CONTENT_TYPE], "application/xml");
    let xml = body_text(listed).await;
    assert!(xml.contains("<Name>test</Name>"));
    assert!(xml.contains("<Key>hello.txt</Key>"));
    assert!(xml.contains("<Size>12</Size>"));
    assert!(xml.contains("<StorageClass>STANDARD</StorageClass>"));
    assert!(xml.contains("<IsTruncated>false</IsTruncated>"));

    let got = send(&app, Method::GET, "/test/hello.txt", Body::empty()).await;
    assert_eq!(got.status(), StatusCode::OK);
    assert_eq!(got.headers()[header::CONTENT_TYPE], "text/plain");
    assert_eq!(got.headers()[header::CONTENT_LENGTH], "12");
    assert_eq!(got.headers()[header::ETAG], expected_etag.as_str());
    assert!(got.headers().contains_key(header::LAST_MODIFIED));
    assert_eq!(body_text(got).await, "Hello World!");

    let deleted = send(&app, Method::DELETE, "/test/hello.txt", Body::empty()).await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let listed = send(&app, Method::GET, "/test", Body::empty()).await;
    let xml = body_text(listed).await;
    assert!(!xml.contains("<Contents>"));
    assert!(xml.contains("<KeyCount>0</KeyCount>"));
}

#[tokio::test]
async fn s3_bucket_errors_are_xml_documents() {
    let (_dir, app) = app();
    send(&app, Method::PUT, "/photos", Body::empty()).await;

    let dup = send(&app, Method::PUT, "/photos", Body::empty()).await;
    assert_eq!(dup.status(), StatusCode::CONFLICT);
    assert_eq!(dup.headers()[header::CONTENT_TYPE], "application/xml");
    assert!(body_text(dup).await.contains("<Code>BucketAlreadyExists</Code>"));

    let missing = send(&app, Method::DELETE, "/ghost", Body::empty()).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert!(body_text(missing).await.contains("<Code>NoSuchBucket</Code>"));

    send(&app, Method::PUT, "/photos/cat.jpg", Body::from("meow")).await;
    let not_empty = send(&app, Method::DELETE, "/photos", Body::empty()).await;
    assert_eq!(not_empty.status(), StatusCode::CONFLICT);
    assert!(body_text(not_empty).await.contains("<Code>BucketNotEmpty</Code>"));

    let no_key = send(&app, Method::GET, "/photos/dog.jpg", Body::empty()).await;
    assert_eq!(no_key.status(), StatusCode::NOT_FOUND);
    assert!(body_text(no_key).await.contains("<Code>NoSuchKey</Code>"));

    let put_missing = send(&app, Method::PUT, "/ghost/k", Body::from("x")).await;
    assert_eq!(put_missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn s3_head_bucket_and_object() {
    let (_dir, app) = app();
    assert_eq!(
        send(&app, Method::HEAD, "/media", Body::empty()).await.status(),
        StatusCode::NOT_FOUND
    );

    send(&app, Method::PUT, "/media", Body::empty()).await;
    assert_eq!(
        send(&app, Method::HEAD, "/media", Body::empty()).await.status(),
        StatusCode::OK
    );

    send(&app, Method::PUT, "/media/clips/a.bin", Body::from("abcdef")).await;
    let head = send(&app, Method::HEAD, "/media/clips/a.bin", Body::empty()).await;
    assert_eq!(head.status(), StatusCode::OK);
    assert_eq!(head.headers()[header::CONTENT_LENGTH], "6");
    assert_eq!(
        head.headers()[header::CONTENT_TYPE],
        "application/octet-stream"
    );
    let expected_etag = format!("\"{}\"", md5_hex(b"abcdef"));
    assert_eq!(head.headers()[header::ETAG], expected_etag.as_str());

    let missing = send(&app, Method::HEAD, "/media/clips/b.bin", Body::empty()).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn s3_list_buckets_and_prefix_listing() {
    let (_dir, app) = app();
    send(&app, Method::PUT, "/bucket-b", Body::empty()).await;
    send(&app, Method::PUT, "/bucket-a", Body::empty()).await;

    let listed = send(&app, Method::GET, "/", Body::empty()).await;
    assert_eq!(listed.status(), StatusCode::OK);
    let xml = body_text(listed).await;
    assert!(xml.contains("<ListAllMyBucketsResult"));
    let a = xml.find("<Name>bucket-a</Name>").unwrap();
    let b = xml.find("<Name>bucket-b</Name>").unwrap();
    assert!(a < b);

    send(&app, Method::PUT, "/bucket-a/documents/report.txt", Body::from("r")).await;
    send(&app, Method::PUT, "/bucket-a/images/photo.jpg", Body::from("p")).await;

    let listed = send(
        &app,
        Method::GET,
        "/bucket-a?prefix=documents/",
        Body::empty(),
    )
    .await;
    let xml = body_text(listed).await;
    assert!(xml.contains("<Prefix>documents/</Prefix>"));
    assert!(xml.contains("<Key>documents/report.txt</Key>"));
    assert!(!xml.contains("images/photo.jpg"));

    let truncated = send(&app, Method::GET, "/bucket-a?max-keys=1", Body::empty()).await;
    let xml = body_text(truncated).await;
    assert_eq!(xml.matches("<Contents>").count(), 1);
    assert!(xml.contains("<MaxKeys>1</MaxKeys>"));
    assert!(xml.contains("<IsTruncated>true</IsTruncated>"));
}

#[tokio::test]
async fn rest_bucket_lifecycle() {
    let (_dir, app) = app();

    let created = send(&app, Method::PUT, "/api/buckets/docs", Body::empty()).await;
    assert_eq!(created.status(), StatusCode::OK);

    let dup = send(&app, Method::PUT, "/api/buckets/docs", Body::empty()).await;
    assert_eq!(dup.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(dup).await["error"], "BucketAlreadyExists");

    let listed = send(&app, Method::GET, "/api/buckets", Body::empty()).await;
    let json = body_json(listed).await;
    assert_eq!(json["Buckets"][0]["Name"], "docs");
    assert!(json["Buckets"][0]["CreationDate"].is_string());

    let deleted = send(&app, Method::DELETE, "/api/buckets/docs", Body::empty()).await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let missing = send(&app, Method::DELETE, "/api/buckets/docs", Body::empty()).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(missing).await["error"], "NoSuchBucket");
}

#[tokio::test]
async fn rest_object_lifecycle() {
    let (_dir, app) = app();
    send(&app, Method::PUT, "/api/buckets/docs", Body::empty()).await;

    let put = Request::builder()
        .method(Method::PUT)
        .uri("/api/buckets/docs/objects/reports/q1.csv")
        .header(header::CONTENT_TYPE, "text/csv")
        .body(Body::from("a,b\n1,2\n"))
        .unwrap();
    let put = app.clone().oneshot(put).await.unwrap();
    assert_eq!(put.status(), StatusCode::OK);
    let etag = md5_hex(b"a,b\n1,2\n");
    assert_eq!(body_json(put).await["ETag"], etag.as_str());

    let listed = send(
        &app,
        Method::GET,
        "/api/buckets/docs/objects?prefix=reports/",
        Body::empty(),
    )
    .await;
    let json = body_json(listed).await;
    assert_eq!(json["Name"], "docs");
    assert_eq!(json["Prefix"], "reports/");
    assert_eq!(json["MaxKeys"], 1000);
    assert_eq!(json["IsTruncated"], false);
    assert_eq!(json["Contents"][0]["Key"], "reports/q1.csv");
    assert_eq!(json["Contents"][0]["Size"], 8);
    assert_eq!(json["Contents"][0]["ETag"], etag.as_str());

    let got = send(
        &app,
        Method::GET,
        "/api/buckets/docs/objects/reports/q1.csv",
        Body::empty(),
    )
    .await;
    assert_eq!(got.status(), StatusCode::OK);
    assert_eq!(got.headers()[header::CONTENT_TYPE], "text/csv");
    assert_eq!(body_text(got).await, "a,b\n1,2\n");

    let info = send(
        &app,
        Method::GET,
        "/api/buckets/docs/head/reports/q1.csv",
        Body::empty(),
    )
    .await;
    let json = body_json(info).await;
    assert_eq!(json["size"], 8);
    assert_eq!(json["etag"], etag.as_str());
    assert_eq!(json["contentType"], "text/csv");
    assert!(json["lastModified"].is_string());

    let not_empty = send(&app, Method::DELETE, "/api/buckets/docs", Body::empty()).await;
    assert_eq!(not_empty.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(not_empty).await["error"], "BucketNotEmpty");

    let deleted = send(
        &app,
        Method::DELETE,
        "/api/buckets/docs/objects/reports/q1.csv",
        Body::empty(),
    )
    .await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let gone = send(
        &app,
        Method::GET,
        "/api/buckets/docs/objects/reports/q1.csv",
        Body::empty(),
    )
    .await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(gone).await["error"], "NoSuchKey");

    let emptied = send(&app, Method::DELETE, "/api/buckets/docs", Body::empty()).await;
    assert_eq!(emptied.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn rest_rejects_unsafe_keys() {
    let (_dir, app) = app();
    send(&app, Method::PUT, "/api/buckets/docs", Body::empty()).await;

    let response = send(
        &app,
        Method::PUT,
        "/api/buckets/docs/objects/a/..%2F..%2Fescape",
        Body::from("x"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "InvalidArgument");
}

#[tokio::test]
async fn s3_bad_max_keys_falls_back_to_default_page() {
    let (_dir, app) = app();
    send(&app, Method::PUT, "/test", Body::empty()).await;
    send(&app, Method::PUT, "/test/one.txt", Body::from("1")).await;
    send(&app, Method::PUT, "/test/two.txt", Body::from("2")).await;

    for uri in ["/test?max-keys=abc", "/test?max-keys=0", "/test?max-keys=5000"] {
        let response = send(&app, Method::GET, uri, Body::empty()).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        let xml = body_text(response).await;
        assert!(xml.contains("<MaxKeys>1000</MaxKeys>"), "{uri}: {xml}");
        assert!(xml.contains("<KeyCount>2</KeyCount>"), "{uri}: {xml}");
        assert!(xml.contains("<IsTruncated>false</IsTruncated>"), "{uri}: {xml}");
    }

    let listed = send(
        &app,
        Method::GET,
        "/api/buckets/test/objects?max-keys=abc",
        Body::empty(),
    )
    .await;
    assert_eq!(listed.status(), StatusCode::OK);
    assert_eq!(body_json(listed).await["MaxKeys"], 1000);
}

#[tokio::test]
async fn s3_pages_with_next_marker() {
    let (_dir, app) = app();
    send(&app, Method::PUT, "/pages", Body::empty()).await;
    for key in ["a.txt", "b.txt", "c.txt"] {
        send(&app, Method::PUT, &format!("/pages/{key}"), Body::from("x")).await;
    }

    let first = body_text(send(&app, Method::GET, "/pages?max-keys=2", Body::empty()).await).await;
    assert!(first.contains("<Key>a.txt</Key><"));
    assert!(first.contains("<Key>b.txt</Key><"));
    assert!(first.contains("<IsTruncated>true</IsTruncated>"));
    assert!(first.contains("<NextMarker>b.txt</NextMarker>"));

    let second = body_text(
        send(
            &app,
            Method::GET,
            "/pages?max-keys=2&marker=b.txt",
            Body::empty(),
        )
        .await,
    )
    .await;
    assert!(second.contains("<Marker>b.txt</Marker>"));
    assert_eq!(second.matches("<Contents>").count(), 1);
    assert!(second.contains("<Key>c.txt</Key>"));
    assert!(second.contains("<IsTruncated>false</IsTruncated>"));
    assert!(!second.contains("<NextMarker>"));

    let v2 = body_text(
        send(
            &app,
            Method::GET,
            "/pages?list-type=2&max-keys=1&continuation-token=a.txt",
            Body::empty(),
        )
        .await,
    )
    .await;
    assert!(v2.contains("<ContinuationToken>a.txt</ContinuationToken>"));
    assert!(v2.contains("<Key>b.txt</Key>"));
    assert!(v2.contains("<NextContinuationToken>b.txt</NextContinuationToken>"));
}

#[tokio::test]
async fn rest_head_object_returns_headers_only() {
    let (_dir, app) = app();
    send(&app, Method::PUT, "/api/buckets/docs", Body::empty()).await;
    let put = Request::builder()
        .method(Method::PUT)
        .uri("/api/buckets/docs/objects/notes/today.md")
        .header(header::CONTENT_TYPE, "text/markdown")
        .body(Body::from("# hi"))
        .unwrap();
    app.clone().oneshot(put).await.unwrap();

    let head = send(
        &app,
        Method::HEAD,
        "/api/buckets/docs/objects/notes/today.md",
        Body::empty(),
    )
    .await;
    assert_eq!(head.status(), StatusCode::OK);
    assert_eq!(head.headers()[header::CONTENT_TYPE], "text/markdown");
    assert_eq!(head.headers()[header::CONTENT_LENGTH], "4");
    let expected_etag = format!("\"{}\"", md5_hex(b"# hi"));
    assert_eq!(head.headers()[header::ETAG], expected_etag.as_str());
    assert!(head.headers().contains_key(header::LAST_MODIFIED));
    assert!(body_bytes(head).await.is_empty());

    let missing = send(
        &app,
        Method::HEAD,
        "/api/buckets/docs/objects/notes/other.md",
        Body::empty(),
    )
    .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn readyz_checks_the_store_root() {
    let (_dir, app) = app();

    // The root is created lazily, so nothing is writable yet.
    let before = send(&app, Method::GET, "/readyz", Body::empty()).await;
    assert_eq!(before.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(before).await["disk"]["ok"], false);

    send(&app, Method::PUT, "/api/buckets/docs", Body::empty()).await;
    let ready = send(&app, Method::GET, "/readyz", Body::empty()).await;
    assert_eq!(ready.status(), StatusCode::OK);
    let json = body_json(ready).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["disk"]["ok"], true);

    let buckets = body_json(send(&app, Method::GET, "/api/buckets", Body::empty()).await).await;
    assert_eq!(buckets["Buckets"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn buckets_named_like_probes_stay_usable_over_rest() {
    let (_dir, app) = app();
    let created = send(&app, Method::PUT, "/api/buckets/health", Body::empty()).await;
    assert_eq!(created.status(), StatusCode::OK);
    send(&app, Method::PUT, "/api/buckets/health/objects/k", Body::from("v")).await;

    // On the S3 surface the probe route wins.
    let probe = send(&app, Method::GET, "/health", Body::empty()).await;
    assert_eq!(body_json(probe).await["status"], "ok");

    let listed = send(&app, Method::GET, "/api/buckets/health/objects", Body::empty()).await;
    assert_eq!(body_json(listed).await["Contents"][0]["Key"], "k");
}
