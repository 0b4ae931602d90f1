//! Defines routes for both transport surfaces over one `StorageService`.
//!
//! ## Structure
//! - **Probes**
//!   - `GET /health`, `GET /readyz`
//!
//! - **REST JSON** (`/api`)
//!   - `GET    /api/buckets` — list buckets
//!   - `PUT    /api/buckets/{bucket}` — create bucket
//!   - `DELETE /api/buckets/{bucket}` — delete bucket
//!   - `GET    /api/buckets/{bucket}/objects` — list objects (prefix, max-keys)
//!   - `PUT|GET|HEAD|DELETE /api/buckets/{bucket}/objects/{*key}` — object CRUD
//!   - `GET    /api/buckets/{bucket}/head/{*key}` — object attributes as JSON
//!
//! - **S3-compatible XML**
//!   - `GET    /` — list buckets
//!   - `GET|PUT|HEAD|DELETE /{bucket}` — list objects / create / exists / delete
//!   - `PUT|GET|HEAD|DELETE /{bucket}/{*key}` — object CRUD
//!
//! The wildcard `*key` allows nested keys like `photos/2025/img.jpg`.

use crate::{
    handlers::{api_handlers, health_handlers, s3_handlers},
    services::SharedStorage,
};
use axum::{
    Router,
    routing::{get, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// REST routes, relative to the `/api` mount point.
fn api_routes() -> Router<SharedStorage> {
    Router::new()
        .route("/buckets", get(api_handlers::list_buckets))
        .route(
            "/buckets/{bucket}",
            put(api_handlers::create_bucket).delete(api_handlers::delete_bucket),
        )
        .route("/buckets/{bucket}/objects", get(api_handlers::list_objects))
        .route(
            "/buckets/{bucket}/objects/{*key}",
            put(api_handlers::put_object)
                .get(api_handlers::get_object)
                .head(api_handlers::head_object)
                .delete(api_handlers::delete_object),
        )
        .route("/buckets/{bucket}/head/{*key}", get(api_handlers::object_info))
}

/// S3 routes. Mounted last so the static `/health` and `/api` paths win.
fn s3_routes() -> Router<SharedStorage> {
    Router::new()
        .route("/", get(s3_handlers::list_buckets))
        .route(
            "/{bucket}/{*key}",
            put(s3_handlers::put_object)
                .get(s3_handlers::get_object)
                .head(s3_handlers::head_object)
                .delete(s3_handlers::delete_object),
        )
        .route(
            "/{bucket}",
            get(s3_handlers::list_objects)
                .put(s3_handlers::create_bucket)
                .head(s3_handlers::head_bucket)
                .delete(s3_handlers::delete_bucket),
        )
}

/// Build the router for all routes without state.
pub fn routes() -> Router<SharedStorage> {
    Router::new()
        .route("/health", get(health_handlers::health))
        .route("/readyz", get(health_handlers::readyz))
        .nest("/api", api_routes())
        .merge(s3_routes())
}

/// The complete application: routes, CORS, request tracing, and the shared engine.
pub fn app(storage: SharedStorage) -> Router {
    routes()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(storage)
}
