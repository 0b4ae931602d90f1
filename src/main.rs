use anyhow::{Context, Result};
use fs_object_store::{config::AppConfig, routes, services::storage_service::StorageService};
use std::{io::ErrorKind, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env_and_args()?;
    tracing::info!("Starting fs-object-store with config: {:?}", cfg);

    // --- Initialize the single engine instance ---
    let storage = StorageService::init(cfg.storage_dir.clone())
        .await
        .with_context(|| format!("creating storage directory {}", cfg.storage_dir))?;
    tracing::info!("Serving buckets from {}", storage.base_path().display());

    let app = routes::app(Arc::new(storage));

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    tracing::info!("REST API at /api, S3 API at /");
    axum::serve(listener, app).await?;

    Ok(())
}
