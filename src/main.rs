use anyhow::Result;
use axum::Router;
use std::{io::ErrorKind, net::SocketAddr, path::Path, sync::Arc};
use tokio::{fs, net::TcpListener};
use tracing_subscriber::EnvFilter;

mod auth;
mod config;
mod db;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;
#[cfg(test)]
mod test_support;

use services::{
    bucket_service::BucketService, content_store::LocalContentStore,
    metadata_store::SqliteMetadataStore, object_service::ObjectService, paths::StorageLayout,
};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = config::AppConfig::from_env_and_args()?;
    tracing::info!("Starting versioned object store with config: {:?}", cfg);

    // --- Ensure storage directory exists ---
    let storage_root = Path::new(&cfg.storage_dir).to_path_buf();
    if !fs::try_exists(&storage_root).await? {
        fs::create_dir_all(&storage_root).await?;
        tracing::info!("Created storage directory at {}", storage_root.display());
    }

    // --- Metadata database ---
    let db = Arc::new(db::connect(&cfg.database_url).await?);
    db::run_migrations(&db).await?;
    if migrate {
        tracing::info!("Database migration complete.");
        return Ok(());
    }

    // --- Services ---
    let layout = StorageLayout::new(storage_root.clone());
    let objects = ObjectService::new(
        Arc::new(SqliteMetadataStore::new(db.clone())),
        Arc::new(LocalContentStore::new(layout.root())),
        layout,
        cfg.object_service_config(),
    );
    let state = AppState {
        db: db.clone(),
        buckets: BucketService::new(db),
        objects,
        storage_root,
        max_page_size: cfg.max_page_size,
    };

    // --- Build router ---
    let app: Router = routes::routes::routes().with_state(state);

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
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
