//! # Wrapped Service Entry Point

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;
use wrapped::{
    config::ConfigLoader,
    db,
    ingest::IngestionPipeline,
    repositories::Stores,
    riot::RiotClient,
    server::{run_server, shutdown_signal},
    telemetry,
    worker_pool::WorkerPool,
    wrapped::WrappedService,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigLoader::new().load()?;
    telemetry::init_tracing(&config)?;

    info!(profile = %config.profile, "Loaded configuration");
    if let Ok(redacted_json) = config.redacted_json() {
        tracing::debug!(config = %redacted_json, "Effective configuration");
    }

    let connection = db::init_pool(&config).await?;
    db::run_migrations(&connection).await?;
    db::health_check(&connection).await?;

    let stores = Stores::sea_orm(connection);
    let api = Arc::new(RiotClient::new(config.riot_client_config()?)?);
    let cancel = CancellationToken::new();
    let pipeline = Arc::new(
        IngestionPipeline::new(api.clone(), stores.clone())
            .with_progress_every(config.progress_every)
            .with_cancellation(cancel.clone()),
    );
    let pool = Arc::new(WorkerPool::new(config.worker_pool_size));
    let service = Arc::new(WrappedService::new(api, stores, pool.clone(), pipeline));

    info!(workers = pool.size(), "Worker pool ready");

    let config = Arc::new(config);
    let served = run_server(config, service, shutdown_signal(cancel.clone())).await;

    cancel.cancel();
    pool.shutdown().await;
    served
}
